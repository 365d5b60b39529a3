//! Serialized document -> pixels -> live texture.
//!
//! A capture never writes foreign pixels into the engine texture directly:
//! the rasterizer's output is drawn into an [`IntermediateCanvas`] owned by
//! the screen, and [`DynamicTexture::blit_from`] only accepts that canvas.

use std::{
    fs::File,
    path::Path,
    time::{Duration, Instant},
};

use anyhow::Context;
use glam::UVec2;
use image::{
    codecs::png::PngEncoder,
    imageops::{self, FilterType},
    ColorType, ImageEncoder, Rgba, RgbaImage,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::DocumentError;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no document loaded")]
    NotLoaded,
    #[error("screen mesh or material unavailable")]
    MaterialMissing,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("failed to decode serialized document: {0}")]
    Decode(String),
    #[error("rasterization exceeded {0:?}")]
    Timeout(Duration),
    #[error("document has an empty {width}x{height} surface")]
    EmptySurface { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub fill: [u8; 4],
}

/// Flattened draw list a document serializes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderList {
    pub width: u32,
    pub height: u32,
    pub background: [u8; 4],
    pub quads: Vec<Quad>,
}

pub trait Rasterizer {
    /// Decodes serialized markup and renders it at its own page size.
    fn rasterize(&mut self, markup: &str, timeout: Duration) -> Result<RgbaImage, CaptureError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareRasterizer;

impl Rasterizer for SoftwareRasterizer {
    fn rasterize(&mut self, markup: &str, timeout: Duration) -> Result<RgbaImage, CaptureError> {
        let started = Instant::now();
        let list: RenderList =
            serde_json::from_str(markup).map_err(|err| CaptureError::Decode(err.to_string()))?;
        if list.width == 0 || list.height == 0 {
            return Err(CaptureError::EmptySurface {
                width: list.width,
                height: list.height,
            });
        }
        let mut image = RgbaImage::from_pixel(list.width, list.height, Rgba(list.background));
        for quad in &list.quads {
            fill_quad(&mut image, quad);
        }
        if started.elapsed() > timeout {
            return Err(CaptureError::Timeout(timeout));
        }
        Ok(image)
    }
}

fn fill_quad(image: &mut RgbaImage, quad: &Quad) {
    let x0 = quad.x.max(0) as u32;
    let y0 = quad.y.max(0) as u32;
    let x1 = (quad.x + quad.width as i32).clamp(0, image.width() as i32) as u32;
    let y1 = (quad.y + quad.height as i32).clamp(0, image.height() as i32) as u32;
    let alpha = u32::from(quad.fill[3]);
    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                let src = u32::from(quad.fill[channel]);
                let dst = u32::from(pixel.0[channel]);
                pixel.0[channel] = ((src * alpha + dst * (255 - alpha)) / 255) as u8;
            }
            pixel.0[3] = 255;
        }
    }
}

/// Same-origin buffer at the texture's resolution.
#[derive(Debug, Clone)]
pub struct IntermediateCanvas {
    pixels: RgbaImage,
}

impl IntermediateCanvas {
    pub fn new(size: UVec2) -> Self {
        IntermediateCanvas {
            pixels: RgbaImage::new(size.x, size.y),
        }
    }

    /// Draws `source` scaled to fill the canvas.
    pub fn draw(&mut self, source: &RgbaImage) {
        if source.dimensions() == self.pixels.dimensions() {
            self.pixels.copy_from_slice(source.as_raw());
        } else {
            self.pixels = imageops::resize(
                source,
                self.pixels.width(),
                self.pixels.height(),
                FilterType::Triangle,
            );
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// The buffer bound to the screen material.
#[derive(Debug, Clone)]
pub struct DynamicTexture {
    buffer: RgbaImage,
    generation: u64,
}

impl DynamicTexture {
    pub fn new(size: UVec2) -> Self {
        DynamicTexture {
            buffer: RgbaImage::from_pixel(size.x, size.y, Rgba([0, 0, 0, 255])),
            generation: 0,
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.buffer.width(), self.buffer.height())
    }

    pub fn blit_from(&mut self, canvas: &IntermediateCanvas) -> u64 {
        imageops::replace(&mut self.buffer, canvas.pixels(), 0, 0);
        self.generation += 1;
        self.generation
    }

    pub fn clear(&mut self, color: [u8; 4]) -> u64 {
        for pixel in self.buffer.pixels_mut() {
            *pixel = Rgba(color);
        }
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let encoder = PngEncoder::new(file);
        encoder
            .write_image(
                self.buffer.as_raw(),
                self.buffer.width(),
                self.buffer.height(),
                ColorType::Rgba8.into(),
            )
            .with_context(|| format!("writing PNG to {}", path.display()))?;
        Ok(())
    }
}
