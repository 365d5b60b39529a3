use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrosshairStyle {
    Idle,
    Focused,
}

impl CrosshairStyle {
    pub fn color(self) -> [u8; 4] {
        match self {
            CrosshairStyle::Idle => [255, 255, 255, 200],
            CrosshairStyle::Focused => [255, 170, 40, 255],
        }
    }

    pub fn size_px(self) -> u32 {
        match self {
            CrosshairStyle::Idle => 4,
            CrosshairStyle::Focused => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    Hidden,
    /// "Press F to interact"
    Interact,
    /// "Press Esc to exit"
    Exit,
}

/// Crosshair and key prompt as the host should draw them this frame.
#[derive(Debug, Clone, Serialize)]
pub struct Hud {
    pub crosshair_visible: bool,
    pub crosshair: CrosshairStyle,
    pub prompt: Prompt,
}

impl Default for Hud {
    fn default() -> Self {
        Hud {
            crosshair_visible: true,
            crosshair: CrosshairStyle::Idle,
            prompt: Prompt::Hidden,
        }
    }
}

impl Hud {
    pub fn show_focus(&mut self, focused: bool) {
        if focused {
            self.crosshair = CrosshairStyle::Focused;
            self.prompt = Prompt::Interact;
        } else {
            self.crosshair = CrosshairStyle::Idle;
            self.prompt = Prompt::Hidden;
        }
    }
}

/// Pointer-lock request state; the host mirrors it onto the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointerState {
    pub locked: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        PointerState { locked: true }
    }
}

/// Global render toggles the core may suspend while locked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderSettings {
    pub fxaa: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings { fxaa: true }
    }
}
