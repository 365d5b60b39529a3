pub mod frames;
pub mod panel;
pub mod scene_doc;

pub use frames::{FrameConfig, FrameEntry};
pub use panel::{PanelLayout, PanelNode, PanelRect, PanelRole, Rgba};
pub use scene_doc::{
    ModelEntry, SaveSceneRequest, SceneDocument, SceneObject, SceneObjectKind, SceneStore,
    list_models,
};
