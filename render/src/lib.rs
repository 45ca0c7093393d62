pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod influence;
pub mod layers;
pub mod orders;
pub mod queue;
pub mod scene;
pub mod settings;
pub mod tracker;

#[cfg(test)]
mod test_support;

pub use command::{CommandExecutor, CommandFactory, RenderCommand};
pub use config::EngineConfig;
pub use engine::{EngineHandle, MapRenderer};
pub use error::{MapError, RenderError};
pub use layers::{ToggleLayer, ZPriority};
pub use queue::{Admission, CommandQueue, QueueStats};
pub use scene::{ElementHandle, RetainedScene, SceneDocument, build_skeleton};
pub use settings::{LabelLevel, RenderSettings, SettingKey, SettingValue};
