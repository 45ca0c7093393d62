use thiserror::Error;

/// Structural problems found while binding a map descriptor to its scene.
///
/// Fatal to loading that map, never to the host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("map format error: {0}")]
    Format(String),
}

impl MapError {
    pub fn format(description: impl Into<String>) -> Self {
        MapError::Format(description.into())
    }
}

/// Runtime contract violations reported by command execution or submission.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("influence mode is already active")]
    InfluenceAlreadyActive,
    #[error("influence mode is not active")]
    InfluenceNotActive,
    #[error("render engine is closed")]
    Closed,
}
