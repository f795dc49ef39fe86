use std::fmt;

use crate::config::ConfigError;

/// Failure reported by a [`RenderBackend2D`](crate::RenderBackend2D) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The device is gone. Every handle created on it is invalid.
    DeviceLost(String),
    /// A state or pipeline object could not be created
    StateCreation(String),
    /// A handle does not refer to a live resource
    InvalidHandle(String),
    /// The backend cannot express the request
    Unsupported(String),
    OutOfMemory(String),
}

impl BackendError {
    /// Only device loss invalidates the frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost(_))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Self::StateCreation(msg) => write!(f, "State creation failed: {}", msg),
            Self::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Self::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Self::OutOfMemory(msg) => write!(f, "Out of GPU memory: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Error returned from the [`Renderer2D`](crate::Renderer2D) frame API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renderer2DError {
    InvalidConfig(ConfigError),
    /// The frame was discarded; GPU resources are recreated on next use.
    DeviceLost(String),
    Backend(BackendError),
}

impl fmt::Display for Renderer2DError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(e) => write!(f, "Invalid renderer configuration: {}", e),
            Self::DeviceLost(msg) => write!(f, "Device lost, frame discarded: {}", msg),
            Self::Backend(e) => write!(f, "Backend error: {}", e),
        }
    }
}

impl std::error::Error for Renderer2DError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(e) => Some(e),
            Self::Backend(e) => Some(e),
            Self::DeviceLost(_) => None,
        }
    }
}

impl From<ConfigError> for Renderer2DError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig(e)
    }
}

impl From<BackendError> for Renderer2DError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::DeviceLost(msg) => Self::DeviceLost(msg),
            other => Self::Backend(other),
        }
    }
}
