//! Error taxonomy for window operations
//!
//! Every public manager operation returns [`WindowError`] on failure. The
//! variants fall into four groups:
//!
//! - configuration errors (unknown kind or layer, missing parent, not a singleton)
//! - loader failures
//! - reentrancy violations (closing mid-open or before load, double close,
//!   manager calls from window hooks)
//! - invariant violations, which also trip `debug_assert!` where they are detected
//!
//! Errors are `Clone` so a single in-flight open can hand the same result to
//! every caller that joined it.

use crate::layer::LayerType;
use crate::registry::WindowKind;
use crate::window::{Visibility, WindowId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window kind `{0}` is not registered")]
    UnknownWindowKind(WindowKind),

    #[error("layer {0:?} is not configured")]
    UnknownLayer(LayerType),

    #[error("parent window `{parent}` not found while opening `{child}`")]
    ParentNotFound { parent: WindowKind, child: WindowKind },

    #[error("window kind `{0}` is not a single-instance window")]
    NotSingleton(WindowKind),

    #[error("asset loader returned nothing for `{kind}` (asset `{asset}`)")]
    LoadFailed { kind: WindowKind, asset: String },

    #[error("no instance of `{0}` is loaded")]
    NotLoaded(WindowKind),

    #[error("window {0} not found")]
    WindowNotFound(WindowId),

    #[error("window {0} is still opening and cannot be closed")]
    CloseWhileOpening(WindowId),

    #[error("window {0} is not open")]
    NotOpen(WindowId),

    #[error("window {id} cannot be closed while {visibility:?}")]
    CloseNotAllowed { id: WindowId, visibility: Visibility },

    #[error("window {0} is not interactable and cannot take focus")]
    NotInteractable(WindowId),

    #[error("{0} called from a window hook while the manager is busy")]
    ReentrantCall(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl WindowError {
    /// Reentrancy violations are expected during normal use and are logged
    /// at a lower level than the other groups.
    pub fn is_reentrancy(&self) -> bool {
        matches!(
            self,
            WindowError::CloseWhileOpening(_)
                | WindowError::NotLoaded(_)
                | WindowError::NotOpen(_)
                | WindowError::CloseNotAllowed { .. }
                | WindowError::ReentrantCall(_)
        )
    }
}

pub type WindowResult<T> = std::result::Result<T, WindowError>;
