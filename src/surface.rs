//! External collaborators: visual surfaces and the asset loader
//!
//! Windeck never draws anything. A window wraps an opaque [`Surface`] created
//! from a [`WindowAsset`], and assets come from an [`AssetLoader`] supplied by
//! the application. These traits are the whole contract the core needs.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// How a surface plays a transition animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationMode {
    /// No animation; the transition completes immediately.
    Instant,
    /// An animation is running; the animator will call
    /// `notify_enter_animation_done` / `notify_exit_animation_done` exactly once.
    Deferred,
}

/// An instantiated visual surface owned by one window.
pub trait Surface: Send {
    /// Called once per instance, before the first open. Attaches whatever the
    /// surface needs to receive pointer input.
    fn attach_interaction(&mut self) {}

    fn set_active(&mut self, active: bool);

    /// Whether pointer input is caught by this surface or passes through.
    fn set_blocks_raycasts(&mut self, blocks: bool);

    fn set_interactable(&mut self, interactable: bool);

    fn set_sort_order(&mut self, order: i32);

    /// Whether a named focusable element currently exists and is active.
    fn is_element_active(&self, _element: &str) -> bool {
        true
    }

    fn play_enter_animation(&mut self) -> AnimationMode {
        AnimationMode::Instant
    }

    fn play_exit_animation(&mut self) -> AnimationMode {
        AnimationMode::Instant
    }

    /// Called when the owning window is destroyed.
    fn destroy(&mut self) {}
}

/// A loaded asset from which surfaces are instantiated.
pub trait WindowAsset: Send + Sync {
    /// Stable key of the asset; instances are reference counted per key.
    fn key(&self) -> &str;

    fn instantiate(&self) -> Box<dyn Surface>;
}

impl fmt::Debug for dyn WindowAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowAsset").field("key", &self.key()).finish()
    }
}

pub type LoadFuture = BoxFuture<'static, Option<Arc<dyn WindowAsset>>>;

/// Turns an asset name into a loaded asset, and releases it again.
///
/// `load` may fail by resolving to `None`; the manager treats that as a
/// recoverable failure of the single open request that asked for it.
/// `unload` is called exactly once per asset key, when its last instance is
/// destroyed. A load that loses a race to an existing instance is dropped
/// without an `unload`.
pub trait AssetLoader: Send + Sync {
    fn load(&self, name: &str) -> LoadFuture;

    fn unload(&self, asset: Arc<dyn WindowAsset>);
}
