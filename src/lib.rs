//! # Windeck UI Window Manager Library
//!
//! Lifecycle, layering, z-order and focus management for the windows of a
//! game or application UI. Windeck never draws anything: it decides which
//! windows exist, which are open, in which order they stack and which one
//! receives input, and drives opaque surfaces supplied by the host.
//!
//! ## Architecture
//!
//! Windeck is built on a modular architecture:
//! - `manager`: The window manager handle: open, close, destroy, focus
//! - `window`: Per-window state machine and element focus memory
//! - `layer`: Layer policies (mutual exclusion, clearing other layers)
//! - `focus_stack`: Most-recently-focused history with lazy fallback
//! - `order`: Render/interaction order of the window forest
//! - `assets`: Reference counting of loaded window assets
//! - `registry`: Window kinds and their descriptors
//! - `surface`: Traits for surfaces and the asset loader
//! - `headless`: In-memory loader and surfaces
//! - `config`: Configuration parsing and management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use windeck::{HeadlessLoader, WindeckConfig, WindowManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WindeckConfig::load("windeck.toml")?;
//!     let manager = WindowManager::new(&config, Arc::new(HeadlessLoader::new()));
//!     let inventory = manager.open("Inventory", None).await?;
//!     manager.close(inventory)?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod config;
pub mod error;
pub mod focus_stack;
pub mod headless;
pub mod layer;
pub mod manager;
pub mod order;
pub mod registry;
pub mod surface;
pub mod window;

// Re-export main types for easy access
pub use config::WindeckConfig;
pub use error::{WindowError, WindowResult};
pub use headless::HeadlessLoader;
pub use layer::LayerType;
pub use manager::{OpenOptions, WindowEvent, WindowManager};
pub use registry::{WindowDescriptor, WindowKind};
pub use surface::{AnimationMode, AssetLoader, Surface, WindowAsset};
pub use window::{Payload, Visibility, WindowBehavior, WindowId};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
