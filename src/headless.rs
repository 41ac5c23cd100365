//! Headless loader and surfaces
//!
//! An in-memory [`AssetLoader`] whose surfaces only record what was done to
//! them. The `windeck replay` command runs on it, and tests use it to observe
//! loads, unloads, activation, raycast blocking and sort orders.

use crate::surface::{AnimationMode, AssetLoader, LoadFuture, Surface, WindowAsset};
use futures::FutureExt;
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Observable state of one headless surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceState {
    pub interaction_attached: bool,
    pub active: bool,
    pub blocks_raycasts: bool,
    pub interactable: bool,
    pub sort_order: i32,
    pub enter_animations: u32,
    pub exit_animations: u32,
    pub destroyed: bool,
}

pub type SurfaceProbe = Arc<Mutex<SurfaceState>>;

#[derive(Debug, Default)]
struct LoaderState {
    loads: HashMap<String, u32>,
    unloads: HashMap<String, u32>,
    missing: HashSet<String>,
    deferred: HashSet<String>,
    inactive_elements: HashSet<String>,
    surfaces: HashMap<String, Vec<SurfaceProbe>>,
}

/// In-memory asset loader.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLoader {
    state: Arc<Mutex<LoaderState>>,
    latency: Option<Duration>,
}

impl HeadlessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every load waits `latency` before resolving.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Loads of `name` resolve to nothing.
    pub fn set_missing(&self, name: &str) {
        self.state.lock().missing.insert(name.to_string());
    }

    /// Surfaces of `name` play animations that must be completed externally.
    pub fn set_deferred_animations(&self, name: &str) {
        self.state.lock().deferred.insert(name.to_string());
    }

    /// Marks a focusable element as inactive on every surface.
    pub fn set_element_inactive(&self, element: &str) {
        self.state.lock().inactive_elements.insert(element.to_string());
    }

    pub fn load_count(&self, name: &str) -> u32 {
        self.state.lock().loads.get(name).copied().unwrap_or(0)
    }

    pub fn unload_count(&self, name: &str) -> u32 {
        self.state.lock().unloads.get(name).copied().unwrap_or(0)
    }

    /// Probes of every surface instantiated from `name`, oldest first.
    pub fn surfaces(&self, name: &str) -> Vec<SurfaceProbe> {
        self.state
            .lock()
            .surfaces
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Probe of the most recent surface instantiated from `name`.
    pub fn last_surface(&self, name: &str) -> Option<SurfaceProbe> {
        self.surfaces(name).pop()
    }
}

impl AssetLoader for HeadlessLoader {
    fn load(&self, name: &str) -> LoadFuture {
        let name = name.to_string();
        let state = self.state.clone();
        let latency = self.latency;
        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            let mut guard = state.lock();
            *guard.loads.entry(name.clone()).or_insert(0) += 1;
            if guard.missing.contains(&name) {
                debug!("headless asset `{}` is missing", name);
                return None;
            }
            let asset: Arc<dyn WindowAsset> = Arc::new(HeadlessAsset {
                key: name,
                loader: state.clone(),
            });
            Some(asset)
        }
        .boxed()
    }

    fn unload(&self, asset: Arc<dyn WindowAsset>) {
        let mut guard = self.state.lock();
        *guard.unloads.entry(asset.key().to_string()).or_insert(0) += 1;
        debug!("headless asset `{}` unloaded", asset.key());
    }
}

struct HeadlessAsset {
    key: String,
    loader: Arc<Mutex<LoaderState>>,
}

impl WindowAsset for HeadlessAsset {
    fn key(&self) -> &str {
        &self.key
    }

    fn instantiate(&self) -> Box<dyn Surface> {
        let probe = SurfaceProbe::default();
        let mut guard = self.loader.lock();
        let mode = if guard.deferred.contains(&self.key) {
            AnimationMode::Deferred
        } else {
            AnimationMode::Instant
        };
        guard
            .surfaces
            .entry(self.key.clone())
            .or_default()
            .push(probe.clone());
        Box::new(HeadlessSurface {
            probe,
            animation: mode,
            loader: self.loader.clone(),
        })
    }
}

struct HeadlessSurface {
    probe: SurfaceProbe,
    animation: AnimationMode,
    loader: Arc<Mutex<LoaderState>>,
}

impl Surface for HeadlessSurface {
    fn attach_interaction(&mut self) {
        let mut probe = self.probe.lock();
        probe.interaction_attached = true;
        probe.blocks_raycasts = true;
    }

    fn set_active(&mut self, active: bool) {
        self.probe.lock().active = active;
    }

    fn set_blocks_raycasts(&mut self, blocks: bool) {
        self.probe.lock().blocks_raycasts = blocks;
    }

    fn set_interactable(&mut self, interactable: bool) {
        self.probe.lock().interactable = interactable;
    }

    fn set_sort_order(&mut self, order: i32) {
        self.probe.lock().sort_order = order;
    }

    fn is_element_active(&self, element: &str) -> bool {
        !self.loader.lock().inactive_elements.contains(element)
    }

    fn play_enter_animation(&mut self) -> AnimationMode {
        self.probe.lock().enter_animations += 1;
        self.animation
    }

    fn play_exit_animation(&mut self) -> AnimationMode {
        self.probe.lock().exit_animations += 1;
        self.animation
    }

    fn destroy(&mut self) {
        self.probe.lock().destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_and_instantiate() {
        let loader = HeadlessLoader::new();
        let asset = loader.load("hud").await.expect("asset");
        assert_eq!(asset.key(), "hud");

        let mut surface = asset.instantiate();
        surface.set_active(true);
        surface.set_sort_order(42);

        let probe = loader.last_surface("hud").unwrap();
        assert!(probe.lock().active);
        assert_eq!(probe.lock().sort_order, 42);
        assert_eq!(loader.load_count("hud"), 1);
    }

    #[tokio::test]
    async fn test_missing_asset_resolves_to_none() {
        let loader = HeadlessLoader::new();
        loader.set_missing("ghost");
        assert!(loader.load("ghost").await.is_none());
        assert_eq!(loader.load_count("ghost"), 1);
    }

    #[tokio::test]
    async fn test_deferred_animation_mode() {
        let loader = HeadlessLoader::new();
        loader.set_deferred_animations("dialog");
        let asset = loader.load("dialog").await.unwrap();
        let mut surface = asset.instantiate();
        assert_eq!(surface.play_enter_animation(), AnimationMode::Deferred);
    }
}
