//! Window-type registry
//!
//! The table of every window kind the application can open, built once at
//! startup from configuration. Each kind maps to a [`WindowDescriptor`]
//! (asset name, layer, flags, sort weight) and optionally to a factory for its
//! [`WindowBehavior`].

use crate::config::{WindeckConfig, WindowTypeConfig};
use crate::layer::LayerType;
use crate::window::{NoopBehavior, WindowBehavior};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tag naming a window type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowKind(String);

impl WindowKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowKind {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for WindowKind {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&WindowKind> for WindowKind {
    fn from(kind: &WindowKind) -> Self {
        kind.clone()
    }
}

/// Static description of one window kind.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDescriptor {
    pub kind: WindowKind,
    /// Name handed to the asset loader
    pub asset: String,
    pub layer: LayerType,
    /// Medium-priority weight from the sort table
    pub weight: i32,
    /// At most one instance; reopening refreshes it
    pub single_instance: bool,
    /// Destroy the instance some time after it closes
    pub auto_destroy: bool,
    /// `false` makes the window never take focus
    pub interactable: bool,
    /// Ready for gamepad/keyboard focus handling
    pub focus_ready: bool,
    /// Restore the last focused element when reopened
    pub reopen_with_last_focus: bool,
    /// The cancel action closes this window while it holds focus
    pub cancel_to_close: bool,
    /// Elements to focus on open, first active one wins
    pub first_selected: Vec<String>,
}

impl WindowDescriptor {
    pub fn new(kind: impl Into<WindowKind>, layer: LayerType) -> Self {
        let kind = kind.into();
        Self {
            asset: kind.as_str().to_string(),
            kind,
            layer,
            weight: 0,
            single_instance: true,
            auto_destroy: true,
            interactable: true,
            focus_ready: true,
            reopen_with_last_focus: false,
            cancel_to_close: true,
            first_selected: Vec::new(),
        }
    }

    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = asset.into();
        self
    }

    pub fn single_instance(mut self, single_instance: bool) -> Self {
        self.single_instance = single_instance;
        self
    }

    pub fn auto_destroy(mut self, auto_destroy: bool) -> Self {
        self.auto_destroy = auto_destroy;
        self
    }

    pub fn interactable(mut self, interactable: bool) -> Self {
        self.interactable = interactable;
        self
    }

    pub fn reopen_with_last_focus(mut self, reopen: bool) -> Self {
        self.reopen_with_last_focus = reopen;
        self
    }

    pub fn cancel_to_close(mut self, cancel_to_close: bool) -> Self {
        self.cancel_to_close = cancel_to_close;
        self
    }

    pub fn first_selected(mut self, elements: &[&str]) -> Self {
        self.first_selected = elements.iter().map(|e| e.to_string()).collect();
        self
    }

    fn from_config(entry: &WindowTypeConfig, weight: i32) -> Self {
        Self {
            kind: entry.kind.clone(),
            asset: entry
                .asset
                .clone()
                .unwrap_or_else(|| entry.kind.as_str().to_string()),
            layer: entry.layer,
            weight,
            single_instance: entry.single_instance,
            auto_destroy: entry.auto_destroy,
            interactable: entry.interactable,
            focus_ready: entry.focus_ready,
            reopen_with_last_focus: entry.reopen_with_last_focus,
            cancel_to_close: entry.cancel_to_close,
            first_selected: entry.first_selected.clone(),
        }
    }
}

pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn WindowBehavior> + Send + Sync>;

/// Kind → descriptor table plus behavior factories.
#[derive(Default, Clone)]
pub struct WindowRegistry {
    descriptors: HashMap<WindowKind, Arc<WindowDescriptor>>,
    behaviors: HashMap<WindowKind, BehaviorFactory>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from configuration. Weights come from the position of
    /// each kind in `sort_order`; kinds missing from it are logged and placed
    /// at `unknown_order`.
    pub fn from_config(config: &WindeckConfig) -> Self {
        let weights: HashMap<&str, i32> = config
            .sort_order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), config.manager.base_order + i as i32))
            .collect();

        let mut registry = Self::new();
        for entry in &config.windows {
            let weight = match weights.get(entry.kind.as_str()) {
                Some(&w) => w,
                None => {
                    error!(
                        "window kind `{}` has no sort order, using {}",
                        entry.kind, config.manager.unknown_order
                    );
                    config.manager.unknown_order
                }
            };
            registry.register(WindowDescriptor::from_config(entry, weight));
        }
        registry
    }

    /// Adds or replaces a descriptor.
    pub fn register(&mut self, descriptor: WindowDescriptor) {
        debug!(
            "registered window kind `{}` on {:?} (weight {})",
            descriptor.kind, descriptor.layer, descriptor.weight
        );
        self.descriptors
            .insert(descriptor.kind.clone(), Arc::new(descriptor));
    }

    pub fn register_behavior<F>(&mut self, kind: impl Into<WindowKind>, factory: F)
    where
        F: Fn() -> Box<dyn WindowBehavior> + Send + Sync + 'static,
    {
        self.behaviors.insert(kind.into(), Arc::new(factory));
    }

    pub fn get(&self, kind: &WindowKind) -> Option<&Arc<WindowDescriptor>> {
        self.descriptors.get(kind)
    }

    pub fn contains(&self, kind: &WindowKind) -> bool {
        self.descriptors.contains_key(kind)
    }

    /// A fresh behavior for one instance of `kind`.
    pub fn create_behavior(&self, kind: &WindowKind) -> Box<dyn WindowBehavior> {
        match self.behaviors.get(kind) {
            Some(factory) => factory(),
            None => Box::new(NoopBehavior),
        }
    }

    /// Descriptors sorted by weight, then kind.
    pub fn descriptors(&self) -> Vec<Arc<WindowDescriptor>> {
        let mut all: Vec<_> = self.descriptors.values().cloned().collect();
        all.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.kind.cmp(&b.kind)));
        all
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
