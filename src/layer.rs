//! Layers: ordered buckets of top-level windows
//!
//! Each root (parentless) window lives in exactly one layer. A layer carries
//! two policies: mutual exclusion (at most one open window) and a list of other
//! layers to clear whenever one of its windows opens or closes.
//!
//! The manager owns the layers; this module only tracks membership and policy.
//! Closing the windows of a cleared layer is done by the manager, which has
//! access to the windows themselves.

use crate::window::WindowId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placement category of a window.
///
/// Declaration order is layer priority: later variants are "less essential"
/// and are cleared by `close_all_non_essential` when they rank above the
/// configured essential layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// UI that follows the scene
    SceneUi,
    /// Main interface
    MainUi,
    /// Full screen pages that replace each other
    MutexWindow,
    /// Several pages shown at once
    MultiWindow,
    /// Item details and other hover panels
    FloatingPanel,
    /// Message boxes that block everything underneath
    ModalWindow,
    /// Toasts and notices, always on top
    Notice,
    /// Mutually exclusive windows shown together, only one focused
    Additive,
    /// Explicitly controlled windows unaffected by other layers; also the home of child windows
    IndependentView,
}

impl LayerType {
    pub const ALL: [LayerType; 9] = [
        LayerType::SceneUi,
        LayerType::MainUi,
        LayerType::MutexWindow,
        LayerType::MultiWindow,
        LayerType::FloatingPanel,
        LayerType::ModalWindow,
        LayerType::Notice,
        LayerType::Additive,
        LayerType::IndependentView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::SceneUi => "scene_ui",
            LayerType::MainUi => "main_ui",
            LayerType::MutexWindow => "mutex_window",
            LayerType::MultiWindow => "multi_window",
            LayerType::FloatingPanel => "floating_panel",
            LayerType::ModalWindow => "modal_window",
            LayerType::Notice => "notice",
            LayerType::Additive => "additive",
            LayerType::IndependentView => "independent_view",
        }
    }
}

/// Policy of a single layer, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPolicy {
    pub layer: LayerType,

    /// Only one window may be open at a time
    #[serde(default)]
    pub mutex: bool,

    /// Whether other layers may clear this one
    #[serde(default = "LayerPolicy::default_auto_clear")]
    pub auto_clear: bool,

    /// Layers cleared whenever a window of this layer opens or closes
    #[serde(default)]
    pub clears: Vec<LayerType>,
}

impl LayerPolicy {
    fn default_auto_clear() -> bool {
        true
    }

    pub fn new(layer: LayerType) -> Self {
        Self {
            layer,
            mutex: false,
            auto_clear: true,
            clears: Vec::new(),
        }
    }

    pub fn mutex(mut self, mutex: bool) -> Self {
        self.mutex = mutex;
        self
    }

    pub fn auto_clear(mut self, auto_clear: bool) -> Self {
        self.auto_clear = auto_clear;
        self
    }

    pub fn clears(mut self, clears: &[LayerType]) -> Self {
        self.clears = clears.to_vec();
        self
    }

    /// The stock layer table.
    pub fn defaults() -> Vec<LayerPolicy> {
        use LayerType::*;
        vec![
            LayerPolicy::new(SceneUi),
            LayerPolicy::new(MainUi).clears(&[FloatingPanel]),
            LayerPolicy::new(IndependentView).auto_clear(false),
            LayerPolicy::new(MutexWindow)
                .mutex(true)
                .clears(&[MultiWindow, FloatingPanel]),
            LayerPolicy::new(MultiWindow).clears(&[MutexWindow, FloatingPanel]),
            LayerPolicy::new(Additive).clears(&[FloatingPanel]),
            LayerPolicy::new(FloatingPanel).mutex(true),
            LayerPolicy::new(ModalWindow).mutex(true).clears(&[FloatingPanel]),
            LayerPolicy::new(Notice).auto_clear(false),
        ]
    }
}

/// A live layer: its policy plus the open root windows in insertion order.
#[derive(Debug, Clone)]
pub struct Layer {
    policy: LayerPolicy,
    roots: Vec<WindowId>,
}

impl Layer {
    pub fn new(policy: LayerPolicy) -> Self {
        Self {
            policy,
            roots: Vec::new(),
        }
    }

    pub fn layer_type(&self) -> LayerType {
        self.policy.layer
    }

    pub fn is_mutex(&self) -> bool {
        self.policy.mutex
    }

    pub fn auto_clear(&self) -> bool {
        self.policy.auto_clear
    }

    pub fn layers_to_clear(&self) -> &[LayerType] {
        &self.policy.clears
    }

    pub fn policy(&self) -> &LayerPolicy {
        &self.policy
    }

    /// Root windows, oldest first
    pub fn roots(&self) -> &[WindowId] {
        &self.roots
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.roots.contains(&id)
    }

    /// Appends a root window. Returns `false` if it was already present.
    pub fn push(&mut self, id: WindowId) -> bool {
        if self.roots.contains(&id) {
            return false;
        }
        self.roots.push(id);
        true
    }

    pub fn remove(&mut self, id: WindowId) -> bool {
        match self.roots.iter().position(|&r| r == id) {
            Some(index) => {
                self.roots.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empties the root list, returning it newest first (the order in which
    /// the windows must be closed).
    pub fn take_roots(&mut self) -> Vec<WindowId> {
        let mut roots = std::mem::take(&mut self.roots);
        roots.reverse();
        roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// All layers, keyed and iterated by priority.
#[derive(Debug, Clone)]
pub struct LayerTable {
    layers: BTreeMap<LayerType, Layer>,
}

impl LayerTable {
    /// Builds the table from the stock policies, replacing any that appear in
    /// `overrides`.
    pub fn new(overrides: &[LayerPolicy]) -> Self {
        let mut layers: BTreeMap<LayerType, Layer> = LayerPolicy::defaults()
            .into_iter()
            .map(|p| (p.layer, Layer::new(p)))
            .collect();
        for policy in overrides {
            layers.insert(policy.layer, Layer::new(policy.clone()));
        }
        Self { layers }
    }

    pub fn get(&self, layer: LayerType) -> Option<&Layer> {
        self.layers.get(&layer)
    }

    pub fn get_mut(&mut self, layer: LayerType) -> Option<&mut Layer> {
        self.layers.get_mut(&layer)
    }

    pub fn contains(&self, layer: LayerType) -> bool {
        self.layers.contains_key(&layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn layer_types(&self) -> Vec<LayerType> {
        self.layers.keys().copied().collect()
    }

    /// Root windows of every layer, layer priority first, insertion order second.
    pub fn all_roots(&self) -> Vec<WindowId> {
        self.layers
            .values()
            .flat_map(|l| l.roots().iter().copied())
            .collect()
    }

    /// Removes a window from whichever layer holds it.
    pub fn remove_everywhere(&mut self, id: WindowId) -> bool {
        let mut removed = false;
        for layer in self.layers.values_mut() {
            removed |= layer.remove(id);
        }
        removed
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        Self::new(&[])
    }
}
