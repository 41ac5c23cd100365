//! Configuration management for Windeck
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files: manager settings, the sort table, layer policy
//! overrides and the window-type table.

use crate::layer::{LayerPolicy, LayerType};
use crate::order::MAX_WEIGHT;
use crate::registry::WindowKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Main configuration struct containing all Windeck settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WindeckConfig {
    /// Window kinds from lowest to highest sort weight
    #[serde(default)]
    pub sort_order: Vec<String>,

    /// Manager behavior
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Per-layer overrides of the stock layer table
    #[serde(default)]
    pub layers: Vec<LayerPolicy>,

    /// Every window kind the application can open
    #[serde(default)]
    pub windows: Vec<WindowTypeConfig>,
}

/// Manager-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Grace period before a closed auto-destroy singleton is destroyed
    pub destroy_delay_secs: u64,

    /// Windows without focus stop accepting input
    pub make_non_interactable: bool,

    /// Start in gamepad/keyboard navigation mode
    pub navigation_mode: bool,

    /// Layers above this one are cleared by `close_all_non_essential`
    pub essential_layer: LayerType,

    /// Weight of the first entry of the sort table
    pub base_order: i32,

    /// Weight of kinds missing from the sort table
    pub unknown_order: i32,
}

/// One entry of the window-type table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowTypeConfig {
    pub kind: WindowKind,

    /// Asset name handed to the loader; defaults to the kind
    #[serde(default)]
    pub asset: Option<String>,

    pub layer: LayerType,

    #[serde(default = "default_true")]
    pub single_instance: bool,

    #[serde(default = "default_true")]
    pub auto_destroy: bool,

    #[serde(default = "default_true")]
    pub interactable: bool,

    #[serde(default = "default_true")]
    pub focus_ready: bool,

    #[serde(default)]
    pub reopen_with_last_focus: bool,

    #[serde(default = "default_true")]
    pub cancel_to_close: bool,

    /// Elements to focus on open, in priority order
    #[serde(default)]
    pub first_selected: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            destroy_delay_secs: 30,
            make_non_interactable: true,
            navigation_mode: true,
            essential_layer: LayerType::MainUi,
            base_order: 1,
            unknown_order: 999,
        }
    }
}

impl WindowTypeConfig {
    pub fn new(kind: impl Into<WindowKind>, layer: LayerType) -> Self {
        Self {
            kind: kind.into(),
            asset: None,
            layer,
            single_instance: true,
            auto_destroy: true,
            interactable: true,
            focus_ready: true,
            reopen_with_last_focus: false,
            cancel_to_close: true,
            first_selected: Vec::new(),
        }
    }
}

impl WindeckConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Path::new(&home).join(path.strip_prefix("~").unwrap_or(path))
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: WindeckConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut kinds = HashSet::new();
        for window in &self.windows {
            if window.kind.as_str().is_empty() {
                anyhow::bail!("Window entry with an empty kind");
            }
            if !kinds.insert(&window.kind) {
                anyhow::bail!("Duplicate window kind: {}", window.kind);
            }
            if window.asset.as_deref() == Some("") {
                anyhow::bail!("Empty asset name for window kind: {}", window.kind);
            }
        }

        let mut sorted = HashSet::new();
        for name in &self.sort_order {
            if !sorted.insert(name.as_str()) {
                anyhow::bail!("Duplicate sort_order entry: {}", name);
            }
        }

        let mut layers = HashSet::new();
        for policy in &self.layers {
            if !layers.insert(policy.layer) {
                anyhow::bail!("Duplicate layer override: {}", policy.layer.as_str());
            }
            if policy.clears.contains(&policy.layer) {
                anyhow::bail!("Layer {} must not clear itself", policy.layer.as_str());
            }
        }

        if self.manager.unknown_order < self.manager.base_order {
            anyhow::bail!("Invalid unknown_order: must not be below base_order");
        }

        let limit = i64::from(MAX_WEIGHT);
        let first = i64::from(self.manager.base_order);
        let last = first + self.sort_order.len() as i64;
        if first < -limit || last > limit {
            anyhow::bail!(
                "Invalid base_order: sort weights must stay within -{} and {}",
                MAX_WEIGHT,
                MAX_WEIGHT
            );
        }
        if self.manager.unknown_order > MAX_WEIGHT {
            anyhow::bail!("Invalid unknown_order: must not exceed {}", MAX_WEIGHT);
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}
