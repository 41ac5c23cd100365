//! Reference counting of loaded window assets
//!
//! Every live window instance holds one reference on the asset it was
//! instantiated from. When the last instance goes away the asset is handed
//! back so the manager can unload it.

use crate::error::{WindowError, WindowResult};
use crate::surface::WindowAsset;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of releasing one reference.
#[derive(Debug)]
pub enum Release {
    /// Other instances still use the asset.
    Retained(usize),
    /// That was the last instance; the asset must be unloaded.
    Unload(Arc<dyn WindowAsset>),
}

struct Entry {
    asset: Arc<dyn WindowAsset>,
    count: usize,
}

#[derive(Default)]
pub struct AssetCounter {
    entries: HashMap<String, Entry>,
}

impl AssetCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference, returning the new count.
    pub fn acquire(&mut self, asset: &Arc<dyn WindowAsset>) -> usize {
        let entry = self
            .entries
            .entry(asset.key().to_string())
            .or_insert_with(|| Entry {
                asset: asset.clone(),
                count: 0,
            });
        entry.count += 1;
        entry.count
    }

    /// Drops a reference.
    ///
    /// Releasing a key with no live references is an invariant violation and
    /// leaves the counter untouched.
    pub fn release(&mut self, key: &str) -> WindowResult<Release> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(WindowError::InvariantViolation(format!(
                "asset `{}` released with no live instances",
                key
            )));
        };

        entry.count -= 1;
        if entry.count > 0 {
            return Ok(Release::Retained(entry.count));
        }

        // Entries only exist while count > 0
        let entry = self.entries.remove(key).map(|e| e.asset);
        entry.map(Release::Unload).ok_or_else(|| {
            WindowError::InvariantViolation(format!("asset `{}` vanished during release", key))
        })
    }

    pub fn count(&self, key: &str) -> usize {
        self.entries.get(key).map(|e| e.count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
