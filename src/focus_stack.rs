//! Focus history stack
//!
//! This module provides the `FocusStack` data structure that remembers which
//! windows have held exclusive input focus. Windows are ordered from oldest to
//! most recent, with the last entry being the window that held focus most
//! recently. A window appears at most once.

use crate::window::WindowId;
use std::collections::HashMap;

/// Ordered history of focused windows.
///
/// # Examples
///
/// ```
/// use windeck::focus_stack::FocusStack;
/// use windeck::window::WindowId;
///
/// let a = WindowId::from_raw(1);
/// let b = WindowId::from_raw(2);
///
/// let mut stack = FocusStack::new();
/// stack.push(a);
/// stack.push(b);
///
/// assert_eq!(stack.top(), Some(b));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FocusStack {
    /// Windows ordered from oldest to most recent
    windows: Vec<WindowId>,

    /// Fast lookup: window ID → position in stack
    positions: HashMap<WindowId, usize>,
}

impl FocusStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a window to the top of the stack.
    ///
    /// Returns `false` if the window was already present (the stack is unchanged).
    pub fn push(&mut self, id: WindowId) -> bool {
        if self.positions.contains_key(&id) {
            return false;
        }

        self.positions.insert(id, self.windows.len());
        self.windows.push(id);
        true
    }

    /// Removes a window from the stack, returning its former position.
    pub fn remove(&mut self, id: WindowId) -> Option<usize> {
        let position = self.positions.remove(&id)?;
        self.windows.remove(position);
        self.rebuild_positions_from(position);
        Some(position)
    }

    /// Moves a window that is already on the stack to the top.
    ///
    /// Returns `false` if the window is not on the stack.
    pub fn promote(&mut self, id: WindowId) -> bool {
        let Some(&position) = self.positions.get(&id) else {
            return false;
        };

        if position + 1 == self.windows.len() {
            return true;
        }

        self.windows.remove(position);
        self.windows.push(id);
        self.rebuild_positions_from(position);
        true
    }

    /// Pushes a new window or promotes an existing one.
    pub fn push_or_promote(&mut self, id: WindowId) {
        if !self.push(id) {
            self.promote(id);
        }
    }

    /// Returns the most recent entry for which `eligible` holds, discarding
    /// every stale entry above it.
    pub fn first_eligible<F>(&mut self, mut eligible: F) -> (Option<WindowId>, Vec<WindowId>)
    where
        F: FnMut(WindowId) -> bool,
    {
        let mut discarded = Vec::new();
        while let Some(&top) = self.windows.last() {
            if eligible(top) {
                return (Some(top), discarded);
            }
            self.windows.pop();
            self.positions.remove(&top);
            discarded.push(top);
        }
        (None, discarded)
    }

    pub fn top(&self) -> Option<WindowId> {
        self.windows.last().copied()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: WindowId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Windows from oldest to most recent
    pub fn as_slice(&self) -> &[WindowId] {
        &self.windows
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowId> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Clears the stack, returning the windows it held.
    pub fn clear(&mut self) -> Vec<WindowId> {
        self.positions.clear();
        std::mem::take(&mut self.windows)
    }

    fn rebuild_positions_from(&mut self, start: usize) {
        for (i, &id) in self.windows.iter().enumerate().skip(start) {
            self.positions.insert(id, i);
        }
    }
}
