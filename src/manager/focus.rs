//! Window focus: the current focus window and its fallback history

use super::state::ManagerState;
use super::WindowEvent;
use crate::error::{WindowError, WindowResult};
use crate::window::{Window, WindowId};
use log::debug;

impl ManagerState {
    /// Moves focus to `new`. `None` falls back to the most recent still-open
    /// window of the focus stack.
    pub(super) fn set_current_focus(&mut self, new: Option<WindowId>) {
        if self.current_focus == new {
            return;
        }
        let last = self.current_focus;

        if let Some(last) = last {
            if let Some((window, mut env)) = self.window_env(last) {
                window.stash_focus(&env);
                window.set_interactable(false, false, false, &mut env);
                if new.is_none() {
                    window.set_in_focus_stack(false);
                }
            }
            if new.is_none() {
                self.focus_stack.remove(last);
            }
        }

        let effective = match new {
            Some(id) => {
                self.focus_stack.push_or_promote(id);
                if let Some((window, mut env)) = self.window_env(id) {
                    window.set_in_focus_stack(true);
                    window.set_interactable(true, false, true, &mut env);
                }
                Some(id)
            }
            None => {
                let fallback = self.first_focus_in_stack();
                if let Some(id) = fallback {
                    if let Some((window, mut env)) = self.window_env(id) {
                        window.set_interactable(true, false, true, &mut env);
                    }
                }
                fallback
            }
        };

        self.current_focus = effective;
        if effective != last {
            debug!("focus moved from {:?} to {:?}", last, effective);
            self.emit(WindowEvent::FocusChanged {
                from: last,
                to: effective,
            });
        }
    }

    /// Most recent stack entry that is open and takes focus. Stale entries
    /// above it are dropped.
    fn first_focus_in_stack(&mut self) -> Option<WindowId> {
        let windows = &self.windows;
        let (found, discarded) = self.focus_stack.first_eligible(|id| {
            windows
                .get(&id)
                .map(|w| w.is_opened() && w.need_focus_management())
                .unwrap_or(false)
        });
        for id in discarded {
            if let Some(window) = self.windows.get_mut(&id) {
                window.set_in_focus_stack(false);
            }
        }
        found
    }

    /// Drops the current focus if its window is no longer open.
    pub(super) fn refresh_current_focus(&mut self) {
        let Some(current) = self.current_focus else {
            return;
        };
        let open = self
            .windows
            .get(&current)
            .map(Window::is_opened)
            .unwrap_or(false);
        if !open {
            self.set_current_focus(None);
        }
    }

    /// Empties the focus stack and the current focus.
    pub(super) fn clear_focus_windows(&mut self) {
        for id in self.focus_stack.clear() {
            if let Some(window) = self.windows.get_mut(&id) {
                window.set_in_focus_stack(false);
            }
        }
        if let Some(last) = self.current_focus.take() {
            self.emit(WindowEvent::FocusChanged {
                from: Some(last),
                to: None,
            });
        }
    }

    pub(super) fn set_navigation_mode(&mut self, enabled: bool) {
        if self.navigation_mode == enabled {
            return;
        }
        debug!("navigation mode {}", if enabled { "on" } else { "off" });
        self.navigation_mode = enabled;

        let current = self.current_focus;
        let stacked = self.focus_stack.as_slice().to_vec();
        for id in stacked {
            let Some((window, mut env)) = self.window_env(id) else {
                continue;
            };
            if enabled {
                window.set_interactable(Some(id) == current, false, true, &mut env);
            } else if window.need_focus_management() {
                // Pointer mode: every stacked window accepts input
                window.apply_interactable(true);
            }
        }
    }

    pub(super) fn select(&mut self, id: WindowId, element: &str) -> WindowResult<()> {
        let (window, mut env) = self
            .window_env(id)
            .ok_or(WindowError::WindowNotFound(id))?;
        if !window.is_opened() {
            return Err(WindowError::NotOpen(id));
        }
        window.select(Some(element), false, &mut env)
    }

    pub(super) fn set_focus_ready(&mut self, id: WindowId, ready: bool) -> WindowResult<()> {
        let window = self
            .windows
            .get_mut(&id)
            .ok_or(WindowError::WindowNotFound(id))?;
        window.set_focus_ready(ready);
        let take_focus = ready && window.is_opened() && window.need_focus_management();
        if take_focus && self.current_focus != Some(id) {
            self.set_current_focus(Some(id));
        }
        Ok(())
    }

    /// Closes the focused window if it closes on cancel.
    pub(super) fn cancel(&mut self) -> WindowResult<Option<WindowId>> {
        let Some(id) = self.current_focus else {
            return Ok(None);
        };
        let closes = self
            .windows
            .get(&id)
            .map(|w| w.is_opened() && w.descriptor().cancel_to_close)
            .unwrap_or(false);
        if !closes {
            return Ok(None);
        }
        self.close(id)?;
        Ok(Some(id))
    }
}
