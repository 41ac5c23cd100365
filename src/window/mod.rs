//! A single managed window
//!
//! This module implements the per-instance half of window management:
//! - the visibility state machine (Invisible → TransitionIn → Visible → TransitionOut)
//! - open/close side effects on the surface and the behavior hooks
//! - element focus memory (manual, recoverable and configured focus targets)
//! - parent/child links and the computed sort order
//!
//! Windows never touch their siblings. Everything that involves more than one
//! window (layers, the focus stack, order solving) lives in the manager, which
//! owns every [`Window`] and passes the shared input state in an [`InputEnv`].

mod behavior;

pub use behavior::{payload_as, NoopBehavior, Payload, WindowBehavior};

use crate::error::{WindowError, WindowResult};
use crate::layer::LayerType;
use crate::order::OpenStamp;
use crate::registry::{WindowDescriptor, WindowKind};
use crate::surface::{AnimationMode, Surface};
use log::{debug, error, warn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle of a window instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(u64);

impl WindowId {
    pub(crate) fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Invisible,
    TransitionIn,
    Visible,
    TransitionOut,
}

impl Visibility {
    pub fn is_transition(self) -> bool {
        matches!(self, Visibility::TransitionIn | Visibility::TransitionOut)
    }

    /// Entering or fully shown; the states a close may start from.
    pub fn is_shown(self) -> bool {
        matches!(self, Visibility::TransitionIn | Visibility::Visible)
    }
}

/// Animation the window is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTransition {
    Enter,
    Exit,
}

/// The globally selected element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub window: WindowId,
    pub element: String,
}

/// Input state shared by every window, lent by the manager.
pub(crate) struct InputEnv<'a> {
    pub selected: &'a mut Option<Selection>,
    pub navigation_mode: bool,
    pub make_non_interactable: bool,
}

/// Point-in-time copy of a window's state.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub kind: WindowKind,
    pub layer: LayerType,
    pub visibility: Visibility,
    pub is_opened: bool,
    pub is_opening: bool,
    pub is_sub_view: bool,
    pub parent: Option<WindowId>,
    pub children: Vec<WindowId>,
    pub sort_order: Option<i32>,
    pub root_index: Option<usize>,
    pub is_focused: bool,
    pub in_focus_stack: bool,
    pub manual_focus: Option<String>,
    pub recover_focus: Option<String>,
    pub pending: Option<PendingTransition>,
}

pub struct Window {
    id: WindowId,
    descriptor: Arc<WindowDescriptor>,
    layer: LayerType,
    asset_key: String,
    surface: Box<dyn Surface>,
    behavior: Box<dyn WindowBehavior>,

    visibility: Visibility,
    pending: Option<PendingTransition>,
    is_opened: bool,
    is_opening: bool,
    is_sub_view: bool,
    initialized: bool,
    focus_ready: bool,
    in_focus_stack: bool,

    // Mirrors of the surface flags
    surface_active: bool,
    blocks_raycasts: bool,
    interactive: bool,

    parent: Option<WindowId>,
    children: Vec<WindowId>,

    open_stamp: Option<OpenStamp>,
    data: Option<Payload>,
    sort_order: Option<i32>,
    root_index: Option<usize>,

    manual_focus: Option<String>,
    recover_focus: Option<String>,
}

impl Window {
    pub(crate) fn new(
        id: WindowId,
        descriptor: Arc<WindowDescriptor>,
        mut surface: Box<dyn Surface>,
        behavior: Box<dyn WindowBehavior>,
        asset_key: String,
        make_non_interactable: bool,
    ) -> Self {
        surface.attach_interaction();
        surface.set_active(false);

        let starts_locked =
            make_non_interactable && descriptor.interactable && descriptor.focus_ready;
        if starts_locked {
            surface.set_interactable(false);
        }

        Self {
            id,
            layer: descriptor.layer,
            focus_ready: descriptor.focus_ready,
            descriptor,
            asset_key,
            surface,
            behavior,
            visibility: Visibility::Invisible,
            pending: None,
            is_opened: false,
            is_opening: false,
            is_sub_view: false,
            initialized: false,
            in_focus_stack: false,
            surface_active: false,
            blocks_raycasts: true,
            interactive: !starts_locked,
            parent: None,
            children: Vec::new(),
            open_stamp: None,
            data: None,
            sort_order: None,
            root_index: None,
            manual_focus: None,
            recover_focus: None,
        }
    }

    /// Runs the init hook, once per instance.
    pub(crate) fn init_instance(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.behavior.on_init();
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn kind(&self) -> &WindowKind {
        &self.descriptor.kind
    }

    pub fn descriptor(&self) -> &Arc<WindowDescriptor> {
        &self.descriptor
    }

    pub fn layer(&self) -> LayerType {
        self.layer
    }

    pub(crate) fn set_layer(&mut self, layer: LayerType) {
        self.layer = layer;
    }

    pub fn asset_key(&self) -> &str {
        &self.asset_key
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn is_opened(&self) -> bool {
        self.is_opened
    }

    pub fn is_opening(&self) -> bool {
        self.is_opening
    }

    pub fn is_sub_view(&self) -> bool {
        self.is_sub_view
    }

    pub(crate) fn set_sub_view(&mut self, sub_view: bool) {
        self.is_sub_view = sub_view;
    }

    pub fn weight(&self) -> i32 {
        self.descriptor.weight
    }

    pub fn open_stamp(&self) -> Option<OpenStamp> {
        self.open_stamp
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    pub fn sort_order(&self) -> Option<i32> {
        self.sort_order
    }

    pub fn root_index(&self) -> Option<usize> {
        self.root_index
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn children(&self) -> &[WindowId] {
        &self.children
    }

    pub fn manual_focus(&self) -> Option<&str> {
        self.manual_focus.as_deref()
    }

    pub fn recover_focus(&self) -> Option<&str> {
        self.recover_focus.as_deref()
    }

    pub fn in_focus_stack(&self) -> bool {
        self.in_focus_stack
    }

    pub(crate) fn set_in_focus_stack(&mut self, in_stack: bool) {
        self.in_focus_stack = in_stack;
    }

    pub fn focus_ready(&self) -> bool {
        self.focus_ready
    }

    pub(crate) fn set_focus_ready(&mut self, ready: bool) {
        self.focus_ready = ready;
    }

    /// Takes part in focus handling at all.
    pub fn need_focus_management(&self) -> bool {
        self.descriptor.interactable && self.focus_ready
    }

    pub fn is_focused(&self) -> bool {
        self.interactive && self.blocks_raycasts && self.need_focus_management()
    }

    pub fn blocks_raycasts(&self) -> bool {
        self.blocks_raycasts
    }

    pub fn info(&self) -> WindowInfo {
        WindowInfo {
            id: self.id,
            kind: self.kind().clone(),
            layer: self.layer,
            visibility: self.visibility,
            is_opened: self.is_opened,
            is_opening: self.is_opening,
            is_sub_view: self.is_sub_view,
            parent: self.parent,
            children: self.children.clone(),
            sort_order: self.sort_order,
            root_index: self.root_index,
            is_focused: self.is_focused(),
            in_focus_stack: self.in_focus_stack,
            manual_focus: self.manual_focus.clone(),
            recover_focus: self.recover_focus.clone(),
            pending: self.pending,
        }
    }

    /// Invisible → TransitionIn, or straight to Visible when the surface has
    /// no enter animation.
    pub(crate) fn open(
        &mut self,
        data: Option<Payload>,
        refreshing: bool,
        stamp: OpenStamp,
        env: &mut InputEnv<'_>,
    ) {
        self.is_opening = true;
        if self.visibility == Visibility::TransitionOut {
            debug!("window {} reopened mid exit animation", self.id);
            self.finish_exit();
        }

        self.is_opened = true;
        self.visibility = Visibility::TransitionIn;
        self.surface.set_active(true);
        self.surface_active = true;
        self.set_data(data, refreshing, stamp);

        // Interaction is allowed while the enter animation plays
        self.set_blocks_raycasts(true);
        self.set_interactable(true, true, false, env);
        self.behavior.on_open();
        if self.manual_focus.is_none() {
            self.auto_set_focus(true, true, env);
        }

        self.pending = Some(PendingTransition::Enter);
        if self.surface.play_enter_animation() == AnimationMode::Instant {
            self.finish_enter();
        }
        self.is_opening = false;
        debug!("opened window {} ({})", self.id, self.kind());
    }

    /// Stores new data and restamps the window.
    pub(crate) fn set_data(&mut self, data: Option<Payload>, refreshing: bool, stamp: OpenStamp) {
        self.open_stamp = Some(stamp);
        self.data = data;
        let applied = if refreshing {
            self.behavior.on_refresh_data(self.data.as_ref())
        } else {
            self.behavior.on_init_data(self.data.as_ref())
        };
        if let Err(e) = applied {
            error!(
                "window {} ({}) failed to apply data: {:#}",
                self.id,
                self.descriptor.kind,
                e
            );
        }
        self.behavior.refresh_view();
    }

    /// Visible/TransitionIn → TransitionOut, or straight to Invisible when the
    /// surface has no exit animation.
    pub(crate) fn begin_close(&mut self, env: &mut InputEnv<'_>) -> WindowResult<()> {
        if !self.is_opened {
            return Err(WindowError::NotOpen(self.id));
        }
        if !self.visibility.is_shown() {
            return Err(WindowError::CloseNotAllowed {
                id: self.id,
                visibility: self.visibility,
            });
        }
        if self.visibility == Visibility::TransitionIn {
            self.finish_enter();
        }

        self.is_opened = false;
        let held_focus = self.is_focused();

        // Pointer input passes through from now on
        self.set_blocks_raycasts(false);
        if let Err(e) = self.behavior.on_close() {
            error!("window {} ({}) close hook failed: {:#}", self.id, self.descriptor.kind, e);
        }
        self.data = None;

        if self.descriptor.reopen_with_last_focus {
            if held_focus {
                if let Some(element) = self.owned_selection(env) {
                    self.recover_focus = Some(element);
                }
            }
        } else {
            self.manual_focus = None;
            self.recover_focus = None;
            if self.owned_selection(env).is_some() {
                *env.selected = None;
            }
        }
        self.set_interactable(false, false, true, env);

        self.visibility = Visibility::TransitionOut;
        self.pending = Some(PendingTransition::Exit);
        if self.surface.play_exit_animation() == AnimationMode::Instant {
            self.finish_exit();
        }
        debug!("closed window {} ({})", self.id, self.kind());
        Ok(())
    }

    /// Consumes a pending enter transition. Returns `false` if none was pending.
    pub(crate) fn complete_enter(&mut self) -> bool {
        if self.pending != Some(PendingTransition::Enter)
            || self.visibility != Visibility::TransitionIn
        {
            warn!("window {} has no pending enter animation", self.id);
            return false;
        }
        self.finish_enter();
        true
    }

    /// Consumes a pending exit transition. Returns `false` if none was pending.
    pub(crate) fn complete_exit(&mut self) -> bool {
        if self.pending != Some(PendingTransition::Exit)
            || self.visibility != Visibility::TransitionOut
        {
            warn!("window {} has no pending exit animation", self.id);
            return false;
        }
        self.finish_exit();
        true
    }

    fn finish_enter(&mut self) {
        self.pending = None;
        self.visibility = Visibility::Visible;
        self.behavior.on_shown();
    }

    fn finish_exit(&mut self) {
        self.pending = None;
        self.behavior.on_closed();
        self.surface.set_active(false);
        self.surface_active = false;
        self.visibility = Visibility::Invisible;
        self.behavior.on_hidden();
    }

    fn set_blocks_raycasts(&mut self, blocks: bool) {
        self.blocks_raycasts = blocks;
        self.surface.set_blocks_raycasts(blocks);
    }

    /// Records the new order. Returns whether it changed.
    pub(crate) fn apply_order(&mut self, order: i32, root_index: Option<usize>) -> bool {
        self.root_index = root_index;
        if self.sort_order == Some(order) {
            return false;
        }
        self.sort_order = Some(order);
        self.surface.set_sort_order(order);
        self.behavior.on_sort_order_changed(order);
        true
    }

    pub(crate) fn set_parent(&mut self, parent: Option<WindowId>) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, child: WindowId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: WindowId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| *c != child);
        before != self.children.len()
    }

    pub(crate) fn destroy(&mut self) {
        self.surface.destroy();
        debug!("destroyed window {} ({})", self.id, self.kind());
    }

    // Element focus

    /// An element counts as active only while the surface itself is.
    pub fn element_active(&self, element: &str) -> bool {
        self.surface_active && self.surface.is_element_active(element)
    }

    fn owned_selection(&self, env: &InputEnv<'_>) -> Option<String> {
        env.selected
            .as_ref()
            .filter(|s| s.window == self.id)
            .map(|s| s.element.clone())
    }

    /// Manual focus if still active, else the recoverable one.
    fn recover_target(&self) -> Option<String> {
        [self.manual_focus.as_deref(), self.recover_focus.as_deref()]
            .into_iter()
            .flatten()
            .find(|e| self.element_active(e))
            .map(str::to_string)
    }

    /// First configured element that is active.
    fn configured_focus(&self) -> Option<String> {
        self.descriptor
            .first_selected
            .iter()
            .find(|e| self.element_active(e))
            .cloned()
    }

    fn target_focus(&self) -> Option<String> {
        self.recover_target().or_else(|| self.configured_focus())
    }

    /// Selects `element` globally, or clears the selection this window holds.
    ///
    /// With `allow_override` a remembered focus target wins over `element`.
    pub(crate) fn select(
        &mut self,
        element: Option<&str>,
        allow_override: bool,
        env: &mut InputEnv<'_>,
    ) -> WindowResult<()> {
        if !self.need_focus_management() {
            error!("window {} ({}) does not take focus", self.id, self.kind());
            return Err(WindowError::NotInteractable(self.id));
        }

        let mut element = element.map(str::to_string);
        if allow_override {
            if let Some(remembered) = self.recover_target() {
                element = Some(remembered);
            }
        }

        match element {
            Some(element) => {
                if !self.element_active(&element) {
                    warn!("window {}: element `{}` is not active", self.id, element);
                    if let Some(current) = self.owned_selection(env) {
                        self.recover_focus = Some(current);
                    }
                    return Ok(());
                }
                self.recover_focus = Some(element.clone());
                self.manual_focus = Some(element.clone());
                *env.selected = Some(Selection {
                    window: self.id,
                    element,
                });
            }
            None => {
                if let Some(current) = self.owned_selection(env) {
                    self.recover_focus = Some(current);
                    *env.selected = None;
                }
                self.manual_focus = None;
            }
        }
        Ok(())
    }

    /// Remembers the selected element before focus moves elsewhere.
    pub(crate) fn stash_focus(&mut self, env: &InputEnv<'_>) {
        if let Some(element) = self.owned_selection(env) {
            if self.element_active(&element) {
                self.manual_focus = Some(element.clone());
                self.recover_focus = Some(element);
            }
        }
    }

    fn auto_set_focus(&mut self, enabled: bool, opening: bool, env: &mut InputEnv<'_>) {
        if !self.need_focus_management() || self.descriptor.first_selected.is_empty() {
            return;
        }
        if enabled {
            self.auto_select_element(opening, env);
        } else if let Err(e) = self.select(None, false, env) {
            warn!("window {} could not drop focus: {}", self.id, e);
        }
    }

    fn auto_select_element(&mut self, opening: bool, env: &mut InputEnv<'_>) {
        let use_previous = !opening || self.descriptor.reopen_with_last_focus;
        let target = if use_previous {
            self.target_focus()
        } else {
            self.configured_focus()
        };
        match target {
            Some(element) => {
                if let Err(e) = self.select(Some(&element), false, env) {
                    warn!("window {} could not select `{}`: {}", self.id, element, e);
                }
            }
            None => debug!("window {} has no active element to focus", self.id),
        }
    }

    /// Grants or revokes input, optionally moving element focus with it.
    pub(crate) fn set_interactable(
        &mut self,
        enabled: bool,
        opening: bool,
        setup_focus: bool,
        env: &mut InputEnv<'_>,
    ) {
        if !env.navigation_mode || !self.need_focus_management() {
            return;
        }
        if setup_focus {
            self.auto_set_focus(enabled, opening, env);
        }
        if !env.make_non_interactable {
            return;
        }
        self.apply_interactable(enabled);
    }

    /// Flips the surface flag and fires the focus hooks on change.
    pub(crate) fn apply_interactable(&mut self, enabled: bool) {
        if self.interactive == enabled {
            return;
        }
        self.interactive = enabled;
        self.surface.set_interactable(enabled);
        if enabled {
            self.behavior.on_focus();
        } else {
            self.behavior.on_focus_lost();
        }
    }
}
