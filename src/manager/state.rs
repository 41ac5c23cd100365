use super::{Inner, WindowEvent};
use crate::assets::{AssetCounter, Release};
use crate::config::ManagerConfig;
use crate::error::{WindowError, WindowResult};
use crate::focus_stack::FocusStack;
use crate::layer::{Layer, LayerTable, LayerType};
use crate::order::{self, OpenStamp, OrderNode};
use crate::registry::{WindowDescriptor, WindowKind, WindowRegistry};
use crate::surface::{AssetLoader, WindowAsset};
use crate::window::{InputEnv, Payload, Selection, Visibility, Window, WindowId};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

/// A pending grace-period destroy.
struct DelayedDestroy {
    token: u64,
    task: AbortHandle,
}

pub(crate) struct ManagerState {
    pub(super) config: ManagerConfig,
    pub(super) registry: WindowRegistry,
    pub(super) layers: LayerTable,
    pub(super) windows: HashMap<WindowId, Window>,
    pub(super) singletons: HashMap<WindowKind, WindowId>,
    pub(super) assets: AssetCounter,
    pub(super) focus_stack: FocusStack,
    pub(super) current_focus: Option<WindowId>,
    pub(super) selected: Option<Selection>,
    pub(super) navigation_mode: bool,
    /// Raised under the lock, delivered once it is released
    events: Vec<WindowEvent>,
    delayed: HashMap<WindowId, DelayedDestroy>,
    next_token: u64,
    next_seq: u64,
    loader: Arc<dyn AssetLoader>,
    handle: Weak<Inner>,
}

impl ManagerState {
    pub(super) fn new(
        config: ManagerConfig,
        layers: LayerTable,
        registry: WindowRegistry,
        loader: Arc<dyn AssetLoader>,
        handle: Weak<Inner>,
    ) -> Self {
        info!(
            "window manager ready: {} window kinds, destroy delay {}s",
            registry.len(),
            config.destroy_delay_secs
        );
        Self {
            navigation_mode: config.navigation_mode,
            config,
            registry,
            layers,
            windows: HashMap::new(),
            singletons: HashMap::new(),
            assets: AssetCounter::new(),
            focus_stack: FocusStack::new(),
            current_focus: None,
            selected: None,
            events: Vec::new(),
            delayed: HashMap::new(),
            next_token: 0,
            next_seq: 0,
            loader,
            handle,
        }
    }

    pub(super) fn emit(&mut self, event: WindowEvent) {
        debug!("window event: {:?}", event);
        self.events.push(event);
    }

    pub(super) fn take_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.events)
    }

    fn next_stamp(&mut self) -> OpenStamp {
        self.next_seq += 1;
        OpenStamp::new(Instant::now(), self.next_seq)
    }

    /// A window together with the shared input state.
    pub(super) fn window_env(&mut self, id: WindowId) -> Option<(&mut Window, InputEnv<'_>)> {
        let env = InputEnv {
            selected: &mut self.selected,
            navigation_mode: self.navigation_mode,
            make_non_interactable: self.config.make_non_interactable,
        };
        self.windows.get_mut(&id).map(|window| (window, env))
    }

    pub(super) fn descriptor(&self, kind: &WindowKind) -> WindowResult<Arc<WindowDescriptor>> {
        let descriptor = self
            .registry
            .get(kind)
            .cloned()
            .ok_or_else(|| WindowError::UnknownWindowKind(kind.clone()))?;
        if !self.layers.contains(descriptor.layer) {
            return Err(WindowError::UnknownLayer(descriptor.layer));
        }
        Ok(descriptor)
    }

    /// The cached singleton of `kind`, open or not.
    pub(super) fn singleton(&self, kind: &WindowKind) -> Option<WindowId> {
        self.singletons
            .get(kind)
            .copied()
            .filter(|id| self.windows.contains_key(id))
    }

    pub(super) fn opened_singleton(&self, kind: &WindowKind) -> Option<WindowId> {
        self.singleton(kind)
            .filter(|id| self.windows.get(id).map(Window::is_opened).unwrap_or(false))
    }

    pub(super) fn resolve_parent(
        &self,
        parent: &WindowKind,
        child: &WindowKind,
    ) -> WindowResult<WindowId> {
        if let Some(descriptor) = self.registry.get(parent) {
            if !descriptor.single_instance {
                return Err(WindowError::NotSingleton(parent.clone()));
            }
        }
        self.opened_singleton(parent)
            .ok_or_else(|| WindowError::ParentNotFound {
                parent: parent.clone(),
                child: child.clone(),
            })
    }

    // Creation

    pub(super) fn instantiate(
        &mut self,
        descriptor: &Arc<WindowDescriptor>,
        asset: Arc<dyn WindowAsset>,
    ) -> WindowId {
        let id = WindowId::next();
        let mut window = Window::new(
            id,
            descriptor.clone(),
            asset.instantiate(),
            self.registry.create_behavior(&descriptor.kind),
            asset.key().to_string(),
            self.config.make_non_interactable,
        );
        window.init_instance();

        let refs = self.assets.acquire(&asset);
        if descriptor.single_instance {
            self.singletons.insert(descriptor.kind.clone(), id);
        }
        self.windows.insert(id, window);
        debug!(
            "instantiated window {} ({}), asset `{}` has {} instance(s)",
            id,
            descriptor.kind,
            asset.key(),
            refs
        );
        id
    }

    /// Cleans up an instance whose first open failed. Non-singletons go right
    /// away; a singleton stays cached for the usual grace period.
    pub(super) fn discard_unopened(&mut self, id: WindowId) {
        let Some(window) = self.windows.get(&id) else {
            return;
        };
        if window.is_opened() {
            return;
        }
        if window.descriptor().single_instance {
            self.schedule_delayed_destroy(id);
        } else {
            self.destroy_instance(id);
        }
    }

    // Opening

    pub(super) fn attach_and_open(
        &mut self,
        id: WindowId,
        parent: Option<(WindowKind, WindowId)>,
        data: Option<Payload>,
        created: bool,
    ) -> WindowResult<()> {
        match parent {
            Some((parent_kind, parent_id)) => self.attach_to_parent(id, &parent_kind, parent_id)?,
            None => {
                if let Some(window) = self.windows.get_mut(&id) {
                    if !window.is_opened() {
                        window.set_sub_view(false);
                    }
                }
            }
        }
        self.open_instance(id, data, !created)
    }

    fn attach_to_parent(
        &mut self,
        id: WindowId,
        parent_kind: &WindowKind,
        parent_id: WindowId,
    ) -> WindowResult<()> {
        let child_kind = self
            .windows
            .get(&id)
            .ok_or(WindowError::WindowNotFound(id))?
            .kind()
            .clone();

        // The parent may have closed while the child was loading
        let parent_open = self
            .windows
            .get(&parent_id)
            .map(Window::is_opened)
            .unwrap_or(false);
        if !parent_open {
            return Err(WindowError::ParentNotFound {
                parent: parent_kind.clone(),
                child: child_kind,
            });
        }
        if parent_id == id || self.is_ancestor(id, parent_id) {
            return Err(WindowError::InvariantViolation(format!(
                "window {} cannot become a child of its descendant {}",
                id, parent_id
            )));
        }

        let old_parent = match self.windows.get_mut(&id) {
            Some(window) => {
                if window.layer() != LayerType::IndependentView {
                    warn!(
                        "child window `{}` moved from {:?} to the independent view layer",
                        child_kind,
                        window.layer()
                    );
                    window.set_layer(LayerType::IndependentView);
                }
                window.set_sub_view(true);
                let old = window.parent();
                window.set_parent(Some(parent_id));
                old
            }
            None => return Err(WindowError::WindowNotFound(id)),
        };
        if let Some(old) = old_parent.filter(|old| *old != parent_id) {
            if let Some(previous) = self.windows.get_mut(&old) {
                previous.remove_child(id);
            }
        }

        // Children never sit in a layer's root list
        self.layers.remove_everywhere(id);
        if let Some(parent) = self.windows.get_mut(&parent_id) {
            parent.add_child(id);
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: WindowId, of: WindowId) -> bool {
        let mut current = self.windows.get(&of).and_then(Window::parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.windows.get(&id).and_then(Window::parent);
        }
        false
    }

    /// Opens a live instance, or refreshes it if it is already open.
    pub(super) fn open_instance(
        &mut self,
        id: WindowId,
        data: Option<Payload>,
        refreshing: bool,
    ) -> WindowResult<()> {
        if let Some(current) = self.current_focus {
            if let Some((window, env)) = self.window_env(current) {
                window.stash_focus(&env);
            }
        }
        self.cancel_delayed_destroy(id);

        let (opened, layer, is_main) = {
            let window = self
                .windows
                .get(&id)
                .ok_or(WindowError::WindowNotFound(id))?;
            (window.is_opened(), window.layer(), !window.is_sub_view())
        };

        if opened {
            self.refresh(id, data);
            self.focus_if_managed(id);
            return Ok(());
        }

        self.notify_layer_changed(layer);
        if is_main {
            self.add_to_layer(id, layer)?;
        }

        let stamp = self.next_stamp();
        let (was_leaving, visible) = match self.window_env(id) {
            Some((window, mut env)) => {
                // Opening cuts a running exit transition short
                let was_leaving = window.visibility() == Visibility::TransitionOut;
                window.open(data, refreshing, stamp, &mut env);
                (was_leaving, window.visibility() == Visibility::Visible)
            }
            None => return Err(WindowError::WindowNotFound(id)),
        };
        if was_leaving {
            self.emit(WindowEvent::Hidden(id));
        }
        self.emit(WindowEvent::Opened(id));
        if visible {
            self.emit(WindowEvent::Shown(id));
        }

        self.recompute_order();
        self.focus_if_managed(id);
        Ok(())
    }

    /// Hands new data to an open window and moves it to the front.
    pub(super) fn refresh(&mut self, id: WindowId, data: Option<Payload>) {
        let stamp = self.next_stamp();
        if let Some(window) = self.windows.get_mut(&id) {
            window.set_data(data, true, stamp);
            self.emit(WindowEvent::Refreshed(id));
            self.recompute_order();
        }
    }

    fn focus_if_managed(&mut self, id: WindowId) {
        let managed = self
            .windows
            .get(&id)
            .map(Window::need_focus_management)
            .unwrap_or(false);
        if managed {
            self.set_current_focus(Some(id));
        }
    }

    // Closing

    /// Closes an open window on behalf of a caller.
    pub(super) fn close(&mut self, id: WindowId) -> WindowResult<()> {
        let window = self
            .windows
            .get(&id)
            .ok_or(WindowError::WindowNotFound(id))?;
        if window.is_opening() {
            return Err(WindowError::CloseWhileOpening(id));
        }
        if !window.is_opened() {
            return Err(WindowError::NotOpen(id));
        }
        self.close_window(id)
    }

    pub(super) fn close_by_kind(&mut self, kind: &WindowKind, is_try: bool) -> WindowResult<()> {
        let descriptor = self.descriptor(kind)?;
        if !descriptor.single_instance {
            return Err(WindowError::NotSingleton(kind.clone()));
        }
        match self.singleton(kind) {
            Some(id) if is_try && !self.windows.get(&id).map(Window::is_opened).unwrap_or(false) => {
                Ok(())
            }
            Some(id) => self.close(id),
            None if is_try => Ok(()),
            None => Err(WindowError::NotLoaded(kind.clone())),
        }
    }

    /// Layer bookkeeping, the close itself, then focus, order and children.
    fn close_window(&mut self, id: WindowId) -> WindowResult<()> {
        let (layer, is_main) = {
            let window = self
                .windows
                .get(&id)
                .ok_or(WindowError::WindowNotFound(id))?;
            (window.layer(), !window.is_sub_view())
        };

        self.notify_layer_changed(layer);
        if is_main {
            if let Some(layer) = self.layers.get_mut(layer) {
                layer.remove(id);
            }
        }
        self.close_by_mgr(id)?;

        if self.current_focus == Some(id) {
            self.set_current_focus(None);
        }
        self.recompute_order();
        self.close_children(id, false);
        self.schedule_delayed_destroy(id);
        Ok(())
    }

    /// Runs the window's own close and detaches it from its parent.
    fn close_by_mgr(&mut self, id: WindowId) -> WindowResult<()> {
        let (window, mut env) = self
            .window_env(id)
            .ok_or(WindowError::WindowNotFound(id))?;
        window.begin_close(&mut env)?;
        let parent = window.parent();
        let hidden = window.visibility() == Visibility::Invisible;
        window.set_parent(None);

        if let Some(parent) = parent {
            if let Some(parent) = self.windows.get_mut(&parent) {
                parent.remove_child(id);
            }
        }
        self.emit(WindowEvent::Closing(id));
        if hidden {
            self.emit(WindowEvent::Hidden(id));
        }
        Ok(())
    }

    /// Closes every child of `id`, most recent first.
    fn close_children(&mut self, id: WindowId, delete: bool) {
        loop {
            let Some(child) = self
                .windows
                .get(&id)
                .and_then(|w| w.children().last().copied())
            else {
                break;
            };

            let child_open = self
                .windows
                .get(&child)
                .map(Window::is_opened)
                .unwrap_or(false);
            if !child_open {
                if let Some(parent) = self.windows.get_mut(&id) {
                    parent.remove_child(child);
                }
                if let Some(child) = self.windows.get_mut(&child) {
                    child.set_parent(None);
                }
                continue;
            }

            if let Err(e) = self.close_window(child) {
                error!("failed to close child {} of {}: {}", child, id, e);
            }
            let still_attached = self
                .windows
                .get(&id)
                .map(|w| w.children().contains(&child))
                .unwrap_or(false);
            if still_attached {
                error!("child {} of {} did not close", child, id);
                debug_assert!(false, "child {} of {} did not close", child, id);
                break;
            }
            if delete {
                self.destroy_instance(child);
            }
        }
    }

    /// Closes if open, then destroys right away.
    pub(super) fn kill(&mut self, id: WindowId) {
        let opened = self
            .windows
            .get(&id)
            .map(Window::is_opened)
            .unwrap_or(false);
        if opened {
            if let Err(e) = self.close_window(id) {
                error!("failed to close {} before destroying it: {}", id, e);
            }
        }
        self.destroy_instance(id);
    }

    // Destruction

    pub(super) fn destroy_instance(&mut self, id: WindowId) {
        let Some(mut window) = self.windows.remove(&id) else {
            return;
        };
        self.cancel_delayed_destroy(id);

        if self.singletons.get(window.kind()) == Some(&id) {
            self.singletons.remove(window.kind());
        }
        self.layers.remove_everywhere(id);
        if let Some(parent) = window.parent() {
            if let Some(parent) = self.windows.get_mut(&parent) {
                parent.remove_child(id);
            }
        }
        for child in window.children() {
            if let Some(child) = self.windows.get_mut(child) {
                child.set_parent(None);
            }
        }
        if self.selected.as_ref().map(|s| s.window) == Some(id) {
            self.selected = None;
        }
        self.focus_stack.remove(id);
        if self.current_focus == Some(id) {
            self.set_current_focus(None);
        }

        window.destroy();
        match self.assets.release(window.asset_key()) {
            Ok(Release::Unload(asset)) => {
                debug!("unloading asset `{}`", asset.key());
                self.loader.unload(asset);
            }
            Ok(Release::Retained(refs)) => {
                debug!("asset `{}` still has {} instance(s)", window.asset_key(), refs);
            }
            Err(e) => {
                error!("destroying {}: {}", id, e);
                debug_assert!(false, "{}", e);
            }
        }
        self.emit(WindowEvent::Destroyed(id));
    }

    /// Destroys a closed auto-destroy window. Singletons get a grace period
    /// during which a reopen keeps the instance.
    fn schedule_delayed_destroy(&mut self, id: WindowId) {
        let Some(window) = self.windows.get(&id) else {
            return;
        };
        if !window.descriptor().auto_destroy || window.is_opened() {
            return;
        }
        if !window.descriptor().single_instance {
            self.destroy_instance(id);
            return;
        }

        self.cancel_delayed_destroy(id);
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("no async runtime, window {} stays cached", id);
                return;
            }
        };

        self.next_token += 1;
        let token = self.next_token;
        let delay = Duration::from_secs(self.config.destroy_delay_secs);
        let handle = self.handle.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = handle.upgrade() {
                let finished = inner.with_state("delayed destroy", |state| {
                    state.finish_delayed_destroy(id, token)
                });
                if let Err(e) = finished {
                    error!("delayed destroy of {} failed: {}", id, e);
                }
            }
        });
        self.delayed.insert(
            id,
            DelayedDestroy {
                token,
                task: task.abort_handle(),
            },
        );
        debug!("window {} will be destroyed in {:?}", id, delay);
    }

    fn cancel_delayed_destroy(&mut self, id: WindowId) {
        if let Some(pending) = self.delayed.remove(&id) {
            pending.task.abort();
            debug!("cancelled delayed destroy of {}", id);
        }
    }

    fn finish_delayed_destroy(&mut self, id: WindowId, token: u64) {
        // A newer schedule or a cancel supersedes this task
        if self.delayed.get(&id).map(|p| p.token) != Some(token) {
            return;
        }
        self.delayed.remove(&id);

        match self.windows.get(&id).map(Window::is_opened) {
            Some(false) => self.destroy_instance(id),
            Some(true) => debug!("window {} was reopened, keeping it", id),
            None => debug!("window {} already destroyed", id),
        }
    }

    // Layers

    /// Clears the layers configured to be cleared by `layer`.
    fn notify_layer_changed(&mut self, layer: LayerType) {
        let Some(clears) = self
            .layers
            .get(layer)
            .map(|l| l.layers_to_clear().to_vec())
        else {
            return;
        };
        for target in clears {
            if target == layer {
                continue;
            }
            match self.layers.get(target).map(Layer::auto_clear) {
                Some(true) => self.clear_layer(target, false),
                Some(false) => debug!("{:?} is not cleared by {:?}", target, layer),
                None => error!("{:?} clears unknown layer {:?}", layer, target),
            }
        }
    }

    fn add_to_layer(&mut self, id: WindowId, layer: LayerType) -> WindowResult<()> {
        let mutex = self
            .layers
            .get(layer)
            .map(Layer::is_mutex)
            .ok_or(WindowError::UnknownLayer(layer))?;
        if mutex {
            self.clear_layer(layer, false);
        }
        if let Some(layer) = self.layers.get_mut(layer) {
            layer.push(id);
        }
        Ok(())
    }

    /// Closes every root of `layer` and its children, most recent first.
    pub(super) fn clear_layer(&mut self, layer: LayerType, delete: bool) {
        let Some(roots) = self.layers.get_mut(layer).map(Layer::take_roots) else {
            error!("layer {:?} is not configured", layer);
            return;
        };
        if roots.is_empty() {
            return;
        }
        debug!("clearing {} window(s) from {:?}", roots.len(), layer);

        for id in &roots {
            self.close_children(*id, delete);
            if let Err(e) = self.close_by_mgr(*id) {
                error!("failed to close {} while clearing {:?}: {}", id, layer, e);
            }
        }
        for id in roots {
            if delete {
                self.destroy_instance(id);
            } else {
                self.schedule_delayed_destroy(id);
            }
        }

        self.refresh_current_focus();
        self.recompute_order();
    }

    pub(super) fn close_all(&mut self, delete_instances: bool) {
        info!("closing all windows (delete instances: {})", delete_instances);
        self.clear_focus_windows();
        for layer in self.layers.layer_types() {
            self.clear_layer(layer, delete_instances);
        }
        if !delete_instances {
            return;
        }

        let singletons: Vec<WindowId> = self.singletons.values().copied().collect();
        for id in singletons {
            self.kill(id);
        }
        self.singletons.clear();

        let remaining: Vec<WindowId> = self.windows.keys().copied().collect();
        for id in remaining {
            self.kill(id);
        }
    }

    pub(super) fn close_all_non_essential(&mut self) {
        let essential = self.config.essential_layer;
        debug!("closing every layer above {:?}", essential);
        self.clear_focus_windows();
        for layer in self.layers.layer_types() {
            if layer > essential {
                self.clear_layer(layer, false);
            }
        }
    }

    // Order

    /// Solves the order of every open root and its children and pushes the
    /// results to the windows.
    pub(super) fn recompute_order(&mut self) {
        let roots: Vec<OrderNode<WindowId>> = self
            .layers
            .all_roots()
            .into_iter()
            .filter_map(|id| self.order_node(id))
            .collect();

        for placement in order::solve(roots) {
            let changed = self
                .windows
                .get_mut(&placement.key)
                .map(|w| w.apply_order(placement.order, placement.root_index))
                .unwrap_or(false);
            if changed {
                self.emit(WindowEvent::OrderChanged {
                    id: placement.key,
                    order: placement.order,
                });
            }
        }
    }

    fn order_node(&self, id: WindowId) -> Option<OrderNode<WindowId>> {
        let window = self.windows.get(&id)?;
        Some(OrderNode {
            key: id,
            stamp: window.open_stamp()?,
            weight: window.weight(),
            children: window
                .children()
                .iter()
                .filter_map(|child| self.order_node(*child))
                .collect(),
        })
    }

    pub(super) fn render_order(&self) -> Vec<(WindowId, i32)> {
        let mut visible: Vec<(WindowId, i32)> = self
            .windows
            .values()
            .filter(|w| w.visibility() != Visibility::Invisible)
            .filter_map(|w| w.sort_order().map(|order| (w.id(), order)))
            .collect();
        visible.sort_by_key(|(id, order)| (*order, *id));
        visible
    }

    // Animations

    pub(super) fn notify_enter_done(&mut self, id: WindowId) -> WindowResult<bool> {
        let window = self
            .windows
            .get_mut(&id)
            .ok_or(WindowError::WindowNotFound(id))?;
        let done = window.complete_enter();
        if done {
            self.emit(WindowEvent::Shown(id));
        }
        Ok(done)
    }

    pub(super) fn notify_exit_done(&mut self, id: WindowId) -> WindowResult<bool> {
        let window = self
            .windows
            .get_mut(&id)
            .ok_or(WindowError::WindowNotFound(id))?;
        let done = window.complete_exit();
        if done {
            self.emit(WindowEvent::Hidden(id));
        }
        Ok(done)
    }
}

impl Drop for ManagerState {
    fn drop(&mut self) {
        for (_, pending) in self.delayed.drain() {
            pending.task.abort();
        }
    }
}
