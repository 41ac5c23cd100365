//! The window manager
//!
//! [`WindowManager`] is a cheap, cloneable handle to the shared manager state.
//! It owns every window instance and is the only way to open, close, focus or
//! destroy one.
//!
//! Opening is asynchronous because assets are loaded on demand. Concurrent
//! opens of the same single-instance kind are collapsed into one in-flight
//! future; every caller receives the same result. Everything else is
//! synchronous and runs under one lock, which is never held across an await.
//!
//! Events raised by an operation are delivered to listeners after the lock is
//! released, so a listener may call back into the manager. Behavior hooks run
//! under the lock; a manager call made from a hook is refused with
//! [`WindowError::ReentrantCall`].

mod focus;
mod state;


use crate::config::{ManagerConfig, WindeckConfig};
use crate::error::{WindowError, WindowResult};
use crate::layer::{LayerTable, LayerType};
use crate::registry::{WindowDescriptor, WindowKind, WindowRegistry};
use crate::surface::AssetLoader;
use crate::window::{Payload, Selection, Window, WindowBehavior, WindowId, WindowInfo};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, warn};
use parking_lot::Mutex;
use state::ManagerState;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

/// Something that happened to a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Opened(WindowId),
    /// An already open window received new data
    Refreshed(WindowId),
    /// The enter transition finished
    Shown(WindowId),
    Closing(WindowId),
    /// The exit transition finished
    Hidden(WindowId),
    FocusChanged {
        from: Option<WindowId>,
        to: Option<WindowId>,
    },
    OrderChanged {
        id: WindowId,
        order: i32,
    },
    Destroyed(WindowId),
}

pub type EventListener = Arc<dyn Fn(&WindowEvent) + Send + Sync>;

/// Options of a single open request.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Open as a child of the open singleton of this kind
    pub parent: Option<WindowKind>,
    /// Collapse concurrent opens of the kind into one. Defaults to the kind's
    /// `single_instance` flag.
    pub singleton: Option<bool>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(mut self, parent: impl Into<WindowKind>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = Some(singleton);
        self
    }
}

type SharedOpen = Shared<BoxFuture<'static, WindowResult<WindowId>>>;

struct Inner {
    state: Mutex<ManagerState>,
    listeners: Mutex<Vec<EventListener>>,
    loader: Arc<dyn AssetLoader>,
    loading: Mutex<HashMap<WindowKind, SharedOpen>>,
}

thread_local! {
    static IN_MANAGER: Cell<bool> = Cell::new(false);
}

/// Marks this thread as holding the manager state.
struct ManagerScope;

impl ManagerScope {
    fn enter() -> Option<Self> {
        IN_MANAGER.with(|busy| {
            if busy.get() {
                None
            } else {
                busy.set(true);
                Some(ManagerScope)
            }
        })
    }
}

impl Drop for ManagerScope {
    fn drop(&mut self) {
        IN_MANAGER.with(|busy| busy.set(false));
    }
}

impl Inner {
    /// Runs `f` on the state, then delivers the events it raised once the
    /// lock is released.
    fn with_state<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut ManagerState) -> R,
    ) -> WindowResult<R> {
        let scope = ManagerScope::enter()
            .ok_or_else(|| WindowError::ReentrantCall(operation.to_string()))?;
        let (result, events) = {
            let mut state = self.state.lock();
            let result = f(&mut state);
            (result, state.take_events())
        };
        drop(scope);

        self.dispatch(&events);
        Ok(result)
    }

    fn dispatch(&self, events: &[WindowEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.lock().clone();
        for event in events {
            for listener in &listeners {
                listener(event);
            }
        }
    }
}

#[derive(Clone)]
pub struct WindowManager {
    inner: Arc<Inner>,
}

/// Logs a failed operation; reentrancy violations are expected and quieter.
fn logged<T>(operation: &str, result: WindowResult<T>) -> WindowResult<T> {
    if let Err(e) = &result {
        if e.is_reentrancy() {
            warn!("{} refused: {}", operation, e);
        } else {
            error!("{} failed: {}", operation, e);
        }
    }
    result
}

impl WindowManager {
    /// Creates a manager with the layers and window table of `config`.
    pub fn new(config: &WindeckConfig, loader: Arc<dyn AssetLoader>) -> Self {
        Self::with_registry(
            config.manager.clone(),
            LayerTable::new(&config.layers),
            WindowRegistry::from_config(config),
            loader,
        )
    }

    pub fn with_registry(
        config: ManagerConfig,
        layers: LayerTable,
        registry: WindowRegistry,
        loader: Arc<dyn AssetLoader>,
    ) -> Self {
        let inner = Arc::new_cyclic(|handle| Inner {
            state: Mutex::new(ManagerState::new(
                config,
                layers,
                registry,
                loader.clone(),
                handle.clone(),
            )),
            listeners: Mutex::new(Vec::new()),
            loader,
            loading: Mutex::new(HashMap::new()),
        });
        Self { inner }
    }

    /// Runs a fallible operation on the state.
    fn apply<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut ManagerState) -> WindowResult<R>,
    ) -> WindowResult<R> {
        self.inner.with_state(operation, f)?
    }

    /// Runs an operation that cannot fail; a refused call is logged.
    fn update(&self, operation: &str, f: impl FnOnce(&mut ManagerState)) {
        let _ = logged(operation, self.inner.with_state(operation, f));
    }

    /// Reads the state; a refused read is logged and yields the default.
    fn query<R: Default>(&self, operation: &str, f: impl FnOnce(&ManagerState) -> R) -> R {
        logged(operation, self.inner.with_state(operation, |state| f(state))).unwrap_or_default()
    }

    /// Adds or replaces a window kind.
    pub fn register_window(&self, descriptor: WindowDescriptor) {
        self.update("register window", |state| state.registry.register(descriptor));
    }

    pub fn register_behavior<F>(&self, kind: impl Into<WindowKind>, factory: F)
    where
        F: Fn() -> Box<dyn WindowBehavior> + Send + Sync + 'static,
    {
        let kind = kind.into();
        self.update("register behavior", |state| {
            state.registry.register_behavior(kind, factory)
        });
    }

    /// Subscribes to window events.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&WindowEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().push(Arc::new(listener));
    }

    // Opening

    /// Opens a window of `kind`, loading and instantiating it if needed.
    pub async fn open(
        &self,
        kind: impl Into<WindowKind>,
        data: Option<Payload>,
    ) -> WindowResult<WindowId> {
        self.open_with(kind, data, OpenOptions::default()).await
    }

    pub async fn open_with(
        &self,
        kind: impl Into<WindowKind>,
        data: Option<Payload>,
        options: OpenOptions,
    ) -> WindowResult<WindowId> {
        let kind = kind.into();
        let single_flight = match options.singleton {
            Some(singleton) => singleton,
            None => self
                .query("open", |state| {
                    state.registry.get(&kind).map(|d| d.single_instance)
                })
                .unwrap_or(true),
        };

        let result = if single_flight {
            self.join_or_start(kind.clone(), data, options.parent).await
        } else {
            self.open_uncached(kind.clone(), data, options.parent).await
        };
        logged(&format!("open `{}`", kind), result)
    }

    /// Returns the in-flight open of `kind`, or starts one.
    fn join_or_start(
        &self,
        kind: WindowKind,
        data: Option<Payload>,
        parent: Option<WindowKind>,
    ) -> SharedOpen {
        let mut loading = self.inner.loading.lock();
        if let Some(pending) = loading.get(&kind) {
            if data.is_some() {
                debug!("joining in-flight open of `{}`, dropping its data", kind);
            }
            return pending.clone();
        }

        let this = self.clone();
        let key = kind.clone();
        let pending = async move {
            let result = this.open_uncached(key.clone(), data, parent).await;
            this.inner.loading.lock().remove(&key);
            result
        }
        .boxed()
        .shared();
        loading.insert(kind, pending.clone());
        pending
    }

    async fn open_uncached(
        &self,
        kind: WindowKind,
        data: Option<Payload>,
        parent: Option<WindowKind>,
    ) -> WindowResult<WindowId> {
        let parent = match parent {
            Some(parent_kind) => {
                let parent_id =
                    self.apply("open", |state| state.resolve_parent(&parent_kind, &kind))?;
                Some((parent_kind, parent_id))
            }
            None => None,
        };

        let (id, created) = self.get_or_create(&kind).await?;

        self.apply("open", |state| {
            let opened = state.attach_and_open(id, parent, data, created);
            if opened.is_err() && created {
                state.discard_unopened(id);
            }
            opened.map(|_| id)
        })
    }

    /// The cached singleton of `kind`, or a freshly loaded instance.
    async fn get_or_create(&self, kind: &WindowKind) -> WindowResult<(WindowId, bool)> {
        if let Some(id) = self.apply("open", |state| Ok(state.singleton(kind)))? {
            return Ok((id, false));
        }
        let descriptor = self.apply("open", |state| state.descriptor(kind))?;

        let asset = self.inner.loader.load(&descriptor.asset).await;
        let Some(asset) = asset else {
            return Err(WindowError::LoadFailed {
                kind: kind.clone(),
                asset: descriptor.asset.clone(),
            });
        };

        self.apply("open", |state| {
            if descriptor.single_instance {
                if let Some(id) = state.singleton(kind) {
                    // The live instance holds the asset; this handle is surplus
                    debug!("`{}` was created while its asset loaded, dropping this load", kind);
                    return Ok((id, false));
                }
            }
            Ok((state.instantiate(&descriptor, asset), true))
        })
    }

    /// The open singleton of `kind`, refreshed with `data` if any; otherwise
    /// opens one.
    pub async fn get_view(
        &self,
        kind: impl Into<WindowKind>,
        data: Option<Payload>,
    ) -> WindowResult<WindowId> {
        let kind = kind.into();
        let opened = self.apply("get view", |state| {
            let id = state.opened_singleton(&kind);
            if let (Some(id), Some(_)) = (id, &data) {
                state.refresh(id, data.clone());
            }
            Ok(id)
        })?;
        match opened {
            Some(id) => Ok(id),
            None => self.open(kind, data).await,
        }
    }

    // Closing and destruction

    pub fn close(&self, id: WindowId) -> WindowResult<()> {
        let operation = format!("close {}", id);
        logged(&operation, self.apply(&operation, |state| state.close(id)))
    }

    /// Closes the singleton of `kind`. With `is_try`, a kind with no loaded or
    /// open instance is not an error.
    pub fn close_by_kind(&self, kind: impl Into<WindowKind>, is_try: bool) -> WindowResult<()> {
        let kind = kind.into();
        let operation = format!("close `{}`", kind);
        logged(
            &operation,
            self.apply(&operation, |state| state.close_by_kind(&kind, is_try)),
        )
    }

    /// Closes if needed, then destroys immediately.
    pub fn kill(&self, id: WindowId) -> WindowResult<()> {
        let operation = format!("kill {}", id);
        let killed = self.apply(&operation, |state| {
            if !state.windows.contains_key(&id) {
                return Err(WindowError::WindowNotFound(id));
            }
            state.kill(id);
            Ok(())
        });
        logged(&operation, killed)
    }

    /// Closes every layer; with `delete_instances` also destroys every instance.
    pub fn close_all(&self, delete_instances: bool) {
        self.update("close all", |state| state.close_all(delete_instances));
    }

    /// Closes every layer above the essential one.
    pub fn close_all_non_essential(&self) {
        self.update("close all non-essential", |state| {
            state.close_all_non_essential()
        });
    }

    /// The cancel action: closes the focused window if it allows it. Returns
    /// the closed window.
    pub fn cancel(&self) -> WindowResult<Option<WindowId>> {
        logged("cancel", self.apply("cancel", |state| state.cancel()))
    }

    // Animations

    /// The enter animation of `id` finished. Returns whether one was pending.
    pub fn notify_enter_animation_done(&self, id: WindowId) -> WindowResult<bool> {
        self.apply("enter animation done", |state| state.notify_enter_done(id))
    }

    /// The exit animation of `id` finished. Returns whether one was pending.
    pub fn notify_exit_animation_done(&self, id: WindowId) -> WindowResult<bool> {
        self.apply("exit animation done", |state| state.notify_exit_done(id))
    }

    // Focus and input

    pub fn set_navigation_mode(&self, enabled: bool) {
        self.update("set navigation mode", |state| {
            state.set_navigation_mode(enabled)
        });
    }

    pub fn navigation_mode(&self) -> bool {
        self.query("navigation mode", |state| state.navigation_mode)
    }

    /// Selects an element of an open window.
    pub fn select(&self, id: WindowId, element: &str) -> WindowResult<()> {
        let operation = format!("select `{}` in {}", element, id);
        logged(
            &operation,
            self.apply(&operation, |state| state.select(id, element)),
        )
    }

    pub fn set_focus_ready(&self, id: WindowId, ready: bool) -> WindowResult<()> {
        self.apply("set focus ready", |state| state.set_focus_ready(id, ready))
    }

    pub fn selection(&self) -> Option<Selection> {
        self.query("selection", |state| state.selected.clone())
    }

    pub fn current_focus(&self) -> Option<WindowId> {
        self.query("current focus", |state| state.current_focus)
    }

    /// Focus stack from oldest to most recent.
    pub fn focus_stack(&self) -> Vec<WindowId> {
        self.query("focus stack", |state| state.focus_stack.as_slice().to_vec())
    }

    // Queries

    pub fn window(&self, id: WindowId) -> Option<WindowInfo> {
        self.query("window", |state| state.windows.get(&id).map(Window::info))
    }

    /// Runs `f` on a live window.
    pub fn with_window<R>(&self, id: WindowId, f: impl FnOnce(&Window) -> R) -> Option<R> {
        self.query("with window", |state| state.windows.get(&id).map(f))
    }

    pub fn opened_singleton(&self, kind: impl Into<WindowKind>) -> Option<WindowId> {
        let kind = kind.into();
        self.query("opened singleton", |state| state.opened_singleton(&kind))
    }

    /// The cached singleton of `kind`, open or not.
    pub fn singleton(&self, kind: impl Into<WindowKind>) -> Option<WindowId> {
        let kind = kind.into();
        self.query("singleton", |state| state.singleton(&kind))
    }

    pub fn is_singleton_loaded(&self, kind: impl Into<WindowKind>) -> bool {
        self.singleton(kind).is_some()
    }

    /// An open of `kind` is in flight.
    pub fn is_loading(&self, kind: impl Into<WindowKind>) -> bool {
        self.inner.loading.lock().contains_key(&kind.into())
    }

    pub fn layer_roots(&self, layer: LayerType) -> Vec<WindowId> {
        self.query("layer roots", |state| {
            state
                .layers
                .get(layer)
                .map(|l| l.roots().to_vec())
                .unwrap_or_default()
        })
    }

    /// Every visible window with its order, lowest first.
    pub fn render_order(&self) -> Vec<(WindowId, i32)> {
        self.query("render order", |state| state.render_order())
    }

    pub fn instance_count(&self) -> usize {
        self.query("instance count", |state| state.windows.len())
    }

    /// Live instances of an asset.
    pub fn asset_refs(&self, asset: &str) -> usize {
        self.query("asset refs", |state| state.assets.count(asset))
    }

    pub fn config(&self) -> ManagerConfig {
        self.query("config", |state| state.config.clone())
    }
}

impl std::fmt::Debug for WindowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(state) = self.inner.state.try_lock() else {
            return f.debug_struct("WindowManager").finish_non_exhaustive();
        };
        f.debug_struct("WindowManager")
            .field("windows", &state.windows.len())
            .field("current_focus", &state.current_focus)
            .finish()
    }
}
