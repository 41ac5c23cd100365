//! Per-kind window logic
//!
//! A [`WindowBehavior`] receives the lifecycle callbacks of one window
//! instance. Every hook has a no-op default so implementations only override
//! what they need.
//!
//! Hooks run while the manager is updating its state. A manager call made from
//! a hook is refused with `WindowError::ReentrantCall`; spawn a task for
//! follow-up work instead.

use std::any::Any;
use std::sync::Arc;

/// Opaque data passed to a window when it is opened.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Borrows the payload as `T`, if it is one.
pub fn payload_as<T: Any>(data: Option<&Payload>) -> Option<&T> {
    data.and_then(|d| d.downcast_ref::<T>())
}

pub trait WindowBehavior: Send {
    /// Once per instance, after creation.
    fn on_init(&mut self) {}

    /// Data of the first open of a newly created instance.
    fn on_init_data(&mut self, _data: Option<&Payload>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Data of every later open or refresh.
    fn on_refresh_data(&mut self, _data: Option<&Payload>) -> anyhow::Result<()> {
        Ok(())
    }

    /// After either data hook.
    fn refresh_view(&mut self) {}

    fn on_open(&mut self) {}

    /// The enter transition completed.
    fn on_shown(&mut self) {}

    fn on_close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The exit transition completed; the surface is about to be deactivated.
    fn on_closed(&mut self) {}

    /// The surface was deactivated.
    fn on_hidden(&mut self) {}

    fn on_focus(&mut self) {}

    fn on_focus_lost(&mut self) {}

    fn on_sort_order_changed(&mut self, _order: i32) {}
}

/// Behavior of kinds that registered none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBehavior;

impl WindowBehavior for NoopBehavior {}
