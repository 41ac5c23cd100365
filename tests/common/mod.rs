//! Shared fixtures for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use windeck::config::ManagerConfig;
use windeck::layer::LayerTable;
use windeck::registry::WindowRegistry;
use windeck::{HeadlessLoader, LayerType, WindowDescriptor, WindowEvent, WindowManager};

/// The window table used across tests.
pub fn standard_windows() -> Vec<WindowDescriptor> {
    vec![
        WindowDescriptor::new("Hud", LayerType::MainUi).weight(1),
        WindowDescriptor::new("Inventory", LayerType::MutexWindow)
            .weight(3)
            .first_selected(&["tab_items", "tab_gear"]),
        WindowDescriptor::new("Map", LayerType::MutexWindow).weight(4),
        WindowDescriptor::new("Shop", LayerType::MultiWindow).weight(5),
        WindowDescriptor::new("ItemDetail", LayerType::MultiWindow)
            .weight(2)
            .first_selected(&["equip"]),
        WindowDescriptor::new("Tooltip", LayerType::FloatingPanel).weight(6),
        WindowDescriptor::new("Confirm", LayerType::ModalWindow)
            .weight(7)
            .single_instance(false),
        WindowDescriptor::new("Toast", LayerType::Notice)
            .weight(8)
            .interactable(false),
        WindowDescriptor::new("Settings", LayerType::Additive)
            .weight(9)
            .auto_destroy(false),
    ]
}

pub fn manager_with(loader: &HeadlessLoader, config: ManagerConfig) -> WindowManager {
    let mut registry = WindowRegistry::new();
    for descriptor in standard_windows() {
        registry.register(descriptor);
    }
    WindowManager::with_registry(
        config,
        LayerTable::default(),
        registry,
        Arc::new(loader.clone()),
    )
}

pub fn manager(loader: &HeadlessLoader) -> WindowManager {
    manager_with(loader, ManagerConfig::default())
}

/// Collects every event the manager emits.
pub fn record_events(manager: &WindowManager) -> Arc<Mutex<Vec<WindowEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    manager.add_listener(move |event| sink.lock().push(event.clone()));
    events
}
