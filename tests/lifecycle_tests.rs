//! Integration tests for window lifecycle
//!
//! These tests drive the manager end to end through the headless loader:
//! opening and closing, layer policies, parent/child trees, ordering,
//! asset reference counting and delayed destruction.

mod common;

use common::{manager, manager_with, record_events};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use windeck::config::ManagerConfig;
use windeck::layer::{LayerPolicy, LayerTable};
use windeck::registry::WindowRegistry;
use windeck::{
    HeadlessLoader, LayerType, OpenOptions, Visibility, WindowDescriptor, WindowError,
    WindowEvent, WindowManager, WindowResult,
};

#[tokio::test]
async fn test_open_close_and_reopen_singleton() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let id = manager.open("Inventory", None).await?;
    let info = manager.window(id).unwrap();
    assert!(info.is_opened);
    assert_eq!(info.visibility, Visibility::Visible);
    assert_eq!(manager.layer_roots(LayerType::MutexWindow), vec![id]);
    assert_eq!(manager.opened_singleton("Inventory"), Some(id));

    manager.close(id)?;
    let info = manager.window(id).unwrap();
    assert!(!info.is_opened);
    assert_eq!(info.visibility, Visibility::Invisible);
    assert!(manager.layer_roots(LayerType::MutexWindow).is_empty());
    assert_eq!(manager.opened_singleton("Inventory"), None);
    assert!(manager.is_singleton_loaded("Inventory"));

    // The cached instance comes back without another load
    let again = manager.open("Inventory", None).await?;
    assert_eq!(again, id);
    assert_eq!(loader.load_count("Inventory"), 1);
    Ok(())
}

#[tokio::test]
async fn test_is_opened_spans_deferred_animations() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    loader.set_deferred_animations("Inventory");
    let manager = manager(&loader);
    let events = record_events(&manager);

    let id = manager.open("Inventory", None).await?;
    let info = manager.window(id).unwrap();
    assert!(info.is_opened);
    assert_eq!(info.visibility, Visibility::TransitionIn);
    assert!(!events.lock().contains(&WindowEvent::Shown(id)));

    assert!(manager.notify_enter_animation_done(id)?);
    assert_eq!(manager.window(id).unwrap().visibility, Visibility::Visible);
    assert!(events.lock().contains(&WindowEvent::Shown(id)));
    assert!(!manager.notify_enter_animation_done(id)?);

    manager.close(id)?;
    let info = manager.window(id).unwrap();
    assert!(!info.is_opened);
    assert_eq!(info.visibility, Visibility::TransitionOut);

    assert!(manager.notify_exit_animation_done(id)?);
    assert_eq!(manager.window(id).unwrap().visibility, Visibility::Invisible);
    assert!(events.lock().contains(&WindowEvent::Hidden(id)));
    Ok(())
}

#[tokio::test]
async fn test_reopen_during_exit_animation() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    loader.set_deferred_animations("Inventory");
    let manager = manager(&loader);
    let events = record_events(&manager);

    let id = manager.open("Inventory", None).await?;
    manager.notify_enter_animation_done(id)?;
    manager.close(id)?;
    assert_eq!(manager.window(id).unwrap().visibility, Visibility::TransitionOut);
    assert!(!events.lock().contains(&WindowEvent::Hidden(id)));

    let again = manager.open("Inventory", None).await?;
    assert_eq!(again, id);
    let info = manager.window(id).unwrap();
    assert!(info.is_opened);
    assert_eq!(info.visibility, Visibility::TransitionIn);
    // The old exit animation no longer completes anything
    assert!(!manager.notify_exit_animation_done(id)?);

    // The cut-short exit still reports the window hidden before it reopens
    let transitions: Vec<WindowEvent> = events
        .lock()
        .iter()
        .filter(|e| {
            matches!(
                e,
                WindowEvent::Opened(_) | WindowEvent::Closing(_) | WindowEvent::Hidden(_)
            )
        })
        .cloned()
        .collect();
    assert_eq!(
        transitions,
        vec![
            WindowEvent::Opened(id),
            WindowEvent::Closing(id),
            WindowEvent::Hidden(id),
            WindowEvent::Opened(id),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_close_refusals() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let id = manager.open("Inventory", None).await?;
    manager.close(id)?;
    assert_eq!(manager.close(id), Err(WindowError::NotOpen(id)));

    let ghost = windeck::WindowId::from_raw(u64::MAX);
    assert_eq!(manager.close(ghost), Err(WindowError::WindowNotFound(ghost)));

    assert_eq!(
        manager.close_by_kind("Map", false),
        Err(WindowError::NotLoaded("Map".into()))
    );
    assert_eq!(manager.close_by_kind("Map", true), Ok(()));
    assert_eq!(manager.close_by_kind("Inventory", true), Ok(()));
    assert_eq!(
        manager.close_by_kind("Confirm", false),
        Err(WindowError::NotSingleton("Confirm".into()))
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_kind_and_load_failure() {
    let loader = HeadlessLoader::new();
    loader.set_missing("Map");
    let manager = manager(&loader);

    assert_eq!(
        manager.open("Nope", None).await,
        Err(WindowError::UnknownWindowKind("Nope".into()))
    );
    assert_eq!(
        manager.open("Map", None).await,
        Err(WindowError::LoadFailed {
            kind: "Map".into(),
            asset: "Map".into(),
        })
    );
    assert!(!manager.is_loading("Map"));
    assert!(!manager.is_singleton_loaded("Map"));
    assert_eq!(manager.instance_count(), 0);

    // Other kinds are unaffected
    assert!(manager.open("Inventory", None).await.is_ok());
}

#[tokio::test]
async fn test_mutex_layer_keeps_one_window() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    let map = manager.open("Map", None).await?;

    assert!(!manager.window(inventory).unwrap().is_opened);
    assert!(manager.window(map).unwrap().is_opened);
    assert_eq!(manager.layer_roots(LayerType::MutexWindow), vec![map]);
    Ok(())
}

#[tokio::test]
async fn test_opening_clears_configured_layers() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    // Multi windows clear mutex windows and floating panels
    let inventory = manager.open("Inventory", None).await?;
    let tooltip = manager.open("Tooltip", None).await?;
    let shop = manager.open("Shop", None).await?;
    assert!(!manager.window(inventory).unwrap().is_opened);
    assert!(!manager.window(tooltip).unwrap().is_opened);
    assert!(manager.window(shop).unwrap().is_opened);

    // Main UI clears floating panels too
    let tooltip = manager.open("Tooltip", None).await?;
    manager.open("Hud", None).await?;
    assert!(!manager.window(tooltip).unwrap().is_opened);
    assert!(manager.window(shop).unwrap().is_opened);
    Ok(())
}

fn manager_with_layers(loader: &HeadlessLoader, overrides: &[LayerPolicy]) -> WindowManager {
    let mut registry = WindowRegistry::new();
    for descriptor in common::standard_windows() {
        registry.register(descriptor);
    }
    WindowManager::with_registry(
        ManagerConfig::default(),
        LayerTable::new(overrides),
        registry,
        Arc::new(loader.clone()),
    )
}

#[tokio::test]
async fn test_auto_clear_flag_protects_layer() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let main_clears_notice =
        LayerPolicy::new(LayerType::MainUi).clears(&[LayerType::FloatingPanel, LayerType::Notice]);

    let manager = manager_with_layers(&loader, &[main_clears_notice.clone()]);
    let toast = manager.open("Toast", None).await?;
    manager.open("Hud", None).await?;
    assert!(manager.window(toast).unwrap().is_opened);

    let manager = manager_with_layers(
        &loader,
        &[
            main_clears_notice,
            LayerPolicy::new(LayerType::Notice).auto_clear(true),
        ],
    );
    let toast = manager.open("Toast", None).await?;
    manager.open("Hud", None).await?;
    assert!(!manager.window(toast).unwrap().is_opened);
    Ok(())
}

#[tokio::test]
async fn test_child_window_tree() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    let detail = manager
        .open_with("ItemDetail", None, OpenOptions::new().parent("Inventory"))
        .await?;

    let info = manager.window(detail).unwrap();
    assert_eq!(info.parent, Some(inventory));
    assert!(info.is_sub_view);
    assert_eq!(info.layer, LayerType::IndependentView);
    assert!(manager.layer_roots(LayerType::MultiWindow).is_empty());
    assert!(manager.layer_roots(LayerType::IndependentView).is_empty());
    assert_eq!(manager.window(inventory).unwrap().children, vec![detail]);

    // A child orders above its parent even with a lower weight
    let parent_order = manager.window(inventory).unwrap().sort_order.unwrap();
    let child_order = manager.window(detail).unwrap().sort_order.unwrap();
    assert!(child_order > parent_order);

    // Closing the parent closes the child and detaches it
    manager.close(inventory)?;
    let info = manager.window(detail).unwrap();
    assert!(!info.is_opened);
    assert_eq!(info.parent, None);
    assert!(manager.window(inventory).unwrap().children.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_closing_child_detaches_it() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    let detail = manager
        .open_with("ItemDetail", None, OpenOptions::new().parent("Inventory"))
        .await?;
    manager.close(detail)?;

    assert!(manager.window(inventory).unwrap().is_opened);
    assert!(manager.window(inventory).unwrap().children.is_empty());
    assert_eq!(manager.window(detail).unwrap().parent, None);
    Ok(())
}

#[tokio::test]
async fn test_parent_must_be_open_singleton() {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let result = manager
        .open_with("ItemDetail", None, OpenOptions::new().parent("Inventory"))
        .await;
    assert_eq!(
        result,
        Err(WindowError::ParentNotFound {
            parent: "Inventory".into(),
            child: "ItemDetail".into(),
        })
    );
    // Nothing was loaded for the child
    assert_eq!(loader.load_count("ItemDetail"), 0);

    let result = manager
        .open_with("ItemDetail", None, OpenOptions::new().parent("Confirm"))
        .await;
    assert_eq!(result, Err(WindowError::NotSingleton("Confirm".into())));
}

#[tokio::test]
async fn test_order_follows_weight_then_open_time() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    manager.register_window(WindowDescriptor::new("Bag", LayerType::MultiWindow).weight(5));

    let hud = manager.open("Hud", None).await?;
    let toast = manager.open("Toast", None).await?;
    let shop = manager.open("Shop", None).await?;
    let bag = manager.open("Bag", None).await?;

    let order = |id| manager.window(id).unwrap().sort_order.unwrap();
    assert!(order(hud) < order(shop));
    assert!(order(shop) < order(toast));
    assert!(order(shop) < order(bag));

    // Refreshing moves a window in front of its equals
    manager.get_view("Shop", Some(Arc::new(1u32))).await?;
    assert!(order(shop) > order(bag));
    assert!(order(shop) < order(toast));

    let render: Vec<_> = manager.render_order().into_iter().map(|(id, _)| id).collect();
    assert_eq!(render, vec![hud, bag, shop, toast]);

    // Surfaces received their orders
    let probe = loader.last_surface("Toast").unwrap();
    assert_eq!(probe.lock().sort_order, order(toast));
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_events() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    let events = record_events(&manager);

    let id = manager.open("Inventory", None).await?;
    manager.close(id)?;
    manager.kill(id)?;

    let events = events.lock().clone();
    let position = |event: &WindowEvent| events.iter().position(|e| e == event).unwrap();
    assert!(position(&WindowEvent::Opened(id)) < position(&WindowEvent::Shown(id)));
    assert!(position(&WindowEvent::Shown(id)) < position(&WindowEvent::Closing(id)));
    assert!(position(&WindowEvent::Closing(id)) < position(&WindowEvent::Hidden(id)));
    assert!(position(&WindowEvent::Hidden(id)) < position(&WindowEvent::Destroyed(id)));
    assert!(events.contains(&WindowEvent::FocusChanged {
        from: None,
        to: Some(id),
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, WindowEvent::OrderChanged { id: changed, .. } if *changed == id)));
    Ok(())
}

#[tokio::test]
async fn test_listener_can_close_the_window_it_saw_open() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    let events = record_events(&manager);

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let handle = manager.clone();
    manager.add_listener(move |event| {
        if let WindowEvent::Opened(id) = event {
            sink.lock().push(handle.close(*id));
        }
    });

    let id = manager.open("Shop", None).await?;
    assert_eq!(*results.lock(), vec![Ok(())]);
    assert!(!manager.window(id).unwrap().is_opened);
    assert_eq!(manager.current_focus(), None);

    let events = events.lock().clone();
    let position = |event: &WindowEvent| events.iter().position(|e| e == event).unwrap();
    assert!(position(&WindowEvent::Opened(id)) < position(&WindowEvent::Closing(id)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_listener_close_across_threads() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    let handle = manager.clone();
    manager.add_listener(move |event| {
        if let WindowEvent::Opened(id) = event {
            let _ = handle.close(*id);
        }
    });

    let opener = manager.clone();
    let opened = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::spawn(async move { opener.open("Shop", None).await }),
    )
    .await
    .expect("open finishes")
    .unwrap()?;
    assert!(!manager.window(opened).unwrap().is_opened);
    Ok(())
}

#[tokio::test]
async fn test_asset_refcount_unloads_once() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    manager.register_window(
        WindowDescriptor::new("Note", LayerType::MultiWindow)
            .weight(5)
            .single_instance(false),
    );

    let first = manager.open("Note", None).await?;
    let second = manager.open("Note", None).await?;
    assert_ne!(first, second);
    assert_eq!(manager.asset_refs("Note"), 2);

    manager.kill(first)?;
    assert_eq!(manager.asset_refs("Note"), 1);
    assert_eq!(loader.unload_count("Note"), 0);

    manager.kill(second)?;
    assert_eq!(manager.asset_refs("Note"), 0);
    assert_eq!(loader.unload_count("Note"), 1);
    assert_eq!(manager.instance_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_non_singleton_destroyed_on_close() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let first = manager.open("Confirm", None).await?;
    // Modal windows are exclusive: the first dialog closes and, not being a
    // singleton, is destroyed right away
    let second = manager.open("Confirm", None).await?;
    assert!(manager.window(first).is_none());
    assert_eq!(manager.asset_refs("Confirm"), 1);
    assert_eq!(loader.unload_count("Confirm"), 0);

    manager.close(second)?;
    assert!(manager.window(second).is_none());
    assert_eq!(loader.unload_count("Confirm"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delayed_destroy_after_grace_period() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let id = manager.open("Inventory", None).await?;
    manager.close(id)?;

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(manager.window(id).is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(manager.window(id).is_none());
    assert!(!manager.is_singleton_loaded("Inventory"));
    assert_eq!(loader.unload_count("Inventory"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reopen_cancels_delayed_destroy() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let id = manager.open("Inventory", None).await?;
    manager.close(id)?;
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(manager.open("Inventory", None).await?, id);
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(manager.window(id).unwrap().is_opened);

    // A new close starts a fresh grace period
    manager.close(id)?;
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(manager.window(id).is_some());
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(manager.window(id).is_none());
    assert_eq!(loader.load_count("Inventory"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_kill_skips_grace_period() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let id = manager.open("Inventory", None).await?;
    manager.close(id)?;
    manager.kill(id)?;
    assert!(manager.window(id).is_none());
    assert_eq!(loader.unload_count("Inventory"), 1);

    // The pending destroy does not fire a second time
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(loader.unload_count("Inventory"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_close_all_keeps_or_deletes_instances() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager_with(
        &loader,
        ManagerConfig {
            destroy_delay_secs: 5,
            ..ManagerConfig::default()
        },
    );

    let hud = manager.open("Hud", None).await?;
    let settings = manager.open("Settings", None).await?;
    let toast = manager.open("Toast", None).await?;

    manager.close_all(false);
    for id in [hud, settings, toast] {
        assert!(!manager.window(id).unwrap().is_opened);
    }
    assert_eq!(manager.current_focus(), None);
    assert!(manager.focus_stack().is_empty());

    // Auto-destroy singletons go after the grace period, the rest stay
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(manager.window(hud).is_none());
    assert!(manager.window(toast).is_none());
    assert!(manager.window(settings).is_some());

    manager.close_all(true);
    assert_eq!(manager.instance_count(), 0);
    assert_eq!(loader.unload_count("Settings"), 1);
    Ok(())
}

#[tokio::test]
async fn test_close_all_non_essential() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let hud = manager.open("Hud", None).await?;
    let inventory = manager.open("Inventory", None).await?;
    let toast = manager.open("Toast", None).await?;

    manager.close_all_non_essential();
    assert!(manager.window(hud).unwrap().is_opened);
    assert!(!manager.window(inventory).unwrap().is_opened);
    assert!(!manager.window(toast).unwrap().is_opened);
    Ok(())
}
