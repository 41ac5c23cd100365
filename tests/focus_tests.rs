//! Integration tests for window focus, element selection and input modes

mod common;

use common::{manager, manager_with, record_events};
use windeck::config::ManagerConfig;
use windeck::window::Selection;
use windeck::{HeadlessLoader, LayerType, WindowDescriptor, WindowEvent, WindowResult};

fn selection(window: windeck::WindowId, element: &str) -> Option<Selection> {
    Some(Selection {
        window,
        element: element.to_string(),
    })
}

#[tokio::test]
async fn test_last_opened_window_takes_focus() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let hud = manager.open("Hud", None).await?;
    assert_eq!(manager.current_focus(), Some(hud));

    let inventory = manager.open("Inventory", None).await?;
    assert_eq!(manager.current_focus(), Some(inventory));
    assert_eq!(manager.focus_stack(), vec![hud, inventory]);
    assert!(manager.window(inventory).unwrap().is_focused);
    assert!(!manager.window(hud).unwrap().is_focused);

    // Passive windows never take focus
    let toast = manager.open("Toast", None).await?;
    assert_eq!(manager.current_focus(), Some(inventory));
    assert!(!manager.window(toast).unwrap().in_focus_stack);
    Ok(())
}

#[tokio::test]
async fn test_focus_falls_back_to_previous_window() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    let events = record_events(&manager);

    let hud = manager.open("Hud", None).await?;
    let shop = manager.open("Shop", None).await?;
    manager.close(shop)?;

    assert_eq!(manager.current_focus(), Some(hud));
    assert_eq!(manager.focus_stack(), vec![hud]);
    assert!(manager.window(hud).unwrap().is_focused);
    assert!(events.lock().contains(&WindowEvent::FocusChanged {
        from: Some(shop),
        to: Some(hud),
    }));
    Ok(())
}

#[tokio::test]
async fn test_fallback_skips_closed_windows() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let hud = manager.open("Hud", None).await?;
    let shop = manager.open("Shop", None).await?;
    let settings = manager.open("Settings", None).await?;
    assert_eq!(manager.current_focus(), Some(settings));

    // Closing a window that is not focused leaves the stack alone
    manager.close(shop)?;
    assert_eq!(manager.current_focus(), Some(settings));
    assert_eq!(manager.focus_stack(), vec![hud, shop, settings]);

    manager.close(settings)?;
    assert_eq!(manager.current_focus(), Some(hud));
    assert_eq!(manager.focus_stack(), vec![hud]);
    assert!(!manager.window(shop).unwrap().in_focus_stack);
    Ok(())
}

#[tokio::test]
async fn test_layer_clear_moves_focus() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let hud = manager.open("Hud", None).await?;
    let inventory = manager.open("Inventory", None).await?;
    let shop = manager.open("Shop", None).await?;

    assert!(!manager.window(inventory).unwrap().is_opened);
    assert_eq!(manager.current_focus(), Some(shop));

    manager.close(shop)?;
    assert_eq!(manager.current_focus(), Some(hud));
    Ok(())
}

#[tokio::test]
async fn test_configured_first_selection() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    assert_eq!(manager.selection(), selection(inventory, "tab_items"));
    Ok(())
}

#[tokio::test]
async fn test_inactive_elements_are_skipped() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    loader.set_element_inactive("tab_items");
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    assert_eq!(manager.selection(), selection(inventory, "tab_gear"));

    // Selecting an inactive element keeps the current selection
    manager.select(inventory, "tab_items")?;
    assert_eq!(manager.selection(), selection(inventory, "tab_gear"));
    Ok(())
}

#[tokio::test]
async fn test_selection_restored_when_focus_returns() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    manager.select(inventory, "tab_gear")?;

    let hud = manager.open("Hud", None).await?;
    assert_eq!(manager.current_focus(), Some(hud));
    manager.close(hud)?;

    assert_eq!(manager.current_focus(), Some(inventory));
    assert_eq!(manager.selection(), selection(inventory, "tab_gear"));
    assert_eq!(
        manager.window(inventory).unwrap().manual_focus.as_deref(),
        Some("tab_gear")
    );
    Ok(())
}

#[tokio::test]
async fn test_reopen_with_last_focus() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    manager.register_window(
        WindowDescriptor::new("Journal", LayerType::MutexWindow)
            .weight(3)
            .first_selected(&["quests", "notes"])
            .reopen_with_last_focus(true),
    );

    let journal = manager.open("Journal", None).await?;
    manager.select(journal, "notes")?;
    manager.close(journal)?;
    manager.open("Journal", None).await?;
    assert_eq!(manager.selection(), selection(journal, "notes"));

    // Windows without focus memory start over
    let inventory = manager.open("Inventory", None).await?;
    manager.select(inventory, "tab_gear")?;
    manager.close(inventory)?;
    assert_eq!(manager.selection(), None);
    manager.open("Inventory", None).await?;
    assert_eq!(manager.selection(), selection(inventory, "tab_items"));
    Ok(())
}

#[tokio::test]
async fn test_select_requires_open_window() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let inventory = manager.open("Inventory", None).await?;
    manager.close(inventory)?;
    assert_eq!(
        manager.select(inventory, "tab_gear"),
        Err(windeck::WindowError::NotOpen(inventory))
    );

    let toast = manager.open("Toast", None).await?;
    assert_eq!(
        manager.select(toast, "dismiss"),
        Err(windeck::WindowError::NotInteractable(toast))
    );
    Ok(())
}

#[tokio::test]
async fn test_navigation_mode_toggles_interaction() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let hud = manager.open("Hud", None).await?;
    let inventory = manager.open("Inventory", None).await?;
    let hud_surface = loader.last_surface("Hud").unwrap();
    assert!(!hud_surface.lock().interactable);

    // Pointer mode: every window in the stack accepts input
    manager.set_navigation_mode(false);
    assert!(!manager.navigation_mode());
    assert!(hud_surface.lock().interactable);
    assert!(manager.window(hud).unwrap().is_focused);
    assert!(manager.window(inventory).unwrap().is_focused);

    manager.set_navigation_mode(true);
    assert!(!hud_surface.lock().interactable);
    assert!(!manager.window(hud).unwrap().is_focused);
    assert!(manager.window(inventory).unwrap().is_focused);
    Ok(())
}

#[tokio::test]
async fn test_windows_stay_interactable_when_configured() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager_with(
        &loader,
        ManagerConfig {
            make_non_interactable: false,
            ..ManagerConfig::default()
        },
    );

    let hud = manager.open("Hud", None).await?;
    let inventory = manager.open("Inventory", None).await?;
    assert_eq!(manager.current_focus(), Some(inventory));
    assert!(manager.window(hud).unwrap().is_focused);
    assert!(manager.window(inventory).unwrap().is_focused);
    Ok(())
}

#[tokio::test]
async fn test_focus_ready_defers_focus() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    let mut lazy = WindowDescriptor::new("Lazy", LayerType::MultiWindow).weight(5);
    lazy.focus_ready = false;
    manager.register_window(lazy);

    let hud = manager.open("Hud", None).await?;
    let window = manager.open("Lazy", None).await?;
    assert_eq!(manager.current_focus(), Some(hud));

    manager.set_focus_ready(window, true)?;
    assert_eq!(manager.current_focus(), Some(window));
    assert_eq!(manager.focus_stack(), vec![hud, window]);
    Ok(())
}

#[tokio::test]
async fn test_cancel_closes_focused_window() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);
    manager.register_window(
        WindowDescriptor::new("Pinned", LayerType::MultiWindow)
            .weight(5)
            .cancel_to_close(false),
    );

    assert_eq!(manager.cancel()?, None);

    let hud = manager.open("Hud", None).await?;
    let inventory = manager.open("Inventory", None).await?;
    assert_eq!(manager.cancel()?, Some(inventory));
    assert!(!manager.window(inventory).unwrap().is_opened);
    assert_eq!(manager.current_focus(), Some(hud));

    let pinned = manager.open("Pinned", None).await?;
    assert_eq!(manager.cancel()?, None);
    assert!(manager.window(pinned).unwrap().is_opened);
    Ok(())
}

#[tokio::test]
async fn test_destroy_releases_focus_and_selection() -> WindowResult<()> {
    let loader = HeadlessLoader::new();
    let manager = manager(&loader);

    let hud = manager.open("Hud", None).await?;
    let inventory = manager.open("Inventory", None).await?;
    manager.kill(inventory)?;

    assert_eq!(manager.current_focus(), Some(hud));
    assert_eq!(manager.focus_stack(), vec![hud]);
    assert_eq!(manager.selection(), None);
    Ok(())
}
