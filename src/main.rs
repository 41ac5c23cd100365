//! # Windeck - Layered UI Window Manager
//!
//! Command line front end of the windeck library.
//!
//! - `check`: load and validate a configuration, print the window table
//! - `replay`: run a scripted sequence of manager operations against the
//!   headless loader and print the resulting layers, focus and order

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use windeck::config::WindeckConfig;
use windeck::layer::LayerTable;
use windeck::registry::WindowRegistry;
use windeck::{HeadlessLoader, LayerType, OpenOptions, WindowId, WindowManager};

#[derive(Parser)]
#[command(name = "windeck")]
#[command(about = "Layered UI window lifecycle, focus and stacking manager")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/windeck/windeck.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and print the window table
    Check,

    /// Replay a TOML script of manager operations on headless surfaces
    Replay {
        /// Script to run
        script: PathBuf,
    },
}

/// A replay script.
#[derive(Debug, Deserialize)]
struct Script {
    /// Assets whose surfaces animate until `finish` is called
    #[serde(default)]
    deferred: Vec<String>,

    /// Assets the loader fails to load
    #[serde(default)]
    missing: Vec<String>,

    #[serde(default)]
    step: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Open {
        kind: String,
        #[serde(default)]
        parent: Option<String>,
    },
    Close {
        kind: String,
    },
    Kill {
        kind: String,
    },
    Cancel,
    CloseAll {
        #[serde(default)]
        delete: bool,
    },
    CloseNonEssential,
    /// Completes the pending animation of a singleton
    Finish {
        kind: String,
    },
    Select {
        kind: String,
        element: String,
    },
    Navigation {
        enabled: bool,
    },
    Wait {
        millis: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting Windeck");
    info!("📄 Version: {}", windeck::VERSION);

    match cli.command {
        Command::Check => check(&cli.config),
        Command::Replay { script } => {
            // Load configuration
            let config = match WindeckConfig::load(&cli.config) {
                Ok(config) => {
                    info!("✅ Configuration loaded from: {}", cli.config);
                    config
                }
                Err(e) => {
                    error!("❌ Failed to load configuration: {:#}", e);
                    info!("📝 Using default configuration");
                    WindeckConfig::default()
                }
            };
            replay(config, &script).await
        }
    }
}

fn check(path: &str) -> Result<()> {
    let config = WindeckConfig::load(path)?;
    info!("✅ Configuration is valid: {}", path);

    let layers = LayerTable::new(&config.layers);
    println!("{:<18} {:<6} {:<11} clears", "layer", "mutex", "auto-clear");
    for layer in layers.iter() {
        let clears: Vec<&str> = layer.layers_to_clear().iter().map(LayerType::as_str).collect();
        println!(
            "{:<18} {:<6} {:<11} {}",
            layer.layer_type().as_str(),
            if layer.is_mutex() { "yes" } else { "no" },
            if layer.auto_clear() { "yes" } else { "no" },
            clears.join(",")
        );
    }
    println!();

    let registry = WindowRegistry::from_config(&config);
    println!("{:<24} {:<18} {:>6}  flags", "kind", "layer", "weight");
    for descriptor in registry.descriptors() {
        let mut flags = Vec::new();
        if descriptor.single_instance {
            flags.push("single");
        }
        if descriptor.auto_destroy {
            flags.push("auto-destroy");
        }
        if !descriptor.interactable {
            flags.push("passive");
        }
        if descriptor.cancel_to_close {
            flags.push("cancel");
        }
        println!(
            "{:<24} {:<18} {:>6}  {}",
            descriptor.kind.as_str(),
            descriptor.layer.as_str(),
            descriptor.weight,
            flags.join(",")
        );
    }
    Ok(())
}

async fn replay(config: WindeckConfig, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    let script: Script = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse script: {}", path.display()))?;

    let loader = HeadlessLoader::new();
    for name in &script.deferred {
        loader.set_deferred_animations(name);
    }
    for name in &script.missing {
        loader.set_missing(name);
    }
    let manager = WindowManager::new(&config, Arc::new(loader));

    for (index, step) in script.step.iter().enumerate() {
        println!("[{}] {:?}", index + 1, step);
        if let Err(e) = run_step(&manager, step).await {
            println!("  ✗ {}", e);
        }
        print_state(&manager);
    }

    manager.close_all(true);
    info!("✨ Replay finished");
    Ok(())
}

async fn run_step(manager: &WindowManager, step: &Step) -> Result<()> {
    match step {
        Step::Open { kind, parent } => {
            let mut options = OpenOptions::new();
            if let Some(parent) = parent {
                options = options.parent(parent.as_str());
            }
            manager.open_with(kind.as_str(), None, options).await?;
        }
        Step::Close { kind } => manager.close_by_kind(kind.as_str(), false)?,
        Step::Kill { kind } => {
            let id = manager
                .singleton(kind.as_str())
                .with_context(|| format!("`{}` is not loaded", kind))?;
            manager.kill(id)?;
        }
        Step::Cancel => {
            if manager.cancel()?.is_none() {
                println!("  nothing to cancel");
            }
        }
        Step::CloseAll { delete } => manager.close_all(*delete),
        Step::CloseNonEssential => manager.close_all_non_essential(),
        Step::Finish { kind } => {
            let id = manager
                .singleton(kind.as_str())
                .with_context(|| format!("`{}` is not loaded", kind))?;
            let entered = manager.notify_enter_animation_done(id)?;
            let exited = !entered && manager.notify_exit_animation_done(id)?;
            if !entered && !exited {
                warn!("`{}` had no pending animation", kind);
            }
        }
        Step::Select { kind, element } => {
            let id = manager
                .opened_singleton(kind.as_str())
                .with_context(|| format!("`{}` is not open", kind))?;
            manager.select(id, element)?;
        }
        Step::Navigation { enabled } => manager.set_navigation_mode(*enabled),
        Step::Wait { millis } => tokio::time::sleep(Duration::from_millis(*millis)).await,
    }
    Ok(())
}

fn label(manager: &WindowManager, id: WindowId) -> String {
    manager
        .window(id)
        .map(|w| format!("{}{}", w.kind, id))
        .unwrap_or_else(|| id.to_string())
}

fn print_state(manager: &WindowManager) {
    let focus = manager
        .current_focus()
        .map(|id| label(manager, id))
        .unwrap_or_else(|| "none".to_string());
    println!("  focus: {}", focus);

    for layer in LayerType::ALL {
        let roots = manager.layer_roots(layer);
        if roots.is_empty() {
            continue;
        }
        let names: Vec<String> = roots.iter().map(|id| label(manager, *id)).collect();
        println!("  {:<16} {}", layer.as_str(), names.join(" "));
    }

    let order: Vec<String> = manager
        .render_order()
        .into_iter()
        .map(|(id, order)| format!("{}@{}", label(manager, id), order))
        .collect();
    if !order.is_empty() {
        println!("  order: {}", order.join(" < "));
    }
}
