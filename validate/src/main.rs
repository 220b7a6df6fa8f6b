//! Headless layout validator
//!
//! Runs the visibility engine over a layout file against an entity-state
//! snapshot and reports which nodes are visible and which overlays open.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vantage_core::config::default_custom_dir;
use vantage_core::{
    ContainerId, Engine, EngineSettings, HeadlessHost, LayoutReport, LayoutSet, ManualClock,
    StateStore, SystemClock, TapOutcome, load_layout, load_layouts, walk_layout,
};
use vantage_types::LayoutConfig;

#[derive(Parser)]
#[command(version, about = "Validate vantage layouts against an entity snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a layout once and print the result
    Check {
        #[command(flatten)]
        scene: Scene,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Simulate a tap on a module after one evaluation pass
    Tap {
        #[command(flatten)]
        scene: Scene,
        #[arg(short, long)]
        module: String,
    },
    /// List layouts found in the builtin and custom directories
    List {
        #[arg(long)]
        builtin: Option<PathBuf>,
        #[arg(long)]
        custom: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct Scene {
    /// Layout TOML file
    #[arg(short, long)]
    layout: PathBuf,
    /// Layout id, required when the file holds more than one
    #[arg(long)]
    id: Option<String>,
    /// Entity-state snapshot (JSON)
    #[arg(short, long)]
    state: PathBuf,
    /// Wall-clock time to evaluate at (HH:MM), defaults to now
    #[arg(long)]
    at: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // If VANTAGE_LOG_PATH is set, append to that file
    if let Ok(path) = std::env::var("VANTAGE_LOG_PATH")
        && let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(file)
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { scene, json } => check(&scene, json),
        Commands::Tap { scene, module } => tap(&scene, &module),
        Commands::List { builtin, custom } => list(builtin.as_deref(), custom.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Validation failed");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn check(scene: &Scene, json: bool) -> Result<(), String> {
    let (mut engine, layout, store) = prepare(scene)?;
    let container = ContainerId::new("validate");
    let report = walk_layout(&mut engine, &container, &layout, &store);

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{text}");
    } else {
        print_report(&report);
    }

    for diagnostic in engine.take_diagnostics() {
        println!("warning: {diagnostic}");
    }
    Ok(())
}

fn tap(scene: &Scene, module: &str) -> Result<(), String> {
    let (mut engine, layout, store) = prepare(scene)?;
    let container = ContainerId::new("validate");
    walk_layout(&mut engine, &container, &layout, &store);

    match engine.handle_tap(&container, module) {
        TapOutcome::OpenedOverlay(key) => {
            let report = walk_layout(&mut engine, &container, &layout, &store);
            println!("{module}: opened {key}");
            if let Some(overlay) = report.overlay(&key.overlay) {
                println!("  open={} rendered={}", overlay.open, overlay.rendered);
            }
        }
        TapOutcome::TriggerUnbound { overlay_id } => {
            println!("{module}: trigger for '{overlay_id}', which is not hosted in this layout");
        }
        TapOutcome::RunOwnAction => {
            let action = layout
                .modules()
                .find(|m| m.id == module)
                .ok_or_else(|| format!("module '{module}' not found in layout '{}'", layout.id))?
                .tap_action
                .as_deref()
                .unwrap_or("none");
            println!("{module}: not a trigger, runs its own action ({action})");
        }
    }
    Ok(())
}

fn list(builtin: Option<&Path>, custom: Option<&Path>) -> Result<(), String> {
    let custom = custom.map(Path::to_path_buf).or_else(default_custom_dir);
    let set = load_layouts(builtin, custom.as_deref()).map_err(|e| e.to_string())?;

    if set.is_empty() {
        println!("no layouts found");
    }
    for id in set.ids() {
        if let Some(layout) = set.get(id) {
            let overlays = layout.overlays().count();
            let name = layout.name.as_deref().unwrap_or("-");
            println!("{id}\t{name}\t{} modules\t{overlays} overlays", layout.modules().count());
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prepare(scene: &Scene) -> Result<(Engine, LayoutConfig, StateStore), String> {
    let mut set = LayoutSet::new();
    let duplicates = set.add_file(load_layout(&scene.layout).map_err(|e| e.to_string())?);
    if !duplicates.is_empty() {
        tracing::warn!(?duplicates, "Duplicate layout ids in file");
    }

    let layout = match &scene.id {
        Some(id) => set.require(id).map_err(|e| e.to_string())?.clone(),
        None if set.len() == 1 => set
            .layouts
            .into_values()
            .next()
            .ok_or("layout file is empty")?,
        None => {
            return Err(format!(
                "layout file holds {} layouts, pick one with --id ({})",
                set.len(),
                set.ids().join(", ")
            ));
        }
    };

    let store = StateStore::load_snapshot(&scene.state).map_err(|e| e.to_string())?;
    let settings = EngineSettings::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using default engine settings");
        EngineSettings::default()
    });

    let host = Box::new(HeadlessHost::new());
    let engine = match &scene.at {
        Some(at) => {
            let time = NaiveTime::parse_from_str(at, "%H:%M")
                .map_err(|e| format!("invalid --at '{at}': {e}"))?;
            let clock = ManualClock::new(Local::now().date_naive().and_time(time));
            Engine::new(host, Box::new(clock), settings)
        }
        None => Engine::new(host, Box::new(SystemClock), settings),
    };

    tracing::info!(layout = %layout.id, entities = store.len(), "Loaded scene");
    Ok((engine, layout, store))
}

fn print_report(report: &LayoutReport) {
    println!("layout {}", report.layout);
    for node in &report.nodes {
        let indent = match node.kind {
            vantage_core::layout::NodeKind::Row => "  ",
            vantage_core::layout::NodeKind::Column => "    ",
            vantage_core::layout::NodeKind::Module => "      ",
        };
        let state = match (node.evaluated, node.visible) {
            (false, _) => "skipped",
            (true, true) => "visible",
            (true, false) => "hidden",
        };
        println!("{indent}{} [{state}]", node.id);
    }
    for overlay in &report.overlays {
        println!(
            "overlay {} ({:?}) host={} open={}",
            overlay.key, overlay.trigger, overlay.host_module, overlay.open
        );
    }
}
