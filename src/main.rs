//! PackView: enumerate the merged listfile tree of archive package groups.
//!
//! Thin binary entry point. All logic lives in the `packview-core` crate.
//! The binary plays the part of a tree view that expands every directory:
//! it drains the engine's results buffer and submits each virtual
//! directory it sees until the engine goes idle, then prints the tree.

use packview_core::engine::{Engine, EngineEvent, ReferenceHandle};
use packview_core::model::EnumerationState;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const DEFAULT_CONFIG: &str = "packview.json";

/// How often the consumer loop polls the results buffer.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn main() -> anyhow::Result<()> {
    // Initialise structured logging. PACKVIEW_LOG=debug raises verbosity.
    let level = std::env::var("PACKVIEW_LOG")
        .ok()
        .and_then(|v| v.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    tracing::info!("PackView starting with {}", config_path.display());

    let engine = Engine::from_config_file(&config_path)
        .map_err(|e| anyhow::anyhow!("cannot open {}: {e}", config_path.display()))?;
    engine.start();

    let started = Instant::now();
    let outcome = engine.reload()?;
    tracing::info!("Reload finished: {outcome:?}");

    expand_everything(&engine);
    engine.stop();

    let mut out = String::new();
    for root in engine.roots() {
        render(&engine, root, 0, &mut out);
    }
    print!("{out}");

    tracing::info!("Enumeration finished in {:.2?}", started.elapsed());
    Ok(())
}

/// Submit every virtual directory the engine reports until nothing is
/// queued, waiting or running and the results buffer is empty.
fn expand_everything(engine: &Engine) {
    loop {
        for event in engine.events_rx.try_iter() {
            log_event(&event);
        }

        let completed = engine.drain_completed();
        for handle in &completed {
            let Some(reference) = engine.reference(*handle) else {
                continue;
            };
            if reference.is_virtual()
                && reference.is_dir
                && reference.state == EnumerationState::NotEnumerated
            {
                engine.submit_work(*handle);
            }
        }

        if completed.is_empty() && engine.is_idle() && engine.completed_work_order_count() == 0 {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    for event in engine.events_rx.try_iter() {
        log_event(&event);
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::PackageGroupAdded { group, location, .. } => {
            tracing::info!("Package group {group} at {}", location.display());
        }
        EngineEvent::PackageEnumerated { group, package, .. } => {
            tracing::debug!("Package {package} in group {group}");
        }
        EngineEvent::EnumerationFailed { reference, error } => {
            tracing::warn!("Enumeration of {reference:?} failed: {error}");
        }
        EngineEvent::ReloadComplete {
            groups,
            packages,
            duration,
        } => {
            tracing::info!("{groups} groups, {packages} packages loaded in {duration:.2?}");
        }
    }
}

/// Append an indented rendering of `handle` and its virtual descendants.
/// Package containers are shown by name but not expanded.
fn render(engine: &Engine, handle: ReferenceHandle, depth: usize, out: &mut String) {
    let Some(reference) = engine.reference(handle) else {
        return;
    };

    out.push_str(&"  ".repeat(depth));
    out.push_str(&reference.name);
    if reference.state == EnumerationState::Failed {
        out.push_str("  [failed]");
    }
    if let Some(hard) = engine
        .effective_hard(handle)
        .filter(|&h| depth > 0 && h != handle)
    {
        if let Some(owner) = engine.reference(hard) {
            out.push_str("  (");
            out.push_str(&owner.package);
            out.push(')');
        }
    }
    out.push('\n');

    if !reference.is_virtual() {
        return;
    }
    for child in engine.children(handle) {
        render(engine, child, depth + 1, out);
    }
}
