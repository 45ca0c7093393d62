use std::sync::Arc;

use parley_render::{
    EngineConfig, MapRenderer, RetainedScene, SceneDocument, ToggleLayer, build_skeleton,
};
use parley_shared::{MapDescriptor, TurnSnapshot};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: parley-replay <descriptor.json> <snapshots.json>";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "replay failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let (Some(descriptor_path), Some(snapshots_path)) = (args.next(), args.next()) else {
        return Err(USAGE.to_string());
    };

    let descriptor = load_descriptor(&descriptor_path).await?;
    let snapshots = load_snapshots(&snapshots_path).await?;
    tracing::info!(
        map = %descriptor.name,
        regions = descriptor.regions.len(),
        zoom_min = descriptor.zoom.min,
        zoom_max = descriptor.zoom.max,
        snapshots = snapshots.len(),
        "loaded replay input"
    );

    let config = EngineConfig::from_env();
    let scene = build_skeleton(&descriptor);
    let renderer = MapRenderer::init(descriptor, scene, config).map_err(|e| e.to_string())?;
    let handle = renderer.handle();
    let worker = tokio::spawn(renderer.run());

    for (turn, snapshot) in snapshots.into_iter().enumerate() {
        let phase = snapshot.phase.label.clone().unwrap_or_default();
        handle
            .snapshot_changed(Arc::new(snapshot))
            .map_err(|e| e.to_string())?;
        if turn == 0 {
            handle
                .submit(handle.commands().show_map())
                .map_err(|e| e.to_string())?;
        }
        handle.wait_idle().await;
        tracing::info!(turn, phase = %phase, "turn rendered");
    }

    handle.close();
    let renderer = worker.await.map_err(|e| format!("render worker panicked: {e}"))?;
    summarize(&renderer);
    Ok(())
}

async fn load_descriptor(path: &str) -> Result<MapDescriptor, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read {path}: {e}"))?;
    MapDescriptor::from_json(&raw).map_err(|e| format!("invalid map descriptor {path}: {e}"))
}

async fn load_snapshots(path: &str) -> Result<Vec<TurnSnapshot>, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read {path}: {e}"))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid snapshot list {path}: {e}"))
}

fn summarize(renderer: &MapRenderer<RetainedScene>) {
    let scene = renderer.scene();
    let layers = renderer.layers();
    let stats = renderer.queue_stats();
    let units = scene.children(layers.layer(ToggleLayer::Units)).len();
    let dislodged = scene
        .children(layers.layer(ToggleLayer::DislodgedUnits))
        .len();
    tracing::info!(
        submitted = stats.submitted,
        executed = stats.executed,
        skipped = stats.skipped,
        mutations = scene.mutation_count(),
        units,
        dislodged,
        visible = scene.is_visible(scene.root()),
        "replay finished"
    );
    for (key, value) in renderer.settings().iter() {
        tracing::debug!(setting = key.name(), value = ?value, "final render setting");
    }
}
