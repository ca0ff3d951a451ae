//! Minimal end-to-end pipeline run over synthetic epochs.
//!
//! Builds a registry, feeds a handful of generated epochs through
//! baseline subtraction, amplitude rejection and averaging, and prints the
//! run summary.

use std::sync::Arc;

use anyhow::Result;
use epoch_types::{DataKind, Epoch};
use pipeline::stages::{MemorySinkFactory, MemorySourceFactory};
use pipeline::{Pipeline, PipelineConfig, StageContext, StageRegistry};

fn synthetic_epoch(index: usize) -> Epoch {
    let channels = 4;
    let points = 64;
    let mut epoch = Epoch::with_shape(channels, points, 1, DataKind::Time).unwrap();
    epoch.sample_rate = 250.0;
    epoch.before_trigger = 16;
    epoch.comment = format!("synthetic epoch {index}");
    epoch.channel_names = (0..channels).map(|c| format!("CH{c}")).collect();
    // A drifting baseline plus a burst; epoch 3 is an artifact.
    let amplitude = if index == 3 { 500.0 } else { 20.0 };
    for channel in 0..channels {
        for point in 0..points {
            let t = point as f64 / 250.0;
            let sample_index = epoch.sample_index(channel, point, 0);
            epoch.samples_mut()[sample_index] =
                5.0 + amplitude * (2.0 * std::f64::consts::PI * 10.0 * t).sin();
        }
    }
    epoch
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut registry = StageRegistry::with_builtin_stages();
    registry.register(MemorySourceFactory::new(
        (0..5).map(synthetic_epoch).collect(),
    ));
    let sink_factory = MemorySinkFactory::new();
    let store = sink_factory.collected();
    registry.register(sink_factory);
    let registry = Arc::new(registry);

    let config = PipelineConfig::from_json(
        r#"{
            "name": "demo",
            "stages": [
                { "name": "read", "type": "memory_source" },
                { "name": "demean", "type": "baseline_subtract" },
                { "name": "reject", "type": "reject_amplitude",
                  "params": { "min": -100.0, "max": 100.0 } },
                { "name": "grand_average", "type": "average" },
                { "name": "write", "type": "memory_sink" }
            ]
        }"#,
    )?;

    let mut pipeline = Pipeline::from_config(&registry, &config)?;
    let mut ctx = StageContext::with_registry(registry.clone());
    let summary = pipeline.run(&mut ctx)?;

    println!(
        "accepted {} epoch(s), rejected {}",
        summary.accepted_epochs, summary.rejected_epochs
    );
    for chain in store.lock().unwrap().iter() {
        let epoch = chain.head();
        println!(
            "sink received: {} channels x {} points, averaged over {}",
            epoch.channel_count, epoch.point_count, epoch.average_count
        );
    }
    Ok(())
}
