//! Watershed Connectivity Binary
//!
//! Runs one connectivity analysis over a watershed exported as JSON and
//! writes the results as JSON.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `WATERSHED_INPUT`: path to the watershed JSON (required unless given as the first argument)
//! - `ENGINE_CONFIG`: path to an engine configuration JSON (default: built-in defaults)
//! - `RESULTS_OUTPUT`: path for the results JSON (default: stdout)
//! - `RUST_LOG`: Log level filter (default: stream_connectivity=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! LOG_FORMAT=pretty cargo run --bin watershed_connectivity -- watershed.json > results.json
//! ```

use std::fs;

use tracing::{info, info_span};

use stream_connectivity::{
    init_tracing, EngineConfig, InMemorySpatialStore, LogFormat, WatershedRun,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env())?;

    let input_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WATERSHED_INPUT").ok())
        .ok_or("WATERSHED_INPUT must be set or passed as the first argument")?;

    let config = match std::env::var("ENGINE_CONFIG") {
        Ok(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        Err(_) => EngineConfig::default(),
    };

    let _span = info_span!("watershed", input = %input_path).entered();
    let store = InMemorySpatialStore::from_json(&fs::read_to_string(&input_path)?)?;
    info!(
        streams = store.num_streams(),
        config_hash = %config.params_hash(),
        "watershed loaded"
    );

    let mut run = WatershedRun::new(store, config);
    let report = run.run()?;
    info!(
        snapshot_id = %report.snapshot.snapshot_id,
        break_points = report.break_points,
        segments_added = report.segments_added,
        barriers_attached = report.barriers_attached,
        "run complete"
    );

    let results = run
        .into_store()
        .results()
        .cloned()
        .ok_or("run finished without writing results")?;
    let json = serde_json::to_string_pretty(&results)?;
    match std::env::var("RESULTS_OUTPUT") {
        Ok(path) => fs::write(path, json)?,
        Err(_) => println!("{json}"),
    }
    Ok(())
}
