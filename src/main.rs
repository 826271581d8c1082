//! streamexec - command-line driver
//!
//! Runs a point-series reader into a density grid (and optionally a temporal
//! accumulator) as configured, or a synthetic image pipeline when no files
//! are configured, and prints a JSON summary.

use serde_json::json;
use streamexec::{
    config::AppConfig,
    data::Extent,
    error::ResultExt,
    filters::{ExtractExtent, ImageSource, PointDensityFilter, TemporalAccumulator},
    pipeline::{Pipeline, PipelineError, PipelineEvent},
    reader::PointSeriesReader,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "streamexec.toml".to_string());
    let loaded = AppConfig::load_if_present(&config_path);
    let config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => AppConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match loaded {
        Ok(Some(_)) => tracing::info!("Starting streamexec with {:?}", config_path),
        Ok(None) => tracing::info!("No config at {:?}, starting with defaults", config_path),
        Err(e) => {
            tracing::error!("Invalid config {:?}: {}", config_path, e);
            return Err(e.into());
        }
    }

    let mut pipeline = Pipeline::new(config.executive.clone());
    let events = pipeline.subscribe();

    let summary = if config.series.files.is_empty() {
        run_synthetic(&mut pipeline, &config)?
    } else {
        run_series(&mut pipeline, &config)?
    };

    let mut executed = 0usize;
    let mut failed = 0usize;
    for event in events.try_iter() {
        match event {
            PipelineEvent::End { .. } => executed += 1,
            PipelineEvent::Error { .. } => failed += 1,
            _ => {}
        }
    }

    let report = json!({
        "summary": summary,
        "requests_executed": executed,
        "requests_failed": failed,
        "topology": pipeline.topology(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_series(pipeline: &mut Pipeline, config: &AppConfig) -> streamexec::Result<serde_json::Value> {
    let series = &config.series;
    let reader = pipeline.add_reader(PointSeriesReader::open(series.files.clone()));
    let density = pipeline.add_algorithm(PointDensityFilter::new(series.grid_dimensions));
    pipeline.connect(reader, 0, density, 0)?;

    if let Some(time) = series.time {
        pipeline.set_update_time_step(density, 0, time)?;
    }
    pipeline.set_update_piece(density, 0, series.piece, series.number_of_pieces, 0)?;
    pipeline
        .update(density)
        .context("Failed to update density grid")?;

    let grid = pipeline
        .output(density, 0)
        .ok_or_else(|| PipelineError::MissingDataObject {
            algorithm: "PointDensityFilter".to_string(),
            port: 0,
        })?;
    let values = grid
        .point_data()
        .and_then(|fields| fields.get("density"))
        .unwrap_or(&[]);
    let mut summary = json!({
        "time_steps": pipeline.time_steps(reader, 0),
        "time": grid.info.time_step,
        "piece": grid.info.piece,
        "number_of_pieces": grid.info.number_of_pieces,
        "extent": grid.info.extent,
        "points": values.iter().sum::<f64>(),
        "max_density": values.iter().copied().fold(0.0, f64::max),
    });

    if let Some(array) = &series.accumulate_array {
        let accumulator = pipeline.add_algorithm(TemporalAccumulator::new(array.clone()));
        pipeline.connect(reader, 0, accumulator, 0)?;
        pipeline
            .update(accumulator)
            .context("Failed to accumulate over time")?;
        if let Some(table) = pipeline.output(accumulator, 0) {
            summary["temporal"] = serde_json::to_value(&table.body)?;
        }
    }
    Ok(summary)
}

fn run_synthetic(
    pipeline: &mut Pipeline,
    config: &AppConfig,
) -> streamexec::Result<serde_json::Value> {
    tracing::info!("No series files configured, running the synthetic image pipeline");
    let [nx, ny, nz] = config.series.grid_dimensions;
    let source = pipeline.add_algorithm(ImageSource::new([nx, ny, nz]));
    let half = Extent::new(0, (nx as i32 - 1) / 2, 0, ny as i32 - 1, 0, nz as i32 - 1);
    let voi = pipeline.add_algorithm(ExtractExtent::new(half));
    pipeline.connect(source, 0, voi, 0)?;

    let pieces = config.series.number_of_pieces.max(1);
    let mut delivered = Vec::with_capacity(pieces);
    for piece in 0..pieces {
        pipeline.set_update_piece(voi, 0, piece, pieces, config.executive.default_ghost_levels)?;
        pipeline
            .update(voi)
            .with_context(|| format!("Failed to update piece {} of {}", piece, pieces))?;
        let extent = pipeline.output(voi, 0).and_then(|d| d.info.extent);
        delivered.push(json!({ "piece": piece, "extent": extent }));
    }

    Ok(json!({
        "whole_extent": pipeline.whole_extent(voi, 0),
        "pieces": delivered,
    }))
}
