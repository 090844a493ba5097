mod options;
mod output;
mod pbf;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use gradient::{Category, NoElevation, Pipeline, TagQuery, TileMode, TileStore};
use log::info;
use options::Cli;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let command = std::env::args().collect::<Vec<_>>().join(" ");
    let cli = Cli::parse();

    let categories = Category::build(&cli.stops, &cli.colors, cli.width, cli.opacity)?;
    let query = TagQuery::compile(&cli.filters);
    let pipeline = Pipeline::new(&query, &categories).concurrency(cli.jobs);

    let counting = progress::Job::spinner("Counting ways");
    let total = pipeline.count_ways(pbf::PbfSource::ways_only(&cli.input)?, &counting)?;
    counting.finish();
    info!("{total} matching ways in {:?}", cli.input);

    let processing = progress::Job::bar("Processing ways", total);
    let source = pbf::PbfSource::open(&cli.input)?;
    let aggregate = if categories.is_empty() {
        pipeline.run(source, &NoElevation, &processing).await?
    } else {
        let tiles = TileStore::new(cli.cache.clone(), TileMode::MemMap)?;
        pipeline.run(source, &tiles, &processing).await?
    };
    processing.finish();

    let geojson_path = cli
        .geojson
        .clone()
        .unwrap_or_else(|| options::default_output(&cli.input, "geojson"));
    output::geojson::export(&geojson_path, &categories, &aggregate)
        .with_context(|| format!("writing {geojson_path:?}"))?;
    info!("wrote {geojson_path:?}");

    let kml_path = cli
        .kml
        .clone()
        .unwrap_or_else(|| options::default_output(&cli.input, "kml"));
    let layer_name = kml_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gradients.kml".to_owned());
    output::kml::export(&kml_path, &layer_name, &command, &categories, &aggregate)
        .with_context(|| format!("writing {kml_path:?}"))?;
    info!("wrote {kml_path:?}");

    if cli.open {
        open_file(&kml_path)?;
    }
    Ok(())
}

fn open_file(path: &Path) -> Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let status = std::process::Command::new(opener).arg(path).status()?;
    anyhow::ensure!(status.success(), "{opener} exited with {status}");
    Ok(())
}
