//! Quick analysis test binary - run the engine on a local image
//! Run with: cargo run --release --bin test_analyze -- <image_path>

use anyhow::Result;
use std::path::Path;
use tracing::info;

use face_analysis_api::core::types::{Action, DEFAULT_ACTIONS};
use face_analysis_api::core::Config;
use face_analysis_api::services::{FacialAnalyzer, OnnxAnalysisService};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("face_analysis_api=debug")
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let sample_path = if args.len() > 1 {
        args[1].clone()
    } else {
        "test_sample.png".to_string()
    };

    if !Path::new(&sample_path).exists() {
        eprintln!("Image not found: {}", sample_path);
        std::process::exit(1);
    }

    info!("Loading image: {}", sample_path);
    let image = image::open(&sample_path)?;
    info!("Image dimensions: {}x{}", image.width(), image.height());

    let config = Config::new()?;
    info!("Initializing analysis engine...");
    let engine = OnnxAnalysisService::new(&config)?;

    let actions: Vec<Action> = DEFAULT_ACTIONS.iter().copied().chain([Action::Race]).collect();
    let analysis = engine.analyze(&image, &actions)?;

    println!("\n=== Results ===");
    println!("{}", serde_json::to_string_pretty(&analysis)?);

    Ok(())
}
