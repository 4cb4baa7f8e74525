use anyhow::{Context, Result, bail};
use pnp_vision::core_modules::stages::{Capture, FileSource};
use pnp_vision::core_modules::utils::image_helper::image_helper;
use pnp_vision::pipeline::{Pipeline, PipelineError, ResultSnapshot};
use pnp_vision::{PipelineDocument, StageRegistry};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        println!("Usage: pipeline_tester <pipeline.yaml> <input_image> <output_dir> [timeout_secs]");
        return Ok(());
    }
    let document_path = PathBuf::from(&args[1]);
    let input_path = PathBuf::from(&args[2]);
    let output_dir = PathBuf::from(&args[3]);
    let timeout = match args.get(4) {
        Some(secs) => Duration::from_secs(secs.parse().context("timeout must be a whole number of seconds")?),
        None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    // --- 2. Pipeline Construction ---
    // Every capture stage reads the input image instead of a camera.
    let mut registry = StageRegistry::with_defaults();
    let camera = input_path.clone();
    registry.register("Capture", move |name| {
        Box::new(Capture::new(name).with_source(FileSource::new(camera.clone())))
    });
    let document = PipelineDocument::from_path(&document_path)
        .with_context(|| format!("loading {}", document_path.display()))?;
    let pipeline = Arc::new(document.build(&registry)?);
    info!(pipeline = pipeline.name(), stages = pipeline.len(), "pipeline loaded");

    // --- 3. Dry Run ---
    // Validation acquires frames too, so it gets the same watchdog.
    let report = with_watchdog(pipeline.clone(), timeout, |pipeline| pipeline.validate()).await?;
    if !report.is_valid() {
        for issue in &report.issues {
            println!("  {}: {}", issue.stage, issue.error);
        }
        bail!("pipeline `{}` has {} invalid stage(s)", pipeline.name(), report.issues.len());
    }

    // --- 4. Timed Run ---
    let outcome = with_watchdog(pipeline.clone(), timeout, |pipeline| pipeline.run()).await;

    // --- 5. Output ---
    // Whatever was published is written out, even when the run failed.
    let results = pipeline.last_results()?;
    let written = write_results(&results, &output_dir)?;
    println!("Wrote {} image(s) to {}", written, output_dir.display());

    let outcome = outcome?;
    for report in &outcome.reports {
        println!(
            "{:>3} {:<24} {:>8.2} ms {}",
            report.index,
            report.name,
            report.duration.as_secs_f64() * 1000.0,
            if report.produced { "" } else { "(no result)" }
        );
    }
    println!("Processing complete in {:.2} ms.", outcome.duration.as_secs_f64() * 1000.0);
    Ok(())
}

/// Runs `job` against the pipeline on a blocking worker and cancels it if it
/// overruns.
async fn with_watchdog<T, F>(pipeline: Arc<Pipeline>, timeout: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Pipeline) -> Result<T, PipelineError> + Send + 'static,
{
    let cancel = pipeline.cancel_handle();
    let mut worker = tokio::task::spawn_blocking(move || job(&pipeline));

    let joined = match tokio::time::timeout(timeout, &mut worker).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "pipeline overran its timeout, cancelling");
            cancel.cancel();
            let joined = worker.await;
            // The job may have finished before the request landed.
            cancel.clear();
            joined
        }
    };
    Ok(joined.context("pipeline worker panicked")??)
}

fn write_results(results: &ResultSnapshot, output_dir: &Path) -> Result<usize> {
    let mut written = 0;
    for (name, result) in results.iter() {
        let Some(result) = result else { continue };
        let Some(image) = result.image() else { continue };
        let path = output_dir.join(format!("{name}.png"));
        image_helper::save(&path, image, result.color_space())
            .with_context(|| format!("writing {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}
