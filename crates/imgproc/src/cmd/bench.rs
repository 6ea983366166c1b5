use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use imgproc_client::ImageClient;
use tracing::{info, warn};

use crate::cmd::{BenchArgs, ClientArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_bench, BenchReport, OutputFormat};

const IMAGE_EXTENSIONS: &[&str] = &["bmp", "png", "jpg", "jpeg"];

pub fn run(args: BenchArgs, client: &ClientArgs, format: OutputFormat) -> CliResult<i32> {
    let paths = image_paths(&args.dir)?;
    if paths.is_empty() {
        return Err(CliError::new(
            USAGE,
            format!("no images found in {}", args.dir.display()),
        ));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running));

    let images =
        ImageClient::connect(client.config()?).map_err(|err| client_error("connect failed", err))?;

    let warmup = Instant::now();
    images
        .ask_for_images(&paths, args.width, args.height)
        .map_err(|err| client_error("warm-up request failed", err))?;
    let warmup = warmup.elapsed();
    info!(images = paths.len(), ?warmup, "warm-up complete");

    let mut completed = 0u32;
    let started = Instant::now();
    while completed < args.iterations && running.load(Ordering::SeqCst) {
        images
            .ask_for_images(&paths, args.width, args.height)
            .map_err(|err| client_error("benchmark request failed", err))?;
        completed += 1;
    }
    let total = started.elapsed();

    print_bench(
        &report(&args, paths.len(), completed, warmup, total, !running.load(Ordering::SeqCst)),
        format,
    );
    Ok(SUCCESS)
}

fn image_paths(dir: &Path) -> CliResult<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|err| io_error(&format!("failed reading {}", dir.display()), err))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    paths.sort();
    Ok(paths
        .into_iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn report(
    args: &BenchArgs,
    images: usize,
    iterations: u32,
    warmup: Duration,
    total: Duration,
    interrupted: bool,
) -> BenchReport {
    let total_ms = total.as_secs_f64() * 1000.0;
    let per_iteration_ms = if iterations == 0 {
        0.0
    } else {
        total_ms / f64::from(iterations)
    };
    BenchReport {
        images,
        iterations,
        width: args.width,
        height: args.height,
        warmup_ms: warmup.as_secs_f64() * 1000.0,
        total_ms,
        per_iteration_ms,
        per_image_ms: per_iteration_ms / images as f64,
        interrupted,
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(err) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        warn!(error = %err, "signal handler setup failed, Ctrl-C will not stop early");
    }
}
