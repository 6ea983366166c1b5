use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One fetched image.
#[derive(Debug, Serialize)]
pub struct ImageRow {
    pub index: usize,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

/// Timing summary of a `bench` run.
#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub images: usize,
    pub iterations: u32,
    pub width: u32,
    pub height: u32,
    pub warmup_ms: f64,
    pub total_ms: f64,
    pub per_iteration_ms: f64,
    pub per_image_ms: f64,
    pub interrupted: bool,
}

pub fn print_images(rows: &[ImageRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!("{}", to_json(row));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "PATH", "WIDTH", "HEIGHT", "BYTES"]);
            for row in rows {
                table.add_row(vec![
                    row.index.to_string(),
                    row.path.clone(),
                    row.width.to_string(),
                    row.height.to_string(),
                    row.bytes.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "[{}] {} {}x{} ({} bytes)",
                    row.index, row.path, row.width, row.height, row.bytes
                );
            }
        }
    }
}

pub fn print_bench(report: &BenchReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METRIC", "VALUE"])
                .add_row(vec!["images".to_string(), report.images.to_string()])
                .add_row(vec!["iterations".to_string(), report.iterations.to_string()])
                .add_row(vec![
                    "size".to_string(),
                    format!("{}x{}", report.width, report.height),
                ])
                .add_row(vec!["warm-up".to_string(), format_ms(report.warmup_ms)])
                .add_row(vec!["total".to_string(), format_ms(report.total_ms)])
                .add_row(vec![
                    "per iteration".to_string(),
                    format_ms(report.per_iteration_ms),
                ])
                .add_row(vec!["per image".to_string(), format_ms(report.per_image_ms)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} iteration(s) of {} image(s) at {}x{}: {} per iteration, {} per image{}",
                report.iterations,
                report.images,
                report.width,
                report.height,
                format_ms(report.per_iteration_ms),
                format_ms(report.per_image_ms),
                if report.interrupted { " (interrupted)" } else { "" }
            );
        }
    }
}

pub fn print_status(status: &str, detail: &str, format: OutputFormat) {
    #[derive(Serialize)]
    struct Status<'a> {
        status: &'a str,
        detail: &'a str,
    }

    match format {
        OutputFormat::Json => println!("{}", to_json(&Status { status, detail })),
        OutputFormat::Table | OutputFormat::Pretty => println!("{status}: {detail}"),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn format_ms(ms: f64) -> String {
    format!("{ms:.2} ms")
}
