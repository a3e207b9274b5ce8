//! Command-line interface for the acceleration conversion pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::processors::event::{self, EventReport, EventTimestamp};
use crate::processors::sorting;
use crate::processors::stats::{StatsColumn, StatsSummary};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "acc-convert")]
#[command(about = "Accelerometer count to acceleration, velocity and displacement conversion", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sensor files of an event directory in processing order
    Order {
        /// Event directory containing sensor text files
        directory: PathBuf,
    },

    /// Convert an explicit set of sensor files belonging to one event
    Convert {
        /// Sensor text files (one or two per channel)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Event timestamp, YYYY-MM-DDTHHMMSS
        #[arg(short, long)]
        event: String,
        /// Directory for CSV output (nothing is written if omitted)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Convert every sensor file of an event directory
    Process {
        /// Event directory containing sensor text files
        directory: PathBuf,
        /// Event timestamp, YYYY-MM-DDTHHMMSS (defaults to the directory name)
        #[arg(short, long)]
        event: Option<String>,
        /// Directory for CSV output (defaults to <directory>/results)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Write a config file with default values
    InitConfig {
        /// Output YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Print the stats table with its column maxima
fn print_stats_table(summary: &StatsSummary) {
    let cell = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_default();

    print!("{:>3} {:<5} {:<5} {:<4}", "Ch", "ID", "Floor", "Axis");
    for column in StatsColumn::ALL {
        print!(" {:>14}", column.header());
    }
    println!();

    for row in summary.rows() {
        print!(
            "{:>3} {:<5} {:<5} {:<4}",
            row.channel,
            row.id,
            row.floor,
            row.axis.as_str()
        );
        for column in StatsColumn::ALL {
            print!(" {:>14}", cell(row.get(column)));
        }
        println!();
    }

    print!("{:>20}", "max");
    for column in StatsColumn::ALL {
        print!(" {:>14}", cell(summary.column_max(column)));
    }
    println!();
}

fn parse_event(value: &str) -> EventTimestamp {
    match EventTimestamp::parse(value) {
        Ok(event) => event,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Order { directory } => {
            cmd_order(&directory, &config);
        }
        Commands::Convert {
            files,
            event,
            output_dir,
        } => {
            cmd_convert(&files, &event, output_dir.as_deref(), &config);
        }
        Commands::Process {
            directory,
            event,
            output_dir,
        } => {
            cmd_process(&directory, event, output_dir, &config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path);
        }
    }
}

fn cmd_order(directory: &Path, config: &PipelineConfig) {
    let start = Instant::now();

    let ordered = sorting::discover_sensor_files(directory, &config.processing.file_extension)
        .and_then(|files| {
            let ordered = sorting::order_files(&files)?;
            let (span, first_token) = sorting::event_span(&ordered)?;
            let groups = sorting::group_by_channel(&ordered)?;
            Ok((ordered, span, first_token, groups))
        });

    let (ordered, span, first_token, groups) = match ordered {
        Ok(result) => result,
        Err(e) => {
            error!("Ordering failed: {}", e);
            std::process::exit(1);
        }
    };

    for path in &ordered {
        println!("{}", path.display());
    }

    print_summary(
        "Sensor File Order",
        &[
            ("Directory", directory.display().to_string()),
            ("Files", ordered.len().to_string()),
            ("Channels", groups.len().to_string()),
            ("Event span", format!("{:?}", span)),
            ("First timestamp", first_token),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_convert(
    files: &[PathBuf],
    event: &str,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let event = parse_event(event);

    println!("Converting {} sensor files...", files.len());
    println!("Event: {}", event.readable());

    let spinner = create_spinner("Converting sensor channels...");
    let report = match event::process_files(files, &event, config) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Conversion failed: {:#}", e);
            std::process::exit(1);
        }
    };
    spinner.finish_and_clear();

    finish_event(&report, output_dir, config, start);
}

fn cmd_process(
    directory: &Path,
    event: Option<String>,
    output_dir: Option<PathBuf>,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    // Event directories are named after their event timestamp
    let event = event.unwrap_or_else(|| {
        directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let event = parse_event(&event);
    let output_dir = output_dir.unwrap_or_else(|| directory.join("results"));

    println!("Processing event {}", event.readable());
    println!("Input directory: {}", directory.display());
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Converting sensor channels...");
    let report = match event::process_event(directory, &event, config) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Processing failed: {:#}", e);
            std::process::exit(1);
        }
    };
    spinner.finish_and_clear();

    finish_event(&report, Some(&output_dir), config, start);
}

fn finish_event(
    report: &EventReport,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
    start: Instant,
) {
    print_stats_table(&report.summary);

    for failure in &report.failures {
        warn!("{}", failure);
    }

    let written = match output_dir {
        Some(dir) => match event::write_event_outputs(report, dir, config) {
            Ok(paths) => paths.len(),
            Err(e) => {
                error!("Writing results failed: {:#}", e);
                std::process::exit(1);
            }
        },
        None => 0,
    };

    let failed: Vec<&str> = report.failures.iter().map(|f| f.sensor.as_str()).collect();
    print_summary(
        "Conversion Complete",
        &[
            ("Event", report.event.readable()),
            ("Event span", format!("{:?}", report.span)),
            ("Sensors converted", report.sensors_converted().to_string()),
            (
                "Sensors failed",
                if failed.is_empty() {
                    "none".to_string()
                } else {
                    failed.join(", ")
                },
            ),
            ("Files written", written.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if report.has_failures() {
        std::process::exit(2);
    }
}

fn cmd_init_config(path: &Path) {
    match PipelineConfig::default().to_yaml(path) {
        Ok(()) => println!("Wrote default config to {}", path.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
