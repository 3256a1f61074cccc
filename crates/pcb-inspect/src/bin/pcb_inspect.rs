//! `pcb-inspect` command-line driver.
//!
//! ```bash
//! pcb-inspect inspect --reference golden.png --test board.png --annotated out.png --log history.jsonl
//! pcb-inspect batch --reference golden.png --out-dir results/ boards/*.png
//! pcb-inspect summary --log history.jsonl
//! ```

use clap::{ArgAction, Parser, Subcommand};
use pcb_inspect::{
    save_mask, save_raster, AnnotationStyle, ImagePreview, InspectError, InspectionParams,
    InspectionReport, InspectionResult, InspectionSink, InspectionStatus, Inspector,
    JsonLinesLog, LogSummary, DEFAULT_DISPLAY_WIDTH,
};
use rayon::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Reference-based PCB defect inspection.
#[derive(Parser)]
#[command(name = "pcb-inspect", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit structured tracing spans instead of plain log lines
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    trace_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect one test image against a reference
    Inspect {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        test: PathBuf,
        /// JSON parameter file (missing fields use defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// TrueType font used to render defect labels (defaults to a system font)
        #[arg(long)]
        font: Option<PathBuf>,
        /// Where to write the annotated image
        #[arg(long)]
        annotated: Option<PathBuf>,
        /// Where to write the difference mask
        #[arg(long)]
        mask: Option<PathBuf>,
        /// Where to write the JSON report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Where to write a display-sized copy of the annotated image
        #[arg(long)]
        preview: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_DISPLAY_WIDTH)]
        preview_width: usize,
        /// Append the outcome to this JSON-lines history file
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Inspect many test images against one reference, in parallel
    Batch {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        font: Option<PathBuf>,
        /// Directory for `<name>_annotated.png` and `<name>_report.json`
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        log: Option<PathBuf>,
        #[arg(required = true)]
        tests: Vec<PathBuf>,
    },

    /// Show the most recent records of a history file
    History {
        #[arg(long)]
        log: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Aggregate pass/fail statistics of a history file
    Summary {
        #[arg(long)]
        log: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print (or write) the default parameter file
    DefaultConfig {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    if cli.trace_json {
        pcb_inspect::core::init_tracing(true);
        return;
    }
    let _ = pcb_inspect::core::init_with_level(pcb_inspect::core::level_from_verbosity(cli.verbose));
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    let _ = pcb_inspect::core::init_with_level(pcb_inspect::core::level_from_verbosity(cli.verbose));
}

fn run(command: Command) -> CliResult<ExitCode> {
    match command {
        Command::Inspect {
            reference,
            test,
            config,
            font,
            annotated,
            mask,
            report,
            preview,
            preview_width,
            log,
        } => {
            let inspector = build_inspector(config.as_deref(), font.as_deref())?;
            let outcome = inspector.inspect_observed(&reference, &test, |stage| {
                log::info!("stage: {stage}");
            });

            if let Some(path) = &report {
                report_for(&reference, &test, &outcome).write_json(path)?;
            }
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("{}: inspection failed ({}): {e}", test.display(), e.stage());
                    return Ok(ExitCode::FAILURE);
                }
            };

            print_result(&test, &result);
            if let Some(path) = &annotated {
                save_raster(result.annotated(), path)?;
            }
            if let Some(path) = &mask {
                save_mask(result.mask(), path)?;
            }
            if let Some(path) = &preview {
                let view = ImagePreview::new(result.annotated().clone(), preview_width)?;
                save_raster(view.display(), path)?;
            }
            if let Some(path) = log {
                JsonLinesLog::new(path).append(&file_name(&test), result.defect_count())?;
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Batch {
            reference,
            config,
            font,
            out_dir,
            log,
            tests,
        } => {
            let inspector = build_inspector(config.as_deref(), font.as_deref())?;
            if let Some(dir) = &out_dir {
                std::fs::create_dir_all(dir)?;
            }

            let outcomes: Vec<(PathBuf, Result<InspectionResult, InspectError>)> = tests
                .into_par_iter()
                .map(|test| {
                    let outcome = inspector.inspect_paths(&reference, &test);
                    (test, outcome)
                })
                .collect();

            let mut sink = log.map(JsonLinesLog::new);
            let mut failures = 0usize;
            for (test, outcome) in &outcomes {
                if let Some(dir) = &out_dir {
                    let stem = file_stem(test);
                    report_for(&reference, test, outcome)
                        .write_json(dir.join(format!("{stem}_report.json")))?;
                    if let Ok(result) = outcome {
                        save_raster(result.annotated(), dir.join(format!("{stem}_annotated.png")))?;
                    }
                }
                match outcome {
                    Ok(result) => {
                        print_result(test, result);
                        if let Some(sink) = sink.as_mut() {
                            sink.append(&file_name(test), result.defect_count())?;
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: inspection failed ({}): {e}", test.display(), e.stage());
                    }
                }
            }
            Ok(if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::History { log, limit } => {
            let records = JsonLinesLog::new(log).records()?;
            for r in records.iter().take(limit) {
                println!(
                    "{:>5}  {}  {:<6} {:>4}  {}",
                    r.id, r.timestamp, r.status, r.defect_count, r.filename
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Summary { log, json } => {
            let summary = LogSummary::from_records(&JsonLinesLog::new(log).records()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("inspections:  {}", summary.total);
                println!(
                    "passed:       {} ({}%)",
                    summary.passed, summary.pass_rate_percent
                );
                println!("failed:       {}", summary.failed);
                println!("defects:      {}", summary.total_defects);
                println!(
                    "per board:    mean {:.2}, max {}, std {:.2}",
                    summary.mean_defects, summary.max_defects, summary.std_defects
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::DefaultConfig { output } => {
            let params = InspectionParams::default();
            match output {
                Some(path) => params.write_json(path)?,
                None => println!("{}", serde_json::to_string_pretty(&params)?),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_inspector(config: Option<&Path>, font: Option<&Path>) -> CliResult<Inspector> {
    let params = match config {
        Some(path) => InspectionParams::load_json(path)?,
        None => InspectionParams::default(),
    };
    let mut inspector = Inspector::new(params);
    if let Some(path) = font {
        inspector = inspector.with_style(AnnotationStyle::with_font_file(path)?);
    }
    Ok(inspector)
}

fn report_for(
    reference: &Path,
    test: &Path,
    outcome: &Result<InspectionResult, InspectError>,
) -> InspectionReport {
    match outcome {
        Ok(result) => InspectionReport::from_result(reference, test, result),
        Err(e) => InspectionReport::from_error(reference, test, e),
    }
}

fn print_result(test: &Path, result: &InspectionResult) {
    let status = InspectionStatus::from_defect_count(result.defect_count());
    println!(
        "{}: {} defect(s) -> {}",
        test.display(),
        result.defect_count(),
        status
    );
    for d in result.defects() {
        println!(
            "  {:<9} x={} y={} w={} h={} area={:.0} mean={:.1}",
            d.label, d.bbox.x, d.bbox.y, d.bbox.width, d.bbox.height, d.area, d.mean_intensity
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "inspection".to_owned())
}
