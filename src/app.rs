//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - builds scan jobs (command line, prompt or manifest)
//! - runs the batch pipeline
//! - prints reports/plots and writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info};

use crate::cli::{BatchArgs, Command, FitArgs, OutputFlags, PlotArgs, SimulateArgs};
use crate::domain::{ScanJob, SigmoidModel};
use crate::error::AppError;
use crate::io::{Manifest, scan_stem};

pub mod pipeline;

use pipeline::{BatchOutput, BatchSettings};

/// Entry point for the `hvscan` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; it only exists to carry RUST_LOG.
    dotenvy::dotenv().ok();

    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Plot(args) => handle_plot(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

/// `RUST_LOG` wins over `-v`.
pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

/// Where the results of a run go.
#[derive(Debug, Clone, Default)]
pub struct OutputPlan {
    pub ascii_plot: bool,
    pub width: usize,
    pub height: usize,
    pub results_csv: Option<PathBuf>,
    pub curves_json: Option<PathBuf>,
    pub svg_dir: Option<PathBuf>,
}

impl OutputPlan {
    fn from_flags(flags: &OutputFlags) -> Self {
        Self {
            ascii_plot: !flags.no_plot,
            width: flags.width,
            height: flags.height,
            results_csv: flags.export.clone(),
            curves_json: flags.export_curves.clone(),
            svg_dir: flags.svg_dir.clone(),
        }
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let files = if args.files.is_empty() {
        crate::cli::picker::prompt_for_scan_paths()?
    } else {
        args.files.clone()
    };

    let jobs: Vec<ScanJob> = files
        .into_iter()
        .map(|path| ScanJob {
            label: scan_stem(&path).to_string(),
            group: args.group.clone(),
            wp_file: None,
            legend: None,
            mixture_name: None,
            path,
        })
        .collect();

    let settings = BatchSettings {
        fit: args.fit.fit_options(),
        reference: args.fit.reference,
        basis: args.fit.basis,
    };
    debug!("fit settings: {settings:?}");

    let output = pipeline::run_batch(jobs, &settings);
    present(output, &OutputPlan::from_flags(&args.output))
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let manifest = Manifest::from_file(&args.manifest)?;
    let base = args
        .manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let jobs = manifest.jobs(&base);
    info!("{}: {} scan(s) in {} group(s)", args.manifest.display(), jobs.len(), manifest.groups.len());

    let settings = BatchSettings {
        fit: manifest.fit_options(),
        reference: manifest.reference(),
        basis: manifest.basis(),
    };

    // Command-line paths win; manifest paths resolve against the manifest.
    let mut plan = OutputPlan::from_flags(&args.output);
    let out = &manifest.output;
    plan.results_csv = plan.results_csv.or_else(|| out.results_csv.as_ref().map(|p| base.join(p)));
    plan.curves_json = plan.curves_json.or_else(|| out.curves_json.as_ref().map(|p| base.join(p)));
    plan.svg_dir = plan.svg_dir.or_else(|| out.svg_dir.as_ref().map(|p| base.join(p)));
    if out.ascii_plot == Some(false) {
        plan.ascii_plot = false;
    }

    let output = pipeline::run_batch(jobs, &settings);
    present(output, &plan)
}

/// Print and export a finished batch.
///
/// Fails when no scan could be analyzed; a single failing scan keeps its own
/// exit code.
fn present(output: BatchOutput, plan: &OutputPlan) -> Result<(), AppError> {
    println!(
        "{}",
        crate::report::format_batch_summary(&output.analyses, &output.failures)
    );

    if plan.ascii_plot && !output.analyses.is_empty() {
        println!(
            "{}",
            crate::plot::render_ascii_plot(&output.analyses, plan.width, plan.height)
        );
    }

    if let Some(path) = &plan.results_csv {
        crate::io::write_results_csv(path, &output.analyses, &output.failures)?;
        info!("wrote {}", path.display());
    }

    if !output.analyses.is_empty() {
        if let Some(path) = &plan.curves_json {
            crate::io::write_curves_json(path, &output.analyses)?;
            info!("wrote {}", path.display());
        }
        if let Some(dir) = &plan.svg_dir {
            for path in crate::plot::write_comparison_charts(dir, &output.analyses)? {
                info!("wrote {}", path.display());
            }
        }
    }

    if output.analyses.is_empty() {
        let mut failures = output.failures;
        return Err(match failures.len() {
            0 => AppError::new(3, "No scans to analyze."),
            1 => AppError::from(failures.remove(0).error),
            n => AppError::new(3, format!("None of the {n} scans could be analyzed.")),
        });
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let curves = crate::io::read_curves_json(&args.curves)?;
    if curves.scans.is_empty() {
        return Err(AppError::new(3, format!("{} contains no scans.", args.curves.display())));
    }
    info!("{} ({}, generated {})", args.curves.display(), curves.tool, curves.generated_at);

    let plot = crate::plot::render_ascii_plot_from_curves(&curves, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = crate::data::SyntheticScan {
        model: SigmoidModel::new(args.emax, args.lambda, args.hv50),
        v_min: args.v_min,
        v_max: args.v_max,
        steps: args.steps,
        triggers: args.triggers,
        seed: args.seed,
    };
    let sample = crate::data::generate_scan(&spec, scan_stem(&args.output))?;
    crate::data::write_scan_csv(&args.output, &sample)?;
    println!("Wrote {} ({} steps)", args.output.display(), sample.len());

    if let Some(rate) = args.noise_rate {
        let wp_path = crate::io::default_wp_path(&args.output);
        crate::data::write_wp_csv(&wp_path, rate, args.gamma_cs)?;
        println!("Wrote {}", wp_path.display());
    }
    Ok(())
}
