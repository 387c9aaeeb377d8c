//! Command-line parsing for the efficiency scan fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{InitialGuess, ReferenceBasis, ReferenceEfficiency, ZeroErrorPolicy};
use crate::fit::FitOptions;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "hvscan", version, about = "Sigmoid fits and working points for detector efficiency scans")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit scan CSVs given on the command line (prompts for files when none are given).
    Fit(FitArgs),
    /// Fit every scan listed in a TOML manifest.
    Batch(BatchArgs),
    /// Plot a previously exported curves JSON in the terminal.
    Plot(PlotArgs),
    /// Write a synthetic scan CSV (and optionally its working-point file).
    Simulate(SimulateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Scan CSV files (`HV_top`, `efficiency`, `eff_error`).
    pub files: Vec<PathBuf>,

    /// Group name attached to these scans in reports and charts.
    #[arg(long)]
    pub group: Option<String>,

    #[command(flatten)]
    pub fit: FitFlags,

    #[command(flatten)]
    pub output: OutputFlags,
}

/// Optimizer and working-point settings.
#[derive(Debug, Args, Clone)]
pub struct FitFlags {
    /// Initial plateau efficiency.
    #[arg(long = "emax0", default_value_t = 0.9)]
    pub emax0: f64,

    /// Initial slope (1/V).
    #[arg(long = "lambda0", default_value_t = 0.01)]
    pub lambda0: f64,

    /// Initial inflection voltage (V).
    #[arg(long = "hv50-0", default_value_t = 7000.0)]
    pub hv50_0: f64,

    /// Optimizer iteration budget.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Relative chi2 change that counts as converged.
    #[arg(long, default_value_t = 1e-10)]
    pub tolerance: f64,

    /// What to do with samples whose error is zero or invalid.
    #[arg(long, value_enum, default_value_t = ZeroErrorPolicy::Exclude)]
    pub zero_error: ZeroErrorPolicy,

    /// Error floor used with `--zero-error floor`.
    #[arg(long, default_value_t = 1e-3)]
    pub error_floor: f64,

    /// How far HV50 may sit outside the scanned range, in units of the span.
    #[arg(long, default_value_t = 1.0)]
    pub hv50_window: f64,

    /// Do not retry failed fits from a data-driven starting point.
    #[arg(long)]
    pub no_retry: bool,

    /// Reference efficiency for HV_ref: a fraction (0.95) or a percentage ("95%").
    #[arg(long, default_value = "0.95")]
    pub reference: ReferenceEfficiency,

    /// Whether the reference is relative to the plateau or absolute.
    #[arg(long, value_enum, default_value_t = ReferenceBasis::Relative)]
    pub basis: ReferenceBasis,
}

impl FitFlags {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            initial_guess: InitialGuess {
                emax: self.emax0,
                lambda: self.lambda0,
                hv50: self.hv50_0,
            },
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            zero_error: self.zero_error,
            error_floor: self.error_floor,
            hv50_window: self.hv50_window,
            retry_from_data: !self.no_retry,
        }
    }
}

/// Terminal and file outputs.
#[derive(Debug, Args, Clone)]
pub struct OutputFlags {
    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-scan results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export fits + fitted grids to JSON.
    #[arg(long = "export-curves")]
    pub export_curves: Option<PathBuf>,

    /// Write SVG comparison charts into this directory.
    #[arg(long = "svg-dir")]
    pub svg_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Manifest file (TOML).
    #[arg(short, long, default_value = "hvscan.toml")]
    pub manifest: PathBuf,

    /// Output flags; paths given here override the manifest's `[output]`.
    #[command(flatten)]
    pub output: OutputFlags,
}

/// Options for plotting a saved curves file.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Curves JSON produced by `--export-curves`.
    #[arg(long, value_name = "JSON")]
    pub curves: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Output scan CSV.
    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 0.96)]
    pub emax: f64,

    #[arg(long, default_value_t = 0.011)]
    pub lambda: f64,

    #[arg(long, default_value_t = 6750.0)]
    pub hv50: f64,

    #[arg(long, default_value_t = 6000.0)]
    pub v_min: f64,

    #[arg(long, default_value_t = 7600.0)]
    pub v_max: f64,

    /// Number of voltage steps.
    #[arg(long, default_value_t = 12)]
    pub steps: usize,

    /// Events per voltage step.
    #[arg(long, default_value_t = 2000)]
    pub triggers: u32,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Also write `<stem>_WP.csv` with this `noiseGammaRate` (Hz).
    #[arg(long)]
    pub noise_rate: Option<f64>,

    /// `gamma_CS` (cm²) for the working-point file.
    #[arg(long, default_value_t = 1.0)]
    pub gamma_cs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn fit_flags_map_to_options() {
        let cli = Cli::parse_from([
            "hvscan",
            "-vv",
            "fit",
            "a.csv",
            "b.csv",
            "--hv50-0",
            "6800",
            "--zero-error",
            "floor",
            "--reference",
            "90%",
            "--no-retry",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.files.len(), 2);
        let opts = args.fit.fit_options();
        assert_eq!(opts.initial_guess.hv50, 6800.0);
        assert_eq!(opts.zero_error, ZeroErrorPolicy::Floor);
        assert!(!opts.retry_from_data);
        assert!((args.fit.reference.fraction() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn percent_magnitude_reference_is_a_usage_error() {
        let res = Cli::try_parse_from(["hvscan", "fit", "a.csv", "--reference", "95"]);
        assert!(res.is_err());
    }
}
