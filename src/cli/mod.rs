//! Command-line interface
//!
//! `pdp partial` computes partial dependence or ICE curves for a model
//! described in JSON, `pdp estimate` reports the cost of that computation
//! without running it, and `pdp grid` prints the sweep grid.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PdpConfig;
use crate::data::{Column, DataLoader, DataSaver, Dataset, Value};
use crate::engine::{PartialDependence, SummaryKind};
use crate::grid::{build_grid, Grid, GridMethod};
use crate::predict::{Model, ModelSpec};
use crate::table::{interaction, PdTable};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "pdp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Partial dependence and ICE curves for fitted models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute partial dependence or ICE curves
    Partial {
        #[command(flatten)]
        run: RunArgs,

        /// Model description (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Write the result table (CSV, or JSON for a .json extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also report Friedman's H statistic (two features only)
        #[arg(long)]
        interaction: bool,
    },

    /// Report the cost of a computation without running it
    Estimate {
        #[command(flatten)]
        run: RunArgs,

        /// Model description (JSON); checks that an adapter exists for it
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Print or save the sweep grid
    Grid {
        #[command(flatten)]
        run: RunArgs,

        /// Write the grid as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Training data (CSV, TSV, or JSON)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Features to sweep, comma separated (one to three)
    #[arg(short, long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// JSON configuration file; command-line flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Grid points per continuous feature
    #[arg(short, long)]
    pub resolution: Option<usize>,

    /// Evenly spaced grid instead of quantiles
    #[arg(long)]
    pub uniform: bool,

    /// Drop outliers before computing the grid range
    #[arg(long)]
    pub trim_outliers: bool,

    /// Numeric columns to treat as categorical
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    /// Keep one curve per training row
    #[arg(long)]
    pub ice: bool,

    /// Center curves at their first grid point
    #[arg(long)]
    pub center: bool,

    /// Flag grid points outside the training convex hull
    #[arg(long)]
    pub chull: bool,

    /// Subsample this many training rows
    #[arg(long)]
    pub subsample: Option<usize>,

    /// Seed for subsampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (enables the thread-pool executor)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Aggregation (mean, mean_sd, median)
    #[arg(long)]
    pub summary: Option<String>,

    /// Focal class for multi-class models
    #[arg(long = "class")]
    pub which_class: Option<String>,
}

impl RunArgs {
    /// Merge the config file (if any) with command-line overrides
    pub fn to_config(&self) -> anyhow::Result<PdpConfig> {
        let mut config = match &self.config {
            Some(path) => PdpConfig::from_json_file(path)?,
            None => PdpConfig::default(),
        };

        if !self.features.is_empty() {
            config.features = self.features.clone();
        }
        if let Some(r) = self.resolution {
            config.grid.resolution = r;
        }
        if self.uniform {
            config.grid.method = GridMethod::Uniform;
        }
        if self.trim_outliers {
            config.grid.trim_outliers = true;
        }
        for name in &self.categorical {
            if !config.grid.categorical.contains(name) {
                config.grid.categorical.push(name.clone());
            }
        }
        config.ice |= self.ice;
        config.center |= self.center;
        config.chull |= self.chull;
        if let Some(k) = self.subsample {
            config.subsample = Some(k);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.threads {
            config = config.with_threads(n);
        }
        if let Some(s) = &self.summary {
            config.summary = parse_summary(s)?;
        }
        if let Some(class) = &self.which_class {
            config.which_class = Some(class.clone());
        }

        if config.features.is_empty() {
            anyhow::bail!("no features given; pass --features or set them in the config file");
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_summary(s: &str) -> anyhow::Result<SummaryKind> {
    match s {
        "mean" => Ok(SummaryKind::Mean),
        "mean_sd" | "meansd" => Ok(SummaryKind::MeanSd),
        "median" => Ok(SummaryKind::Median),
        _ => anyhow::bail!("Invalid summary: {} (expected mean, mean_sd, or median)", s),
    }
}

fn load_training(path: &Path) -> anyhow::Result<Dataset> {
    step_run("Loading data");
    let start = Instant::now();
    let data = DataLoader::new().load_auto(path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        data.n_rows(),
        data.n_cols(),
        start.elapsed()
    ));
    Ok(data)
}

fn load_model(path: &Path) -> anyhow::Result<Box<dyn Model>> {
    step_run("Loading model");
    let model = ModelSpec::from_json_file(path)?.into_model()?;
    step_done(model.type_tag());
    Ok(model)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_partial(
    run: &RunArgs,
    model_path: &Path,
    output: Option<&Path>,
    report_interaction: bool,
) -> anyhow::Result<()> {
    section("Partial dependence");

    let config = run.to_config()?;
    let data = load_training(&run.data)?;
    let model = load_model(model_path)?;
    let pd = PartialDependence::from_config(model.as_ref(), &config)?;

    step_run(&format!("Computing {}", config.features.join(", ").cyan()));
    let start = Instant::now();
    let table = pd.compute(&config.features, &data)?;
    step_done(&format!("{} rows in {:?}", table.len(), start.elapsed()));

    print_table(&table)?;

    if report_interaction {
        report_h_statistic(&pd, &config, &data, &table)?;
    }

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        table.write_auto(path)?;
        step_done(&format!("{} rows", table.len()));
    }

    println!();
    Ok(())
}

pub fn cmd_estimate(run: &RunArgs, model_path: Option<&Path>) -> anyhow::Result<()> {
    section("Estimate");

    let config = run.to_config()?;
    let data = load_training(&run.data)?;
    let grid = build_grid(&config.features, &data, &config.grid)?;

    let training_rows = config
        .subsample
        .map(|k| k.min(data.n_rows()))
        .unwrap_or(data.n_rows());
    let (grid_rows, predictions) = match model_path {
        Some(path) => {
            let model = load_model(path)?;
            let pd = PartialDependence::from_config(model.as_ref(), &config)?;
            let cost = pd.estimate_cost_for_grid(&grid, &data);
            (cost.grid_rows, cost.predictions)
        }
        None => (grid.len(), grid.len().saturating_mul(training_rows)),
    };

    println!();
    kv("Features", &config.features.join(", "));
    kv("Grid rows", &grid_rows.to_string());
    kv("Training rows", &training_rows.to_string());
    kv("Adapter calls", &grid_rows.to_string());
    kv("Predictions", &predictions.to_string());
    kv(
        "Output rows",
        &if config.ice { predictions } else { grid_rows }.to_string(),
    );
    if predictions > config.warn_threshold {
        println!();
        println!(
            "  {}",
            "Large computation; consider --resolution or --subsample".yellow()
        );
    }
    println!();
    Ok(())
}

pub fn cmd_grid(run: &RunArgs, output: Option<&Path>) -> anyhow::Result<()> {
    section("Grid");

    let config = run.to_config()?;
    let data = load_training(&run.data)?;
    let grid = build_grid(&config.features, &data, &config.grid)?;

    println!();
    for axis in grid.axes() {
        let values: Vec<String> = axis.values.iter().map(Value::to_string).collect();
        kv(&axis.name, &values.join(", "));
    }
    kv("Rows", &grid.len().to_string());

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        DataSaver::save_dataset_csv(&grid_dataset(&grid)?, path)?;
        step_done(&format!("{} rows", grid.len()));
    }
    println!();
    Ok(())
}

fn print_table(table: &PdTable) -> anyhow::Result<()> {
    let df = table.to_dataframe()?;
    println!();
    println!("{}", df.head(Some(10)));
    if table.hull_checked() {
        kv(
            "Extrapolated",
            &format!("{} of {} rows", table.n_extrapolated(), table.len()),
        );
    }
    Ok(())
}

fn report_h_statistic(
    pd: &PartialDependence<'_>,
    config: &PdpConfig,
    data: &Dataset,
    table: &PdTable,
) -> anyhow::Result<()> {
    if config.features.len() != 2 {
        println!(
            "  {}",
            "Interaction strength needs exactly two features".yellow()
        );
        return Ok(());
    }
    let joint = if table.is_ice() {
        table.average_ice()?
    } else {
        table.clone()
    };
    let first = pd.compute(&config.features[..1], data)?;
    let second = pd.compute(&config.features[1..], data)?;
    let (first, second) = if first.is_ice() {
        (first.average_ice()?, second.average_ice()?)
    } else {
        (first, second)
    };
    for column in joint.value_columns() {
        let h = interaction::h_statistic(&joint, &first, &second, column)?;
        kv(&format!("H² ({})", column), &format!("{:.4}", h));
    }
    Ok(())
}

fn grid_dataset(grid: &Grid) -> anyhow::Result<Dataset> {
    let columns = grid
        .feature_names()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<&Value> = grid.rows().iter().map(|r| &r[j]).collect();
            if values.iter().all(|v| v.as_f64().is_some()) {
                Column::numeric(
                    name.as_str(),
                    values.iter().filter_map(|v| v.as_f64()).collect(),
                )
            } else {
                let levels: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                Column::categorical(name.as_str(), &levels)
            }
        })
        .collect();
    Ok(Dataset::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_partial() {
        let cli = Cli::try_parse_from([
            "pdp", "partial", "--data", "train.csv", "--model", "m.json", "--features", "x,z",
            "--ice", "--resolution", "7",
        ])
        .unwrap();
        match cli.command {
            Commands::Partial { run, model, .. } => {
                assert_eq!(run.features, vec!["x", "z"]);
                assert_eq!(model, PathBuf::from("m.json"));
                let config = run.to_config().unwrap();
                assert!(config.ice);
                assert_eq!(config.grid.resolution, 7);
            }
            _ => panic!("expected partial"),
        }
    }

    #[test]
    fn test_missing_features_rejected() {
        let run = RunArgs {
            data: PathBuf::from("train.csv"),
            ..Default::default()
        };
        assert!(run.to_config().is_err());
    }

    #[test]
    fn test_parse_summary() {
        assert_eq!(parse_summary("mean_sd").unwrap(), SummaryKind::MeanSd);
        assert!(parse_summary("mode").is_err());
    }
}
