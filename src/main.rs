//! Command line front end: one invocation computes and prints one correction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hemobias::report::{write_series, Formatted};
use hemobias::{BiasCorrector, Config, ParameterTable, Preanalytical, Strategy};

#[derive(Parser)]
#[command(version, about = "Correct blood-chemistry measurements for hemolysis interference")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Correct a single measured value
    Correct(CorrectArgs),
    /// List the parameters in the table
    ///
    /// The bundled table only carries BHB. Other parameters need a table passed with
    /// `--table`, for example one produced by `fit`.
    List {
        /// TOML parameter table, defaults to the bundled table
        #[arg(long)]
        table: Option<PathBuf>,
    },
    /// Fit interference coefficients from a directory of `<analyte>.csv` study files
    Fit {
        directory: PathBuf,
        /// Write the fitted table here instead of printing it
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CorrectArgs {
    /// Parameter name, e.g. BHB
    #[arg(long, short)]
    parameter: String,
    /// Free hemoglobin concentration
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    hb: f64,
    /// Value reported by the analyser
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    value: f64,
    /// Sample was transported at room temperature
    #[arg(long)]
    room_temp: bool,
    /// Sample was processed more than eight hours after collection
    #[arg(long)]
    delay_over_8h: bool,
    /// Preanalytical adjustment policy, overrides the config file
    #[arg(long)]
    strategy: Option<Strategy>,
    /// Number of points in the plotting series, overrides the config file
    #[arg(long)]
    samples: Option<usize>,
    /// TOML parameter table, defaults to the bundled table
    #[arg(long)]
    table: Option<PathBuf>,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the plotting series as CSV into this directory
    #[arg(long)]
    series: Option<PathBuf>,
}

fn load_table(path: Option<&Path>) -> Result<ParameterTable<f64>> {
    let table = match path {
        Some(path) => ParameterTable::from_file(path)
            .with_context(|| format!("failed to load parameter table {}", path.display()))?,
        None => ParameterTable::bundled()?,
    };
    Ok(table)
}

fn correct(args: CorrectArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(samples) = args.samples {
        config.samples = samples;
    }

    let corrector = BiasCorrector::new(load_table(args.table.as_deref())?, config)?;
    let conditions = Preanalytical::new(args.room_temp, args.delay_over_8h);
    let result = corrector.correct(&args.parameter, args.hb, args.value, conditions)?;

    println!("{}", Formatted::from(&result));

    if let Some(directory) = &args.series {
        let series = corrector.visualize(&result)?;
        write_series(directory, &series)
            .with_context(|| format!("failed to write series to {}", directory.display()))?;
    }
    Ok(())
}

fn list(table: Option<&Path>) -> Result<()> {
    let table = load_table(table)?;
    println!("{:<10} {:>10} {:>10} {:>8}", "parameter", "a", "b", "r2");
    for profile in table.iter() {
        println!(
            "{:<10} {:>10.4} {:>10.4} {:>8.4}",
            profile.name(),
            profile.a(),
            profile.b(),
            profile.r_squared()
        );
    }
    Ok(())
}

fn fit(directory: &Path, output: Option<&Path>) -> Result<()> {
    let table: ParameterTable<f64> = hemobias::fit::from_directory(directory)
        .with_context(|| format!("failed to fit study data in {}", directory.display()))?;
    let rendered = table.to_toml_string()?;
    match output {
        Some(path) => std::fs::write(path, rendered)?,
        None => print!("{rendered}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    // stdout carries the report, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Correct(args) => correct(args),
        Command::List { table } => list(table.as_deref()),
        Command::Fit { directory, output } => fit(&directory, output.as_deref()),
    }
}
