extern crate tomcat_inputs;

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tomcat_inputs::core::optics::OpticalAngleTable;
use tomcat_inputs::core::sunsolve::{
    optics_from_sunsolve, SunSolveColumns, SunSolveOptions, DEFAULT_ANGLE_COLUMN,
};
use tomcat_inputs::input::{ingest_run_config, RunConfig};
use tomcat_inputs::lcoe::{breakeven_module_cost, lcoe, BosCostTree, LcoeInputs, SystemType};
use tomcat_inputs::output::FileOutput;
use tomcat_inputs::read_weather_file::{weather_data_to_series, TmyWeather};
use tomcat_inputs::run_with_weather;
use tomcat_inputs::weather_cache::{FileWeatherCache, NoWeatherCache, WeatherCache};
use tracing::{debug, info};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct TomcatArgs {
    #[command(subcommand)]
    command: Command,
    #[clap(long, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
    #[clap(long, short, default_value_t = false, help = "Log at debug level")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the TOMCAT time series and tilt files
    Generate(GenerateArgs),
    /// Build an optics table from SunSolve exports
    Sunsolve(SunSolveArgs),
    /// Levelized cost of energy and breakeven module cost
    Lcoe(LcoeArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(help = "Path to weather file in TMY3 .csv format")]
    tmy_file: PathBuf,
    #[arg(help = "Path to optics table in .csv format")]
    optics_file: PathBuf,
    #[arg(long, help = "Case to select from a multi-case optics table")]
    case: Option<String>,
    #[arg(long, short, help = "Path to run configuration in .json format")]
    config: Option<PathBuf>,
    #[arg(long, help = "Array tilt in degrees, overriding the configuration")]
    tilt: Option<f64>,
    #[arg(long, help = "Array azimuth in degrees, overriding the configuration")]
    azimuth: Option<f64>,
    #[arg(long, default_value = "TOMCAT_input.csv")]
    time_series_file: PathBuf,
    #[arg(long, default_value = "TOMCAT_tilt.txt")]
    tilt_file: PathBuf,
    #[arg(long, default_value_t = false, help = "Do not write the time series file")]
    no_time_series: bool,
    #[arg(long, default_value_t = false, help = "Do not write the tilt file")]
    no_tilt: bool,
    #[arg(long, help = "Directory in which to cache parsed weather")]
    cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SunSolveArgs {
    #[arg(help = "Path to SunSolve results export")]
    results_file: PathBuf,
    #[arg(help = "Path to internal quantum efficiency file")]
    iqe_file: PathBuf,
    #[arg(long, value_delimiter = ',', required = true)]
    glass: Vec<String>,
    #[arg(long, value_delimiter = ',', required = true)]
    encapsulant: Vec<String>,
    #[arg(long, value_delimiter = ',', required = true)]
    cell: Vec<String>,
    #[arg(long, value_delimiter = ',', required = true)]
    photocurrent: Vec<String>,
    #[arg(long, default_value = DEFAULT_ANGLE_COLUMN)]
    angle_column: String,
    #[arg(long, default_value_t = 1.)]
    normal_incidence_current_factor: f64,
    #[arg(long, default_value_t = 2)]
    iqe_header_rows: usize,
    #[arg(long, short, default_value = "optics.csv")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct LcoeArgs {
    #[arg(help = "Path to the balance of system cost tree (JSON or JavaScript assignment)")]
    cost_tree_file: PathBuf,
    #[arg(long, short, help = "Path to calculator inputs in .json format")]
    inputs: Option<PathBuf>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    system_type: Option<String>,
    #[arg(long, help = "Energy yield ratio for which to solve the breakeven module cost")]
    breakeven: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let args = TomcatArgs::parse();

    let tracing_subscriber = {
        let level = if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(level);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)
        .expect("setting tracing subscriber failed");

    match args.command {
        Command::Generate(args) => generate(args),
        Command::Sunsolve(args) => sunsolve(args),
        Command::Lcoe(args) => run_lcoe(args),
    }
}

fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ingest_run_config(BufReader::new(File::open(path)?))?,
        None => RunConfig::default(),
    };
    if let Some(tilt) = args.tilt {
        config.array_tilt = tilt;
    }
    if let Some(azimuth) = args.azimuth {
        config.array_azimuth = azimuth;
    }
    config.validate()?;

    let output = FileOutput::new(
        (!args.no_time_series).then_some(args.time_series_file),
        (!args.no_tilt).then_some(args.tilt_file),
    )?;

    let weather = match &args.cache_dir {
        Some(directory) => load_weather(&FileWeatherCache::new(directory)?, &args.tmy_file)?,
        None => load_weather(&NoWeatherCache, &args.tmy_file)?,
    };

    let optics_file = BufReader::new(File::open(&args.optics_file)?);
    let optics = match &args.case {
        Some(case) => OpticalAngleTable::case_from_reader(optics_file, case)?,
        None => OpticalAngleTable::from_reader(optics_file)?,
    };

    let table = run_with_weather(&weather, &optics, &config, output)?;
    info!(
        rows = table.rows.len(),
        warnings = table.warnings.len(),
        "finished"
    );

    Ok(())
}

fn load_weather(cache: &impl WeatherCache, tmy_file: &Path) -> anyhow::Result<TmyWeather> {
    // the full path, so same-named files from different sites are cached apart
    let key = fs::canonicalize(tmy_file)?.to_string_lossy().into_owned();

    cache.fetch_or_load(&key, || {
        debug!(?tmy_file, "reading weather file");
        Ok(weather_data_to_series(BufReader::new(File::open(
            tmy_file,
        )?))?)
    })
}

fn sunsolve(args: SunSolveArgs) -> anyhow::Result<()> {
    let options = SunSolveOptions {
        normal_incidence_current_factor: args.normal_incidence_current_factor,
        iqe_header_rows: args.iqe_header_rows,
        ..SunSolveOptions::new(SunSolveColumns {
            glass: args.glass,
            front_encapsulant: args.encapsulant,
            cell: args.cell,
            photocurrent: args.photocurrent,
            angle: args.angle_column,
        })
    };

    let table = optics_from_sunsolve(
        BufReader::new(File::open(&args.results_file)?),
        BufReader::new(File::open(&args.iqe_file)?),
        &options,
    )?;
    table.write_csv(BufWriter::new(File::create(&args.output)?))?;
    info!(samples = table.samples().len(), output = ?args.output, "wrote optics table");

    Ok(())
}

fn run_lcoe(args: LcoeArgs) -> anyhow::Result<()> {
    let tree = BosCostTree::from_js(&fs::read_to_string(&args.cost_tree_file)?)?;

    let mut inputs: LcoeInputs = match &args.inputs {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => LcoeInputs::default(),
    };
    if let Some(state) = args.state {
        inputs.state = state;
    }
    if let Some(system_type) = &args.system_type {
        inputs.system_type = SystemType::parse(system_type)?;
    }

    println!("LCOE: {:.4} USD/kWh", lcoe(&inputs, &tree)?);
    if let Some(energy_factor) = args.breakeven {
        println!(
            "Breakeven module cost: {:.4} USD/m2",
            breakeven_module_cost(&inputs, &tree, energy_factor)?
        );
    }

    Ok(())
}
