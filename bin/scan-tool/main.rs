use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, LevelFilter};
use rusty_scan::config::{load_config_or_default, AppConfig};
use rusty_scan::plotting::plot_spectrum;
use rusty_scan::scan::{read_scan, read_scan_info, resolve_scan_path, rewrite_scan, ScanInfo};
use rusty_scan::types::{Decoded, OutputDims};
use std::path::PathBuf;

/// Inspect, plot and rewrite scan files
#[derive(Parser, Debug)]
#[command(name = "scan-tool")]
#[command(about = "Inspect and convert *.scan measurement files", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header and grid of a scan file
    Info {
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plot the magnitude spectrum at one spatial point
    Plot {
        file: PathBuf,

        /// Spatial point, counted with the first axis fastest
        #[arg(short, long, default_value_t = 0)]
        point: usize,

        /// Channel index
        #[arg(long, default_value_t = 0)]
        channel: usize,

        /// Number of spatial output dimensions
        #[arg(short, long)]
        dims: Option<usize>,
    },
    /// Decode a scan file and encode it again
    Rewrite { input: PathBuf, output: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(args.config.as_deref());

    let log_level = args
        .log_level
        .clone()
        .unwrap_or(config.logging.log_level.clone());
    initialize_logging(&log_level)?;

    match args.command {
        Command::Info { file, json } => run_info(&config, file, json),
        Command::Plot {
            file,
            point,
            channel,
            dims,
        } => run_plot(&config, file, point, channel, dims),
        Command::Rewrite { input, output } => run_rewrite(&config, input, output),
    }
}

fn run_info(
    config: &AppConfig,
    file: PathBuf,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_scan_path(&file, Some(config.codec.extension.as_str()));
    let info = read_scan_info(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&path, &info);
    }
    Ok(())
}

fn print_info(path: &std::path::Path, info: &ScanInfo) {
    println!("File:        {}", path.display());
    println!("Header:      {}", info.header.header);
    println!("Description: {}", info.header.description);
    println!("Device:      {}", info.header.device_name);
    println!(
        "Grid:        {} ({} axis/axes)",
        if info.grid.is_uniform {
            "uniform"
        } else {
            "non-uniform"
        },
        info.grid.num_dims()
    );
    println!("  dim_order: {:?}", info.grid.dim_order);
    println!("  dim_size:  {:?}", info.grid.dim_size);
    println!("Channels:    {}", info.header.channel_names.join(", "));
    println!("Frequencies: {}", info.num_freq);
    println!("Complex:     {}", info.is_complex);
}

fn run_plot(
    config: &AppConfig,
    file: PathBuf,
    point: usize,
    channel: usize,
    dims: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = config.codec.read_options();
    options.squeeze_channels = false;
    if let Some(n) = dims {
        options.output_dims = OutputDims::Exact(n);
    }

    let Decoded { scan, notices } = read_scan(&file, &options)?;
    info!("Decoded with {} notice(s)", notices.len());

    let values = scan.magnitude_spectrum(point, channel)?;

    let title = scan
        .header
        .channel_names
        .get(channel)
        .map(|name| format!("{} at point {}", name, point))
        .unwrap_or_else(|| format!("Point {}", point));

    plot_spectrum(
        &scan.frequencies,
        &values,
        Some(&title),
        Some(config.plot.width),
        Some(config.plot.height),
    )
}

fn run_rewrite(
    config: &AppConfig,
    input: PathBuf,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = config.codec.read_options();
    options.squeeze_channels = false;

    let report = rewrite_scan(
        &input,
        &output,
        &options,
        &config.codec.write_options(),
        Some(config.codec.device_name.as_str()),
    )?;
    info!(
        "Rewrote '{}' to '{}' ({} notice(s) on read, {} on write)",
        input.display(),
        report.path.display(),
        report.read_notices.len(),
        report.write_notices.len()
    );
    Ok(())
}

fn initialize_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    Ok(())
}
