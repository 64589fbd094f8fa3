use clap::Parser;
use gamestat::logging::{LogFormat, LoggingConfig, init_logging};
use gamestat::{AnalysisConfig, Dataset, GamestatError, analyze, render_tui};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Gamestat cleans video game sales tables and tests what sells.", long_about = None)]
struct Args {
    /// Delimited file with the game sales table.
    #[arg(short = 'p', long = "path", required = true)]
    path: PathBuf,
    /// JSON file overriding analysis defaults.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Write the report as JSON to this file.
    #[arg(short = 'e', long = "export")]
    export: Option<PathBuf>,
    /// Write the cleaned table as CSV to this file.
    #[arg(long = "write-clean")]
    write_clean: Option<PathBuf>,
    /// Print the report as JSON instead of opening the terminal viewer.
    #[arg(long = "no-tui")]
    no_tui: bool,
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), GamestatError> {
    let args = Args::parse();
    init_logging(&LoggingConfig::from_verbosity(args.verbose, args.log_format))?;

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    let dataset = Dataset::from_csv(&args.path)?;
    let (frame, report) = analyze(dataset, &config)?;

    if let Some(path) = &args.write_clean {
        frame.write_csv(BufWriter::new(File::create(path)?))?;
    }
    if let Some(path) = &args.export {
        report.export(path)?;
    }
    if args.no_tui {
        println!("{}", report.to_json()?);
    } else {
        render_tui(&report)?;
    }
    Ok(())
}
