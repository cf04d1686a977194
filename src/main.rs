use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use state_convert::{
    CollisionPolicy, MigrationConfig, MigrationError, MigrationOptions, MigrationReporter,
    ReportFormat, SchemaMigrator,
};

const VERSION_BANNER: &str = "Version 0.1";
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser, Debug)]
#[command(name = "state-convert")]
#[command(about = "Convert a state dump into the name-keyed schema layout")]
#[command(disable_version_flag = true)]
struct Args {
    /// Print the version and exit
    #[arg(short = 'v', long)]
    version: bool,

    /// Path to the state dump to convert
    input: Option<PathBuf>,

    /// Where to write the converted document (default: State_new.json)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// YAML file with migration settings
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep names and references in their original casing
    #[arg(long)]
    no_normalize: bool,

    /// Do not write default attributes onto transmitters
    #[arg(long)]
    no_enrich: bool,

    /// Regroup only, same as --no-normalize --no-enrich
    #[arg(long)]
    legacy: bool,

    /// Duplicate record names: overwrite, warn or reject
    #[arg(long, value_name = "POLICY")]
    on_collision: Option<CollisionPolicy>,

    /// Summary format printed after a successful run: console or json
    #[arg(long, value_name = "FORMAT", default_value = "console")]
    report: ReportFormat,

    /// Do not print the summary
    #[arg(short, long)]
    quiet: bool,

    /// Log level or filter directive for diagnostics on stderr
    #[arg(long, value_name = "LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match execute(args, &mut io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);
            if let MigrationError::Usage(_) = e {
                eprintln!("\nUsage: state-convert [-v|--version] [OPTIONS] <input>");
                eprintln!("Example: state-convert State.json");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Everything after argument parsing; stdout output goes to `out`
fn execute(args: Args, out: &mut dyn Write) -> Result<(), MigrationError> {
    if args.version {
        return print(out, VERSION_BANNER);
    }

    let filter = log_filter(&args.log_level)?;
    // try_init: a subscriber is already set when this runs twice in one process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();

    run(args, out)
}

fn log_filter(level: &str) -> Result<EnvFilter, MigrationError> {
    EnvFilter::try_new(level)
        .map_err(|e| MigrationError::Usage(format!("invalid --log-level '{}': {}", level, e)))
}

fn run(args: Args, out: &mut dyn Write) -> Result<(), MigrationError> {
    let input = args
        .input
        .clone()
        .ok_or_else(|| MigrationError::Usage("no input file given".to_string()))?;

    let options = resolve_options(&args)?;
    let migrator = SchemaMigrator::new(options);
    let (_, report) = migrator.migrate_with_report(&input)?;

    if !args.quiet {
        match MigrationReporter::new().with_format(args.report).format_report(&report) {
            Ok(text) => print(out, &text)?,
            Err(e) => tracing::warn!("Failed to render migration report: {}", e),
        }
    }

    Ok(())
}

fn print(out: &mut dyn Write, text: &str) -> Result<(), MigrationError> {
    writeln!(out, "{}", text).map_err(|source| MigrationError::Write {
        path: PathBuf::from("<stdout>"),
        source,
    })
}

/// Defaults, then the config file, then command-line flags
fn resolve_options(args: &Args) -> Result<MigrationOptions, MigrationError> {
    let mut options = MigrationOptions::default();

    if let Some(ref path) = args.config {
        options = options.merge_config(MigrationConfig::load(path)?);
    }

    if args.legacy || args.no_normalize {
        options.normalize = false;
    }
    if args.legacy || args.no_enrich {
        options.enrich = false;
    }
    if let Some(policy) = args.on_collision {
        options.collision_policy = policy;
    }
    if let Some(ref output) = args.output {
        options.output_path = output.clone();
    }

    Ok(options)
}
