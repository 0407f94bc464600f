use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use hips_provisioner::app::{App, ProgressSinkKind, ProvisionOptions};
use hips_provisioner::catalog;
use hips_provisioner::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use hips_provisioner::domain::{DsoId, TileFormat, TileLayout};
use hips_provisioner::error::HipsError;
use hips_provisioner::fetch::{HipsHttpClient, HttpReply, TileSource};
use hips_provisioner::output::{JsonOutput, OutputMode, TextOutput};
use hips_provisioner::tui::Tui;

#[derive(Parser)]
#[command(name = "hips-provision")]
#[command(about = "Mirror HiPS tile pyramids for a curated deep-sky object catalog")]
#[command(version, author)]
struct Cli {
    /// Line-oriented progress instead of the dashboard.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Print a machine-readable report on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    /// JSON catalog replacing the built-in object list.
    #[arg(long, global = true)]
    catalog: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch tiles and write properties for every pending object (default)")]
    Provision(ProvisionArgs),
    #[command(about = "Show the completion state of every catalog object")]
    Status,
    #[command(about = "Print the viewer overlay list as JSON")]
    Catalog(CatalogArgs),
}

#[derive(Args, Clone, Default)]
struct ProvisionArgs {
    /// Reprocess objects that are already complete.
    #[arg(long)]
    force: bool,

    /// Plan orders and tile counts without touching the network or disk.
    #[arg(long)]
    dry_run: bool,

    /// Restrict the run to these object ids.
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    only: Vec<String>,

    /// Concurrent tile downloads per object.
    #[arg(long)]
    jobs: Option<usize>,

    #[arg(long)]
    layout: Option<TileLayout>,

    #[arg(long)]
    format: Option<TileFormat>,
}

#[derive(Args)]
struct CatalogArgs {
    /// Path prefix of each overlay directory as seen by the viewer.
    #[arg(long, default_value = "hips")]
    prefix: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HipsError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HipsError) -> u8 {
    match error {
        HipsError::MissingWorkingDir(_)
        | HipsError::CatalogRead(_)
        | HipsError::CatalogParse(_)
        | HipsError::EmptyCatalog
        | HipsError::DuplicateId(_)
        | HipsError::InvalidRecord { .. }
        | HipsError::UnknownDso(_)
        | HipsError::InvalidDsoId(_)
        | HipsError::ConfigRead(_)
        | HipsError::ConfigParse(_)
        | HipsError::InvalidConfig(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Some(Commands::Provision(ref args)) => run_provision(&cli, args.clone(), output_mode),
        None => run_provision(&cli, ProvisionArgs::default(), output_mode),
        Some(Commands::Status) => run_status(&cli, output_mode),
        Some(Commands::Catalog(ref args)) => run_catalog(&cli, args),
    }
}

fn resolve_config(cli: &Cli, overrides: ConfigOverrides) -> Result<ResolvedConfig, HipsError> {
    let overrides = ConfigOverrides {
        catalog: cli.catalog.clone(),
        ..overrides
    };
    ConfigLoader::resolve(cli.config.as_deref(), &overrides)
}

fn run_provision(cli: &Cli, args: ProvisionArgs, output_mode: OutputMode) -> miette::Result<()> {
    let only = args
        .only
        .iter()
        .map(|value| value.parse::<DsoId>())
        .collect::<Result<Vec<_>, _>>()?;
    let config = resolve_config(
        cli,
        ConfigOverrides {
            tile_format: args.format,
            layout: args.layout,
            workers: args.jobs,
            catalog: None,
        },
    )?;
    let records = catalog::load(config.catalog.as_deref())?;
    let options = ProvisionOptions {
        force: args.force,
        dry_run: args.dry_run,
        only,
        workers: config.workers,
    };
    let app = App::new(&config, HipsHttpClient::new()?);

    match output_mode {
        OutputMode::Json => {
            let result = app.provision(records, options, &JsonOutput)?;
            JsonOutput::print_provision(&result).into_diagnostic()?;
        }
        OutputMode::NonInteractive => {
            let result = app.provision(records, options, &TextOutput)?;
            TextOutput::print_provision(&result);
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::Provision);
            let result = tui.run(move |sink| app.provision(records, options, sink))?;
            tui.finish_provision(&result)?;
            TextOutput::print_provision(&result);
        }
    }
    Ok(())
}

fn run_status(cli: &Cli, output_mode: OutputMode) -> miette::Result<()> {
    let config = resolve_config(cli, ConfigOverrides::default())?;
    let records = catalog::load(config.catalog.as_deref())?;
    let app = App::new(&config, NoNetwork);

    match output_mode {
        OutputMode::Json => {
            let result = app.status(&records, &JsonOutput)?;
            JsonOutput::print_status(&result).into_diagnostic()?;
        }
        OutputMode::NonInteractive => {
            let result = app.status(&records, &TextOutput)?;
            TextOutput::print_status(&result);
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::Status);
            let result = tui.run(move |sink| app.status(&records, sink))?;
            tui.finish_status(&result)?;
            TextOutput::print_status(&result);
        }
    }
    Ok(())
}

fn run_catalog(cli: &Cli, args: &CatalogArgs) -> miette::Result<()> {
    let config = resolve_config(cli, ConfigOverrides::default())?;
    let records = catalog::load(config.catalog.as_deref())?;
    let entries = catalog::overlay_list(&records, &args.prefix);
    JsonOutput::print_overlay(&entries).into_diagnostic()?;
    Ok(())
}

/// Status never downloads anything.
struct NoNetwork;

impl TileSource for NoNetwork {
    fn get(&self, _url: &str, _timeout: Duration) -> Result<HttpReply, HipsError> {
        Err(HipsError::Http("network disabled for this command".to_string()))
    }
}
