use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use gdc_expression_matrix::app::{App, RunSummary};
use gdc_expression_matrix::config::{ConfigLoader, DEFAULT_CONFIG_FILE, ResolvedConfig};
use gdc_expression_matrix::error::GdcEmError;
use gdc_expression_matrix::gdc::GdcHttpClient;
use gdc_expression_matrix::output::{JsonOutput, TraceSink};

#[derive(Parser)]
#[command(name = "gdc-em")]
#[command(about = "Tumor/normal RNA-Seq expression matrices from the NCI GDC open-access API")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query, download and assemble matrices for the configured sites")]
    Fetch(FetchArgs),
    #[command(about = "Print the resolved site list")]
    Sites(ConfigArgs),
    #[command(about = "Write a starter gdc-em.json with the default site list")]
    Init(InitArgs),
}

#[derive(Args, Clone, Default)]
struct FetchArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long = "site", help = "Override the configured sites (repeatable)")]
    sites: Vec<String>,

    #[arg(long)]
    output_root: Option<String>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    site_timeout_secs: Option<u64>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct InitArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    path: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(gdc) = report.downcast_ref::<GdcEmError>() {
            return ExitCode::from(map_exit_code(gdc));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GdcEmError) -> u8 {
    match error {
        GdcEmError::MissingConfig(_) | GdcEmError::ConfigRead(_) | GdcEmError::ConfigParse(_) => 2,
        GdcEmError::Http(_)
        | GdcEmError::Retrieval { .. }
        | GdcEmError::RetrievalStatus { .. }
        | GdcEmError::Fetch { .. }
        | GdcEmError::FetchStatus { .. } => 3,
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
    match cli.command {
        Some(Commands::Fetch(args)) => run_fetch(args),
        Some(Commands::Sites(args)) => run_sites(args),
        Some(Commands::Init(args)) => run_init(args),
        None => run_fetch(FetchArgs::default()),
    }
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let mut resolved = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    apply_overrides(&mut resolved, &args);

    let client = GdcHttpClient::new().into_diagnostic()?;
    let app = App::new(client);
    let summary = app.run(&resolved, &TraceSink);

    if args.json {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    } else {
        print_run_summary(&summary);
    }
    Ok(())
}

fn apply_overrides(resolved: &mut ResolvedConfig, args: &FetchArgs) {
    if !args.sites.is_empty() {
        resolved.sites = args.sites.clone();
    }
    if let Some(output_root) = &args.output_root {
        resolved.output_root = camino::Utf8PathBuf::from(output_root);
    }
    if let Some(workers) = args.workers {
        resolved.workers = workers.max(1);
    }
    if let Some(secs) = args.site_timeout_secs {
        resolved.site_timeout = Some(std::time::Duration::from_secs(secs));
    }
}

fn run_sites(args: ConfigArgs) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    for site in &resolved.sites {
        println!("{site}");
    }
    Ok(())
}

fn run_init(args: InitArgs) -> miette::Result<()> {
    ConfigLoader::write_starter(&args.path).into_diagnostic()?;
    println!("wrote starter config to {}", args.path);
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    for site in &summary.sites {
        if site.retrieval_failed {
            println!("{red}✗ {}: metadata query failed, site skipped{reset}", site.site);
            continue;
        }
        println!(
            "{green}✓ {}: {} files, {} samples assembled, {} written{reset}",
            site.site,
            site.files_found,
            site.samples_assembled,
            site.outputs.len()
        );
        if site.unclassified > 0 {
            println!(
                "{yellow}  {} samples neither tumor nor normal, excluded{reset}",
                site.unclassified
            );
        }
        for skip in &site.skipped {
            println!(
                "{yellow}  skipped {} ({}): {}{reset}",
                skip.sample_id, skip.file_id, skip.reason
            );
        }
        for failure in &site.export_failures {
            println!("{red}  {failure}{reset}");
        }
    }
    println!(
        "done: {} sites, {} failed, {} samples skipped",
        summary.sites.len(),
        summary.sites_failed(),
        summary.samples_skipped()
    );
}
