use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod asset;
mod error;
mod layout;
mod lexer;
mod propagate;
mod report;
mod settings;

use layout::{ProjectLayout, SetupConfig};
use report::RunReport;
use settings::{BuildTargetGroup, DefineChange};

#[derive(Parser)]
#[command(name = "pickplace-setup")]
#[command(version)]
#[command(about = "Prepare the Pick and Place tutorial project for integration tests")]
struct Cli {
    /// Tutorial root; defaults to ../tutorials/pick_and_place next to the executable
    #[arg(long)]
    root: Option<PathBuf>,
    /// Build target group whose scripting defines receive the marker
    #[arg(long, value_enum, default_value_t = BuildTargetGroup::Standalone)]
    group: BuildTargetGroup,
    /// Report what would change without touching any file
    #[arg(long)]
    dry_run: bool,
    /// Write a JSON summary of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,
    /// Verbose logging (RUST_LOG takes precedence when set)
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(config: &SetupConfig, report: &mut RunReport) -> Result<()> {
    let layout = &config.layout;
    info!(
        root = %layout.root.display(),
        project = %layout.project_dir.display(),
        dry_run = config.dry_run,
        "preparing tutorial project"
    );

    let propagation = propagate::propagate(
        &layout.external_scripts_dir,
        &layout.project_scripts_dir,
        &config.pattern,
        config.dry_run,
    )
    .context("copying external scripts")?;
    report.record_propagation(&propagation);
    let propagation = propagation.into_result().context("copying external scripts")?;
    println!(
        "{} {} script(s) into {}",
        if config.dry_run { "would copy" } else { "copied" },
        propagation.copied.len(),
        layout.project_scripts_dir.display()
    );

    let patch = settings::patch_settings(&layout.settings_file, &config.marker, config.group, config.dry_run)
        .context("patching project settings")?;
    let verb = match (&patch.change, config.dry_run) {
        (DefineChange::Unchanged { .. }, _) => "already contains",
        (_, true) => "would become",
        (_, false) => "now",
    };
    println!(
        "scriptingDefineSymbols[{}] {} {}",
        config.group.name(),
        verb,
        patch.change.after()
    );
    report.settings = Some(patch);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = option_env!("GIT_HASH").unwrap_or("unknown"),
        tree = env!("GIT_DIRTY"),
        built = env!("BUILD_UNIX"),
        "pickplace-setup starting"
    );

    let layout = match cli.root {
        Some(root) => ProjectLayout::from_root(root),
        None => ProjectLayout::beside_executable().context("locating tutorial root")?,
    };
    let mut config = SetupConfig::new(layout);
    config.group = cli.group;
    config.dry_run = cli.dry_run;

    let mut report = RunReport::new(&config.layout.root, config.dry_run);
    let outcome = run(&config, &mut report);
    report.finish(&outcome);
    if let Some(path) = &cli.report {
        match (report.write_json(path), &outcome) {
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(_)) => error!(error = %format!("{:#}", e), "could not write run report"),
            (Ok(()), _) => {}
        }
    }
    outcome
}
