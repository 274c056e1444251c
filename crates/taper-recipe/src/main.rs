//! taper-recipe: CLI for running the routing taper design recipe

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use taper_recipe::config::{load_config, JobConfig};
use taper_recipe::report::render_report;
use taper_recipe::{ArtifactStore, RecordedSimulator, TaperDesignRecipe};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "taper-recipe")]
#[command(about = "Sweep taper profiles through recorded EME length sweeps and select the best design")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the recipe (skipped when stored results are up to date)
    Run {
        /// Job file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the working directory from the job file
        #[arg(long)]
        dirpath: Option<PathBuf>,

        /// Override the recorded sweep directory from the job file
        #[arg(long)]
        recordings: Option<PathBuf>,

        /// Re-run even if stored results match the configuration
        #[arg(long)]
        force: bool,

        /// Print the report to stdout instead of writing it next to the results
        #[arg(long)]
        stdout: bool,
    },
    /// Print the configuration fingerprint and whether stored results are stale
    Fingerprint {
        /// Job file (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_job(config: &Path) -> Result<(JobConfig, PathBuf)> {
    let job = load_config(config)
        .with_context(|| format!("Failed to read job file: {:?}", config))?;
    let base_dir = config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((job, base_dir))
}

fn run(
    config: &Path,
    dirpath: Option<PathBuf>,
    recordings: Option<PathBuf>,
    force: bool,
    stdout: bool,
) -> Result<()> {
    let (job, base_dir) = load_job(config)?;
    let recordings = recordings.unwrap_or_else(|| base_dir.join(&job.recipe.recordings));
    let mut recipe: TaperDesignRecipe = job.into_recipe(&base_dir)?;
    if let Some(dir) = dirpath {
        recipe.dirpath = dir;
    }
    fs::create_dir_all(&recipe.dirpath)
        .with_context(|| format!("Failed to create working directory: {:?}", recipe.dirpath))?;

    let simulator = RecordedSimulator::new(recordings);
    let store = ArtifactStore::in_dir(&recipe.dirpath);
    let (artifact, ran) = recipe
        .eval_cached(&simulator, &store, force)
        .context("Taper design recipe failed")?;

    let report = render_report(&recipe, &artifact.design)?;
    if stdout {
        println!("{}", report);
    } else {
        let path = recipe.dirpath.join("taper_recipe_report.txt");
        fs::write(&path, &report)
            .with_context(|| format!("Failed to write report: {:?}", path))?;
        eprintln!("Report: {:?}", path);
    }

    if ran {
        tracing::info!(results = ?store.path(), "Completed taper design recipe.");
    } else {
        tracing::info!(results = ?store.path(), "Taper design recipe already up to date.");
    }
    Ok(())
}

fn fingerprint(config: &Path) -> Result<()> {
    let (job, base_dir) = load_job(config)?;
    let recipe = job.into_recipe(&base_dir)?;
    let fp = recipe.fingerprint()?;
    let fresh = ArtifactStore::in_dir(&recipe.dirpath).is_fresh(&fp)?;
    println!("{}", fp);
    println!("{}", if fresh { "up to date" } else { "stale" });
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run {
            config,
            dirpath,
            recordings,
            force,
            stdout,
        } => run(&config, dirpath, recordings, force, stdout),
        Command::Fingerprint { config } => fingerprint(&config),
    }
}
