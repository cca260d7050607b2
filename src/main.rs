use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;

use projects_sync::config::{Backend, CliOverrides, EnvValues, Settings, SyncConfig};
use projects_sync::error::SyncError;
use projects_sync::git::GitCloner;
use projects_sync::output::{Reporter, StepMessages};
use projects_sync::prompt::TerminalPrompter;
use projects_sync::reconcile::{Outcome, ReconcileOptions, Reconciler};
use projects_sync::remote::{GhCli, GithubApi, RemoteSource};
use projects_sync::store::ProjectStore;

/// Reconcile your GitHub repositories with a local SQLite project inventory.
///
/// Repositories missing from the database can be added (cloning them into
/// the working directory when no checkout exists). Database entries with no
/// matching repository are reported but never removed.
#[derive(Parser, Debug)]
#[command(
    name = "projects-sync",
    version,
    about,
    after_help = "Examples:\n  projects-sync\n  projects-sync --force --dir ~/code\n  projects-sync --backend api --limit 200\n  projects-sync --db ~/projects.sqlite --debug"
)]
struct Cli {
    /// Clone repositories without asking when no local folder matches.
    #[arg(long)]
    force: bool,

    /// Print full error causes.
    #[arg(long)]
    debug: bool,

    /// Path to the SQLite project database.
    #[arg(long = "db", value_name = "PATH")]
    database_path: Option<PathBuf>,

    /// Maximum number of GitHub repositories to fetch.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// How to talk to GitHub.
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Directory searched for checkouts and used as the clone target.
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            database_path: self.database_path.clone(),
            repo_limit: self.limit,
            backend: self.backend,
            debug: self.debug,
        }
    }
}

const OPEN_DB: StepMessages<'static> = StepMessages {
    initial: "Initializing database",
    success: "Database initialized",
    fail: "Failed to initialize database",
};

const CLOSE_DB: StepMessages<'static> = StepMessages {
    initial: "Closing database",
    success: "Database closed",
    fail: "Failed to close database",
};

fn load_settings(cli: &Cli, env: &EnvValues) -> Result<Settings> {
    let config = SyncConfig::load()?;
    config.resolve(&cli.overrides(), env)
}

fn build_remote(settings: &Settings) -> Result<Box<dyn RemoteSource>> {
    let remote: Box<dyn RemoteSource> = match settings.backend {
        Backend::Gh => Box::new(GhCli::default()),
        Backend::Api => Box::new(GithubApi::new(&settings.api_url, settings.token.clone())?),
    };
    Ok(remote)
}

fn run(cli: &Cli, settings: &Settings, reporter: &mut Reporter) -> Result<Outcome> {
    // Stored paths must be absolute, so a relative --dir is anchored at the cwd.
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let work_dir = match &cli.dir {
        Some(dir) => cwd.join(dir),
        None => cwd,
    };

    let store = reporter.timed(OPEN_DB, || {
        ProjectStore::open(&settings.database_path).map_err(|source| SyncError::StoreInit {
            path: settings.database_path.clone(),
            source,
        })
    })?;

    let remote = build_remote(settings)?;
    let mut prompter = TerminalPrompter;
    let options = ReconcileOptions {
        limit: settings.repo_limit,
        force: cli.force,
        work_dir,
    };

    // On error the store is released by Drop.
    let outcome = Reconciler::new(
        remote.as_ref(),
        &store,
        &mut prompter,
        &GitCloner::for_stdin(),
        reporter,
        options,
    )
    .run()?;

    reporter.timed(CLOSE_DB, || store.close())?;
    Ok(outcome)
}

fn main() {
    let cli = Cli::parse();
    let env = EnvValues::from_process();

    let settings = match load_settings(&cli, &env) {
        Ok(settings) => settings,
        Err(e) => {
            Reporter::stderr(cli.debug || env.debug_enabled()).fatal(&*e);
            process::exit(1);
        }
    };

    let mut reporter = Reporter::stderr(settings.debug);
    if let Err(e) = run(&cli, &settings, &mut reporter) {
        reporter.fatal(&*e);
        process::exit(1);
    }
}
