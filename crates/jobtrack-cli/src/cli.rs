use crate::commands;
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use jobtrack_core::AppConfig;
use jobtrack_db::Database;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "jobtrack", version)]
#[command(about = "Keep a job application sheet in sync with each posting's ATS page")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. Defaults to the XDG config location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one scan pass over the sheet
    Scan(ScanArgs),
    /// Run scan passes on an interval until interrupted
    Watch {
        #[command(flatten)]
        scan: ScanArgs,
        /// Minutes between the end of one pass and the start of the next
        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,
    },
    /// Import rows from a CSV sheet (URL, Company, Status, Platform, LastChecked)
    Import {
        path: PathBuf,
    },
    /// Export the sheet as CSV
    Export {
        path: PathBuf,
    },
    /// Counts by status and platform, plus recent passes
    Summary {
        /// Number of recent passes to show
        #[arg(long, default_value_t = 5)]
        runs: u32,
    },
    /// Inspect or reset cached tenant credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Visit every row, including ones with a terminal status
    #[arg(long, conflicts_with_all = ["platform", "id"])]
    pub all: bool,

    /// Only rows recorded under this platform (workday, greenhouse, lever, ...)
    #[arg(long)]
    pub platform: Option<String>,

    /// Only these application ids (repeatable)
    #[arg(long = "id", conflicts_with = "platform")]
    pub id: Vec<String>,

    /// Print the pass report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum CredentialsAction {
    /// Show which credential reference works for each tenant
    List,
    /// Forget the cached credential for a tenant
    Forget {
        tenant: String,
    },
}

pub async fn dispatch(args: Args) -> Result<()> {
    let config = AppConfig::load_with_env(args.config.as_deref()).context("load configuration")?;
    let db_path = config.database_path()?;
    debug!(path = %db_path.display(), "opening database");

    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("open database {}", db_path.display()))?;
    db.run_migrations().await.context("run migrations")?;

    let result = match args.cmd {
        Command::Scan(scan) => commands::scan::run_once(&config, &db, &scan).await,
        Command::Watch {
            scan,
            interval_minutes,
        } => commands::scan::watch(&config, &db, &scan, interval_minutes).await,
        Command::Import { path } => commands::sheet::import(&db, &path).await,
        Command::Export { path } => commands::sheet::export(&db, &path).await,
        Command::Summary { runs } => commands::sheet::summary(&db, runs).await,
        Command::Credentials { action } => match action {
            CredentialsAction::List => commands::credentials::list(&db).await,
            CredentialsAction::Forget { tenant } => {
                commands::credentials::forget(&db, &tenant).await
            }
        },
    };

    db.close().await;
    result
}
