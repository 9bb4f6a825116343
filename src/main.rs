use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use chrono::{Duration, Local, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use physically_lib::{
    enforcement::JsonFileShield,
    init_logging,
    ledger::{ProtectedSelection, Target},
    monitor::{BackgroundTrigger, ExpiryPoller, SESSION_ACTIVITY},
    AppContext, ContextRole,
};

const SHIELD_FILE: &str = "shield.json";

#[derive(Parser)]
#[command(name = "physically", version, about = "Exercise-gated app blocking")]
struct Cli {
    /// Directory holding the shared database, settings and shield file
    #[arg(long, env = "PHYSICALLY_DATA_DIR", default_value = ".physically")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OS callback: an interval schedule started
    IntervalStart {
        #[arg(long, default_value = SESSION_ACTIVITY)]
        activity: String,
    },
    /// OS callback: an interval schedule ended
    IntervalEnd {
        #[arg(long, default_value = SESSION_ACTIVITY)]
        activity: String,
    },
    /// OS callback: the warning threshold before an interval end
    Warning {
        #[arg(long, default_value = SESSION_ACTIVITY)]
        activity: String,
    },
    /// Expire due exemptions and recommit the shield
    Reconcile,
    /// Show the ledger and banked balance
    Status,
    /// Exempt a target (or every selected target) for a while
    Grant {
        /// `app:<id>` or `category:<id>`; omit for all selected targets
        #[arg(long)]
        target: Option<Target>,
        #[arg(long)]
        minutes: i64,
    },
    /// End an exemption early; without a target, end all of them
    Cancel {
        #[arg(long)]
        target: Option<Target>,
    },
    /// Spend banked minutes on an exemption
    Redeem {
        #[arg(long)]
        target: Option<Target>,
        #[arg(long)]
        minutes: f64,
    },
    /// Take the once-daily emergency minutes
    Debt,
    /// Replace the protected selection
    Select {
        #[arg(long = "app")]
        apps: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Run the foreground expiry poll until interrupted
    Poll,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    ledger: physically_lib::ledger::LedgerSnapshot,
    stats: physically_lib::db::UserStats,
    can_take_debt: bool,
}

async fn run(cli: Cli) -> Result<()> {
    let shield = Arc::new(JsonFileShield::new(cli.data_dir.join(SHIELD_FILE)));
    let (ctx, _events) =
        AppContext::open(&cli.data_dir, ContextRole::Background, shield, None).await?;
    let now = Utc::now();

    match cli.command {
        Commands::IntervalStart { activity } => {
            BackgroundTrigger::new(ctx.ledger.clone()).interval_did_start(&activity);
        }
        Commands::IntervalEnd { activity } => {
            let outcome = BackgroundTrigger::new(ctx.ledger.clone())
                .interval_did_end(&activity, now)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Warning { activity } => {
            let outcome = BackgroundTrigger::new(ctx.ledger.clone())
                .warning_threshold(&activity, now)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Reconcile => print_json(&ctx.ledger.reconcile(now).await?)?,
        Commands::Status => {
            let status = Status {
                ledger: ctx.ledger.snapshot(now).await?,
                stats: ctx.bank.stats().await?,
                can_take_debt: ctx.bank.can_take_debt(Local::now().date_naive()).await?,
            };
            print_json(&status)?;
        }
        Commands::Grant { target, minutes } => {
            let duration = Duration::try_minutes(minutes)
                .ok_or_else(|| anyhow!("--minutes {minutes} is out of range"))?;
            let snapshot = ctx.ledger.grant_exemption(target, duration, now).await?;
            print_json(&snapshot)?;
        }
        Commands::Cancel { target: Some(target) } => {
            print_json(&ctx.ledger.cancel_exemption(target, now).await?)?
        }
        Commands::Cancel { target: None } => print_json(&ctx.ledger.cancel_all(now).await?)?,
        Commands::Redeem { target, minutes } => {
            print_json(&ctx.bank.redeem(&ctx.ledger, target, minutes, now).await?)?
        }
        Commands::Debt => {
            let minutes = ctx.settings.get().debt_minutes;
            let outcome = ctx
                .bank
                .take_debt(Local::now().date_naive(), minutes)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Select { apps, categories } => {
            let selection = ProtectedSelection::from_targets(
                apps.into_iter()
                    .map(Target::application)
                    .chain(categories.into_iter().map(Target::category)),
            );
            print_json(&ctx.ledger.update_selection(selection, now).await?)?;
        }
        Commands::Poll => {
            let mut poller = ExpiryPoller::new();
            poller.start(ctx.ledger.clone(), ctx.settings.get().poll_interval())?;
            tokio::signal::ctrl_c().await?;
            poller.stop().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();
    log::info!("physically starting up...");

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
