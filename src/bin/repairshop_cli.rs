use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use repairshop_api::{
    common::DateRangeParams,
    config::{self, AppConfig},
    db::{self, DbPool},
    events::{Event, EventSender},
    services::{costing::CostingService, reports::ReportService},
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::RefreshJobCosting => {
            let summary = context
                .costing_service()
                .refresh_all_job_costings()
                .await
                .context("job costing refresh failed")?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!(
                    "Refreshed {} job costing snapshots ({} failed)",
                    summary.refreshed, summary.failed
                );
            }
        }
        Commands::Recompute { id } => {
            let ro = context
                .costing_service()
                .recompute(id)
                .await
                .with_context(|| format!("failed to recompute repair order {}", id))?;
            if cli.json {
                print_json(&ro)?;
            } else {
                println!(
                    "{} • parts {} • labor {} • other {} • total {} • margin {}",
                    ro.name,
                    ro.parts_cost,
                    ro.labor_cost,
                    ro.other_charges,
                    ro.total_job_cost,
                    ro.gross_margin
                );
            }
        }
        Commands::Report(command) => handle_report_command(&context, command, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "repairshop-cli",
    version,
    about = "Maintenance and reporting commands for the repair shop API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Rebuild every Job Costing snapshot
    RefreshJobCosting,
    /// Recompute the costs of one repair order
    Recompute { id: Uuid },
    #[command(subcommand)]
    Report(ReportCommands),
}

#[derive(Subcommand)]
enum ReportCommands {
    JobProfitability {
        #[arg(long)]
        customer: Option<String>,
    },
    PartsConsumption(RangeArgs),
    TechnicianUtilization {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        employee: Option<String>,
    },
    WipAging,
    RepeatRepairs {
        #[arg(long)]
        days: Option<u32>,
    },
    VehicleTimeline {
        vehicle: String,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// Inclusive start date, YYYY-MM-DD
    #[arg(long)]
    from: Option<String>,
    /// Inclusive end date, YYYY-MM-DD
    #[arg(long)]
    to: Option<String>,
}

impl RangeArgs {
    fn to_params(&self) -> DateRangeParams {
        DateRangeParams::new(self.from.as_deref(), self.to.as_deref())
    }
}

async fn handle_report_command(
    context: &CliContext,
    command: ReportCommands,
    json: bool,
) -> Result<()> {
    let reports = context.report_service();
    let now = Utc::now();

    match command {
        ReportCommands::JobProfitability { customer } => {
            let report = reports.job_profitability(customer.as_deref()).await?;
            if json {
                return print_json(&report);
            }
            for row in &report.rows {
                println!(
                    "- {} • {} • invoiced {} • cost {} • profit {}",
                    row.repair_order, row.customer, row.invoiced, row.actual, row.profit
                );
            }
        }
        ReportCommands::PartsConsumption(range) => {
            let report = reports.parts_consumption(&range.to_params()).await?;
            if json {
                return print_json(&report);
            }
            for row in &report.rows {
                println!(
                    "- {} • {} x {} @ {} = {} ({})",
                    row.repair_order,
                    row.item_code,
                    row.qty,
                    row.valuation_rate,
                    row.extended_cost,
                    row.billable
                );
            }
        }
        ReportCommands::TechnicianUtilization { range, employee } => {
            let report = reports
                .technician_utilization(&range.to_params(), employee.as_deref())
                .await?;
            if json {
                return print_json(&report);
            }
            for row in &report.rows {
                println!(
                    "- {} • logged {}h of {}h • utilization {}% • efficiency {}%",
                    row.employee,
                    row.logged_hours,
                    row.capacity_hours,
                    row.utilization,
                    row.efficiency
                );
            }
        }
        ReportCommands::WipAging => {
            let report = reports.wip_aging(now).await?;
            if json {
                return print_json(&report);
            }
            for row in &report.rows {
                println!(
                    "- {} • {} • {} days ({})",
                    row.repair_order, row.status, row.days_in_status, row.bucket
                );
            }
        }
        ReportCommands::RepeatRepairs { days } => {
            let days = days.unwrap_or(context.config.repeat_repair_window_days);
            let report = reports.repeat_repairs(days, now).await?;
            if json {
                return print_json(&report);
            }
            for row in &report.rows {
                println!(
                    "- {} • {} ({}) -> {} ({}) after {} days",
                    row.vehicle,
                    row.first_ro,
                    row.first_date,
                    row.return_ro,
                    row.return_date,
                    row.days_between
                );
            }
        }
        ReportCommands::VehicleTimeline { vehicle } => {
            let points = reports.vehicle_timeline(&vehicle, now).await?;
            if json {
                return print_json(&points);
            }
            for point in &points {
                println!("- {} • {}", point.date, point.repair_orders);
            }
        }
    }

    Ok(())
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(32);
        let event_sender = EventSender::new(event_tx);

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!(target: "repairshop_cli", event = ?event, "received async event");
            }
        });

        Ok(Self {
            config,
            db,
            event_sender,
        })
    }

    fn costing_service(&self) -> CostingService {
        CostingService::new(self.db.clone(), self.event_sender.clone())
    }

    fn report_service(&self) -> ReportService {
        ReportService::new(
            self.db.clone(),
            self.config.workday_hours,
            self.config.weekly_capacity_hours,
        )
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
