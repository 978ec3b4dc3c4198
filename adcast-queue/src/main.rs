//! adcast-queue - Manage tenants, products, schedules, and billing
//!
//! Unix-style tool for driving the Adcaster pipeline from the command line.

use clap::{Parser, Subcommand};
use libadcaster::scheduler::ScheduleOutcome;
use libadcaster::types::{Recurrence, ScheduleStatus, TxKind};
use libadcaster::{AdFormat, AdcasterError, Config, Plan, Product, Result, SchedulerState, Tenant};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "adcast-queue")]
#[command(version)]
#[command(about = "Manage tenants, products, schedules, and billing")]
#[command(long_about = "\
adcast-queue - Manage tenants, products, schedules, and billing

DESCRIPTION:
    adcast-queue is a Unix-style tool for driving the Adcaster ad pipeline.
    Use it to manage tenants and their product catalogs, publish or schedule
    ads, top up prepaid balances, and pull engagement reports.

COMMANDS:
    tenant      Create and inspect tenants
    product     Manage a tenant's product catalog
    post        Assemble and publish an ad immediately
    schedule    Schedule an ad for later publishing
    list        List a tenant's schedule entries
    cancel      Cancel a pending schedule entry
    auto        Auto-schedule a campaign over the coming days
    balance     Show the prepaid balance
    topup       Credit the prepaid balance
    usage       Show recent metered usage
    report      Build an engagement report

USAGE EXAMPLES:
    # Create a tenant on the starter plan
    adcast-queue tenant add \"Acme Outdoor\" --plan starter

    # Add a product to its catalog
    adcast-queue product add --tenant <ID> \"Solar Lantern\" \\
        --description \"Compact lantern for camping\" \\
        --features \"solar charging,waterproof\" --audience \"campers\"

    # Publish right now
    adcast-queue post --tenant <ID> --product <PID> --platform facebook

    # Publish every day at a random daytime hour
    adcast-queue schedule --tenant <ID> --product <PID> \\
        --platform twitter --when daily

    # Top up and check the balance
    adcast-queue topup --tenant <ID> 25.00
    adcast-queue balance --tenant <ID>

CONFIGURATION:
    Configuration file: ~/.config/adcaster/config.toml
    Database location: ~/.local/share/adcaster/adcaster.db

    Override with environment variables:
        ADCASTER_CONFIG    - Path to config file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Platform or configuration error
    3 - Invalid input (bad ID, time format, etc.)
    4 - Insufficient balance

For more information, visit: https://github.com/adcaster/adcaster
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and inspect tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// Manage a tenant's product catalog
    Product {
        #[command(subcommand)]
        command: ProductCommands,
    },

    /// Assemble and publish an ad immediately
    Post {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Product ID
        #[arg(long)]
        product: String,

        /// Target platform (e.g. facebook, twitter)
        #[arg(long)]
        platform: String,

        /// Ad format: text or image
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Schedule an ad for later publishing
    Schedule {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Product ID
        #[arg(long)]
        product: String,

        /// Target platform
        #[arg(long)]
        platform: String,

        /// Ad format: text or image
        #[arg(long, default_value = "text")]
        format: String,

        /// When to publish: now, at:HH:MM, date:YYYY-MM-DD HH:MM, daily, in:DURATION
        #[arg(long)]
        when: String,

        /// Recurrence: once, daily, weekly, monthly
        #[arg(long, default_value = "once")]
        recurrence: String,
    },

    /// List a tenant's schedule entries
    List {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Filter by status: scheduled, completed, failed, cancelled
        #[arg(long)]
        status: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cancel a pending schedule entry
    Cancel {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Schedule ID to cancel
        schedule_id: String,
    },

    /// Auto-schedule a campaign over the coming days
    Auto {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Product ID
        #[arg(long)]
        product: String,

        /// Number of days to cover
        #[arg(long, default_value = "7")]
        days: u32,

        /// Ad format: text or image
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show the prepaid balance
    Balance {
        /// Tenant ID
        #[arg(long)]
        tenant: String,
    },

    /// Credit the prepaid balance
    Topup {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Amount to credit
        amount: f64,
    },

    /// Show recent metered usage
    Usage {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Also list balance transactions
        #[arg(long)]
        transactions: bool,
    },

    /// Build an engagement report
    Report {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Restrict to one product
        #[arg(long)]
        product: Option<String>,

        /// Restrict to one platform
        #[arg(long)]
        platform: Option<String>,

        /// Trailing window in days
        #[arg(long, default_value = "30")]
        days: i64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Create a tenant
    Add {
        /// Tenant name
        name: String,

        /// Plan: free, starter, business, enterprise
        #[arg(long, default_value = "free")]
        plan: String,
    },

    /// Show a tenant
    Show {
        /// Tenant ID
        #[arg(long)]
        tenant: String,
    },

    /// Change a tenant's plan
    Plan {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// New plan: free, starter, business, enterprise
        plan: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProductCommands {
    /// Add a product to the catalog
    Add {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Product name
        name: String,

        /// Product description
        #[arg(long)]
        description: String,

        /// Comma-separated feature list
        #[arg(long, default_value = "")]
        features: String,

        /// Target audience
        #[arg(long)]
        audience: String,

        /// Product category
        #[arg(long)]
        category: Option<String>,
    },

    /// List the catalog
    List {
        /// Tenant ID
        #[arg(long)]
        tenant: String,
    },

    /// Remove a product
    Remove {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Product ID to remove
        product_id: String,
    },

    /// Search the catalog by name, description, or feature
    Search {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Search query
        query: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // CLI output stays on stdout; diagnostics default to errors only
    libadcaster::logging::init_for_binary(cli.verbose, "error");

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let state = SchedulerState::from_config(&config).await?;

    match cli.command {
        Commands::Tenant { command } => cmd_tenant(&state, command).await?,
        Commands::Product { command } => cmd_product(&state, command).await?,
        Commands::Post {
            tenant,
            product,
            platform,
            format,
        } => cmd_post(&state, &tenant, &product, &platform, &format).await?,
        Commands::Schedule {
            tenant,
            product,
            platform,
            format,
            when,
            recurrence,
        } => cmd_schedule(&state, &tenant, &product, &platform, &format, &when, &recurrence).await?,
        Commands::List {
            tenant,
            status,
            format,
        } => cmd_list(&state, &tenant, status.as_deref(), &format).await?,
        Commands::Cancel {
            tenant,
            schedule_id,
        } => cmd_cancel(&state, &tenant, &schedule_id).await?,
        Commands::Auto {
            tenant,
            product,
            days,
            format,
        } => cmd_auto(&state, &tenant, &product, days, &format).await?,
        Commands::Balance { tenant } => cmd_balance(&state, &tenant).await?,
        Commands::Topup { tenant, amount } => cmd_topup(&state, &tenant, amount).await?,
        Commands::Usage {
            tenant,
            transactions,
        } => cmd_usage(&state, &tenant, transactions).await?,
        Commands::Report {
            tenant,
            product,
            platform,
            days,
            format,
        } => {
            cmd_report(
                &state,
                &tenant,
                product.as_deref(),
                platform.as_deref(),
                days,
                &format,
            )
            .await?
        }
    }

    Ok(())
}

/// Load a tenant or fail with a usable message
async fn require_tenant(state: &SchedulerState, tenant_id: &str) -> Result<Tenant> {
    state
        .db()
        .get_tenant(tenant_id)
        .await?
        .ok_or_else(|| AdcasterError::InvalidInput(format!("Tenant not found: {}", tenant_id)))
}

fn parse_format(format: &str) -> Result<AdFormat> {
    AdFormat::from_str(format).map_err(AdcasterError::InvalidInput)
}

fn validate_output_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(AdcasterError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

async fn cmd_tenant(state: &SchedulerState, command: TenantCommands) -> Result<()> {
    match command {
        TenantCommands::Add { name, plan } => {
            if name.trim().is_empty() {
                return Err(AdcasterError::InvalidInput(
                    "Tenant name cannot be empty".to_string(),
                ));
            }
            let plan = Plan::from_str(&plan).map_err(AdcasterError::InvalidInput)?;
            let tenant = Tenant::new(name, plan);
            state.db().create_tenant(&tenant).await?;
            println!("{}", tenant.id);
        }
        TenantCommands::Show { tenant } => {
            let tenant = require_tenant(state, &tenant).await?;
            let balance = state.ledger().get_balance(&tenant.id).await?;
            println!("id:      {}", tenant.id);
            println!("name:    {}", tenant.name);
            println!("plan:    {}", tenant.plan);
            println!("balance: {:.2}", balance.balance);
        }
        TenantCommands::Plan { tenant, plan } => {
            let tenant = require_tenant(state, &tenant).await?;
            let plan = Plan::from_str(&plan).map_err(AdcasterError::InvalidInput)?;
            state.db().update_tenant_plan(&tenant.id, plan).await?;
            println!("{} -> {}", tenant.plan, plan);
        }
    }
    Ok(())
}

async fn cmd_product(state: &SchedulerState, command: ProductCommands) -> Result<()> {
    match command {
        ProductCommands::Add {
            tenant,
            name,
            description,
            features,
            audience,
            category,
        } => {
            let tenant = require_tenant(state, &tenant).await?;
            if name.trim().is_empty() {
                return Err(AdcasterError::InvalidInput(
                    "Product name cannot be empty".to_string(),
                ));
            }
            let features: Vec<String> = features
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
            let product = Product::new(tenant.id, name, description, features, audience, category);
            state.db().create_product(&product).await?;
            println!("{}", product.id);
        }
        ProductCommands::List { tenant } => {
            let tenant = require_tenant(state, &tenant).await?;
            for product in state.db().list_products(&tenant.id).await? {
                println!("{} | {} | {}", product.id, product.name, product.description);
            }
        }
        ProductCommands::Remove { tenant, product_id } => {
            let tenant = require_tenant(state, &tenant).await?;
            let removed = state.db().delete_product(&tenant.id, &product_id).await?;
            if !removed {
                return Err(AdcasterError::InvalidInput(format!(
                    "Product not found: {}",
                    product_id
                )));
            }
            println!("removed {}", product_id);
        }
        ProductCommands::Search { tenant, query } => {
            let tenant = require_tenant(state, &tenant).await?;
            for product in state.db().search_products(&tenant.id, &query).await? {
                println!("{} | {} | {}", product.id, product.name, product.description);
            }
        }
    }
    Ok(())
}

async fn cmd_post(
    state: &SchedulerState,
    tenant_id: &str,
    product_id: &str,
    platform: &str,
    format: &str,
) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;
    let format = parse_format(format)?;

    let outcome = state.create_post(&tenant, product_id, platform, format).await?;
    match outcome.post {
        Some(post) => println!(
            "{} | {} | published",
            post.id,
            outcome.result.post_id.as_deref().unwrap_or("-")
        ),
        None => println!(
            "failed: {}",
            outcome.result.error.as_deref().unwrap_or("unknown")
        ),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_schedule(
    state: &SchedulerState,
    tenant_id: &str,
    product_id: &str,
    platform: &str,
    format: &str,
    when: &str,
    recurrence: &str,
) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;
    let format = parse_format(format)?;
    let recurrence = Recurrence::from_str(recurrence).map_err(AdcasterError::InvalidInput)?;

    match state
        .schedule_post(&tenant, product_id, platform, format, when, recurrence)
        .await?
    {
        ScheduleOutcome::Immediate(outcome) => match outcome.post {
            Some(post) => println!("published | {}", post.id),
            None => println!(
                "failed | {}",
                outcome.result.error.as_deref().unwrap_or("unknown")
            ),
        },
        ScheduleOutcome::Scheduled(entry) => {
            println!("{} | next run {}", entry.id, format_timestamp(entry.next_run_at));
        }
    }
    Ok(())
}

async fn cmd_list(
    state: &SchedulerState,
    tenant_id: &str,
    status: Option<&str>,
    format: &str,
) -> Result<()> {
    validate_output_format(format)?;
    let tenant = require_tenant(state, tenant_id).await?;

    let status = match status {
        Some(s) => Some(ScheduleStatus::from_str(s).map_err(AdcasterError::InvalidInput)?),
        None => None,
    };
    let entries = state.db().list_schedules(&tenant.id, status).await?;

    if format == "json" {
        let json: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "product_id": e.product_id,
                    "platform": e.platform,
                    "format": e.format_type.as_str(),
                    "spec": e.spec,
                    "recurrence": e.recurrence.as_str(),
                    "status": e.status.as_str(),
                    "next_run_at": e.next_run_at,
                    "last_error": e.last_error,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
    } else {
        let now = chrono::Utc::now().timestamp();
        for entry in entries {
            println!(
                "{} | {} | {} | {} | {}",
                entry.id,
                entry.platform,
                entry.status,
                format_time_until(now, entry.next_run_at),
                entry.last_error.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

async fn cmd_cancel(state: &SchedulerState, tenant_id: &str, schedule_id: &str) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;
    let status = state.cancel_schedule(&tenant.id, schedule_id).await?;
    println!("{} | {}", schedule_id, status);
    Ok(())
}

async fn cmd_auto(
    state: &SchedulerState,
    tenant_id: &str,
    product_id: &str,
    days: u32,
    format: &str,
) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;
    let format = parse_format(format)?;

    let entries = state
        .auto_schedule_for_product(&tenant, product_id, format, days)
        .await?;
    for entry in &entries {
        println!(
            "{} | {} | {}",
            entry.id,
            entry.platform,
            format_timestamp(entry.next_run_at)
        );
    }
    println!("{} entries over {} day(s)", entries.len(), days);
    Ok(())
}

async fn cmd_balance(state: &SchedulerState, tenant_id: &str) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;
    let balance = state.ledger().get_balance(&tenant.id).await?;
    println!("{:.2}", balance.balance);
    Ok(())
}

async fn cmd_topup(state: &SchedulerState, tenant_id: &str, amount: f64) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;
    let balance = state
        .ledger()
        .add_funds(&tenant.id, amount, "manual topup")
        .await?;
    println!("{:.2}", balance.balance);
    Ok(())
}

async fn cmd_usage(state: &SchedulerState, tenant_id: &str, transactions: bool) -> Result<()> {
    let tenant = require_tenant(state, tenant_id).await?;

    for entry in state.ledger().usage_history(&tenant.id).await? {
        let covered = if entry.plan_covered { "plan" } else { "balance" };
        println!(
            "{} | {} x{} | {:.2} | {}",
            format_timestamp(entry.created_at),
            entry.usage_type,
            entry.quantity,
            entry.amount,
            covered
        );
    }

    if transactions {
        for tx in state.db().list_transactions(&tenant.id, 100).await? {
            let sign = match tx.kind {
                TxKind::Credit => "+",
                TxKind::Debit => "-",
            };
            println!(
                "{} | {}{:.2} | {}",
                format_timestamp(tx.created_at),
                sign,
                tx.amount,
                tx.description
            );
        }
    }
    Ok(())
}

async fn cmd_report(
    state: &SchedulerState,
    tenant_id: &str,
    product_id: Option<&str>,
    platform: Option<&str>,
    days: i64,
    format: &str,
) -> Result<()> {
    validate_output_format(format)?;
    let tenant = require_tenant(state, tenant_id).await?;

    let report = state
        .performance_report(&tenant, product_id, platform, days)
        .await?;

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else {
        println!("window:      {} day(s)", report.window_days);
        println!("total posts: {}", report.total_posts);
        println!("impressions: {}", report.totals.impressions);
        println!("clicks:      {}", report.totals.clicks);
        for (platform, totals) in &report.by_platform {
            println!(
                "  {} | {} post(s) | score {:.2}",
                platform,
                totals.posts,
                totals.score()
            );
        }
        if let Some(best) = &report.best_platform {
            println!("best:        {}", best);
        }
    }
    Ok(())
}

/// Format a unix timestamp as UTC wall time
fn format_timestamp(ts: i64) -> String {
    use chrono::TimeZone;
    chrono::Utc
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Format time until a future timestamp in human-readable form
fn format_time_until(now: i64, at: i64) -> String {
    let diff = at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
