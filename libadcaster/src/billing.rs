//! Usage ledger and prepaid balances
//!
//! Every billable operation passes through [`UsageLedger::record_usage`]
//! before it runs. Operations covered by the tenant's plan allowance for the
//! current calendar month are recorded without touching the balance; anything
//! else is debited from the prepaid balance or refused.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tracing::{debug, info};

use crate::config::BillingConfig;
use crate::db::Database;
use crate::error::{BillingError, Result};
use crate::types::{Allowance, Balance, Plan, Tenant, Transaction, TxKind, UsageEntry, UsageType};

/// Per-unit rates. Unknown or unmapped operations fall back to the base rate.
#[derive(Debug, Clone)]
pub struct BillingRates {
    pub post: f64,
    pub image_generation: f64,
    pub analytics: f64,
    pub scheduled_post: f64,
}

impl BillingRates {
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            post: config.post_rate,
            image_generation: config.image_generation_rate,
            analytics: config.analytics_rate,
            scheduled_post: config.scheduled_post_rate,
        }
    }

    pub fn rate(&self, usage_type: UsageType) -> f64 {
        match usage_type {
            UsageType::Post => self.post,
            UsageType::ImageGeneration => self.image_generation,
            UsageType::Analytics => self.analytics,
            UsageType::ScheduledPost => self.scheduled_post,
        }
    }
}

impl Default for BillingRates {
    fn default() -> Self {
        Self::from_config(&BillingConfig::default())
    }
}

#[derive(Clone)]
pub struct UsageLedger {
    db: Database,
    rates: BillingRates,
}

impl UsageLedger {
    pub fn new(db: Database, rates: BillingRates) -> Self {
        Self { db, rates }
    }

    /// Record one billable operation, all-or-nothing.
    ///
    /// The whole quantity is either covered by the plan allowance or charged
    /// to the balance; a request that straddles the allowance line is charged
    /// in full. Returns the appended ledger entry. On an insufficient balance
    /// nothing is written.
    pub async fn record_usage(
        &self,
        tenant: &Tenant,
        usage_type: UsageType,
        quantity: i64,
    ) -> Result<UsageEntry> {
        if quantity < 1 {
            return Err(crate::error::AdcasterError::InvalidInput(format!(
                "Usage quantity must be at least 1, got {}",
                quantity
            )));
        }

        let amount = self.rates.rate(usage_type) * quantity as f64;

        let since = month_start(Utc::now());
        let current = self
            .db
            .usage_since(&tenant.id, usage_type, since)
            .await?;

        let covered = tenant.plan != Plan::Free
            && plan_allowance(tenant.plan, usage_type).covers(current + quantity);

        if covered {
            let entry = UsageEntry::new(tenant.id.clone(), usage_type, quantity, amount, true);
            self.db.insert_usage(&entry).await?;
            debug!(
                tenant = %tenant.id,
                usage = %usage_type,
                quantity,
                "usage covered by plan allowance"
            );
            return Ok(entry);
        }

        let balance = self.db.get_balance(&tenant.id).await?;
        if balance.balance < amount {
            return Err(BillingError::InsufficientBalance {
                required: amount,
                available: balance.balance,
            }
            .into());
        }

        // Floating-point debits are clamped so rounding can never take the
        // stored balance below zero
        let remaining = (balance.balance - amount).max(0.0);
        self.db.set_balance(&tenant.id, remaining).await?;

        let tx = Transaction::new(
            tenant.id.clone(),
            TxKind::Debit,
            amount,
            format!("{} x{}", usage_type, quantity),
        );
        self.db.insert_transaction(&tx).await?;

        let entry = UsageEntry::new(tenant.id.clone(), usage_type, quantity, amount, false);
        self.db.insert_usage(&entry).await?;

        info!(
            tenant = %tenant.id,
            usage = %usage_type,
            quantity,
            amount,
            remaining,
            "usage charged to balance"
        );
        Ok(entry)
    }

    /// Read a tenant's balance, creating the zero row on first touch
    pub async fn get_balance(&self, tenant_id: &str) -> Result<Balance> {
        self.db.get_balance(tenant_id).await
    }

    /// Credit the prepaid balance. The amount must be positive.
    pub async fn add_funds(
        &self,
        tenant_id: &str,
        amount: f64,
        description: &str,
    ) -> Result<Balance> {
        if amount <= 0.0 {
            return Err(crate::error::AdcasterError::InvalidInput(format!(
                "Top-up amount must be positive, got {}",
                amount
            )));
        }

        let balance = self.db.get_balance(tenant_id).await?;
        let updated = balance.balance + amount;
        self.db.set_balance(tenant_id, updated).await?;

        let tx = Transaction::new(
            tenant_id.to_string(),
            TxKind::Credit,
            amount,
            description.to_string(),
        );
        self.db.insert_transaction(&tx).await?;

        info!(tenant = %tenant_id, amount, balance = updated, "funds added");
        self.db.get_balance(tenant_id).await
    }

    /// Entry point for a completed checkout notification from the payment
    /// provider; forwards the settled amount to the balance.
    pub async fn apply_checkout_completed(&self, tenant_id: &str, amount: f64) -> Result<Balance> {
        self.add_funds(tenant_id, amount, "checkout completed").await
    }

    /// The most recent ledger entries, newest first
    pub async fn usage_history(&self, tenant_id: &str) -> Result<Vec<UsageEntry>> {
        self.db.usage_history(tenant_id, 100).await
    }
}

/// Allowance the plan grants for one usage type.
///
/// Scheduled posts are never plan-covered; scheduling is a plan feature but
/// each run is metered against the balance.
fn plan_allowance(plan: Plan, usage_type: UsageType) -> Allowance {
    let limits = plan.limits();
    match usage_type {
        UsageType::Post => limits.monthly_posts,
        UsageType::ImageGeneration => limits.image_generation,
        UsageType::Analytics => limits.analytics_reports,
        UsageType::ScheduledPost => Allowance::Limited(0),
    }
}

/// Start of the current calendar month (UTC) as unix seconds
fn month_start(now: DateTime<Utc>) -> i64 {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp())
        .unwrap_or(0)
}
