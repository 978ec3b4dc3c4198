//! Scheduling and the publish pipeline
//!
//! [`SchedulerState`] is the hub the binaries share: it owns the database,
//! the usage ledger, the content assembler, the adapter registry, and the
//! analytics aggregator. The schedule table is the only source of truth;
//! the daemon recomputes the due set from it on every tick, so restarts and
//! concurrent CLI edits need no coordination.

use chrono::{DateTime, Datelike, Months, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsAggregator, PerformanceReport};
use crate::billing::{BillingRates, UsageLedger};
use crate::config::{Config, DefaultsConfig};
use crate::content::{finalize_for_platform, ContentAssembler};
use crate::db::Database;
use crate::error::{AdcasterError, BillingError, PlatformError, Result};
use crate::generator::OpenAiGenerator;
use crate::platforms::{build_adapters, PlatformAdapter};
use crate::types::{
    AdFormat, Post, PublishResult, Recurrence, ScheduleEntry, ScheduleStatus, Tenant, UsageType,
};

const DAY_SECS: i64 = 86_400;

/// How a schedule spec string was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecKind {
    /// Publish right away, nothing stored
    Now,
    /// First run at the given timestamp; `force_daily` when the spec itself
    /// implies a daily cadence
    FirstRun { at: i64, force_daily: bool },
}

/// Parse a schedule spec relative to `now`.
///
/// Accepted forms: `now`, `at:HH:MM` (next occurrence of a UTC wall time),
/// `date:YYYY-MM-DD HH:MM` (absolute UTC, must be in the future), `daily`
/// (a random time between 09:00 and 17:59 UTC, fixed at creation), and
/// `in:DURATION` (humantime syntax, e.g. `in:2h30m`).
fn parse_spec(spec: &str, now: DateTime<Utc>) -> Result<SpecKind> {
    if spec == "now" {
        return Ok(SpecKind::Now);
    }

    if let Some(time) = spec.strip_prefix("at:") {
        let (hour, minute) = parse_wall_time(time)?;
        let mut at = wall_time_today(now, hour, minute)?;
        if at <= now.timestamp() {
            at += DAY_SECS;
        }
        return Ok(SpecKind::FirstRun {
            at,
            force_daily: false,
        });
    }

    if let Some(date) = spec.strip_prefix("date:") {
        let parsed = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M").map_err(|_| {
            AdcasterError::InvalidInput(format!(
                "Invalid date spec: '{}'. Expected YYYY-MM-DD HH:MM",
                date
            ))
        })?;
        let at = parsed.and_utc().timestamp();
        if at <= now.timestamp() {
            return Err(AdcasterError::InvalidInput(format!(
                "Scheduled time '{}' is in the past",
                date
            )));
        }
        return Ok(SpecKind::FirstRun {
            at,
            force_daily: false,
        });
    }

    if spec == "daily" {
        let mut rng = rand::thread_rng();
        let hour = rng.gen_range(9..=17);
        let minute = rng.gen_range(0..=59);
        let mut at = wall_time_today(now, hour, minute)?;
        if at <= now.timestamp() {
            at += DAY_SECS;
        }
        return Ok(SpecKind::FirstRun {
            at,
            force_daily: true,
        });
    }

    if let Some(duration) = spec.strip_prefix("in:") {
        let parsed = humantime::parse_duration(duration).map_err(|e| {
            AdcasterError::InvalidInput(format!("Invalid duration '{}': {}", duration, e))
        })?;
        return Ok(SpecKind::FirstRun {
            at: now.timestamp() + parsed.as_secs() as i64,
            force_daily: false,
        });
    }

    Err(AdcasterError::InvalidInput(format!(
        "Invalid schedule spec: '{}'. Expected now, at:HH:MM, date:YYYY-MM-DD HH:MM, daily, or in:DURATION",
        spec
    )))
}

fn parse_wall_time(time: &str) -> Result<(u32, u32)> {
    let invalid = || {
        AdcasterError::InvalidInput(format!("Invalid time spec: '{}'. Expected HH:MM", time))
    };

    let (hour, minute) = time.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

fn wall_time_today(now: DateTime<Utc>, hour: u32, minute: u32) -> Result<i64> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), hour, minute, 0)
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| AdcasterError::InvalidInput(format!("Invalid time {:02}:{:02}", hour, minute)))
}

/// The next run after a completed one, or None for one-shot entries.
///
/// Daily and weekly advance by fixed spans so the wall time never drifts;
/// monthly follows the calendar (Jan 31 advances to Feb 28/29).
fn advance_next_run(next_run_at: i64, recurrence: Recurrence) -> Option<i64> {
    match recurrence {
        Recurrence::Once => None,
        Recurrence::Daily => Some(next_run_at + DAY_SECS),
        Recurrence::Weekly => Some(next_run_at + 7 * DAY_SECS),
        Recurrence::Monthly => Some(
            Utc.timestamp_opt(next_run_at, 0)
                .single()
                .and_then(|dt| dt.checked_add_months(Months::new(1)))
                .map(|dt| dt.timestamp())
                .unwrap_or(next_run_at + 30 * DAY_SECS),
        ),
    }
}

/// Result of a direct publish. `post` is only present when the platform
/// accepted the ad; failed attempts leave no post record.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub post: Option<Post>,
    pub result: PublishResult,
}

/// What `schedule_post` did with the request
#[derive(Debug, Clone)]
pub enum ScheduleOutcome {
    /// The spec was `now`; the post went out immediately
    Immediate(PublishOutcome),
    /// An entry was stored for the daemon to pick up
    Scheduled(ScheduleEntry),
}

/// Counters for one daemon tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum RunOutcome {
    Published,
    Failed,
    Skipped,
}

pub struct SchedulerState {
    db: Database,
    ledger: UsageLedger,
    assembler: ContentAssembler,
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
    analytics: AnalyticsAggregator,
    defaults: DefaultsConfig,
}

impl SchedulerState {
    pub fn new(
        db: Database,
        ledger: UsageLedger,
        assembler: ContentAssembler,
        adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
        defaults: DefaultsConfig,
    ) -> Self {
        let analytics = AnalyticsAggregator::new(db.clone());
        Self {
            db,
            ledger,
            assembler,
            adapters,
            analytics,
            defaults,
        }
    }

    /// Wire up the full pipeline from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let ledger = UsageLedger::new(db.clone(), BillingRates::from_config(&config.billing));

        let (generator, image_size) = match config.generator.clone() {
            Some(gen_config) => {
                let size = gen_config.image_size.clone();
                let generator: Arc<dyn crate::generator::ContentGenerator> =
                    Arc::new(OpenAiGenerator::new(gen_config));
                (Some(generator), size)
            }
            None => (None, "1024x1024".to_string()),
        };
        let assembler = ContentAssembler::new(generator, image_size);

        let adapters = build_adapters(config);
        Ok(Self::new(
            db,
            ledger,
            assembler,
            adapters,
            config.defaults.clone(),
        ))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Platforms with a configured adapter
    pub fn available_platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.adapters.keys().cloned().collect();
        platforms.sort();
        platforms
    }

    /// Assemble and publish one ad right now. Charges a post (and an image
    /// generation for image ads) before the publish attempt.
    pub async fn create_post(
        &self,
        tenant: &Tenant,
        product_id: &str,
        platform: &str,
        format: AdFormat,
    ) -> Result<PublishOutcome> {
        let product = self
            .db
            .get_product(&tenant.id, product_id)
            .await?
            .ok_or_else(|| {
                AdcasterError::InvalidInput(format!("Product not found: {}", product_id))
            })?;

        self.ledger
            .record_usage(tenant, UsageType::Post, 1)
            .await?;
        if format == AdFormat::Image {
            self.ledger
                .record_usage(tenant, UsageType::ImageGeneration, 1)
                .await?;
        }

        self.publish_once(tenant, &product.id, platform, format).await
    }

    /// Store a schedule entry, or publish immediately for the `now` spec.
    /// Scheduling is a paid-plan feature and only targets platforms with a
    /// configured adapter.
    pub async fn schedule_post(
        &self,
        tenant: &Tenant,
        product_id: &str,
        platform: &str,
        format: AdFormat,
        spec: &str,
        recurrence: Recurrence,
    ) -> Result<ScheduleOutcome> {
        if !tenant.plan.limits().scheduling {
            return Err(BillingError::PlanRestriction(tenant.plan.as_str().to_string()).into());
        }
        if self
            .db
            .get_product(&tenant.id, product_id)
            .await?
            .is_none()
        {
            return Err(AdcasterError::InvalidInput(format!(
                "Product not found: {}",
                product_id
            )));
        }
        if !self.adapters.contains_key(platform) {
            return Err(PlatformError::NotConfigured(platform.to_string()).into());
        }

        match parse_spec(spec, Utc::now())? {
            SpecKind::Now => {
                self.charge_scheduled_run(tenant, format).await?;
                let outcome = self.publish_once(tenant, product_id, platform, format).await?;
                Ok(ScheduleOutcome::Immediate(outcome))
            }
            SpecKind::FirstRun { at, force_daily } => {
                let recurrence = if force_daily {
                    Recurrence::Daily
                } else {
                    recurrence
                };
                let entry = ScheduleEntry::new(
                    tenant.id.clone(),
                    product_id.to_string(),
                    platform.to_string(),
                    format,
                    spec.to_string(),
                    recurrence,
                    at,
                );
                self.db.create_schedule(&entry).await?;
                info!(
                    schedule_id = %entry.id,
                    platform = %platform,
                    next_run_at = at,
                    "schedule created"
                );
                Ok(ScheduleOutcome::Scheduled(entry))
            }
        }
    }

    /// Spread one-shot entries over the coming days at random daytime hours,
    /// cycling through the configured platforms
    pub async fn auto_schedule_for_product(
        &self,
        tenant: &Tenant,
        product_id: &str,
        format: AdFormat,
        days: u32,
    ) -> Result<Vec<ScheduleEntry>> {
        if !tenant.plan.limits().scheduling {
            return Err(BillingError::PlanRestriction(tenant.plan.as_str().to_string()).into());
        }
        if days == 0 {
            return Err(AdcasterError::InvalidInput(
                "Auto-schedule needs at least one day".to_string(),
            ));
        }
        if self
            .db
            .get_product(&tenant.id, product_id)
            .await?
            .is_none()
        {
            return Err(AdcasterError::InvalidInput(format!(
                "Product not found: {}",
                product_id
            )));
        }

        // Prefer the configured default rotation, restricted to platforms
        // that actually have an adapter
        let mut platforms: Vec<String> = self
            .defaults
            .platforms
            .iter()
            .filter(|name| self.adapters.contains_key(name.as_str()))
            .cloned()
            .collect();
        if platforms.is_empty() {
            platforms = self.available_platforms();
        }
        if platforms.is_empty() {
            return Err(AdcasterError::InvalidInput(
                "No platforms configured for auto-scheduling".to_string(),
            ));
        }

        let now = Utc::now();
        let mut entries = Vec::new();
        let mut picked = 0usize;
        for day in 1..=days as i64 {
            for _ in 0..self.defaults.posts_per_day {
                let (hour, minute) = {
                    let mut rng = rand::thread_rng();
                    (rng.gen_range(9..=19), rng.gen_range(0..=59))
                };
                let at = wall_time_today(now, hour, minute)? + day * DAY_SECS;
                let platform = platforms[picked % platforms.len()].clone();
                picked += 1;

                let entry = ScheduleEntry::new(
                    tenant.id.clone(),
                    product_id.to_string(),
                    platform,
                    format,
                    format!("date:{}", format_timestamp(at)),
                    Recurrence::Once,
                    at,
                );
                self.db.create_schedule(&entry).await?;
                entries.push(entry);
            }
        }

        info!(count = entries.len(), days, "auto-schedule created");
        Ok(entries)
    }

    /// Cancel a pending entry. Cancelling an already terminal entry is a
    /// no-op that reports the current status.
    pub async fn cancel_schedule(
        &self,
        tenant_id: &str,
        schedule_id: &str,
    ) -> Result<ScheduleStatus> {
        let entry = self
            .db
            .get_schedule(tenant_id, schedule_id)
            .await?
            .ok_or_else(|| {
                AdcasterError::InvalidInput(format!("Schedule not found: {}", schedule_id))
            })?;

        if entry.status.is_terminal() {
            return Ok(entry.status);
        }

        self.db
            .update_schedule_status(schedule_id, ScheduleStatus::Cancelled)
            .await?;
        info!(schedule_id = %schedule_id, "schedule cancelled");
        Ok(ScheduleStatus::Cancelled)
    }

    /// One daemon tick: publish every due entry. Failures are isolated per
    /// entry so one broken schedule never blocks the rest of the queue.
    pub async fn run_due_jobs(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let due = self.db.get_due_schedules(now.timestamp()).await?;
        let mut summary = TickSummary::default();

        for entry in due {
            summary.attempted += 1;
            match self.run_entry(&entry, now).await {
                Ok(RunOutcome::Published) => summary.published += 1,
                Ok(RunOutcome::Failed) => summary.failed += 1,
                Ok(RunOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(schedule_id = %entry.id, error = %e, "schedule run errored");
                    summary.failed += 1;
                }
            }
        }

        if summary.attempted > 0 {
            info!(
                attempted = summary.attempted,
                published = summary.published,
                failed = summary.failed,
                "processed due schedules"
            );
        }
        Ok(summary)
    }

    /// Build an engagement report. Reports are metered operations.
    pub async fn performance_report(
        &self,
        tenant: &Tenant,
        product_id: Option<&str>,
        platform: Option<&str>,
        window_days: i64,
    ) -> Result<PerformanceReport> {
        if window_days < 1 {
            return Err(AdcasterError::InvalidInput(
                "Report window must be at least one day".to_string(),
            ));
        }
        self.ledger
            .record_usage(tenant, UsageType::Analytics, 1)
            .await?;
        self.analytics
            .report(&tenant.id, product_id, platform, window_days)
            .await
    }

    async fn charge_scheduled_run(&self, tenant: &Tenant, format: AdFormat) -> Result<()> {
        self.ledger
            .record_usage(tenant, UsageType::ScheduledPost, 1)
            .await?;
        if format == AdFormat::Image {
            self.ledger
                .record_usage(tenant, UsageType::ImageGeneration, 1)
                .await?;
        }
        Ok(())
    }

    /// The shared publish pipeline: assemble, hand to the adapter, persist
    /// the attempt, and collect metrics for successful posts
    async fn publish_once(
        &self,
        tenant: &Tenant,
        product_id: &str,
        platform: &str,
        format: AdFormat,
    ) -> Result<PublishOutcome> {
        let product = self
            .db
            .get_product(&tenant.id, product_id)
            .await?
            .ok_or_else(|| {
                AdcasterError::InvalidInput(format!("Product not found: {}", product_id))
            })?;

        let adapter = self
            .adapters
            .get(platform)
            .ok_or_else(|| PlatformError::NotConfigured(platform.to_string()))?
            .clone();

        let content = self.assembler.assemble(&product, platform, format).await;
        let result = adapter.publish(&content).await;

        if !result.success {
            debug!(
                platform = %platform,
                error = result.error.as_deref().unwrap_or("unknown"),
                "post failed"
            );
            return Ok(PublishOutcome { post: None, result });
        }

        let caption = finalize_for_platform(&content.copy, &content.hashtags, platform);
        let post = Post::new(
            tenant.id.clone(),
            product.id.clone(),
            platform.to_string(),
            caption,
            result.post_id.clone(),
            true,
        );
        self.db.create_post(&post).await?;

        if let Err(e) = self.analytics.collect_metrics(&post, adapter.as_ref()).await {
            warn!(post_id = %post.id, error = %e, "metrics collection failed");
        }
        debug!(post_id = %post.id, platform = %platform, "post published");

        Ok(PublishOutcome {
            post: Some(post),
            result,
        })
    }

    async fn run_entry(&self, stale: &ScheduleEntry, now: DateTime<Utc>) -> Result<RunOutcome> {
        // Re-read before acting; the entry may have been cancelled since the
        // due set was computed
        let Some(entry) = self.db.get_schedule(&stale.tenant_id, &stale.id).await? else {
            return Ok(RunOutcome::Skipped);
        };
        if entry.status != ScheduleStatus::Scheduled {
            debug!(schedule_id = %entry.id, status = %entry.status, "skipping inactive schedule");
            return Ok(RunOutcome::Skipped);
        }

        let Some(tenant) = self.db.get_tenant(&entry.tenant_id).await? else {
            self.finish_failed(&entry, now, "tenant no longer exists", true)
                .await?;
            return Ok(RunOutcome::Failed);
        };
        if self
            .db
            .get_product(&entry.tenant_id, &entry.product_id)
            .await?
            .is_none()
        {
            self.finish_failed(&entry, now, "product no longer exists", true)
                .await?;
            return Ok(RunOutcome::Failed);
        }

        if let Err(e) = self.charge_scheduled_run(&tenant, entry.format_type).await {
            self.finish_failed(&entry, now, &e.to_string(), false).await?;
            return Ok(RunOutcome::Failed);
        }

        match self
            .publish_once(&tenant, &entry.product_id, &entry.platform, entry.format_type)
            .await
        {
            Ok(outcome) if outcome.result.success => {
                let post_id = outcome.post.as_ref().map(|p| p.id.clone()).unwrap_or_default();
                self.finish_published(&entry, now, &post_id).await?;
                Ok(RunOutcome::Published)
            }
            Ok(outcome) => {
                let error = outcome
                    .result
                    .error
                    .unwrap_or_else(|| "publish failed".to_string());
                self.finish_failed(&entry, now, &error, false).await?;
                Ok(RunOutcome::Failed)
            }
            Err(e) => {
                self.finish_failed(&entry, now, &e.to_string(), false).await?;
                Ok(RunOutcome::Failed)
            }
        }
    }

    async fn finish_published(
        &self,
        entry: &ScheduleEntry,
        now: DateTime<Utc>,
        post_id: &str,
    ) -> Result<()> {
        let (status, next_run_at) = match advance_next_run(entry.next_run_at, entry.recurrence) {
            Some(next) => (ScheduleStatus::Scheduled, next),
            None => (ScheduleStatus::Completed, entry.next_run_at),
        };
        self.db
            .record_schedule_run(
                &entry.id,
                status,
                next_run_at,
                now.timestamp(),
                Some(post_id),
                None,
            )
            .await
    }

    /// Record a failed run. One-shot and permanently broken entries become
    /// Failed; recurring entries keep the error and re-arm for the next slot.
    async fn finish_failed(
        &self,
        entry: &ScheduleEntry,
        now: DateTime<Utc>,
        error: &str,
        permanent: bool,
    ) -> Result<()> {
        warn!(schedule_id = %entry.id, error = %error, "schedule run failed");

        let advanced = if permanent {
            None
        } else {
            advance_next_run(entry.next_run_at, entry.recurrence)
        };
        let (status, next_run_at) = match advanced {
            Some(next) => (ScheduleStatus::Scheduled, next),
            None => (ScheduleStatus::Failed, entry.next_run_at),
        };
        self.db
            .record_schedule_run(
                &entry.id,
                status,
                next_run_at,
                now.timestamp(),
                entry.last_post_id.as_deref(),
                Some(error),
            )
            .await
    }
}

fn format_timestamp(at: i64) -> String {
    Utc.timestamp_opt(at, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentAssembler;
    use crate::generator::MockGenerator;
    use crate::platforms::mock::MockAdapter;
    use crate::types::{Plan, Product};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_spec_now() {
        let kind = parse_spec("now", at("2026-03-10T12:00:00Z")).unwrap();
        assert_eq!(kind, SpecKind::Now);
    }

    #[test]
    fn test_parse_spec_at_future_today() {
        let now = at("2026-03-10T12:00:00Z");
        let kind = parse_spec("at:15:30", now).unwrap();
        assert_eq!(
            kind,
            SpecKind::FirstRun {
                at: at("2026-03-10T15:30:00Z").timestamp(),
                force_daily: false,
            }
        );
    }

    #[test]
    fn test_parse_spec_at_rolls_to_tomorrow() {
        let now = at("2026-03-10T16:00:00Z");
        let kind = parse_spec("at:09:00", now).unwrap();
        assert_eq!(
            kind,
            SpecKind::FirstRun {
                at: at("2026-03-11T09:00:00Z").timestamp(),
                force_daily: false,
            }
        );
    }

    #[test]
    fn test_parse_spec_date() {
        let now = at("2026-03-10T12:00:00Z");
        let kind = parse_spec("date:2026-04-01 08:15", now).unwrap();
        assert_eq!(
            kind,
            SpecKind::FirstRun {
                at: at("2026-04-01T08:15:00Z").timestamp(),
                force_daily: false,
            }
        );
    }

    #[test]
    fn test_parse_spec_date_in_past_rejected() {
        let now = at("2026-03-10T12:00:00Z");
        let err = parse_spec("date:2026-03-01 08:15", now).unwrap_err();
        assert!(err.to_string().contains("in the past"));
    }

    #[test]
    fn test_parse_spec_daily_picks_daytime_slot() {
        let now = at("2026-03-10T03:00:00Z");
        let SpecKind::FirstRun { at: run_at, force_daily } =
            parse_spec("daily", now).unwrap()
        else {
            panic!("expected a first run");
        };
        assert!(force_daily);
        assert!(run_at > now.timestamp());

        let dt = Utc.timestamp_opt(run_at, 0).single().unwrap();
        let hour = chrono::Timelike::hour(&dt);
        assert!((9..=17).contains(&hour));
    }

    #[test]
    fn test_parse_spec_in_duration() {
        let now = at("2026-03-10T12:00:00Z");
        let kind = parse_spec("in:2h30m", now).unwrap();
        assert_eq!(
            kind,
            SpecKind::FirstRun {
                at: now.timestamp() + 9_000,
                force_daily: false,
            }
        );
    }

    #[test]
    fn test_parse_spec_rejects_garbage() {
        let now = at("2026-03-10T12:00:00Z");
        assert!(parse_spec("tomorrowish", now).is_err());
        assert!(parse_spec("at:25:00", now).is_err());
        assert!(parse_spec("in:two hours-ish", now).is_err());
    }

    #[test]
    fn test_advance_next_run() {
        let base = at("2026-01-31T10:00:00Z").timestamp();
        assert_eq!(advance_next_run(base, Recurrence::Once), None);
        assert_eq!(advance_next_run(base, Recurrence::Daily), Some(base + 86_400));
        assert_eq!(
            advance_next_run(base, Recurrence::Weekly),
            Some(base + 7 * 86_400)
        );
        // Jan 31 clamps to the end of February
        assert_eq!(
            advance_next_run(base, Recurrence::Monthly),
            Some(at("2026-02-28T10:00:00Z").timestamp())
        );
    }

    async fn test_state(adapter: MockAdapter) -> (SchedulerState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        let ledger = UsageLedger::new(db.clone(), BillingRates::default());
        let assembler = ContentAssembler::new(
            Some(Arc::new(MockGenerator::succeeding())),
            "1024x1024".to_string(),
        );

        let platform = adapter.name().to_string();
        let mut adapters: HashMap<String, Arc<dyn PlatformAdapter>> = HashMap::new();
        adapters.insert(platform, Arc::new(adapter));

        let state = SchedulerState::new(db, ledger, assembler, adapters, DefaultsConfig::default());
        (state, dir)
    }

    async fn seed_tenant_product(state: &SchedulerState, plan: Plan) -> (Tenant, Product) {
        let tenant = Tenant::new("Acme".to_string(), plan);
        state.db().create_tenant(&tenant).await.unwrap();
        let product = Product::new(
            tenant.id.clone(),
            "Solar Lantern".to_string(),
            "Compact lantern for camping".to_string(),
            vec!["solar charging".to_string(), "waterproof".to_string()],
            "campers".to_string(),
            Some("outdoors".to_string()),
        );
        state.db().create_product(&product).await.unwrap();
        (tenant, product)
    }

    #[tokio::test]
    async fn test_create_post_publishes_and_persists() {
        let (state, _dir) = test_state(MockAdapter::success("facebook").with_post_id("fb_1")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;

        let outcome = state
            .create_post(&tenant, &product.id, "facebook", AdFormat::Text)
            .await
            .unwrap();

        assert!(outcome.result.success);
        let post = outcome.post.unwrap();
        assert_eq!(post.platform_post_id.as_deref(), Some("fb_1"));

        let posts = state.db().list_posts(&tenant.id, None, None, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].success);
    }

    #[tokio::test]
    async fn test_create_post_unconfigured_platform() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;

        let err = state
            .create_post(&tenant, &product.id, "myspace", AdFormat::Text)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_schedule_post_blocked_on_free_plan() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Free).await;

        let err = state
            .schedule_post(
                &tenant,
                &product.id,
                "facebook",
                AdFormat::Text,
                "at:10:00",
                Recurrence::Once,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("free plan"));

        let schedules = state.db().list_schedules(&tenant.id, None).await.unwrap();
        assert!(schedules.is_empty());
    }

    #[tokio::test]
    async fn test_schedule_post_past_date_stores_nothing() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Starter).await;

        let err = state
            .schedule_post(
                &tenant,
                &product.id,
                "facebook",
                AdFormat::Text,
                "date:2001-01-01 00:00",
                Recurrence::Once,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("in the past"));

        let schedules = state.db().list_schedules(&tenant.id, None).await.unwrap();
        assert!(schedules.is_empty());
    }

    #[tokio::test]
    async fn test_schedule_post_unconfigured_platform_stores_nothing() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Starter).await;

        let err = state
            .schedule_post(
                &tenant,
                &product.id,
                "myspace",
                AdFormat::Text,
                "in:2h",
                Recurrence::Once,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));

        let schedules = state.db().list_schedules(&tenant.id, None).await.unwrap();
        assert!(schedules.is_empty());
    }

    #[tokio::test]
    async fn test_auto_schedule_requires_a_configured_platform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        let ledger = UsageLedger::new(db.clone(), BillingRates::default());
        let assembler =
            ContentAssembler::new(Some(Arc::new(MockGenerator::succeeding())), "1024x1024".to_string());

        let state = SchedulerState::new(
            db,
            ledger,
            assembler,
            HashMap::new(),
            DefaultsConfig::default(),
        );
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;

        let err = state
            .auto_schedule_for_product(&tenant, &product.id, AdFormat::Text, 3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No platforms configured"));

        let schedules = state.db().list_schedules(&tenant.id, None).await.unwrap();
        assert!(schedules.is_empty());
    }

    #[tokio::test]
    async fn test_run_due_jobs_completes_one_shot() {
        let (state, _dir) = test_state(MockAdapter::success("facebook").with_post_id("fb_9")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;
        state.ledger().add_funds(&tenant.id, 10.0, "test topup").await.unwrap();

        let entry = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "facebook".to_string(),
            AdFormat::Text,
            "at:10:00".to_string(),
            Recurrence::Once,
            100,
        );
        state.db().create_schedule(&entry).await.unwrap();

        let summary = state.run_due_jobs(Utc::now()).await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.published, 1);

        let stored = state
            .db()
            .get_schedule(&tenant.id, &entry.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ScheduleStatus::Completed);
        assert!(stored.last_post_id.is_some());
        assert!(stored.last_error.is_none());

        let posts = state.db().list_posts(&tenant.id, None, None, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].platform_post_id.as_deref(), Some("fb_9"));
    }

    #[tokio::test]
    async fn test_run_due_jobs_failure_isolated() {
        // One broken platform, one working one; both entries are due
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        let ledger = UsageLedger::new(db.clone(), BillingRates::default());
        let assembler =
            ContentAssembler::new(Some(Arc::new(MockGenerator::succeeding())), "1024x1024".to_string());

        let mut adapters: HashMap<String, Arc<dyn PlatformAdapter>> = HashMap::new();
        adapters.insert(
            "facebook".to_string(),
            Arc::new(MockAdapter::failure("facebook", "simulated outage")),
        );
        adapters.insert(
            "twitter".to_string(),
            Arc::new(MockAdapter::success("twitter").with_post_id("tw_1")),
        );
        let state = SchedulerState::new(db, ledger, assembler, adapters, DefaultsConfig::default());
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;
        state.ledger().add_funds(&tenant.id, 10.0, "test topup").await.unwrap();

        let failing = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "facebook".to_string(),
            AdFormat::Text,
            "at:10:00".to_string(),
            Recurrence::Once,
            50,
        );
        let working = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "twitter".to_string(),
            AdFormat::Text,
            "at:10:00".to_string(),
            Recurrence::Once,
            100,
        );
        state.db().create_schedule(&failing).await.unwrap();
        state.db().create_schedule(&working).await.unwrap();

        let summary = state.run_due_jobs(Utc::now()).await.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.failed, 1);

        let failed = state
            .db()
            .get_schedule(&tenant.id, &failing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, ScheduleStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("simulated outage"));

        let ok = state
            .db()
            .get_schedule(&tenant.id, &working.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok.status, ScheduleStatus::Completed);
    }

    #[tokio::test]
    async fn test_run_due_jobs_recurring_failure_rearms() {
        let (state, _dir) =
            test_state(MockAdapter::failure("facebook", "simulated outage")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;
        state.ledger().add_funds(&tenant.id, 10.0, "test topup").await.unwrap();

        let entry = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "facebook".to_string(),
            AdFormat::Text,
            "daily".to_string(),
            Recurrence::Daily,
            100,
        );
        state.db().create_schedule(&entry).await.unwrap();

        let summary = state.run_due_jobs(Utc::now()).await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = state
            .db()
            .get_schedule(&tenant.id, &entry.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ScheduleStatus::Scheduled);
        assert_eq!(stored.next_run_at, 100 + 86_400);
        assert_eq!(stored.last_error.as_deref(), Some("simulated outage"));
    }

    #[tokio::test]
    async fn test_run_due_jobs_insufficient_balance_fails_entry() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        // Starter plan: scheduled posts are never plan-covered, and the
        // balance starts at zero
        let (tenant, product) = seed_tenant_product(&state, Plan::Starter).await;

        let entry = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "facebook".to_string(),
            AdFormat::Text,
            "at:10:00".to_string(),
            Recurrence::Once,
            100,
        );
        state.db().create_schedule(&entry).await.unwrap();

        let summary = state.run_due_jobs(Utc::now()).await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = state
            .db()
            .get_schedule(&tenant.id, &entry.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed);
        assert!(stored.last_error.as_deref().unwrap_or("").contains("Insufficient"));

        let posts = state.db().list_posts(&tenant.id, None, None, 10).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_entry_skipped_even_when_due() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;

        let entry = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "facebook".to_string(),
            AdFormat::Text,
            "at:10:00".to_string(),
            Recurrence::Once,
            100,
        );
        state.db().create_schedule(&entry).await.unwrap();
        state.cancel_schedule(&tenant.id, &entry.id).await.unwrap();

        let summary = state.run_due_jobs(Utc::now()).await.unwrap();
        assert_eq!(summary.published, 0);
        assert_eq!(summary.attempted, 0);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_on_terminal_entries() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;
        state.ledger().add_funds(&tenant.id, 10.0, "test topup").await.unwrap();

        let entry = ScheduleEntry::new(
            tenant.id.clone(),
            product.id.clone(),
            "facebook".to_string(),
            AdFormat::Text,
            "at:10:00".to_string(),
            Recurrence::Once,
            100,
        );
        state.db().create_schedule(&entry).await.unwrap();
        state.run_due_jobs(Utc::now()).await.unwrap();

        // The entry completed; cancelling now reports Completed unchanged
        let status = state.cancel_schedule(&tenant.id, &entry.id).await.unwrap();
        assert_eq!(status, ScheduleStatus::Completed);

        let stored = state
            .db()
            .get_schedule(&tenant.id, &entry.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ScheduleStatus::Completed);
    }

    #[tokio::test]
    async fn test_auto_schedule_spreads_entries() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, product) = seed_tenant_product(&state, Plan::Business).await;

        let entries = state
            .auto_schedule_for_product(&tenant, &product.id, AdFormat::Text, 3)
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);

        let now = Utc::now().timestamp();
        for entry in &entries {
            assert!(entry.next_run_at > now);
            assert_eq!(entry.recurrence, Recurrence::Once);
            assert_eq!(entry.platform, "facebook");
        }

        let stored = state.db().list_schedules(&tenant.id, None).await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn test_performance_report_is_metered() {
        let (state, _dir) = test_state(MockAdapter::success("facebook")).await;
        let (tenant, _product) = seed_tenant_product(&state, Plan::Starter).await;

        let report = state
            .performance_report(&tenant, None, None, 30)
            .await
            .unwrap();
        assert_eq!(report.total_posts, 0);

        let history = state.ledger().usage_history(&tenant.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].usage_type, UsageType::Analytics);
        assert!(history[0].plan_covered);
    }
}
