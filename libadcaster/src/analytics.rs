//! Engagement collection and performance reporting

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::platforms::PlatformAdapter;
use crate::types::{Engagement, MetricsRecord, Post};

/// Running totals for a group of posts
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngagementTotals {
    pub posts: i64,
    pub impressions: i64,
    pub likes: i64,
    pub comments: i64,
    pub clicks: i64,
    pub shares: i64,
}

impl EngagementTotals {
    fn add(&mut self, engagement: &Engagement) {
        self.posts += 1;
        self.impressions += engagement.impressions;
        self.likes += engagement.likes;
        self.comments += engagement.comments;
        self.clicks += engagement.clicks;
        self.shares += engagement.shares;
    }

    fn avg(total: i64, posts: i64) -> f64 {
        if posts == 0 {
            0.0
        } else {
            total as f64 / posts as f64
        }
    }

    /// Weighted per-post engagement score used to rank platforms. Shares and
    /// clicks count the most since they track intent to buy.
    pub fn score(&self) -> f64 {
        0.3 * Self::avg(self.impressions, self.posts)
            + 0.2 * Self::avg(self.likes, self.posts)
            + 0.3 * Self::avg(self.comments, self.posts)
            + 0.4 * Self::avg(self.clicks, self.posts)
            + 0.5 * Self::avg(self.shares, self.posts)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub tenant_id: String,
    pub window_days: i64,
    pub total_posts: i64,
    pub totals: EngagementTotals,
    /// Per-platform rollups in first-seen order
    pub by_platform: Vec<(String, EngagementTotals)>,
    /// Per-product rollups in first-seen order
    pub by_product: Vec<(String, EngagementTotals)>,
    pub best_platform: Option<String>,
}

/// Collects engagement counters for published posts and rolls them up into
/// reports
#[derive(Clone)]
pub struct AnalyticsAggregator {
    db: Database,
}

impl AnalyticsAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch and persist engagement for one post. Failed posts and posts
    /// without a platform id have no metrics to collect.
    pub async fn collect_metrics(
        &self,
        post: &Post,
        adapter: &dyn PlatformAdapter,
    ) -> Result<Option<MetricsRecord>> {
        if !post.success {
            return Ok(None);
        }
        let Some(platform_post_id) = post.platform_post_id.as_deref() else {
            return Ok(None);
        };

        let engagement = adapter.fetch_metrics(platform_post_id).await;
        let record = MetricsRecord::new(post, engagement);
        self.db.insert_metrics(&record).await?;

        debug!(
            post_id = %post.id,
            platform = %post.platform,
            impressions = engagement.impressions,
            "collected metrics"
        );
        Ok(Some(record))
    }

    /// Roll up stored metrics for a tenant over a trailing window of days
    pub async fn report(
        &self,
        tenant_id: &str,
        product_id: Option<&str>,
        platform: Option<&str>,
        window_days: i64,
    ) -> Result<PerformanceReport> {
        let since = Utc::now().timestamp() - window_days * 86_400;
        let records = self
            .db
            .query_metrics(tenant_id, product_id, platform, since)
            .await?;

        Ok(build_report(tenant_id, window_days, &records))
    }
}

fn build_report(tenant_id: &str, window_days: i64, records: &[MetricsRecord]) -> PerformanceReport {
    let mut totals = EngagementTotals::default();
    let mut by_platform: Vec<(String, EngagementTotals)> = Vec::new();
    let mut by_product: Vec<(String, EngagementTotals)> = Vec::new();

    for record in records {
        totals.add(&record.engagement);
        rollup(&mut by_platform, &record.platform, &record.engagement);
        rollup(&mut by_product, &record.product_id, &record.engagement);
    }

    let best_platform = rank_platforms(&by_platform).first().map(|(p, _)| p.clone());

    PerformanceReport {
        tenant_id: tenant_id.to_string(),
        window_days,
        total_posts: totals.posts,
        totals,
        by_platform,
        by_product,
        best_platform,
    }
}

fn rollup(groups: &mut Vec<(String, EngagementTotals)>, key: &str, engagement: &Engagement) {
    match groups.iter_mut().find(|(k, _)| k == key) {
        Some((_, totals)) => totals.add(engagement),
        None => {
            let mut totals = EngagementTotals::default();
            totals.add(engagement);
            groups.push((key.to_string(), totals));
        }
    }
}

/// Platforms ordered best-first by weighted score. Ties keep the earlier
/// platform first.
pub fn rank_platforms(by_platform: &[(String, EngagementTotals)]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = by_platform
        .iter()
        .map(|(platform, totals)| (platform.clone(), totals.score()))
        .collect();
    // Stable sort preserves first-seen order among equal scores
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}
