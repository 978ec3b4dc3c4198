//! Core types for Adcaster

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Subscription plan a tenant is on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Plan {
    Free,
    Starter,
    Business,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Business => "business",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn monthly_price(&self) -> f64 {
        match self {
            Plan::Free => 0.0,
            Plan::Starter => 29.99,
            Plan::Business => 99.99,
            Plan::Enterprise => 299.99,
        }
    }

    /// Monthly allowances included in the plan
    pub fn limits(&self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                monthly_posts: Allowance::Limited(10),
                platforms: Allowance::Limited(2),
                image_generation: Allowance::Limited(5),
                analytics_reports: Allowance::Limited(0),
                team_members: Allowance::Limited(1),
                scheduling: false,
            },
            Plan::Starter => PlanLimits {
                monthly_posts: Allowance::Limited(50),
                platforms: Allowance::Limited(3),
                image_generation: Allowance::Limited(20),
                analytics_reports: Allowance::Limited(25),
                team_members: Allowance::Limited(2),
                scheduling: true,
            },
            Plan::Business => PlanLimits {
                monthly_posts: Allowance::Limited(200),
                platforms: Allowance::Limited(5),
                image_generation: Allowance::Limited(100),
                analytics_reports: Allowance::Limited(100),
                team_members: Allowance::Limited(5),
                scheduling: true,
            },
            Plan::Enterprise => PlanLimits {
                monthly_posts: Allowance::Unlimited,
                platforms: Allowance::Unlimited,
                image_generation: Allowance::Unlimited,
                analytics_reports: Allowance::Unlimited,
                team_members: Allowance::Unlimited,
                scheduling: true,
            },
        }
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "starter" => Ok(Plan::Starter),
            "business" => Ok(Plan::Business),
            "enterprise" => Ok(Plan::Enterprise),
            _ => Err(format!(
                "Invalid plan: '{}'. Valid options: free, starter, business, enterprise",
                s
            )),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A plan allowance, either a monthly count or uncapped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Allowance {
    Limited(i64),
    Unlimited,
}

impl Allowance {
    /// Whether the allowance covers `want` units in total
    pub fn covers(&self, want: i64) -> bool {
        match self {
            Allowance::Limited(n) => want <= *n,
            Allowance::Unlimited => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub monthly_posts: Allowance,
    pub platforms: Allowance,
    pub image_generation: Allowance,
    pub analytics_reports: Allowance,
    pub team_members: Allowance,
    pub scheduling: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub plan: Plan,
    pub created_at: i64,
}

impl Tenant {
    pub fn new(name: String, plan: Plan) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            plan,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub features: Vec<String>,
    pub target_audience: String,
    pub category: Option<String>,
    pub created_at: i64,
}

impl Product {
    pub fn new(
        tenant_id: String,
        name: String,
        description: String,
        features: Vec<String>,
        target_audience: String,
        category: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            name,
            description,
            features,
            target_audience,
            category,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Ad format requested for a post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdFormat {
    Text,
    Image,
}

impl AdFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdFormat::Text => "text",
            AdFormat::Image => "image",
        }
    }
}

impl FromStr for AdFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(AdFormat::Text),
            "image" => Ok(AdFormat::Image),
            _ => Err(format!("Invalid format: '{}'. Valid options: text, image", s)),
        }
    }
}

/// Assembled ad content, ready for an adapter. Never persisted as-is.
#[derive(Debug, Clone)]
pub struct AdContent {
    pub product_id: String,
    pub platform: String,
    pub copy: String,
    pub hashtags: Vec<String>,
    pub image: Option<Vec<u8>>,
    pub created_at: i64,
}

/// A publish attempt that produced a platform response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub platform: String,
    pub content: String,
    pub platform_post_id: Option<String>,
    pub success: bool,
    pub created_at: i64,
}

impl Post {
    pub fn new(
        tenant_id: String,
        product_id: String,
        platform: String,
        content: String,
        platform_post_id: Option<String>,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            product_id,
            platform,
            content,
            platform_post_id,
            success,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleStatus {
    Scheduled,
    Completed,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal entries are never picked up by the daemon again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduleStatus::Scheduled)
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ScheduleStatus::Scheduled),
            "completed" => Ok(ScheduleStatus::Completed),
            "failed" => Ok(ScheduleStatus::Failed),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            _ => Err(format!("Invalid schedule status: '{}'", s)),
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recurrence {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Once => "once",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }
}

impl FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "once" => Ok(Recurrence::Once),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(format!(
                "Invalid recurrence: '{}'. Valid options: once, daily, weekly, monthly",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub platform: String,
    pub format_type: AdFormat,
    pub spec: String,
    pub recurrence: Recurrence,
    pub status: ScheduleStatus,
    pub next_run_at: i64,
    pub created_at: i64,
    pub last_run: Option<i64>,
    pub last_post_id: Option<String>,
    pub last_error: Option<String>,
}

impl ScheduleEntry {
    pub fn new(
        tenant_id: String,
        product_id: String,
        platform: String,
        format_type: AdFormat,
        spec: String,
        recurrence: Recurrence,
        next_run_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            product_id,
            platform,
            format_type,
            spec,
            recurrence,
            status: ScheduleStatus::Scheduled,
            next_run_at,
            created_at: chrono::Utc::now().timestamp(),
            last_run: None,
            last_post_id: None,
            last_error: None,
        }
    }
}

/// Billable operation categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UsageType {
    Post,
    ImageGeneration,
    Analytics,
    ScheduledPost,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::Post => "post",
            UsageType::ImageGeneration => "image_generation",
            UsageType::Analytics => "analytics",
            UsageType::ScheduledPost => "scheduled_post",
        }
    }
}

impl FromStr for UsageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "post" => Ok(UsageType::Post),
            "image_generation" => Ok(UsageType::ImageGeneration),
            "analytics" => Ok(UsageType::Analytics),
            "scheduled_post" => Ok(UsageType::ScheduledPost),
            _ => Err(format!("Invalid usage type: '{}'", s)),
        }
    }
}

impl std::fmt::Display for UsageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only usage ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    pub id: String,
    pub tenant_id: String,
    pub usage_type: UsageType,
    pub quantity: i64,
    pub amount: f64,
    pub plan_covered: bool,
    pub created_at: i64,
}

impl UsageEntry {
    pub fn new(
        tenant_id: String,
        usage_type: UsageType,
        quantity: i64,
        amount: f64,
        plan_covered: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            usage_type,
            quantity,
            amount,
            plan_covered,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TxKind {
    Credit,
    Debit,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Credit => "credit",
            TxKind::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub tenant_id: String,
    pub kind: TxKind,
    pub amount: f64,
    pub description: String,
    pub created_at: i64,
}

impl Transaction {
    pub fn new(tenant_id: String, kind: TxKind, amount: f64, description: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            kind,
            amount,
            description,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Prepaid balance, one row per tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub tenant_id: String,
    pub balance: f64,
    pub last_updated: i64,
}

/// Engagement counters for a single post. Missing vendor fields stay zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engagement {
    pub impressions: i64,
    pub likes: i64,
    pub comments: i64,
    pub clicks: i64,
    pub shares: i64,
}

/// Engagement snapshot collected for one successful post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub id: Option<i64>,
    pub post_id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub platform: String,
    pub engagement: Engagement,
    pub created_at: i64,
}

impl MetricsRecord {
    pub fn new(post: &Post, engagement: Engagement) -> Self {
        Self {
            id: None,
            post_id: post.id.clone(),
            tenant_id: post.tenant_id.clone(),
            product_id: post.product_id.clone(),
            platform: post.platform.clone(),
            engagement,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Outcome of a single publish attempt. Adapters never return errors past
/// this boundary; every failure becomes `success = false` with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: String,
    pub success: bool,
    pub post_id: Option<String>,
    pub error: Option<String>,
}

impl PublishResult {
    pub fn published(platform: &str, post_id: String) -> Self {
        Self {
            platform: platform.to_string(),
            success: true,
            post_id: Some(post_id),
            error: None,
        }
    }

    pub fn failed(platform: &str, error: String) -> Self {
        Self {
            platform: platform.to_string(),
            success: false,
            post_id: None,
            error: Some(error),
        }
    }
}
