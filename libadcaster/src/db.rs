//! Database operations for Adcaster
//!
//! Every query over tenant-owned data carries a `tenant_id` predicate; there
//! is no code path that reads another tenant's rows.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::Result;
use crate::types::{
    MetricsRecord, Post, Product, Recurrence, ScheduleEntry, ScheduleStatus, Tenant, Transaction,
    UsageEntry,
};
use crate::types::{AdFormat, Balance, Engagement, Plan, UsageType};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::DbError::IoError)?;
        }

        // mode=rwc creates the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::error::DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Tenants
    // ========================================================================

    pub async fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, plan, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(tenant.plan.as_str())
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, plan, created_at FROM tenants WHERE id = ?
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(|r| Tenant {
            id: r.get("id"),
            name: r.get("name"),
            plan: r
                .get::<String, _>("plan")
                .parse()
                .unwrap_or(Plan::Free),
            created_at: r.get("created_at"),
        }))
    }

    pub async fn update_tenant_plan(&self, tenant_id: &str, plan: Plan) -> Result<()> {
        sqlx::query("UPDATE tenants SET plan = ? WHERE id = ?")
            .bind(plan.as_str())
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn create_product(&self, product: &Product) -> Result<()> {
        let features =
            serde_json::to_string(&product.features).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, name, description, features, target_audience, category, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(features)
        .bind(&product.target_audience)
        .bind(&product.category)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_product(&self, tenant_id: &str, product_id: &str) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, description, features, target_audience, category, created_at
            FROM products WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(row_to_product))
    }

    pub async fn list_products(&self, tenant_id: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, description, features, target_audience, category, created_at
            FROM products WHERE tenant_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.into_iter().map(row_to_product).collect())
    }

    /// Update mutable fields; the id and tenant never change
    pub async fn update_product(&self, product: &Product) -> Result<bool> {
        let features =
            serde_json::to_string(&product.features).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, features = ?, target_audience = ?, category = ?
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(features)
        .bind(&product.target_audience)
        .bind(&product.category)
        .bind(&product.tenant_id)
        .bind(&product.id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_product(&self, tenant_id: &str, product_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Case-insensitive substring search over name, description, and features
    pub async fn search_products(&self, tenant_id: &str, query: &str) -> Result<Vec<Product>> {
        let pattern = format!("%{}%", query.to_lowercase());

        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, description, features, target_audience, category, created_at
            FROM products
            WHERE tenant_id = ?
              AND (LOWER(name) LIKE ? OR LOWER(description) LIKE ? OR LOWER(features) LIKE ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.into_iter().map(row_to_product).collect())
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, tenant_id, product_id, platform, content, platform_post_id, success, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.tenant_id)
        .bind(&post.product_id)
        .bind(&post.platform)
        .bind(&post.content)
        .bind(&post.platform_post_id)
        .bind(if post.success { 1 } else { 0 })
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn list_posts(
        &self,
        tenant_id: &str,
        product_id: Option<&str>,
        platform: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        // Build the WHERE clause dynamically
        let mut where_clauses = vec!["tenant_id = ?"];

        if product_id.is_some() {
            where_clauses.push("product_id = ?");
        }
        if platform.is_some() {
            where_clauses.push("platform = ?");
        }

        let query_str = format!(
            r#"
            SELECT id, tenant_id, product_id, platform, content, platform_post_id, success, created_at
            FROM posts
            WHERE {}
            ORDER BY created_at DESC
            LIMIT ?
            "#,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str).bind(tenant_id);
        if let Some(p) = product_id {
            query = query.bind(p);
        }
        if let Some(p) = platform {
            query = query.bind(p);
        }
        query = query.bind(limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|r| Post {
                id: r.get("id"),
                tenant_id: r.get("tenant_id"),
                product_id: r.get("product_id"),
                platform: r.get("platform"),
                content: r.get("content"),
                platform_post_id: r.get("platform_post_id"),
                success: r.get::<i64, _>("success") != 0,
                created_at: r.get("created_at"),
            })
            .collect())
    }

    // ========================================================================
    // Schedules
    // ========================================================================

    pub async fn create_schedule(&self, entry: &ScheduleEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, tenant_id, product_id, platform, format_type, spec,
                                   recurrence, status, next_run_at, created_at,
                                   last_run, last_post_id, last_error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.product_id)
        .bind(&entry.platform)
        .bind(entry.format_type.as_str())
        .bind(&entry.spec)
        .bind(entry.recurrence.as_str())
        .bind(entry.status.as_str())
        .bind(entry.next_run_at)
        .bind(entry.created_at)
        .bind(entry.last_run)
        .bind(&entry.last_post_id)
        .bind(&entry.last_error)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_schedule(
        &self,
        tenant_id: &str,
        schedule_id: &str,
    ) -> Result<Option<ScheduleEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, platform, format_type, spec, recurrence,
                   status, next_run_at, created_at, last_run, last_post_id, last_error
            FROM schedules WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(tenant_id)
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(row_to_schedule))
    }

    pub async fn list_schedules(
        &self,
        tenant_id: &str,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<ScheduleEntry>> {
        let mut where_clauses = vec!["tenant_id = ?"];
        if status.is_some() {
            where_clauses.push("status = ?");
        }

        let query_str = format!(
            r#"
            SELECT id, tenant_id, product_id, platform, format_type, spec, recurrence,
                   status, next_run_at, created_at, last_run, last_post_id, last_error
            FROM schedules
            WHERE {}
            ORDER BY next_run_at ASC
            "#,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str).bind(tenant_id);
        if let Some(s) = status {
            query = query.bind(s.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.into_iter().map(row_to_schedule).collect())
    }

    /// Due set for the daemon tick, recomputed from the table every call.
    /// Spans tenants; the scheduler re-checks status per entry before running.
    pub async fn get_due_schedules(&self, now: i64) -> Result<Vec<ScheduleEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, platform, format_type, spec, recurrence,
                   status, next_run_at, created_at, last_run, last_post_id, last_error
            FROM schedules
            WHERE status = 'scheduled' AND next_run_at <= ?
            ORDER BY next_run_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.into_iter().map(row_to_schedule).collect())
    }

    pub async fn update_schedule_status(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE schedules SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(schedule_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Persist the outcome of one job run
    pub async fn record_schedule_run(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
        next_run_at: i64,
        last_run: i64,
        last_post_id: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE schedules
            SET status = ?, next_run_at = ?, last_run = ?, last_post_id = ?, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(next_run_at)
        .bind(last_run)
        .bind(last_post_id)
        .bind(last_error)
        .bind(schedule_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Usage ledger
    // ========================================================================

    pub async fn insert_usage(&self, entry: &UsageEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO usage (id, tenant_id, usage_type, quantity, amount, plan_covered, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(entry.usage_type.as_str())
        .bind(entry.quantity)
        .bind(entry.amount)
        .bind(if entry.plan_covered { 1 } else { 0 })
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Total units consumed for one usage type since `since` (unix seconds)
    pub async fn usage_since(
        &self,
        tenant_id: &str,
        usage_type: UsageType,
        since: i64,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity), 0) AS total
            FROM usage
            WHERE tenant_id = ? AND usage_type = ? AND created_at >= ?
            "#,
        )
        .bind(tenant_id)
        .bind(usage_type.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.get("total"))
    }

    pub async fn usage_history(&self, tenant_id: &str, limit: usize) -> Result<Vec<UsageEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, usage_type, quantity, amount, plan_covered, created_at
            FROM usage
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|r| UsageEntry {
                id: r.get("id"),
                tenant_id: r.get("tenant_id"),
                usage_type: r
                    .get::<String, _>("usage_type")
                    .parse()
                    .unwrap_or(UsageType::Post),
                quantity: r.get("quantity"),
                amount: r.get("amount"),
                plan_covered: r.get::<i64, _>("plan_covered") != 0,
                created_at: r.get("created_at"),
            })
            .collect())
    }

    // ========================================================================
    // Balances and transactions
    // ========================================================================

    /// Read a tenant's balance, creating the zero row on first touch
    pub async fn get_balance(&self, tenant_id: &str) -> Result<Balance> {
        sqlx::query(
            r#"
            INSERT INTO balances (tenant_id, balance, last_updated)
            VALUES (?, 0, ?)
            ON CONFLICT(tenant_id) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        let row = sqlx::query(
            "SELECT tenant_id, balance, last_updated FROM balances WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(Balance {
            tenant_id: row.get("tenant_id"),
            balance: row.get("balance"),
            last_updated: row.get("last_updated"),
        })
    }

    pub async fn set_balance(&self, tenant_id: &str, balance: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (tenant_id, balance, last_updated)
            VALUES (?, ?, ?)
            ON CONFLICT(tenant_id) DO UPDATE SET balance = excluded.balance,
                                                 last_updated = excluded.last_updated
            "#,
        )
        .bind(tenant_id)
        .bind(balance)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn insert_transaction(&self, tx: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, tenant_id, kind, amount, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.tenant_id)
        .bind(tx.kind.as_str())
        .bind(tx.amount)
        .bind(&tx.description)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn list_transactions(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, kind, amount, description, created_at
            FROM transactions
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|r| Transaction {
                id: r.get("id"),
                tenant_id: r.get("tenant_id"),
                kind: match r.get::<String, _>("kind").as_str() {
                    "credit" => crate::types::TxKind::Credit,
                    _ => crate::types::TxKind::Debit,
                },
                amount: r.get("amount"),
                description: r.get("description"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    pub async fn insert_metrics(&self, record: &MetricsRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metrics (post_id, tenant_id, product_id, platform,
                                 impressions, likes, comments, clicks, shares, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.post_id)
        .bind(&record.tenant_id)
        .bind(&record.product_id)
        .bind(&record.platform)
        .bind(record.engagement.impressions)
        .bind(record.engagement.likes)
        .bind(record.engagement.comments)
        .bind(record.engagement.clicks)
        .bind(record.engagement.shares)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn query_metrics(
        &self,
        tenant_id: &str,
        product_id: Option<&str>,
        platform: Option<&str>,
        since: i64,
    ) -> Result<Vec<MetricsRecord>> {
        let mut where_clauses = vec!["tenant_id = ?", "created_at >= ?"];
        if product_id.is_some() {
            where_clauses.push("product_id = ?");
        }
        if platform.is_some() {
            where_clauses.push("platform = ?");
        }

        let query_str = format!(
            r#"
            SELECT id, post_id, tenant_id, product_id, platform,
                   impressions, likes, comments, clicks, shares, created_at
            FROM metrics
            WHERE {}
            ORDER BY created_at ASC
            "#,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str).bind(tenant_id).bind(since);
        if let Some(p) = product_id {
            query = query.bind(p);
        }
        if let Some(p) = platform {
            query = query.bind(p);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|r| MetricsRecord {
                id: Some(r.get("id")),
                post_id: r.get("post_id"),
                tenant_id: r.get("tenant_id"),
                product_id: r.get("product_id"),
                platform: r.get("platform"),
                engagement: Engagement {
                    impressions: r.get("impressions"),
                    likes: r.get("likes"),
                    comments: r.get("comments"),
                    clicks: r.get("clicks"),
                    shares: r.get("shares"),
                },
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

fn row_to_product(r: sqlx::sqlite::SqliteRow) -> Product {
    let features: Vec<String> =
        serde_json::from_str(&r.get::<String, _>("features")).unwrap_or_default();

    Product {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        name: r.get("name"),
        description: r.get("description"),
        features,
        target_audience: r.get("target_audience"),
        category: r.get("category"),
        created_at: r.get("created_at"),
    }
}

fn row_to_schedule(r: sqlx::sqlite::SqliteRow) -> ScheduleEntry {
    ScheduleEntry {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        product_id: r.get("product_id"),
        platform: r.get("platform"),
        format_type: match r.get::<String, _>("format_type").as_str() {
            "image" => AdFormat::Image,
            _ => AdFormat::Text,
        },
        spec: r.get("spec"),
        recurrence: r
            .get::<String, _>("recurrence")
            .parse()
            .unwrap_or(Recurrence::Once),
        status: r
            .get::<String, _>("status")
            .parse()
            .unwrap_or(ScheduleStatus::Scheduled),
        next_run_at: r.get("next_run_at"),
        created_at: r.get("created_at"),
        last_run: r.get("last_run"),
        last_post_id: r.get("last_post_id"),
        last_error: r.get("last_error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxKind;

    async fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn sample_product(tenant_id: &str) -> Product {
        Product::new(
            tenant_id.to_string(),
            "Solar Lantern".to_string(),
            "A rugged lantern that charges in daylight".to_string(),
            vec!["solar charging".to_string(), "waterproof".to_string()],
            "campers and hikers".to_string(),
            Some("outdoors".to_string()),
        )
    }

    #[tokio::test]
    async fn test_tenant_round_trip() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Starter);
        db.create_tenant(&tenant).await.unwrap();

        let loaded = db.get_tenant(&tenant.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Acme");
        assert_eq!(loaded.plan, Plan::Starter);
    }

    #[tokio::test]
    async fn test_product_round_trip() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Free);
        db.create_tenant(&tenant).await.unwrap();

        let product = sample_product(&tenant.id);
        db.create_product(&product).await.unwrap();

        let loaded = db
            .get_product(&tenant.id, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, product.name);
        assert_eq!(loaded.features, product.features);
        assert_eq!(loaded.category, Some("outdoors".to_string()));
    }

    #[tokio::test]
    async fn test_product_update_keeps_id() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Free);
        db.create_tenant(&tenant).await.unwrap();

        let mut product = sample_product(&tenant.id);
        db.create_product(&product).await.unwrap();

        product.name = "Solar Lantern Pro".to_string();
        assert!(db.update_product(&product).await.unwrap());

        let loaded = db
            .get_product(&tenant.id, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, product.id);
        assert_eq!(loaded.name, "Solar Lantern Pro");
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let (db, _dir) = test_db().await;

        let acme = Tenant::new("Acme".to_string(), Plan::Free);
        let globex = Tenant::new("Globex".to_string(), Plan::Free);
        db.create_tenant(&acme).await.unwrap();
        db.create_tenant(&globex).await.unwrap();

        let product = sample_product(&acme.id);
        db.create_product(&product).await.unwrap();

        // Globex cannot see or touch Acme's product
        assert!(db
            .get_product(&globex.id, &product.id)
            .await
            .unwrap()
            .is_none());
        assert!(db.list_products(&globex.id).await.unwrap().is_empty());
        assert!(!db.delete_product(&globex.id, &product.id).await.unwrap());

        // Still present for Acme
        assert!(db
            .get_product(&acme.id, &product.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_search_products() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Free);
        db.create_tenant(&tenant).await.unwrap();
        db.create_product(&sample_product(&tenant.id)).await.unwrap();

        let hits = db.search_products(&tenant.id, "waterPROOF").await.unwrap();
        assert_eq!(hits.len(), 1);

        let misses = db.search_products(&tenant.id, "submarine").await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_due_schedules() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Starter);
        db.create_tenant(&tenant).await.unwrap();

        let now = chrono::Utc::now().timestamp();

        let due = ScheduleEntry::new(
            tenant.id.clone(),
            "p1".to_string(),
            "twitter".to_string(),
            AdFormat::Text,
            "at:09:00".to_string(),
            Recurrence::Daily,
            now - 10,
        );
        let future = ScheduleEntry::new(
            tenant.id.clone(),
            "p1".to_string(),
            "twitter".to_string(),
            AdFormat::Text,
            "at:09:00".to_string(),
            Recurrence::Daily,
            now + 3600,
        );
        let mut cancelled = ScheduleEntry::new(
            tenant.id.clone(),
            "p1".to_string(),
            "twitter".to_string(),
            AdFormat::Text,
            "at:09:00".to_string(),
            Recurrence::Daily,
            now - 10,
        );
        cancelled.status = ScheduleStatus::Cancelled;

        db.create_schedule(&due).await.unwrap();
        db.create_schedule(&future).await.unwrap();
        db.create_schedule(&cancelled).await.unwrap();

        let found = db.get_due_schedules(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[tokio::test]
    async fn test_balance_implicit_create() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Free);
        db.create_tenant(&tenant).await.unwrap();

        let balance = db.get_balance(&tenant.id).await.unwrap();
        assert_eq!(balance.balance, 0.0);

        db.set_balance(&tenant.id, 12.5).await.unwrap();
        let balance = db.get_balance(&tenant.id).await.unwrap();
        assert_eq!(balance.balance, 12.5);
    }

    #[tokio::test]
    async fn test_usage_since_window() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Starter);
        db.create_tenant(&tenant).await.unwrap();

        let now = chrono::Utc::now().timestamp();

        let mut recent = UsageEntry::new(tenant.id.clone(), UsageType::Post, 3, 1.5, true);
        recent.created_at = now - 60;
        let mut old = UsageEntry::new(tenant.id.clone(), UsageType::Post, 40, 20.0, true);
        old.created_at = now - 90 * 86_400;
        let other_type = UsageEntry::new(tenant.id.clone(), UsageType::Analytics, 5, 0.5, true);

        db.insert_usage(&recent).await.unwrap();
        db.insert_usage(&old).await.unwrap();
        db.insert_usage(&other_type).await.unwrap();

        let total = db
            .usage_since(&tenant.id, UsageType::Post, now - 3600)
            .await
            .unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_transactions_round_trip() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Free);
        db.create_tenant(&tenant).await.unwrap();

        let tx = Transaction::new(
            tenant.id.clone(),
            TxKind::Credit,
            25.0,
            "top-up".to_string(),
        );
        db.insert_transaction(&tx).await.unwrap();

        let txs = db.list_transactions(&tenant.id, 10).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TxKind::Credit);
        assert_eq!(txs[0].amount, 25.0);
    }

    #[tokio::test]
    async fn test_metrics_query_filters() {
        let (db, _dir) = test_db().await;

        let tenant = Tenant::new("Acme".to_string(), Plan::Business);
        db.create_tenant(&tenant).await.unwrap();

        let post = Post::new(
            tenant.id.clone(),
            "p1".to_string(),
            "twitter".to_string(),
            "hello".to_string(),
            Some("123".to_string()),
            true,
        );
        let record = MetricsRecord::new(
            &post,
            Engagement {
                impressions: 100,
                likes: 10,
                comments: 2,
                clicks: 5,
                shares: 1,
            },
        );
        db.insert_metrics(&record).await.unwrap();

        let all = db.query_metrics(&tenant.id, None, None, 0).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].engagement.impressions, 100);

        let other = db
            .query_metrics(&tenant.id, None, Some("facebook"), 0)
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
