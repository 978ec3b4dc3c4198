//! Error types for Adcaster

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdcasterError>;

#[derive(Error, Debug)]
pub enum AdcasterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AdcasterError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AdcasterError::InvalidInput(_) => 3,
            AdcasterError::Billing(BillingError::InsufficientBalance { .. }) => 4,
            AdcasterError::Billing(_) => 1,
            AdcasterError::Platform(PlatformError::Authentication(_)) => 2,
            AdcasterError::Platform(_) => 1,
            AdcasterError::Config(_) => 1,
            AdcasterError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Platform not configured: {0}")]
    NotConfigured(String),
}

#[derive(Error, Debug, Clone)]
pub enum BillingError {
    #[error("Insufficient balance: required {required:.2}, available {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Feature not available on the {0} plan")]
    PlanRestriction(String),
}
