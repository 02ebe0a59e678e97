//! Configuration for QuoteDesk
//!
//! Every heuristic threshold used by the engines lives here so it can be
//! tuned from `config.toml` and pinned in tests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Location of the SQLite database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Quote ledger defaults
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Health scoring weights and thresholds
    #[serde(default)]
    pub health: HealthConfig,

    /// Analytics thresholds
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Alert rule thresholds
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Quote ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Tax rate applied to new quotes (fraction)
    #[serde(default = "default_tax_rate")]
    pub default_tax_rate: f64,

    /// Attempts made to allocate a unique quote number
    #[serde(default = "default_number_retries")]
    pub quote_number_retries: u32,

    /// Pause between quote number attempts, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Customer health scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Engagement points earned per quote
    #[serde(default = "default_points_per_quote")]
    pub points_per_quote: f64,

    /// Realized spend that maps to a full spend score
    #[serde(default = "default_spend_normalization")]
    pub spend_normalization: f64,

    /// Window for the growth component
    #[serde(default = "default_activity_window_days")]
    pub growth_window_days: i64,

    #[serde(default = "default_engagement_weight")]
    pub engagement_weight: f64,

    #[serde(default = "default_spend_weight")]
    pub spend_weight: f64,

    #[serde(default = "default_growth_weight")]
    pub growth_weight: f64,

    /// Minimum health score classified as LOW risk
    #[serde(default = "default_low_risk_min")]
    pub low_risk_min: f64,

    /// Minimum health score classified as MEDIUM risk
    #[serde(default = "default_medium_risk_min")]
    pub medium_risk_min: f64,
}

/// Analytics engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Trailing window for "recent" revenue in the intelligence summary
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,

    /// Trailing window that counts as customer activity
    #[serde(default = "default_activity_window_days")]
    pub activity_window_days: i64,

    #[serde(default = "default_forecast_min_samples")]
    pub forecast_min_quotes: usize,

    #[serde(default = "default_forecast_min_samples")]
    pub forecast_min_days: usize,

    /// R² above which a forecast is High confidence
    #[serde(default = "default_high_confidence_r2")]
    pub high_confidence_r2: f64,

    /// R² above which a forecast is Medium confidence
    #[serde(default = "default_medium_confidence_r2")]
    pub medium_confidence_r2: f64,

    /// Horizon of the forecast embedded in the intelligence summary
    #[serde(default = "default_recent_window_days")]
    pub summary_forecast_days: i64,

    #[serde(default = "default_top_customers")]
    pub top_customers: usize,

    #[serde(default = "default_vip_min_value")]
    pub vip_min_value: f64,

    #[serde(default = "default_vip_min_acceptance")]
    pub vip_min_acceptance: f64,

    #[serde(default = "default_growth_min_value")]
    pub growth_min_value: f64,

    #[serde(default = "default_anomaly_min_quotes")]
    pub anomaly_min_quotes: usize,

    #[serde(default = "default_anomaly_high_multiplier")]
    pub anomaly_high_multiplier: f64,

    #[serde(default = "default_anomaly_low_multiplier")]
    pub anomaly_low_multiplier: f64,

    /// Churn risk above which a customer is listed in the churn overview
    #[serde(default = "default_churn_report_cutoff")]
    pub churn_report_cutoff: u8,
}

/// Alert rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_high_value_threshold")]
    pub high_value_threshold: f64,

    #[serde(default = "default_high_value_window_hours")]
    pub high_value_window_hours: i64,

    /// Month-over-month drop (percent) that raises a revenue alert
    #[serde(default = "default_revenue_drop_percent")]
    pub revenue_drop_percent: f64,

    #[serde(default = "default_activity_window_days")]
    pub churn_inactive_days: i64,
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("quotedesk").join("quotes.db"))
        .unwrap_or_else(|| PathBuf::from("quotes.db"))
}

fn default_tax_rate() -> f64 {
    0.10
}

fn default_number_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    10
}

fn default_points_per_quote() -> f64 {
    20.0
}

fn default_spend_normalization() -> f64 {
    50_000.0
}

fn default_activity_window_days() -> i64 {
    90
}

fn default_engagement_weight() -> f64 {
    0.3
}

fn default_spend_weight() -> f64 {
    0.5
}

fn default_growth_weight() -> f64 {
    0.2
}

fn default_low_risk_min() -> f64 {
    75.0
}

fn default_medium_risk_min() -> f64 {
    50.0
}

fn default_recent_window_days() -> i64 {
    30
}

fn default_forecast_min_samples() -> usize {
    5
}

fn default_high_confidence_r2() -> f64 {
    0.7
}

fn default_medium_confidence_r2() -> f64 {
    0.3
}

fn default_top_customers() -> usize {
    5
}

fn default_vip_min_value() -> f64 {
    100_000.0
}

fn default_vip_min_acceptance() -> f64 {
    0.6
}

fn default_growth_min_value() -> f64 {
    20_000.0
}

fn default_anomaly_min_quotes() -> usize {
    10
}

fn default_anomaly_high_multiplier() -> f64 {
    5.0
}

fn default_anomaly_low_multiplier() -> f64 {
    0.1
}

fn default_churn_report_cutoff() -> u8 {
    40
}

fn default_high_value_threshold() -> f64 {
    5_000.0
}

fn default_high_value_window_hours() -> i64 {
    1
}

fn default_revenue_drop_percent() -> f64 {
    20.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ledger: LedgerConfig::default(),
            health: HealthConfig::default(),
            analytics: AnalyticsConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_tax_rate: default_tax_rate(),
            quote_number_retries: default_number_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            points_per_quote: default_points_per_quote(),
            spend_normalization: default_spend_normalization(),
            growth_window_days: default_activity_window_days(),
            engagement_weight: default_engagement_weight(),
            spend_weight: default_spend_weight(),
            growth_weight: default_growth_weight(),
            low_risk_min: default_low_risk_min(),
            medium_risk_min: default_medium_risk_min(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            recent_window_days: default_recent_window_days(),
            activity_window_days: default_activity_window_days(),
            forecast_min_quotes: default_forecast_min_samples(),
            forecast_min_days: default_forecast_min_samples(),
            high_confidence_r2: default_high_confidence_r2(),
            medium_confidence_r2: default_medium_confidence_r2(),
            summary_forecast_days: default_recent_window_days(),
            top_customers: default_top_customers(),
            vip_min_value: default_vip_min_value(),
            vip_min_acceptance: default_vip_min_acceptance(),
            growth_min_value: default_growth_min_value(),
            anomaly_min_quotes: default_anomaly_min_quotes(),
            anomaly_high_multiplier: default_anomaly_high_multiplier(),
            anomaly_low_multiplier: default_anomaly_low_multiplier(),
            churn_report_cutoff: default_churn_report_cutoff(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: default_high_value_threshold(),
            high_value_window_hours: default_high_value_window_hours(),
            revenue_drop_percent: default_revenue_drop_percent(),
            churn_inactive_days: default_activity_window_days(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, or return defaults if it is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}
