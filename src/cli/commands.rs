//! Command implementations

use super::{ImportTarget, OutputFormat, ReportKind};
use crate::alerts::{format_currency, AlertEngine, RuleOutcome};
use crate::analytics::{Analytics, DealAnalysis, WinMetrics};
use crate::batch::{BatchEngine, ImportKind, ImportReport};
use crate::config::AppConfig;
use crate::health::HealthEngine;
use crate::ledger::QuoteLedger;
use crate::model::{Alert, HealthScore, QuoteStatus};
use crate::seed::{seed_demo_data, SeedReport};
use crate::storage::Database;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

impl From<ImportTarget> for ImportKind {
    fn from(target: ImportTarget) -> Self {
        match target {
            ImportTarget::Customers => ImportKind::Customers,
            ImportTarget::Products => ImportKind::Products,
            ImportTarget::Quotes => ImportKind::Quotes,
        }
    }
}

/// Open the database named by `--db`, falling back to the config file
pub fn open_database(config: &AppConfig, db_override: Option<&Path>) -> Result<Database> {
    let path = db_override.unwrap_or(config.database_path.as_path());
    Database::open(path).with_context(|| format!("Failed to open database: {:?}", path))
}

/// Write a default config file and create the database
pub fn init(config_path: &Path, db_override: Option<&Path>, force: bool) -> Result<AppConfig> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    let mut config = AppConfig::default();
    if let Some(path) = db_override {
        config.database_path = path.to_path_buf();
    }

    let _db = open_database(&config, None)?;
    config.save(config_path)?;

    println!("✓ Initialized QuoteDesk");
    println!("  Database: {:?}", config.database_path);
    println!("  Config: {:?}", config_path);

    Ok(config)
}

/// Seed demo data into empty tables
pub fn seed(db: &Database, config: &AppConfig) -> Result<SeedReport> {
    seed_demo_data(db, &config.ledger).context("Failed to seed demo data")
}

/// Recompute health for one customer, or for all of them
pub fn health(db: &Database, config: &AppConfig, customer: Option<i64>) -> Result<Vec<HealthScore>> {
    let engine = HealthEngine::new(db, &config.health);
    let scores = match customer {
        Some(id) => vec![engine.compute_health(id)?],
        None => engine.compute_health_batch()?,
    };
    Ok(scores)
}

/// Run every alert rule once
pub fn run_alerts(db: &Database, config: &AppConfig) -> Vec<RuleOutcome> {
    AlertEngine::new(db, &config.alerts).run_all_checks()
}

/// Unread alerts of a user, newest first
pub fn unread_alerts(db: &Database, username: &str, limit: usize) -> Result<Vec<Alert>> {
    let user = db
        .get_user_by_username(username)?
        .with_context(|| format!("Unknown user '{}'", username))?;
    Ok(db.unread_alerts(user.id, limit)?)
}

/// Import a CSV file
pub fn import(
    db: &Database,
    config: &AppConfig,
    target: ImportTarget,
    file: &Path,
) -> Result<ImportReport> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {:?}", file))?;

    let engine = BatchEngine::new(db, &config.ledger);
    Ok(engine.import(target.into(), &content))
}

/// Change a quote's status and notify the sales team
pub fn set_status(
    db: &Database,
    config: &AppConfig,
    quote_id: i64,
    status: &str,
    notify: bool,
) -> Result<()> {
    let status: QuoteStatus = status.parse()?;

    QuoteLedger::new(db, &config.ledger)
        .update_status(quote_id, status)
        .with_context(|| format!("Failed to update quote {}", quote_id))?;
    println!("✓ Quote {} is now {}", quote_id, status);

    if notify {
        match AlertEngine::new(db, &config.alerts).notify_status_change(quote_id, status) {
            Ok(ids) => tracing::debug!("Raised {} status alert(s)", ids.len()),
            Err(e) => tracing::warn!("Failed to raise status alerts: {}", e),
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct DealsReport {
    deals: Option<DealAnalysis>,
    outcomes: WinMetrics,
}

/// Print an analytics report
pub fn report(
    db: &Database,
    config: &AppConfig,
    kind: ReportKind,
    days: i64,
    format: OutputFormat,
) -> Result<()> {
    let analytics = Analytics::new(db, &config.analytics);

    match kind {
        ReportKind::Intelligence => {
            let intel = analytics.sales_intelligence()?;
            emit(format, &intel, |intel| {
                println!("Sales intelligence");
                println!("  Customers:      {}", intel.total_customers);
                println!("  Quotes:         {}", intel.total_quotes);
                println!("  Realized value: {}", format_currency(intel.total_value));
                println!("  Win rate:       {:.1}%", intel.win_rate);
                println!("  Average deal:   {}", format_currency(intel.average_deal_size));
                println!(
                    "  Last {} days:   {}",
                    intel.recent_window_days,
                    format_currency(intel.recent_value)
                );
                println!(
                    "  Forecast ({}d): {} ({:?} confidence)",
                    intel.forecast.days,
                    format_currency(intel.forecast.forecast),
                    intel.forecast.confidence
                );
                if !intel.top_customers.is_empty() {
                    println!("\nTop customers:");
                    for (rank, customer) in intel.top_customers.iter().enumerate() {
                        println!(
                            "  {}. {} - {}",
                            rank + 1,
                            customer.customer_name,
                            format_currency(customer.revenue)
                        );
                    }
                }
            })
        }

        ReportKind::Forecast => {
            let forecast = analytics.forecast_revenue(days)?;
            emit(format, &forecast, |f| {
                println!("Revenue forecast for the next {} days", f.days);
                println!("  Forecast:      {}", format_currency(f.forecast));
                println!("  Daily average: {}", format_currency(f.daily_average));
                println!("  Confidence:    {:?}", f.confidence);
                println!("  Trend:         {:?}", f.trend);
            })
        }

        ReportKind::Segments => {
            let groups = analytics.segment_customers()?;
            emit(format, &groups, |groups| {
                for group in groups {
                    println!(
                        "{:<9} {:>3} customer(s)  {}",
                        group.segment.as_str(),
                        group.customers.len(),
                        group.action
                    );
                }
            })
        }

        ReportKind::Anomalies => {
            let report = analytics.detect_anomalies()?;
            emit(format, &report, |report| {
                if let Some(message) = &report.message {
                    println!("{}", message);
                    return;
                }
                if report.anomalies.is_empty() {
                    println!("✓ No anomalies found");
                    return;
                }
                for anomaly in &report.anomalies {
                    println!(
                        "[{}] {} {} (customer average {}): {}",
                        anomaly.kind.severity(),
                        anomaly.quote_number,
                        format_currency(anomaly.amount),
                        format_currency(anomaly.customer_avg),
                        anomaly.kind.description()
                    );
                }
            })
        }

        ReportKind::Churn => {
            let risks = analytics.churn_overview()?;
            emit(format, &risks, |risks| {
                if risks.is_empty() {
                    println!("✓ No customers at elevated churn risk");
                    return;
                }
                for risk in risks {
                    println!("{:>3}%  {}  {}", risk.risk, risk.customer_name, risk.reason);
                }
            })
        }

        ReportKind::Trend => {
            let trend = analytics.revenue_trend()?;
            emit(format, &trend, |t| {
                println!(
                    "Revenue trend ({:?}, {} period(s))",
                    t.granularity, t.periods_analyzed
                );
                println!("  Direction:     {:?} ({:+.1}%)", t.direction, t.trend_percent);
                println!("  Latest period: {}", format_currency(t.latest_revenue));
                println!(
                    "  Previous:      {} ({:+.1}%)",
                    format_currency(t.previous_revenue),
                    t.period_change
                );
            })
        }

        ReportKind::Deals => {
            let report = DealsReport {
                deals: analytics.deal_analysis()?,
                outcomes: analytics.win_metrics()?,
            };
            emit(format, &report, |r| {
                let o = &r.outcomes;
                println!(
                    "Quotes: {} (draft {}, sent {}, accepted {}, rejected {})",
                    o.total_quotes, o.draft_count, o.sent_count, o.accepted_count, o.rejected_count
                );
                println!("  Win rate:         {:.1}%", o.win_rate);
                println!("  Accepted revenue: {}", format_currency(o.accepted_revenue));
                println!("  Pipeline (sent):  {}", format_currency(o.sent_revenue));

                match &r.deals {
                    Some(d) => {
                        println!("\nDeal sizes over {} realized quote(s)", d.total_deals);
                        println!("  Average: {}", format_currency(d.average_deal));
                        println!("  Median:  {}", format_currency(d.median_deal));
                        println!(
                            "  Range:   {} - {}",
                            format_currency(d.min_deal),
                            format_currency(d.max_deal)
                        );
                        println!("  Std dev: {}", format_currency(d.std_dev));
                    }
                    None => println!("\nNo realized deals yet"),
                }
            })
        }
    }
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(value)?,
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print seed counts as text
pub fn print_seed_text(report: &SeedReport) {
    if *report == SeedReport::default() {
        println!("✓ Database already populated, nothing seeded");
        return;
    }
    println!(
        "✓ Seeded {} customer(s), {} product(s), {} user(s), {} quote(s)",
        report.customers, report.products, report.users, report.quotes
    );
}

/// Print health scores as text
pub fn print_health_text(scores: &[HealthScore]) {
    if scores.is_empty() {
        println!("No customers to score.");
        return;
    }

    println!(
        "{:<28} {:>7} {:>7} {:>7} {:>7}  RISK",
        "CUSTOMER", "HEALTH", "ENGAGE", "SPEND", "GROWTH"
    );
    for score in scores {
        println!(
            "{:<28} {:>7.1} {:>7.1} {:>7.1} {:>7.1}  {}",
            score.customer_name.as_deref().unwrap_or("?"),
            score.health_score,
            score.engagement_score,
            score.spend_score,
            score.growth_score,
            score.risk_level
        );
    }
}

/// Print rule outcomes as text
pub fn print_rule_outcomes_text(outcomes: &[RuleOutcome]) {
    for outcome in outcomes {
        match &outcome.error {
            Some(error) => println!("✗ {}: {}", outcome.rule, error),
            None => println!("✓ {}: {} alert(s)", outcome.rule, outcome.alert_ids.len()),
        }
    }
}

/// Print alerts as text
pub fn print_alerts_text(alerts: &[Alert]) {
    if alerts.is_empty() {
        println!("✓ No unread alerts");
        return;
    }

    for alert in alerts {
        println!(
            "[{}] {}  {}",
            alert.severity,
            alert.created_at.format("%Y-%m-%d %H:%M"),
            alert.title
        );
        println!("    {}", alert.message);
    }
}

/// Print an import report as text
pub fn print_import_text(report: &ImportReport) {
    println!("✓ Imported {} row(s)", report.success_count);
    if !report.errors.is_empty() {
        println!("\n{} row(s) rejected:", report.errors.len());
        for error in &report.errors {
            println!("  • {}", error);
        }
    }
}
