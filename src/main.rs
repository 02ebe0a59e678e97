//! QuoteDesk - quoting ledger and sales analytics
//!
//! Operator command line over the local quote database.

use anyhow::Result;
use quotedesk::cli::{
    health, import, init, open_database, print_alerts_text, print_health_text, print_import_text,
    print_json, print_rule_outcomes_text, print_seed_text, report, run_alerts, seed, set_status,
    unread_alerts, Cli, Commands, OutputFormat,
};
use quotedesk::batch::ImportKind;
use quotedesk::config::AppConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let db_override = cli.db.as_deref();

    if let Commands::Init(args) = &cli.command {
        let config = init(&cli.config, db_override, args.force)?;
        if args.seed {
            let db = open_database(&config, None)?;
            let seeded = seed(&db, &config)?;
            match cli.format {
                OutputFormat::Json => print_json(&seeded)?,
                OutputFormat::Text => print_seed_text(&seeded),
            }
        }
        return Ok(());
    }

    if let Commands::Import(args) = &cli.command {
        if args.template {
            print!("{}", ImportKind::from(args.kind).template());
            return Ok(());
        }
    }

    let config = AppConfig::load_or_default(&cli.config)?;
    let db = open_database(&config, db_override)?;

    // Execute command
    match cli.command {
        Commands::Init(_) => {}

        Commands::Seed => {
            let seeded = seed(&db, &config)?;
            match cli.format {
                OutputFormat::Json => print_json(&seeded)?,
                OutputFormat::Text => print_seed_text(&seeded),
            }
        }

        Commands::Health(args) => {
            let scores = health(&db, &config, args.customer)?;
            match cli.format {
                OutputFormat::Json => print_json(&scores)?,
                OutputFormat::Text => print_health_text(&scores),
            }
        }

        Commands::Alerts(args) => match args.user.as_deref() {
            Some(username) => {
                let alerts = unread_alerts(&db, username, args.limit)?;
                match cli.format {
                    OutputFormat::Json => print_json(&alerts)?,
                    OutputFormat::Text => print_alerts_text(&alerts),
                }
            }
            None => {
                let outcomes = run_alerts(&db, &config);
                match cli.format {
                    OutputFormat::Json => print_json(&outcomes)?,
                    OutputFormat::Text => print_rule_outcomes_text(&outcomes),
                }
            }
        },

        Commands::Import(args) => {
            let Some(file) = args.file.as_deref() else {
                anyhow::bail!("No CSV file given. Pass a file or --template.");
            };
            let imported = import(&db, &config, args.kind, file)?;
            match cli.format {
                OutputFormat::Json => print_json(&imported)?,
                OutputFormat::Text => print_import_text(&imported),
            }
        }

        Commands::Status(args) => {
            set_status(&db, &config, args.quote_id, &args.status, !args.quiet)?;
        }

        Commands::Report(args) => {
            report(&db, &config, args.kind, args.days, cli.format)?;
        }
    }

    Ok(())
}
