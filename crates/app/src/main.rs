//! Tally CLI - rule-based expense categorization
//!
//! Usage:
//!   tally init                      Create the database with default lists and rules
//!   tally import statement.csv      Import and auto-categorize a statement
//!   tally rules apply               Re-apply rules to unlocked history
//!   tally summary --month 2024-03   Spending totals for a month

mod cli;
mod commands;
mod config;
mod ledger;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let db = cli.db.as_deref();
    let cfg = config::load_config()?;

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init => config::init_config(),
            ConfigAction::Show => commands::cmd_config_show(db, &cfg),
        },
        Commands::Init => commands::cmd_init(db, &cfg).await,
        command => {
            let ledger = commands::open_ledger(db, &cfg).await?;
            match command {
                Commands::Import { file, source } => {
                    commands::cmd_import(&ledger, file.as_deref(), source.as_deref(), &cfg).await
                }
                Commands::Transactions { action } => match action {
                    None => {
                        commands::cmd_transactions_list(&ledger, &FilterArgs::default(), false)
                            .await
                    }
                    Some(TransactionsAction::List { filter, json }) => {
                        commands::cmd_transactions_list(&ledger, &filter, json).await
                    }
                    Some(TransactionsAction::Add {
                        date,
                        description,
                        amount,
                        fields,
                        source,
                    }) => {
                        commands::cmd_transactions_add(
                            &ledger,
                            &date,
                            &description,
                            &amount,
                            &fields,
                            source.as_deref(),
                        )
                        .await
                    }
                    Some(TransactionsAction::Edit { id, fields }) => {
                        commands::cmd_transactions_edit(&ledger, id, &fields).await
                    }
                    Some(TransactionsAction::Lock { ids }) => {
                        commands::cmd_transactions_lock(&ledger, &ids, true).await
                    }
                    Some(TransactionsAction::Unlock { ids }) => {
                        commands::cmd_transactions_lock(&ledger, &ids, false).await
                    }
                    Some(TransactionsAction::Delete { ids }) => {
                        commands::cmd_transactions_delete(&ledger, &ids).await
                    }
                },
                Commands::Rules { action } => match action {
                    None | Some(RulesAction::List) => commands::cmd_rules_list(&ledger).await,
                    Some(RulesAction::Add {
                        keyword,
                        category,
                        name,
                        subcategory,
                        person,
                        amount,
                    }) => {
                        commands::cmd_rules_add(
                            &ledger,
                            &keyword,
                            &category,
                            name.as_deref(),
                            subcategory.as_deref(),
                            person.as_deref(),
                            amount.as_deref(),
                        )
                        .await
                    }
                    Some(RulesAction::FromTransaction { id, with_amount }) => {
                        commands::cmd_rules_from_transaction(&ledger, id, with_amount).await
                    }
                    Some(RulesAction::Apply) => commands::cmd_rules_apply(&ledger).await,
                    Some(RulesAction::Learn) => commands::cmd_rules_learn(&ledger).await,
                    Some(RulesAction::Export { file }) => {
                        commands::cmd_rules_export(&ledger, file.as_deref()).await
                    }
                    Some(RulesAction::Import { file, replace }) => {
                        commands::cmd_rules_import(&ledger, &file, replace).await
                    }
                },
                Commands::Trash { action } => match action {
                    None | Some(TrashAction::List) => commands::cmd_trash_list(&ledger).await,
                    Some(TrashAction::Restore { ids }) => {
                        commands::cmd_trash_restore(&ledger, &ids).await
                    }
                    Some(TrashAction::Empty) => commands::cmd_trash_empty(&ledger).await,
                },
                Commands::Summary {
                    filter,
                    breakdown,
                    json,
                } => commands::cmd_summary(&ledger, &filter, breakdown.as_deref(), json).await,
                Commands::Lists { kind } => commands::cmd_lists(&ledger, kind).await,
                Commands::Init | Commands::Config { .. } => Ok(()),
            }
        }
    }
}
