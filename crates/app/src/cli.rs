//! CLI argument definitions using clap
//!
//! Command implementations live in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tally_core::ReferenceKind;

/// Tally - rule-based expense categorization
#[derive(Parser)]
#[command(name = "tally")]
#[command(
    about = "Import bank statements and categorize them with keyword rules",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides config.toml)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and seed default lists and starter rules
    Init,

    /// Import a statement (CSV, or a spreadsheet with the xlsx feature)
    Import {
        /// File to import; reads pasted CSV from stdin when omitted
        file: Option<PathBuf>,

        /// Source label for tables without a source column
        #[arg(short, long)]
        source: Option<String>,
    },

    /// List and edit transactions
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage categorization rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Inspect and restore deleted transactions
    Trash {
        #[command(subcommand)]
        action: Option<TrashAction>,
    },

    /// Spending totals for the selected transactions
    Summary {
        #[command(flatten)]
        filter: FilterArgs,

        /// Also break this category down by subcategory
        #[arg(long)]
        breakdown: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the category, subcategory and people lists
    Lists {
        /// Only show one list: categories, subcategories or people
        kind: Option<ReferenceKind>,
    },

    /// Manage config.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List transactions matching the filter
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Add a transaction by hand
    Add {
        /// Date (YYYY-MM-DD or another recognised format)
        date: String,
        description: String,
        /// Signed amount; negative for spending
        #[arg(allow_hyphen_values = true)]
        amount: String,
        #[command(flatten)]
        fields: FieldArgs,
        #[arg(long)]
        source: Option<String>,
    },
    /// Change fields of a stored transaction
    Edit {
        id: i64,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Protect transactions from rule re-application
    Lock { ids: Vec<i64> },
    /// Allow rule re-application again
    Unlock { ids: Vec<i64> },
    /// Move transactions to the trash
    Delete { ids: Vec<i64> },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List all rules
    List,
    /// Add or overwrite the rule for a keyword
    Add {
        keyword: String,
        category: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long)]
        person: Option<String>,
        /// Only match transactions of this exact amount
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<String>,
    },
    /// Create a rule from a transaction and lock it
    FromTransaction {
        id: i64,
        /// Guard the rule with the transaction's amount
        #[arg(long)]
        with_amount: bool,
    },
    /// Re-apply rules to all unlocked transactions
    Apply,
    /// Create rules from categorized transactions no rule covers yet
    Learn,
    /// Write the rule set as TOML
    Export {
        /// Output file; stdout when omitted
        file: Option<PathBuf>,
    },
    /// Load rules from a TOML file
    Import {
        file: PathBuf,
        /// Replace the whole rule set instead of merging by keyword
        #[arg(long)]
        replace: bool,
    },
}

#[derive(Subcommand)]
pub enum TrashAction {
    /// List deleted transactions, newest first
    List,
    /// Restore deleted transactions by trash id
    Restore { ids: Vec<i64> },
    /// Permanently remove everything in the trash
    Empty,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config.toml
    Init,
    /// Print the effective configuration
    Show,
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum SearchIn {
    Name,
    Description,
    #[default]
    Both,
}

#[derive(Args, Default)]
pub struct FilterArgs {
    /// Calendar year
    #[arg(long, conflicts_with_all = ["month", "from", "to"])]
    pub year: Option<i32>,
    /// Month as YYYY-MM
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub month: Option<String>,
    /// First date to include
    #[arg(long)]
    pub from: Option<String>,
    /// Last date to include
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long = "category")]
    pub categories: Vec<String>,
    #[arg(long = "subcategory")]
    pub subcategories: Vec<String>,
    #[arg(long = "person")]
    pub people: Vec<String>,
    #[arg(long = "source")]
    pub sources: Vec<String>,
    /// Keywords separated by commas or spaces; any may match
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, value_enum, default_value_t = SearchIn::Both)]
    pub search_in: SearchIn,
}

#[derive(Args, Default)]
pub struct FieldArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub subcategory: Option<String>,
    #[arg(long)]
    pub person: Option<String>,
}
