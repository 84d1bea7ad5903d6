use std::collections::HashSet;

use tally_core::{
    IdentityKey, RuleSet, Transaction, DEFAULT_PERSON, UNCATEGORIZED, UNKNOWN_SOURCE,
};
use thiserror::Error;

use crate::amount::normalize_amount;
use crate::columns::ColumnMapping;
use crate::date::parse_date;
use crate::matcher::RuleMatcher;
use crate::table::{RawTable, TableError};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Required headers missing: need {}", .0.join(", "))]
    MissingHeaders(Vec<&'static str>),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Request-scoped import settings.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Source label used when the table has no source column.
    pub manual_source: Option<String>,
}

impl ImportOptions {
    pub fn with_source(source: &str) -> Self {
        Self {
            manual_source: Some(source.to_string()).filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// Rows that survived parsing and deduplication, ready for insertion.
    pub transactions: Vec<Transaction>,
    /// Rows dropped because their date or amount could not be parsed.
    pub rejected: usize,
    /// Rows dropped because an identical transaction already exists.
    pub duplicates: usize,
    /// Rows classified by a rule.
    pub categorized: usize,
}

/// Turns a raw table into new canonical transactions: sniff columns, parse each row,
/// fill unset fields from `rules`, then drop rows already present in `history`.
pub fn import_table(
    table: &RawTable,
    options: &ImportOptions,
    rules: &RuleSet,
    history: &[Transaction],
) -> Result<ImportOutcome, ImportError> {
    let mapping = ColumnMapping::sniff(&table.headers);
    let required = mapping
        .required()
        .ok_or_else(|| ImportError::MissingHeaders(mapping.missing_required()))?;

    let fallback_source = options
        .manual_source
        .as_deref()
        .unwrap_or(UNKNOWN_SOURCE);
    let matcher = RuleMatcher::new(rules);
    let mut outcome = ImportOutcome::default();
    let mut parsed = Vec::with_capacity(table.rows.len());

    for row in 0..table.rows.len() {
        let (Some(date), Some(amount)) = (
            parse_date(table.cell(row, required.date)),
            normalize_amount(table.cell(row, required.amount)),
        ) else {
            outcome.rejected += 1;
            continue;
        };

        let optional =
            |column: Option<usize>| column.map(|c| table.cell(row, c).trim().to_string());

        let mut tx = Transaction::new(date, table.cell(row, required.description).trim(), amount);
        tx.source = optional(mapping.source)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_source.to_string());
        tx.name = optional(mapping.name).filter(|n| !n.is_empty());
        tx.category = optional(mapping.category).unwrap_or_else(|| UNCATEGORIZED.to_string());
        tx.subcategory = optional(mapping.subcategory).unwrap_or_default();
        tx.person = optional(mapping.person).unwrap_or_else(|| DEFAULT_PERSON.to_string());

        if matcher.apply_to_import(&mut tx) {
            outcome.categorized += 1;
        }
        tx.normalize();
        parsed.push(tx);
    }

    let (fresh, duplicates) = dedup_against_history(parsed, history);
    outcome.transactions = fresh;
    outcome.duplicates = duplicates;

    tracing::info!(
        new = outcome.transactions.len(),
        rejected = outcome.rejected,
        duplicates = outcome.duplicates,
        categorized = outcome.categorized,
        "Import batch prepared"
    );
    Ok(outcome)
}

/// Drops every incoming transaction whose identity triple already exists in
/// `history`. Repeats within the incoming batch itself are kept.
pub fn dedup_against_history(
    incoming: Vec<Transaction>,
    history: &[Transaction],
) -> (Vec<Transaction>, usize) {
    let known: HashSet<IdentityKey> = history.iter().map(Transaction::identity).collect();
    let before = incoming.len();
    let fresh: Vec<Transaction> = incoming
        .into_iter()
        .filter(|tx| !known.contains(&tx.identity()))
        .collect();
    let duplicates = before - fresh.len();
    (fresh, duplicates)
}
