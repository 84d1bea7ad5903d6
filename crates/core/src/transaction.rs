use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const DEFAULT_PERSON: &str = "Family";
pub const UNKNOWN_SOURCE: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<TransactionId>,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub name: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub source: String,
    pub person: String,
    pub locked: bool,
}

impl Transaction {
    /// An unpersisted, unclassified transaction carrying the default buckets.
    pub fn new(date: NaiveDate, description: &str, amount: Money) -> Self {
        Transaction {
            id: None,
            date,
            description: description.to_string(),
            amount,
            name: None,
            category: UNCATEGORIZED.to_string(),
            subcategory: String::new(),
            source: UNKNOWN_SOURCE.to_string(),
            person: DEFAULT_PERSON.to_string(),
            locked: false,
        }
    }

    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(self.date, &self.description, self.amount)
    }

    pub fn is_uncategorized(&self) -> bool {
        is_default_category(&self.category)
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Restores the non-empty invariants on `category`, `person` and `source`
    /// and collapses a blank `name` to `None`.
    pub fn normalize(&mut self) {
        if self.category.trim().is_empty() {
            self.category = UNCATEGORIZED.to_string();
        }
        if self.person.trim().is_empty() {
            self.person = DEFAULT_PERSON.to_string();
        }
        if self.source.trim().is_empty() {
            self.source = UNKNOWN_SOURCE.to_string();
        }
        if !self.has_name() {
            self.name = None;
        }
    }
}

/// Category values that mean "no classification yet".
pub fn is_default_category(category: &str) -> bool {
    let category = category.trim();
    category.is_empty() || category == UNCATEGORIZED
}

/// Deduplication key. Two transactions with equal keys are the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
}

impl IdentityKey {
    pub fn new(date: NaiveDate, description: &str, amount: Money) -> Self {
        IdentityKey {
            date,
            description: description.to_string(),
            amount: amount.normalized(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrashId(pub i64);

impl fmt::Display for TrashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A soft-deleted transaction. `transaction` keeps every field verbatim; its `id`
/// is cleared and the former id is kept in `original_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashedTransaction {
    pub id: TrashId,
    pub original_id: Option<TransactionId>,
    pub transaction: Transaction,
    pub deleted_at: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_transaction_has_defaults() {
        let tx = Transaction::new(date(2024, 1, 5), "STARBUCKS #123", Money::from_cents(-550));
        assert_eq!(tx.category, "Uncategorized");
        assert_eq!(tx.person, "Family");
        assert_eq!(tx.source, "Unknown");
        assert!(tx.subcategory.is_empty());
        assert!(!tx.locked);
        assert!(tx.id.is_none());
    }

    #[test]
    fn normalize_fills_blank_buckets() {
        let mut tx = Transaction::new(date(2024, 1, 5), "x", Money::from_cents(-1));
        tx.category = "  ".to_string();
        tx.person = String::new();
        tx.source = String::new();
        tx.name = Some(" ".to_string());
        tx.normalize();
        assert_eq!(tx.category, UNCATEGORIZED);
        assert_eq!(tx.person, DEFAULT_PERSON);
        assert_eq!(tx.source, UNKNOWN_SOURCE);
        assert_eq!(tx.name, None);
    }

    #[test]
    fn identity_ignores_classification_fields() {
        let a = Transaction::new(date(2024, 1, 5), "UBER TRIP", Money::from_cents(-2500));
        let mut b = a.clone();
        b.category = "Transport".to_string();
        b.person = "Partner".to_string();
        b.id = Some(TransactionId(7));
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn identity_equates_amount_scale() {
        let a = Transaction::new(date(2024, 1, 5), "x", Money::from_decimal(Decimal::new(550, 2)));
        let b = Transaction::new(date(2024, 1, 5), "x", Money::from_decimal(Decimal::new(55, 1)));
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn identity_distinguishes_description() {
        let a = Transaction::new(date(2024, 1, 5), "UBER TRIP", Money::from_cents(-2500));
        let b = Transaction::new(date(2024, 1, 5), "UBER EATS", Money::from_cents(-2500));
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn amount_serializes_as_decimal_string() {
        let tx = Transaction::new(date(2024, 1, 5), "x", Money::from_cents(-550));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["amount"], "-5.50");
        assert_eq!(json["date"], "2024-01-05");
    }
}
