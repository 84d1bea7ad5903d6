use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::money::Money;
use super::period::DateRange;
use super::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchField {
    Name,
    Description,
    #[default]
    Both,
}

/// Request-scoped view selection. Empty selections mean "no restriction".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub range: Option<DateRange>,
    pub categories: Vec<String>,
    pub subcategories: Vec<String>,
    pub people: Vec<String>,
    pub sources: Vec<String>,
    pub search: Option<String>,
    pub search_field: SearchField,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(range) = self.range {
            if !range.contains(tx.date) {
                return false;
            }
        }
        if !selected(&self.categories, &tx.category) {
            return false;
        }
        // Transactions without a subcategory are never hidden by a subcategory selection.
        if !tx.subcategory.is_empty() && !selected(&self.subcategories, &tx.subcategory) {
            return false;
        }
        if !selected(&self.people, &tx.person) || !selected(&self.sources, &tx.source) {
            return false;
        }
        self.matches_search(tx)
    }

    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions.iter().filter(|tx| self.matches(tx)).collect()
    }

    fn matches_search(&self, tx: &Transaction) -> bool {
        let keywords = search_keywords(self.search.as_deref().unwrap_or_default());
        if keywords.is_empty() {
            return true;
        }
        let name = tx.name.as_deref().unwrap_or_default().to_lowercase();
        let description = tx.description.to_lowercase();
        keywords.iter().any(|k| match self.search_field {
            SearchField::Name => name.contains(k.as_str()),
            SearchField::Description => description.contains(k.as_str()),
            SearchField::Both => name.contains(k.as_str()) || description.contains(k.as_str()),
        })
    }
}

fn selected(selection: &[String], value: &str) -> bool {
    selection.is_empty() || selection.iter().any(|s| s == value)
}

fn search_keywords(search: &str) -> Vec<String> {
    search
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Spend attributed to one bucket. `spend` is the negated sum of amounts, so
/// expenses count positive and refunds reduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTotal {
    pub label: String,
    pub spend: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingSummary {
    pub transaction_count: usize,
    pub gross_spend: Money,
    pub refunds: Money,
    pub net_spend: Money,
    pub by_category: Vec<BucketTotal>,
    pub by_person: Vec<BucketTotal>,
}

pub fn summarize<'a, I>(transactions: I) -> SpendingSummary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let transactions: Vec<&Transaction> = transactions.into_iter().collect();
    let gross_spend: Money = -transactions
        .iter()
        .filter(|tx| tx.amount.is_expense())
        .map(|tx| tx.amount)
        .sum::<Money>();
    let refunds: Money = transactions
        .iter()
        .filter(|tx| tx.amount.is_income())
        .map(|tx| tx.amount)
        .sum();

    SpendingSummary {
        transaction_count: transactions.len(),
        gross_spend,
        refunds,
        net_spend: gross_spend - refunds,
        by_category: bucket_totals(&transactions, |tx| tx.category.as_str()),
        by_person: bucket_totals(&transactions, |tx| tx.person.as_str()),
    }
}

/// Spend per subcategory within one category, largest first.
pub fn subcategory_breakdown<'a, I>(transactions: I, category: &str) -> Vec<BucketTotal>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let in_category: Vec<&Transaction> = transactions
        .into_iter()
        .filter(|tx| tx.category == category)
        .collect();
    bucket_totals(&in_category, |tx| tx.subcategory.as_str())
}

fn bucket_totals<F>(transactions: &[&Transaction], key: F) -> Vec<BucketTotal>
where
    F: Fn(&Transaction) -> &str,
{
    let mut totals: BTreeMap<&str, Money> = BTreeMap::new();
    for tx in transactions {
        let entry = totals.entry(key(tx)).or_insert_with(Money::zero);
        *entry = *entry - tx.amount;
    }
    let mut buckets: Vec<BucketTotal> = totals
        .into_iter()
        .map(|(label, spend)| BucketTotal {
            label: label.to_string(),
            spend,
        })
        .collect();
    // Stable sort keeps labels alphabetical among equal totals.
    buckets.sort_by(|a, b| b.spend.cmp(&a.spend));
    buckets
}
