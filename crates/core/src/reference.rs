use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::rule::Rule;
use super::transaction::Transaction;

/// The user-curated lists offered when classifying transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Categories,
    Subcategories,
    People,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 3] = [
        ReferenceKind::Categories,
        ReferenceKind::Subcategories,
        ReferenceKind::People,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::Categories => "categories",
            ReferenceKind::Subcategories => "subcategories",
            ReferenceKind::People => "people",
        }
    }

    pub fn defaults(self) -> Vec<String> {
        let items: &[&str] = match self {
            ReferenceKind::Categories => DEFAULT_CATEGORIES,
            ReferenceKind::Subcategories => DEFAULT_SUBCATEGORIES,
            ReferenceKind::People => DEFAULT_PEOPLE,
        };
        let mut items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        items.sort();
        items
    }

    fn value_of(self, tx: &Transaction) -> &str {
        match self {
            ReferenceKind::Categories => &tx.category,
            ReferenceKind::Subcategories => &tx.subcategory,
            ReferenceKind::People => &tx.person,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "categories" | "category" => Ok(ReferenceKind::Categories),
            "subcategories" | "subcategory" => Ok(ReferenceKind::Subcategories),
            "people" | "person" => Ok(ReferenceKind::People),
            other => Err(format!("Unknown reference list: '{other}'")),
        }
    }
}

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Transport",
    "Dining",
    "Groceries",
    "Entertainment",
    "Shopping",
    "Travel",
    "Bills & Utilities",
    "Transfer/Payment",
    "Uncategorized",
    "Medical",
    "Pets",
    "Investments",
    "Beauty & Spa",
    "Education",
];

pub const DEFAULT_SUBCATEGORIES: &[&str] = &[
    "Coffee",
    "Restaurant",
    "Flights",
    "Hotel",
    "Taxi",
    "Uber",
    "Gas",
    "Supermarket",
    "Online Shopping",
    "Subscription",
    "General",
];

pub const DEFAULT_PEOPLE: &[&str] = &["Family", "Partner", "Business"];

/// Starter rules: (keyword, name, category, subcategory, person).
pub const DEFAULT_RULES: &[(&str, &str, &str, &str, &str)] = &[
    ("uber", "Uber Ride", "Transport", "Uber", "Family"),
    ("starbucks", "Starbucks Coffee", "Dining", "Coffee", "Family"),
    ("netflix", "Netflix Subscription", "Entertainment", "Subscription", "Family"),
    ("taobao", "Taobao Purchase", "Shopping", "Online Shopping", "Family"),
];

pub fn default_rules() -> Vec<Rule> {
    DEFAULT_RULES
        .iter()
        .filter_map(|(keyword, name, category, subcategory, person)| {
            Rule::new(keyword, category).ok().map(|r| {
                r.with_name(name)
                    .with_subcategory(subcategory)
                    .with_person(person)
            })
        })
        .collect()
}

/// Returns `current` extended with every non-blank value of `kind` used by `transactions`
/// that it does not already contain, sorted. `None` when nothing new was found.
pub fn extend_reference_list(
    kind: ReferenceKind,
    current: &[String],
    transactions: &[Transaction],
) -> Option<Vec<String>> {
    let known: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    let added: BTreeSet<&str> = transactions
        .iter()
        .map(|tx| kind.value_of(tx).trim())
        .filter(|v| !v.is_empty() && !known.contains(v))
        .collect();
    if added.is_empty() {
        return None;
    }
    let mut extended: Vec<String> = current.to_vec();
    extended.extend(added.into_iter().map(str::to_string));
    extended.sort();
    Some(extended)
}
