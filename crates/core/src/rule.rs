use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::Money;
use super::transaction::{Transaction, DEFAULT_PERSON, UNCATEGORIZED};

#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("Rule keyword must not be empty")]
    EmptyKeyword,
    #[error("Failed to parse rule file: {0}")]
    Parse(String),
    #[error("Failed to write rule file: {0}")]
    Serialize(String),
}

/// Keyword classification directive. The keyword is the rule's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub keyword: String,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub person: Option<String>,
    /// Exact-amount guard; the rule only fires within [`Money::amount_tolerance`] of it.
    #[serde(default)]
    pub amount: Option<Money>,
}

impl Rule {
    pub fn new(keyword: &str, category: &str) -> Result<Self, RuleError> {
        let keyword = normalize_keyword(keyword);
        if keyword.is_empty() {
            return Err(RuleError::EmptyKeyword);
        }
        Ok(Rule {
            keyword,
            name: None,
            category: category.to_string(),
            subcategory: String::new(),
            person: None,
            amount: None,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string()).filter(|n| !n.trim().is_empty());
        self
    }

    pub fn with_subcategory(mut self, subcategory: &str) -> Self {
        self.subcategory = subcategory.to_string();
        self
    }

    pub fn with_person(mut self, person: &str) -> Self {
        self.person = Some(person.to_string()).filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Builds a rule that reproduces an already classified transaction.
    /// The keyword is the trimmed, lower-cased description.
    pub fn from_transaction(tx: &Transaction, include_amount: bool) -> Result<Self, RuleError> {
        let category = if tx.category.trim().is_empty() {
            UNCATEGORIZED
        } else {
            tx.category.as_str()
        };
        let person = if tx.person.trim().is_empty() {
            DEFAULT_PERSON
        } else {
            tx.person.as_str()
        };
        let mut rule = Rule::new(&tx.description, category)?
            .with_name(tx.name.as_deref().unwrap_or_default())
            .with_subcategory(&tx.subcategory)
            .with_person(person);
        if include_amount {
            rule = rule.with_amount(tx.amount);
        }
        Ok(rule)
    }

    pub fn person_or_default(&self) -> &str {
        self.person
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_PERSON)
    }
}

pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// An ordered collection of rules with unique keywords.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, rename = "rule")]
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes every keyword, drops blank ones and collapses duplicate
    /// keywords so that the last occurrence wins.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        let mut set = RuleSet::new();
        for rule in rules {
            set.upsert(rule);
        }
        set
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        let parsed: RuleSet =
            toml::from_str(toml_content).map_err(|e| RuleError::Parse(e.to_string()))?;
        Ok(Self::from_rules(parsed.rules))
    }

    pub fn to_toml(&self) -> Result<String, RuleError> {
        toml::to_string_pretty(self).map_err(|e| RuleError::Serialize(e.to_string()))
    }

    /// Inserts `rule`, overwriting any rule with the same keyword in place.
    /// Returns false when the keyword is blank and nothing was stored.
    pub fn upsert(&mut self, mut rule: Rule) -> bool {
        rule.keyword = normalize_keyword(&rule.keyword);
        if rule.keyword.is_empty() {
            return false;
        }
        match self.rules.iter_mut().find(|r| r.keyword == rule.keyword) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        true
    }

    pub fn contains_keyword(&self, keyword: &str) -> bool {
        let keyword = normalize_keyword(keyword);
        self.rules.iter().any(|r| r.keyword == keyword)
    }

    pub fn get(&self, keyword: &str) -> Option<&Rule> {
        let keyword = normalize_keyword(keyword);
        self.rules.iter().find(|r| r.keyword == keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn new_rule_normalizes_keyword() {
        let rule = Rule::new("  NetFlix ", "Entertainment").unwrap();
        assert_eq!(rule.keyword, "netflix");
    }

    #[test]
    fn new_rule_rejects_blank_keyword() {
        assert!(matches!(Rule::new("   ", "Dining"), Err(RuleError::EmptyKeyword)));
    }

    #[test]
    fn person_defaults_to_family() {
        let rule = Rule::new("uber", "Transport").unwrap();
        assert_eq!(rule.person_or_default(), "Family");
        let rule = rule.with_person("Partner");
        assert_eq!(rule.person_or_default(), "Partner");
    }

    #[test]
    fn upsert_overwrites_same_keyword() {
        let mut set = RuleSet::new();
        set.upsert(Rule::new("uber", "Transport").unwrap());
        set.upsert(Rule::new("UBER ", "Business Travel").unwrap());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("uber").unwrap().category, "Business Travel");
    }

    #[test]
    fn from_rules_drops_blank_keywords() {
        let mut blank = Rule::new("x", "Dining").unwrap();
        blank.keyword = "  ".to_string();
        let set = RuleSet::from_rules(vec![blank, Rule::new("starbucks", "Dining").unwrap()]);
        assert_eq!(set.len(), 1);
        assert!(set.contains_keyword("Starbucks"));
    }

    #[test]
    fn rule_from_transaction_uses_description() {
        let mut tx = Transaction::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "  Uber *Trip HELP.UBER.COM ",
            Money::from_cents(-2500),
        );
        tx.category = "Transport".to_string();
        tx.subcategory = "Uber".to_string();
        tx.person = String::new();
        let rule = Rule::from_transaction(&tx, true).unwrap();
        assert_eq!(rule.keyword, "uber *trip help.uber.com");
        assert_eq!(rule.category, "Transport");
        assert_eq!(rule.subcategory, "Uber");
        assert_eq!(rule.person.as_deref(), Some("Family"));
        assert_eq!(rule.amount, Some(Money::from_cents(-2500)));
        assert_eq!(rule.name, None);

        let unguarded = Rule::from_transaction(&tx, false).unwrap();
        assert_eq!(unguarded.amount, None);
    }

    #[test]
    fn toml_round_trip_keeps_guard() {
        let content = r#"
            [[rule]]
            keyword = "Uber"
            category = "Transport"
            subcategory = "Uber"
            amount = "-25.00"

            [[rule]]
            keyword = "starbucks"
            name = "Starbucks Coffee"
            category = "Dining"
            person = "Family"
        "#;
        let set = RuleSet::from_toml(content).unwrap();
        assert_eq!(set.len(), 2);
        let uber = set.get("uber").unwrap();
        assert_eq!(uber.amount, Some(Money::from_cents(-2500)));
        assert_eq!(uber.person, None);

        let written = set.to_toml().unwrap();
        assert_eq!(RuleSet::from_toml(&written).unwrap(), set);
    }

    #[test]
    fn from_toml_rejects_garbage() {
        assert!(matches!(RuleSet::from_toml("rule = 5"), Err(RuleError::Parse(_))));
    }
}
