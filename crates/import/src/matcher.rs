use serde::{Deserialize, Serialize};
use tally_core::{is_default_category, Money, Rule, RuleSet, Transaction};

/// What a matching rule assigns to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub name: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub person: String,
}

impl Classification {
    fn from_rule(rule: &Rule) -> Self {
        Classification {
            name: rule.name.clone().filter(|n| !n.trim().is_empty()),
            category: rule.category.clone(),
            subcategory: rule.subcategory.clone(),
            person: rule.person_or_default().to_string(),
        }
    }

    /// Import fill: only blank or default fields are written.
    pub fn fill_unset(&self, tx: &mut Transaction) {
        if let Some(name) = &self.name {
            if !tx.has_name() {
                tx.name = Some(name.clone());
            }
        }
        if !self.category.trim().is_empty() && is_default_category(&tx.category) {
            tx.category = self.category.clone();
        }
        if !self.subcategory.is_empty() && tx.subcategory.trim().is_empty() {
            tx.subcategory = self.subcategory.clone();
        }
        if tx.person.trim().is_empty() {
            tx.person = self.person.clone();
        }
    }

    /// Reconciliation fill: every value the rule carries replaces the current one.
    /// Blank rule values never erase existing data. Returns whether anything changed.
    pub fn overwrite(&self, tx: &mut Transaction) -> bool {
        let mut changed = false;
        if let Some(name) = &self.name {
            changed |= replace(&mut tx.name, Some(name.clone()));
        }
        if !self.category.trim().is_empty() {
            changed |= replace(&mut tx.category, self.category.clone());
        }
        if !self.subcategory.is_empty() {
            changed |= replace(&mut tx.subcategory, self.subcategory.clone());
        }
        changed |= replace(&mut tx.person, self.person.clone());
        changed
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Rules pre-sorted so the longest keyword is tried first. Equal lengths fall back
/// to keyword order, which keeps matching independent of how the rules were loaded.
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    pub fn new(rules: &RuleSet) -> Self {
        let mut sorted: Vec<Rule> = rules
            .iter()
            .filter(|r| !r.keyword.trim().is_empty())
            .cloned()
            .collect();
        sorted.sort_by(|a, b| {
            b.keyword
                .chars()
                .count()
                .cmp(&a.keyword.chars().count())
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        Self { rules: sorted }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule, in precedence order, whose keyword occurs in `description` and
    /// whose amount guard (if any) accepts `amount`.
    pub fn find_matching_rule(&self, description: &str, amount: Option<Money>) -> Option<&Rule> {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| text.contains(rule.keyword.to_lowercase().as_str()))
            .find(|rule| match rule.amount {
                Some(guard) => amount.is_some_and(|a| a.within(guard, Money::amount_tolerance())),
                None => true,
            })
    }

    pub fn classify(&self, description: &str, amount: Option<Money>) -> Option<Classification> {
        self.find_matching_rule(description, amount)
            .map(Classification::from_rule)
    }

    /// Fills unset fields of a freshly imported transaction. Rows that already carry
    /// both a real category and a name are left alone without matching.
    pub fn apply_to_import(&self, tx: &mut Transaction) -> bool {
        if !tx.is_uncategorized() && tx.has_name() {
            return false;
        }
        match self.classify(&tx.description, Some(tx.amount)) {
            Some(classification) => {
                classification.fill_unset(tx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rule(keyword: &str, category: &str) -> Rule {
        Rule::new(keyword, category).unwrap()
    }

    fn tx(desc: &str, cents: i64) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            desc,
            Money::from_cents(cents),
        )
    }

    #[test]
    fn contains_match_case_insensitive() {
        let rules = RuleSet::from_rules(vec![rule("whole foods", "Groceries")]);
        let matcher = RuleMatcher::new(&rules);
        let found = matcher.classify("WHOLE FOODS MARKET 123", Some(Money::from_cents(-5000)));
        assert_eq!(found.unwrap().category, "Groceries");
        assert!(matcher.classify("STARBUCKS", None).is_none());
    }

    #[test]
    fn longest_keyword_wins() {
        let rules = RuleSet::from_rules(vec![rule("coffee", "catA"), rule("blue coffee", "catB")]);
        let matcher = RuleMatcher::new(&rules);
        let found = matcher.classify("blue coffee shop", None).unwrap();
        assert_eq!(found.category, "catB");
    }

    #[test]
    fn equal_length_keywords_tie_break_alphabetically() {
        let rules = RuleSet::from_rules(vec![rule("taxi", "Second"), rule("grab", "First")]);
        let matcher = RuleMatcher::new(&rules);
        let found = matcher.classify("GRAB TAXI HK", None).unwrap();
        assert_eq!(found.category, "First");
    }

    #[test]
    fn amount_guard_blocks_other_amounts() {
        let guarded = rule("uber", "Commute").with_amount(Money::from_cents(2500));
        let matcher = RuleMatcher::new(&RuleSet::from_rules(vec![guarded.clone()]));
        assert!(matcher.classify("UBER TRIP", Some(Money::from_cents(3000))).is_none());
        assert!(matcher.classify("UBER TRIP", Some(Money::from_cents(2501))).is_some());
        assert!(matcher.classify("UBER TRIP", None).is_none());

        let matcher = RuleMatcher::new(&RuleSet::from_rules(vec![rule("uber", "Transport")]));
        assert!(matcher.classify("UBER TRIP", Some(Money::from_cents(3000))).is_some());
        assert!(matcher.classify("UBER TRIP", None).is_some());
    }

    #[test]
    fn guarded_miss_falls_through_to_shorter_keyword() {
        let rules = RuleSet::from_rules(vec![
            rule("uber eats", "Dining").with_amount(Money::from_cents(-4000)),
            rule("uber", "Transport"),
        ]);
        let matcher = RuleMatcher::new(&rules);
        let found = matcher.classify("UBER EATS HK", Some(Money::from_cents(-1200))).unwrap();
        assert_eq!(found.category, "Transport");
        let found = matcher.classify("UBER EATS HK", Some(Money::from_cents(-4000))).unwrap();
        assert_eq!(found.category, "Dining");
    }

    #[test]
    fn unset_person_defaults_to_family() {
        let rules = RuleSet::from_rules(vec![rule("netflix", "Entertainment")]);
        let matcher = RuleMatcher::new(&rules);
        assert_eq!(matcher.classify("NETFLIX.COM", None).unwrap().person, "Family");
    }

    #[test]
    fn import_fill_only_touches_defaults() {
        let rules = RuleSet::from_rules(vec![rule("starbucks", "Dining")
            .with_name("Starbucks Coffee")
            .with_subcategory("Coffee")
            .with_person("Partner")]);
        let matcher = RuleMatcher::new(&rules);

        let mut fresh = tx("STARBUCKS #123", -550);
        assert!(matcher.apply_to_import(&mut fresh));
        assert_eq!(fresh.name.as_deref(), Some("Starbucks Coffee"));
        assert_eq!(fresh.category, "Dining");
        assert_eq!(fresh.subcategory, "Coffee");
        // Person was already the default "Family", which is not blank.
        assert_eq!(fresh.person, "Family");

        let mut blank_person = tx("STARBUCKS #123", -550);
        blank_person.person = String::new();
        matcher.apply_to_import(&mut blank_person);
        assert_eq!(blank_person.person, "Partner");

        let mut partly = tx("STARBUCKS #123", -550);
        partly.category = "Work".to_string();
        matcher.apply_to_import(&mut partly);
        assert_eq!(partly.category, "Work");
        assert_eq!(partly.name.as_deref(), Some("Starbucks Coffee"));
    }

    #[test]
    fn import_fill_short_circuits_classified_rows() {
        let matcher = RuleMatcher::new(&RuleSet::from_rules(vec![rule("starbucks", "Dining")
            .with_subcategory("Coffee")]));
        let mut done = tx("STARBUCKS #123", -550);
        done.category = "Work".to_string();
        done.name = Some("Client coffee".to_string());
        assert!(!matcher.apply_to_import(&mut done));
        assert!(done.subcategory.is_empty());
    }

    #[test]
    fn overwrite_reports_changes_and_keeps_existing_on_blank_rule_values() {
        let classification = Classification {
            name: None,
            category: "Transport".to_string(),
            subcategory: String::new(),
            person: "Family".to_string(),
        };
        let mut t = tx("UBER", -2500);
        t.name = Some("Ride".to_string());
        t.subcategory = "Taxi".to_string();
        assert!(classification.overwrite(&mut t));
        assert_eq!(t.category, "Transport");
        assert_eq!(t.name.as_deref(), Some("Ride"));
        assert_eq!(t.subcategory, "Taxi");
        assert!(!classification.overwrite(&mut t));
    }
}
