use tally_core::{RuleSet, Transaction};

use crate::matcher::RuleMatcher;

/// Re-runs the rules over unlocked history and returns only the transactions
/// whose classification actually changed, fully updated. Locked rows are never
/// touched. Running it again on its own output yields nothing.
pub fn reconcile(history: &[Transaction], rules: &RuleSet) -> Vec<Transaction> {
    let matcher = RuleMatcher::new(rules);
    if matcher.is_empty() {
        return Vec::new();
    }

    let changed: Vec<Transaction> = history
        .iter()
        .filter(|tx| !tx.locked)
        .filter_map(|tx| {
            let classification = matcher.classify(&tx.description, Some(tx.amount))?;
            let mut updated = tx.clone();
            classification.overwrite(&mut updated).then_some(updated)
        })
        .collect();

    tracing::info!(
        scanned = history.len(),
        changed = changed.len(),
        "Rules re-applied"
    );
    changed
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Money, Rule, TransactionId};

    fn tx(id: i64, desc: &str, cents: i64) -> Transaction {
        let mut tx = Transaction::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            desc,
            Money::from_cents(cents),
        );
        tx.id = Some(TransactionId(id));
        tx
    }

    fn rules() -> RuleSet {
        RuleSet::from_rules(vec![
            Rule::new("starbucks", "Dining")
                .unwrap()
                .with_name("Starbucks Coffee")
                .with_subcategory("Coffee"),
            Rule::new("uber", "Transport").unwrap().with_subcategory("Uber"),
        ])
    }

    #[test]
    fn changes_only_what_rules_alter() {
        let mut already = tx(3, "UBER TRIP", -2500);
        already.category = "Transport".to_string();
        already.subcategory = "Uber".to_string();
        let history = vec![tx(1, "STARBUCKS #1", -550), tx(2, "MYSTERY SHOP", -100), already];

        let changed = reconcile(&history, &rules());
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, Some(TransactionId(1)));
        assert_eq!(changed[0].category, "Dining");
        assert_eq!(changed[0].name.as_deref(), Some("Starbucks Coffee"));
    }

    #[test]
    fn overrides_manual_category_on_unlocked_rows() {
        let mut manual = tx(1, "UBER TRIP", -2500);
        manual.category = "Business".to_string();
        let changed = reconcile(&[manual], &rules());
        assert_eq!(changed[0].category, "Transport");
    }

    #[test]
    fn locked_rows_are_never_altered() {
        let mut locked = tx(1, "STARBUCKS #1", -550);
        locked.locked = true;
        locked.category = "Work".to_string();
        let changed = reconcile(&[locked], &rules());
        assert!(changed.is_empty());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut history = vec![
            tx(1, "STARBUCKS #1", -550),
            tx(2, "UBER TRIP", -2500),
            tx(3, "MYSTERY", -1),
        ];
        let rules = rules();
        let first = reconcile(&history, &rules);
        assert_eq!(first.len(), 2);
        for update in first {
            if let Some(slot) = history.iter_mut().find(|tx| tx.id == update.id) {
                *slot = update;
            }
        }
        assert!(reconcile(&history, &rules).is_empty());
    }

    #[test]
    fn empty_rules_change_nothing() {
        assert!(reconcile(&[tx(1, "STARBUCKS", -1)], &RuleSet::new()).is_empty());
    }
}
