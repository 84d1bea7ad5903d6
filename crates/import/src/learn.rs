use std::collections::HashSet;

use tally_core::{normalize_keyword, Rule, RuleSet, Transaction};

/// Proposes one rule per distinct categorized description not yet covered by a
/// rule keyword. For repeated descriptions the first transaction in `history`
/// order supplies the classification.
pub fn induce(history: &[Transaction], existing: &RuleSet) -> Vec<Rule> {
    let mut seen: HashSet<String> =
        existing.iter().map(|r| normalize_keyword(&r.keyword)).collect();
    let mut learned = Vec::new();

    for tx in history.iter().filter(|tx| !tx.is_uncategorized()) {
        let keyword = normalize_keyword(&tx.description);
        if keyword.is_empty() || seen.contains(&keyword) {
            continue;
        }
        let Ok(rule) = Rule::from_transaction(tx, false) else {
            continue;
        };
        seen.insert(keyword);
        learned.push(rule);
    }

    tracing::info!(learned = learned.len(), "Rules induced from history");
    learned
}
