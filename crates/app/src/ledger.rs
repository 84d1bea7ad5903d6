use anyhow::{Context, Result};
use std::collections::HashSet;

use tally_core::{
    extend_reference_list, subcategory_breakdown, summarize, BucketTotal, ReferenceKind, Rule,
    RuleSet, SpendingSummary, Transaction, TransactionFilter, TransactionId, TrashId,
    TrashedTransaction,
};
use tally_import::{import_table, induce, reconcile, ImportOptions, RawTable};
use tally_storage::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub categorized: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditReport {
    pub updated: usize,
    pub inserted: usize,
}

/// Runs the pure import and classification steps against a [`Store`].
/// Each operation loads what it needs, computes, then issues its writes.
pub struct Ledger<S> {
    store: S,
}

impl<S: Store> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.store
            .load_transactions()
            .await
            .context("load transactions")
    }

    pub async fn rules(&self) -> Result<RuleSet> {
        let rules = self.store.load_rules().await.context("load rules")?;
        Ok(RuleSet::from_rules(rules))
    }

    // ── Import & classification ───────────────────────────────────────────────

    pub async fn import(&self, table: &RawTable, options: &ImportOptions) -> Result<ImportReport> {
        let rules = self.rules().await?;
        let history = self.transactions().await?;
        let outcome = import_table(table, options, &rules, &history)?;

        if !outcome.transactions.is_empty() {
            self.store
                .insert_transactions(&outcome.transactions)
                .await
                .context("insert imported transactions")?;
        }

        Ok(ImportReport {
            imported: outcome.transactions.len(),
            rejected: outcome.rejected,
            duplicates: outcome.duplicates,
            categorized: outcome.categorized,
        })
    }

    /// Re-applies the current rules to unlocked history. Returns how many rows changed.
    pub async fn reapply_rules(&self) -> Result<usize> {
        let rules = self.rules().await?;
        let history = self.transactions().await?;
        let changed = reconcile(&history, &rules);
        if !changed.is_empty() {
            self.store
                .upsert_transactions(&changed)
                .await
                .context("save reclassified transactions")?;
        }
        Ok(changed.len())
    }

    pub async fn auto_learn(&self) -> Result<Vec<Rule>> {
        let rules = self.rules().await?;
        let history = self.transactions().await?;
        let learned = induce(&history, &rules);
        if !learned.is_empty() {
            self.store
                .upsert_rules_by_keyword(&learned)
                .await
                .context("save learned rules")?;
        }
        Ok(learned)
    }

    // ── Rules ─────────────────────────────────────────────────────────────────

    pub async fn teach(&self, rule: Rule) -> Result<()> {
        self.store
            .upsert_rules_by_keyword(std::slice::from_ref(&rule))
            .await
            .with_context(|| format!("save rule '{}'", rule.keyword))
    }

    /// Replaces the whole rule set. Blank keywords are dropped and repeated
    /// keywords collapse to their last occurrence. Returns the number stored.
    pub async fn save_rules(&self, rules: Vec<Rule>) -> Result<usize> {
        let rules = RuleSet::from_rules(rules).into_rules();
        self.store
            .replace_all_rules(&rules)
            .await
            .context("replace rules")?;
        Ok(rules.len())
    }

    /// Creates a rule reproducing transaction `id` and locks that transaction.
    pub async fn rule_from_transaction(
        &self,
        id: TransactionId,
        include_amount: bool,
    ) -> Result<Rule> {
        let mut tx = self
            .transactions()
            .await?
            .into_iter()
            .find(|tx| tx.id == Some(id))
            .with_context(|| format!("no transaction with id {id}"))?;

        let rule = Rule::from_transaction(&tx, include_amount)?;
        self.teach(rule.clone()).await?;

        tx.locked = true;
        self.store
            .upsert_transactions(std::slice::from_ref(&tx))
            .await
            .context("lock transaction")?;
        Ok(rule)
    }

    pub async fn export_rules(&self) -> Result<String> {
        Ok(self.rules().await?.to_toml()?)
    }

    /// Loads rules from TOML. With `replace` the file becomes the whole rule
    /// set; otherwise its rules are merged in by keyword.
    pub async fn import_rules(&self, toml_content: &str, replace: bool) -> Result<usize> {
        let incoming = RuleSet::from_toml(toml_content)?;
        let count = incoming.len();
        if replace {
            self.save_rules(incoming.into_rules()).await?;
        } else {
            self.store
                .upsert_rules_by_keyword(&incoming.into_rules())
                .await
                .context("merge rules")?;
        }
        Ok(count)
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    /// Persists edited rows: rows with an id overwrite their stored version,
    /// rows without one are inserted. Values the reference lists lack are added.
    pub async fn save_edits(&self, mut edits: Vec<Transaction>) -> Result<EditReport> {
        for tx in &mut edits {
            tx.description = tx.description.trim().to_string();
            tx.subcategory = tx.subcategory.trim().to_string();
            tx.normalize();
        }

        for kind in ReferenceKind::ALL {
            let current = self.reference_list(kind).await?;
            if let Some(extended) = extend_reference_list(kind, &current, &edits) {
                self.store
                    .replace_reference_list(kind, &extended)
                    .await
                    .with_context(|| format!("save {kind}"))?;
            }
        }

        let (updates, inserts): (Vec<Transaction>, Vec<Transaction>) =
            edits.into_iter().partition(|tx| tx.id.is_some());
        if !updates.is_empty() {
            self.store
                .upsert_transactions(&updates)
                .await
                .context("update transactions")?;
        }
        if !inserts.is_empty() {
            self.store
                .insert_transactions(&inserts)
                .await
                .context("insert transactions")?;
        }

        Ok(EditReport {
            updated: updates.len(),
            inserted: inserts.len(),
        })
    }

    /// Returns how many transactions actually changed state.
    pub async fn set_locked(&self, ids: &[TransactionId], locked: bool) -> Result<usize> {
        let wanted: HashSet<TransactionId> = ids.iter().copied().collect();
        let changed: Vec<Transaction> = self
            .transactions()
            .await?
            .into_iter()
            .filter(|tx| tx.id.is_some_and(|id| wanted.contains(&id)) && tx.locked != locked)
            .map(|mut tx| {
                tx.locked = locked;
                tx
            })
            .collect();
        if !changed.is_empty() {
            self.store
                .upsert_transactions(&changed)
                .await
                .context("update lock state")?;
        }
        Ok(changed.len())
    }

    pub async fn reference_list(&self, kind: ReferenceKind) -> Result<Vec<String>> {
        self.store
            .load_reference_list(kind)
            .await
            .with_context(|| format!("load {kind}"))
    }

    // ── Trash ─────────────────────────────────────────────────────────────────

    pub async fn trash(&self, ids: &[TransactionId]) -> Result<usize> {
        let wanted: HashSet<TransactionId> = ids.iter().copied().collect();
        let doomed: Vec<Transaction> = self
            .transactions()
            .await?
            .into_iter()
            .filter(|tx| tx.id.is_some_and(|id| wanted.contains(&id)))
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        self.store
            .move_to_trash(&doomed)
            .await
            .context("copy transactions to trash")?;
        let doomed_ids: Vec<TransactionId> = doomed.iter().filter_map(|tx| tx.id).collect();
        self.store
            .delete_transactions(&doomed_ids)
            .await
            .context("delete trashed transactions")?;
        tracing::info!(count = doomed.len(), "Moved transactions to trash");
        Ok(doomed.len())
    }

    pub async fn list_trash(&self) -> Result<Vec<TrashedTransaction>> {
        self.store.load_trash().await.context("load trash")
    }

    pub async fn restore(&self, ids: &[TrashId]) -> Result<usize> {
        self.store
            .restore_from_trash(ids)
            .await
            .context("restore from trash")
    }

    pub async fn empty_trash(&self) -> Result<()> {
        self.store.empty_trash().await.context("empty trash")
    }

    // ── Reporting ─────────────────────────────────────────────────────────────

    pub async fn filtered(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let history = self.transactions().await?;
        Ok(history.into_iter().filter(|tx| filter.matches(tx)).collect())
    }

    pub async fn summary(&self, filter: &TransactionFilter) -> Result<SpendingSummary> {
        let selected = self.filtered(filter).await?;
        Ok(summarize(&selected))
    }

    pub async fn breakdown(
        &self,
        filter: &TransactionFilter,
        category: &str,
    ) -> Result<Vec<BucketTotal>> {
        let selected = self.filtered(filter).await?;
        Ok(subcategory_breakdown(&selected, category))
    }
}
