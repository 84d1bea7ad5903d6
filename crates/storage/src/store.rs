use async_trait::async_trait;
use tally_core::{ReferenceKind, Rule, Transaction, TransactionId, TrashId, TrashedTransaction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Transaction has no id; only persisted transactions can be updated")]
    MissingId,
    #[error("Corrupt {table} row {id}: {reason}")]
    Corrupt {
        table: &'static str,
        id: i64,
        reason: String,
    },
}

/// The persistence boundary. Every call may fail and is issued at most once;
/// a sequence of calls is not atomic.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_transactions(&self) -> Result<Vec<Transaction>, StoreError>;
    /// Inserts unpersisted transactions; any `id` they carry is ignored.
    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<(), StoreError>;
    /// Writes each transaction over the stored row with the same `id`.
    async fn upsert_transactions(&self, transactions: &[Transaction]) -> Result<(), StoreError>;
    async fn delete_transactions(&self, ids: &[TransactionId]) -> Result<(), StoreError>;

    async fn load_rules(&self) -> Result<Vec<Rule>, StoreError>;
    /// Deletes every rule, then inserts `rules`.
    async fn replace_all_rules(&self, rules: &[Rule]) -> Result<(), StoreError>;
    async fn upsert_rules_by_keyword(&self, rules: &[Rule]) -> Result<(), StoreError>;

    async fn load_reference_list(&self, kind: ReferenceKind) -> Result<Vec<String>, StoreError>;
    async fn replace_reference_list(
        &self,
        kind: ReferenceKind,
        items: &[String],
    ) -> Result<(), StoreError>;

    /// Copies transactions into the trash. Removing them from history is a separate call.
    async fn move_to_trash(&self, transactions: &[Transaction]) -> Result<(), StoreError>;
    /// Newest first.
    async fn load_trash(&self) -> Result<Vec<TrashedTransaction>, StoreError>;
    /// Re-inserts trashed transactions under fresh ids and returns how many were restored.
    async fn restore_from_trash(&self, ids: &[TrashId]) -> Result<usize, StoreError>;
    async fn empty_trash(&self) -> Result<(), StoreError>;
}
