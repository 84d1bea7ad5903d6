use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tally_core::{
    default_rules, normalize_keyword, Money, ReferenceKind, Rule, Transaction, TransactionId,
    TrashId, TrashedTransaction,
};

use crate::store::{Store, StoreError};

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            name TEXT,
            category TEXT NOT NULL DEFAULT 'Uncategorized',
            subcategory TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT 'Unknown',
            person TEXT NOT NULL DEFAULT 'Family',
            locked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deleted_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_id INTEGER,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            name TEXT,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            source TEXT NOT NULL,
            person TEXT NOT NULL,
            locked INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL UNIQUE,
            name TEXT,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL DEFAULT '',
            person TEXT,
            amount TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reference_items (
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (kind, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seeds the default reference lists and starter rules into a store that has
/// never held any data. Lists that already have entries are left untouched.
pub async fn seed_defaults(pool: &DbPool) -> Result<(), sqlx::Error> {
    let (transactions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await?;
    if transactions > 0 {
        return Ok(());
    }

    for kind in ReferenceKind::ALL {
        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reference_items WHERE kind = ?")
                .bind(kind.as_str())
                .fetch_one(pool)
                .await?;
        if existing > 0 {
            continue;
        }
        for item in kind.defaults() {
            sqlx::query("INSERT OR IGNORE INTO reference_items (kind, name) VALUES (?, ?)")
                .bind(kind.as_str())
                .bind(item)
                .execute(pool)
                .await?;
        }
    }

    let (rules,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rules")
        .fetch_one(pool)
        .await?;
    if rules == 0 {
        for rule in default_rules() {
            bind_rule(
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO rules
                        (keyword, name, category, subcategory, person, amount)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                ),
                &rule,
            )
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

// ── Row mapping ───────────────────────────────────────────────────────────────

type TransactionRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    i64,
);

type TrashRow = (
    i64,
    Option<i64>,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    i64,
    String,
);

type RuleRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
);

const TRANSACTION_COLUMNS: &str =
    "id, date, description, amount, name, category, subcategory, source, person, locked";

const TRASH_COLUMNS: &str = "id, original_id, date, description, amount, name, category, \
                             subcategory, source, person, locked, deleted_at";

fn parse_date(table: &'static str, id: i64, s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| StoreError::Corrupt {
        table,
        id,
        reason: format!("date '{s}': {e}"),
    })
}

fn parse_money(table: &'static str, id: i64, s: &str) -> Result<Money, StoreError> {
    Decimal::from_str(s)
        .map(Money::from_decimal)
        .map_err(|e| StoreError::Corrupt {
            table,
            id,
            reason: format!("amount '{s}': {e}"),
        })
}

fn transaction_from_row(r: TransactionRow) -> Result<Transaction, StoreError> {
    Ok(Transaction {
        id: Some(TransactionId(r.0)),
        date: parse_date("transactions", r.0, &r.1)?,
        description: r.2,
        amount: parse_money("transactions", r.0, &r.3)?,
        name: r.4.filter(|n| !n.is_empty()),
        category: r.5,
        subcategory: r.6,
        source: r.7,
        person: r.8,
        locked: r.9 != 0,
    })
}

fn trashed_from_row(r: TrashRow) -> Result<TrashedTransaction, StoreError> {
    let transaction = Transaction {
        id: None,
        date: parse_date("deleted_transactions", r.0, &r.2)?,
        description: r.3,
        amount: parse_money("deleted_transactions", r.0, &r.4)?,
        name: r.5.filter(|n| !n.is_empty()),
        category: r.6,
        subcategory: r.7,
        source: r.8,
        person: r.9,
        locked: r.10 != 0,
    };
    Ok(TrashedTransaction {
        id: TrashId(r.0),
        original_id: r.1.map(TransactionId),
        transaction,
        deleted_at: NaiveDateTime::parse_from_str(&r.11, "%Y-%m-%d %H:%M:%S").ok(),
    })
}

fn rule_from_row(r: RuleRow) -> Result<Rule, StoreError> {
    let amount = r
        .6
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| parse_money("rules", r.0, s))
        .transpose()?;
    Ok(Rule {
        keyword: r.1,
        name: r.2.filter(|n| !n.is_empty()),
        category: r.3,
        subcategory: r.4,
        person: r.5.filter(|p| !p.is_empty()),
        amount,
    })
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds date, description, amount, name, category, subcategory, source, person, locked.
fn bind_transaction<'q>(query: SqliteQuery<'q>, tx: &'q Transaction) -> SqliteQuery<'q> {
    query
        .bind(tx.date.format("%Y-%m-%d").to_string())
        .bind(&tx.description)
        .bind(tx.amount.amount().to_string())
        .bind(tx.name.as_deref())
        .bind(&tx.category)
        .bind(&tx.subcategory)
        .bind(&tx.source)
        .bind(&tx.person)
        .bind(tx.locked)
}

/// Binds keyword, name, category, subcategory, person, amount.
fn bind_rule<'q>(query: SqliteQuery<'q>, rule: &'q Rule) -> SqliteQuery<'q> {
    query
        .bind(normalize_keyword(&rule.keyword))
        .bind(rule.name.as_deref())
        .bind(&rule.category)
        .bind(&rule.subcategory)
        .bind(rule.person.as_deref())
        .bind(rule.amount.map(|a| a.amount().to_string()))
}

// ── SQLite store ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = create_db(path).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        let mut db = self.pool.begin().await?;
        for tx in transactions {
            bind_transaction(
                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (date, description, amount, name, category, subcategory, source, person,
                         locked)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                ),
                tx,
            )
            .execute(&mut *db)
            .await?;
        }
        db.commit().await?;
        tracing::debug!(count = transactions.len(), "Inserted transactions");
        Ok(())
    }

    async fn upsert_transactions(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        if transactions.iter().any(|tx| tx.id.is_none()) {
            return Err(StoreError::MissingId);
        }
        let mut db = self.pool.begin().await?;
        for tx in transactions {
            let id = tx.id.map(|id| id.0);
            bind_transaction(
                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (date, description, amount, name, category, subcategory, source, person,
                         locked, id)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        date = excluded.date,
                        description = excluded.description,
                        amount = excluded.amount,
                        name = excluded.name,
                        category = excluded.category,
                        subcategory = excluded.subcategory,
                        source = excluded.source,
                        person = excluded.person,
                        locked = excluded.locked
                    "#,
                ),
                tx,
            )
            .bind(id)
            .execute(&mut *db)
            .await?;
        }
        db.commit().await?;
        tracing::debug!(count = transactions.len(), "Upserted transactions");
        Ok(())
    }

    async fn delete_transactions(&self, ids: &[TransactionId]) -> Result<(), StoreError> {
        let mut db = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM transactions WHERE id = ?")
                .bind(id.0)
                .execute(&mut *db)
                .await?;
        }
        db.commit().await?;
        Ok(())
    }

    async fn load_rules(&self) -> Result<Vec<Rule>, StoreError> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, keyword, name, category, subcategory, person, amount \
             FROM rules ORDER BY keyword",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(rule_from_row).collect()
    }

    async fn replace_all_rules(&self, rules: &[Rule]) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM rules").execute(&self.pool).await?;
        // A failure below leaves the rule set partially written; callers accept that.
        for rule in rules.iter().filter(|r| !normalize_keyword(&r.keyword).is_empty()) {
            bind_rule(
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO rules
                        (keyword, name, category, subcategory, person, amount)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                ),
                rule,
            )
            .execute(&self.pool)
            .await?;
        }
        tracing::debug!(count = rules.len(), "Replaced rule set");
        Ok(())
    }

    async fn upsert_rules_by_keyword(&self, rules: &[Rule]) -> Result<(), StoreError> {
        let mut db = self.pool.begin().await?;
        for rule in rules.iter().filter(|r| !normalize_keyword(&r.keyword).is_empty()) {
            bind_rule(
                sqlx::query(
                    r#"
                    INSERT INTO rules (keyword, name, category, subcategory, person, amount)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(keyword) DO UPDATE SET
                        name = excluded.name,
                        category = excluded.category,
                        subcategory = excluded.subcategory,
                        person = excluded.person,
                        amount = excluded.amount
                    "#,
                ),
                rule,
            )
            .execute(&mut *db)
            .await?;
        }
        db.commit().await?;
        tracing::debug!(count = rules.len(), "Upserted rules");
        Ok(())
    }

    async fn load_reference_list(&self, kind: ReferenceKind) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT name FROM reference_items WHERE kind = ? ORDER BY name",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn replace_reference_list(
        &self,
        kind: ReferenceKind,
        items: &[String],
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM reference_items WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        for item in items.iter().map(|i| i.trim()).filter(|i| !i.is_empty()) {
            sqlx::query("INSERT OR IGNORE INTO reference_items (kind, name) VALUES (?, ?)")
                .bind(kind.as_str())
                .bind(item)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn move_to_trash(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        let mut db = self.pool.begin().await?;
        for tx in transactions {
            bind_transaction(
                sqlx::query(
                    r#"
                    INSERT INTO deleted_transactions
                        (date, description, amount, name, category, subcategory, source, person,
                         locked, original_id)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                ),
                tx,
            )
            .bind(tx.id.map(|id| id.0))
            .execute(&mut *db)
            .await?;
        }
        db.commit().await?;
        Ok(())
    }

    async fn load_trash(&self) -> Result<Vec<TrashedTransaction>, StoreError> {
        let rows = sqlx::query_as::<_, TrashRow>(&format!(
            "SELECT {TRASH_COLUMNS} FROM deleted_transactions ORDER BY deleted_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(trashed_from_row).collect()
    }

    async fn restore_from_trash(&self, ids: &[TrashId]) -> Result<usize, StoreError> {
        let mut restored = 0;
        for id in ids {
            let mut db = self.pool.begin().await?;
            let row = sqlx::query_as::<_, TrashRow>(&format!(
                "SELECT {TRASH_COLUMNS} FROM deleted_transactions WHERE id = ?"
            ))
            .bind(id.0)
            .fetch_optional(&mut *db)
            .await?;
            let Some(row) = row else {
                continue;
            };
            let item = trashed_from_row(row)?;
            bind_transaction(
                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (date, description, amount, name, category, subcategory, source, person,
                         locked)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                ),
                &item.transaction,
            )
            .execute(&mut *db)
            .await?;
            sqlx::query("DELETE FROM deleted_transactions WHERE id = ?")
                .bind(id.0)
                .execute(&mut *db)
                .await?;
            db.commit().await?;
            restored += 1;
        }
        Ok(restored)
    }

    async fn empty_trash(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM deleted_transactions")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("tally.db")).await.unwrap();
        (dir, store)
    }

    fn tx(day: u32, description: &str, cents: i64) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            description,
            Money::from_cents(cents),
        )
    }

    #[tokio::test]
    async fn insert_assigns_ids_in_order() {
        let (_dir, store) = store().await;
        store
            .insert_transactions(&[tx(1, "UBER TRIP", 1250), tx(2, "REFUND", -500)])
            .await
            .unwrap();

        let loaded = store.load_transactions().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].description, "UBER TRIP");
        assert_eq!(loaded[0].amount, Money::from_cents(1250));
        assert_eq!(loaded[1].amount, Money::from_cents(-500));
        assert!(loaded[0].id.unwrap() < loaded[1].id.unwrap());
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let (_dir, store) = store().await;
        store.insert_transactions(&[tx(1, "NETFLIX", 1599)]).await.unwrap();
        let mut loaded = store.load_transactions().await.unwrap();
        loaded[0].category = "Entertainment".into();
        loaded[0].name = Some("Netflix".into());
        loaded[0].locked = true;
        store.upsert_transactions(&loaded).await.unwrap();

        let again = store.load_transactions().await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].category, "Entertainment");
        assert_eq!(again[0].name.as_deref(), Some("Netflix"));
        assert!(again[0].locked);
    }

    #[tokio::test]
    async fn upsert_without_id_is_rejected() {
        let (_dir, store) = store().await;
        let err = store.upsert_transactions(&[tx(1, "X", 100)]).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingId));
        assert!(store.load_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rules_upsert_by_keyword() {
        let (_dir, store) = store().await;
        let first = Rule::new("uber", "Transport").unwrap();
        store.upsert_rules_by_keyword(&[first]).await.unwrap();
        let second = Rule::new("UBER", "Travel")
            .unwrap()
            .with_amount(Money::from_cents(1250));
        store.upsert_rules_by_keyword(&[second]).await.unwrap();

        let rules = store.load_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].keyword, "uber");
        assert_eq!(rules[0].category, "Travel");
        assert_eq!(rules[0].amount, Some(Money::from_cents(1250)));
    }

    #[tokio::test]
    async fn replace_all_rules_drops_previous() {
        let (_dir, store) = store().await;
        store
            .upsert_rules_by_keyword(&[Rule::new("uber", "Transport").unwrap()])
            .await
            .unwrap();
        store
            .replace_all_rules(&[Rule::new("netflix", "Entertainment").unwrap()])
            .await
            .unwrap();

        let rules = store.load_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].keyword, "netflix");
    }

    #[tokio::test]
    async fn reference_lists_are_kept_per_kind() {
        let (_dir, store) = store().await;
        store
            .replace_reference_list(
                ReferenceKind::People,
                &["Mom".into(), "Dad".into(), " ".into()],
            )
            .await
            .unwrap();
        store
            .replace_reference_list(ReferenceKind::Categories, &["Food".into()])
            .await
            .unwrap();

        let people = store.load_reference_list(ReferenceKind::People).await.unwrap();
        assert_eq!(people, vec!["Dad".to_string(), "Mom".to_string()]);
        let categories = store.load_reference_list(ReferenceKind::Categories).await.unwrap();
        assert_eq!(categories, vec!["Food".to_string()]);
    }

    #[tokio::test]
    async fn trash_round_trip_gives_fresh_id() {
        let (_dir, store) = store().await;
        store.insert_transactions(&[tx(5, "TAOBAO", 8800)]).await.unwrap();
        let loaded = store.load_transactions().await.unwrap();
        let original_id = loaded[0].id.unwrap();

        store.move_to_trash(&loaded).await.unwrap();
        store.delete_transactions(&[original_id]).await.unwrap();
        assert!(store.load_transactions().await.unwrap().is_empty());

        let trash = store.load_trash().await.unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].original_id, Some(original_id));
        assert_eq!(trash[0].transaction.description, "TAOBAO");

        let restored = store
            .restore_from_trash(&[trash[0].id, TrashId(9999)])
            .await
            .unwrap();
        assert_eq!(restored, 1);
        assert!(store.load_trash().await.unwrap().is_empty());

        let back = store.load_transactions().await.unwrap();
        assert_eq!(back.len(), 1);
        assert_ne!(back[0].id, Some(original_id));
        assert_eq!(back[0].amount, Money::from_cents(8800));
    }

    #[tokio::test]
    async fn load_trash_lists_newest_first() {
        let (_dir, store) = store().await;
        store.move_to_trash(&[tx(1, "FIRST", 100)]).await.unwrap();
        store.move_to_trash(&[tx(2, "SECOND", 200)]).await.unwrap();

        let trash = store.load_trash().await.unwrap();
        assert_eq!(trash[0].transaction.description, "SECOND");
        assert_eq!(trash[1].transaction.description, "FIRST");

        store.empty_trash().await.unwrap();
        assert!(store.load_trash().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seed_defaults_only_fills_a_fresh_store() {
        let (_dir, store) = store().await;
        seed_defaults(store.pool()).await.unwrap();

        let people = store.load_reference_list(ReferenceKind::People).await.unwrap();
        assert!(people.contains(&"Family".to_string()));
        let rules = store.load_rules().await.unwrap();
        assert_eq!(rules.len(), default_rules().len());

        store.replace_all_rules(&[]).await.unwrap();
        store.insert_transactions(&[tx(1, "X", 100)]).await.unwrap();
        seed_defaults(store.pool()).await.unwrap();
        assert!(store.load_rules().await.unwrap().is_empty());
    }
}
