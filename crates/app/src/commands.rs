use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::io::Read;
use std::path::Path;

use tally_core::{
    BucketTotal, DateRange, ReferenceKind, Rule, SearchField, Transaction, TransactionFilter,
    TransactionId, TrashId,
};
use tally_import::{normalize_amount, parse_date, ImportOptions, RawTable};
use tally_storage::{seed_defaults, SqliteStore};

use crate::cli::{FieldArgs, FilterArgs, SearchIn};
use crate::config::Config;
use crate::ledger::Ledger;

pub async fn open_ledger(db: Option<&Path>, config: &Config) -> Result<Ledger<SqliteStore>> {
    let path = config.database_path(db)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("open database {}", path.display()))?;
    seed_defaults(store.pool())
        .await
        .context("seed default lists and rules")?;
    tracing::debug!(db = %path.display(), "Database ready");
    Ok(Ledger::new(store))
}

pub async fn cmd_init(db: Option<&Path>, config: &Config) -> Result<()> {
    let path = config.database_path(db)?;
    let ledger = open_ledger(db, config).await?;
    let rules = ledger.rules().await?;
    println!("Database ready at {}", path.display());
    println!("  {} rules", rules.len());
    for kind in ReferenceKind::ALL {
        println!("  {} {}", ledger.reference_list(kind).await?.len(), kind);
    }
    Ok(())
}

// ── Import ────────────────────────────────────────────────────────────────────

fn read_table(file: Option<&Path>) -> Result<RawTable> {
    let Some(path) = file else {
        let mut pasted = String::new();
        std::io::stdin()
            .read_to_string(&mut pasted)
            .context("read pasted CSV from stdin")?;
        return Ok(RawTable::from_csv_str(&pasted)?);
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        #[cfg(feature = "xlsx")]
        "xlsx" | "xls" | "ods" => Ok(RawTable::from_workbook(path)?),
        #[cfg(not(feature = "xlsx"))]
        "xlsx" | "xls" | "ods" => bail!("spreadsheet import needs the `xlsx` feature"),
        _ => {
            let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
            Ok(RawTable::from_csv_reader(file)?)
        }
    }
}

pub async fn cmd_import(
    ledger: &Ledger<SqliteStore>,
    file: Option<&Path>,
    source: Option<&str>,
    config: &Config,
) -> Result<()> {
    let table = read_table(file)?;
    let options = source
        .or(config.default_source.as_deref())
        .map(ImportOptions::with_source)
        .unwrap_or_default();

    let report = ledger.import(&table, &options).await?;
    println!("Imported {} transactions", report.imported);
    println!("  {} categorized by rules", report.categorized);
    if report.duplicates > 0 {
        println!("  {} duplicates skipped", report.duplicates);
    }
    if report.rejected > 0 {
        println!("  {} rows with unreadable date or amount skipped", report.rejected);
    }
    Ok(())
}

// ── Transactions ──────────────────────────────────────────────────────────────

fn parse_day(raw: &str) -> Result<NaiveDate> {
    parse_date(raw).with_context(|| format!("unrecognised date '{raw}'"))
}

pub fn build_filter(args: &FilterArgs) -> Result<TransactionFilter> {
    let range = match (args.year, &args.month, &args.from, &args.to) {
        (Some(year), ..) => {
            Some(DateRange::year(year).with_context(|| format!("bad year {year}"))?)
        }
        (None, Some(month), _, _) => Some(
            DateRange::parse_month(month).with_context(|| format!("bad month '{month}'"))?,
        ),
        (None, None, None, None) => None,
        (None, None, from, to) => Some(DateRange::new(
            from.as_deref().map(parse_day).transpose()?.unwrap_or(NaiveDate::MIN),
            to.as_deref().map(parse_day).transpose()?.unwrap_or(NaiveDate::MAX),
        )),
    };
    Ok(TransactionFilter {
        range,
        categories: args.categories.clone(),
        subcategories: args.subcategories.clone(),
        people: args.people.clone(),
        sources: args.sources.clone(),
        search: args.search.clone(),
        search_field: match args.search_in {
            SearchIn::Name => SearchField::Name,
            SearchIn::Description => SearchField::Description,
            SearchIn::Both => SearchField::Both,
        },
    })
}

fn apply_fields(tx: &mut Transaction, fields: &FieldArgs) {
    if let Some(name) = &fields.name {
        tx.name = Some(name.clone());
    }
    if let Some(category) = &fields.category {
        tx.category = category.clone();
    }
    if let Some(subcategory) = &fields.subcategory {
        tx.subcategory = subcategory.clone();
    }
    if let Some(person) = &fields.person {
        tx.person = person.clone();
    }
}

fn print_transaction(tx: &Transaction) {
    let id = tx.id.map(|id| id.to_string()).unwrap_or_default();
    let lock = if tx.locked { "  [locked]" } else { "" };
    let class = if tx.subcategory.is_empty() {
        tx.category.clone()
    } else {
        format!("{}/{}", tx.category, tx.subcategory)
    };
    println!(
        "{:>5}  {}  {:>12}  {:<36}  {:<24}  {:<10}  {}{}",
        id,
        tx.date,
        tx.amount.to_string(),
        tx.name.as_deref().unwrap_or(&tx.description),
        class,
        tx.person,
        tx.source,
        lock,
    );
}

pub async fn cmd_transactions_list(
    ledger: &Ledger<SqliteStore>,
    filter: &FilterArgs,
    json: bool,
) -> Result<()> {
    let filter = build_filter(filter)?;
    let selected = ledger.filtered(&filter).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }
    if selected.is_empty() {
        println!("No transactions.");
        return Ok(());
    }
    for tx in &selected {
        print_transaction(tx);
    }
    println!("{} transactions", selected.len());
    Ok(())
}

pub async fn cmd_transactions_add(
    ledger: &Ledger<SqliteStore>,
    date: &str,
    description: &str,
    amount: &str,
    fields: &FieldArgs,
    source: Option<&str>,
) -> Result<()> {
    let date = parse_day(date)?;
    let amount =
        normalize_amount(amount).with_context(|| format!("unrecognised amount '{amount}'"))?;
    if description.trim().is_empty() {
        bail!("description must not be empty");
    }

    let mut tx = Transaction::new(date, description, amount);
    apply_fields(&mut tx, fields);
    if let Some(source) = source {
        tx.source = source.to_string();
    }
    ledger.save_edits(vec![tx]).await?;
    println!("Added transaction");
    Ok(())
}

pub async fn cmd_transactions_edit(
    ledger: &Ledger<SqliteStore>,
    id: i64,
    fields: &FieldArgs,
) -> Result<()> {
    let id = TransactionId(id);
    let mut tx = ledger
        .transactions()
        .await?
        .into_iter()
        .find(|tx| tx.id == Some(id))
        .with_context(|| format!("no transaction with id {id}"))?;
    apply_fields(&mut tx, fields);
    ledger.save_edits(vec![tx]).await?;
    println!("Updated transaction {id}");
    Ok(())
}

pub async fn cmd_transactions_lock(
    ledger: &Ledger<SqliteStore>,
    ids: &[i64],
    locked: bool,
) -> Result<()> {
    let ids: Vec<TransactionId> = ids.iter().copied().map(TransactionId).collect();
    let changed = ledger.set_locked(&ids, locked).await?;
    let verb = if locked { "Locked" } else { "Unlocked" };
    println!("{verb} {changed} transactions");
    Ok(())
}

pub async fn cmd_transactions_delete(ledger: &Ledger<SqliteStore>, ids: &[i64]) -> Result<()> {
    let ids: Vec<TransactionId> = ids.iter().copied().map(TransactionId).collect();
    let moved = ledger.trash(&ids).await?;
    println!("Moved {moved} transactions to the trash");
    Ok(())
}

// ── Rules ─────────────────────────────────────────────────────────────────────

pub async fn cmd_rules_list(ledger: &Ledger<SqliteStore>) -> Result<()> {
    let rules = ledger.rules().await?;
    if rules.is_empty() {
        println!("No rules.");
        return Ok(());
    }
    for rule in rules.iter() {
        let guard = rule.amount.map(|a| format!("  (= {a})")).unwrap_or_default();
        println!(
            "{:<28}  {:<24}  {:<16}  {:<14}  {}{}",
            rule.keyword,
            rule.name.as_deref().unwrap_or("-"),
            rule.category,
            rule.subcategory,
            rule.person_or_default(),
            guard,
        );
    }
    println!("{} rules", rules.len());
    Ok(())
}

pub async fn cmd_rules_add(
    ledger: &Ledger<SqliteStore>,
    keyword: &str,
    category: &str,
    name: Option<&str>,
    subcategory: Option<&str>,
    person: Option<&str>,
    amount: Option<&str>,
) -> Result<()> {
    let mut rule = Rule::new(keyword, category)?
        .with_name(name.unwrap_or_default())
        .with_subcategory(subcategory.unwrap_or_default().trim())
        .with_person(person.unwrap_or_default());
    if let Some(raw) = amount {
        let guard = normalize_amount(raw).with_context(|| format!("unrecognised amount '{raw}'"))?;
        rule = rule.with_amount(guard);
    }
    ledger.teach(rule.clone()).await?;
    println!("Saved rule '{}' -> {}", rule.keyword, rule.category);
    Ok(())
}

pub async fn cmd_rules_from_transaction(
    ledger: &Ledger<SqliteStore>,
    id: i64,
    with_amount: bool,
) -> Result<()> {
    let rule = ledger
        .rule_from_transaction(TransactionId(id), with_amount)
        .await?;
    println!(
        "Saved rule '{}' -> {} and locked transaction {id}",
        rule.keyword, rule.category
    );
    Ok(())
}

pub async fn cmd_rules_apply(ledger: &Ledger<SqliteStore>) -> Result<()> {
    let changed = ledger.reapply_rules().await?;
    println!("Updated {changed} transactions");
    Ok(())
}

pub async fn cmd_rules_learn(ledger: &Ledger<SqliteStore>) -> Result<()> {
    let learned = ledger.auto_learn().await?;
    for rule in &learned {
        println!("  {} -> {}", rule.keyword, rule.category);
    }
    println!("Learned {} rules", learned.len());
    Ok(())
}

pub async fn cmd_rules_export(ledger: &Ledger<SqliteStore>, file: Option<&Path>) -> Result<()> {
    let toml = ledger.export_rules().await?;
    match file {
        Some(path) => {
            fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{toml}"),
    }
    Ok(())
}

pub async fn cmd_rules_import(
    ledger: &Ledger<SqliteStore>,
    file: &Path,
    replace: bool,
) -> Result<()> {
    let content = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let count = ledger.import_rules(&content, replace).await?;
    println!("Loaded {count} rules from {}", file.display());
    Ok(())
}

// ── Trash ─────────────────────────────────────────────────────────────────────

pub async fn cmd_trash_list(ledger: &Ledger<SqliteStore>) -> Result<()> {
    let trash = ledger.list_trash().await?;
    if trash.is_empty() {
        println!("Trash is empty.");
        return Ok(());
    }
    for item in &trash {
        let deleted = item
            .deleted_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let tx = &item.transaction;
        println!(
            "{:>5}  {}  {:>12}  {:<36}  deleted {}",
            item.id,
            tx.date,
            tx.amount.to_string(),
            tx.description,
            deleted
        );
    }
    Ok(())
}

pub async fn cmd_trash_restore(ledger: &Ledger<SqliteStore>, ids: &[i64]) -> Result<()> {
    let ids: Vec<TrashId> = ids.iter().copied().map(TrashId).collect();
    let restored = ledger.restore(&ids).await?;
    println!("Restored {restored} transactions");
    Ok(())
}

pub async fn cmd_trash_empty(ledger: &Ledger<SqliteStore>) -> Result<()> {
    ledger.empty_trash().await?;
    println!("Trash emptied");
    Ok(())
}

// ── Reports ───────────────────────────────────────────────────────────────────

fn print_buckets(title: &str, buckets: &[BucketTotal]) {
    println!("\n{title}");
    for bucket in buckets {
        let label = if bucket.label.is_empty() { "(none)" } else { &bucket.label };
        println!("  {:<24} {:>12}", label, bucket.spend.to_string());
    }
}

pub async fn cmd_summary(
    ledger: &Ledger<SqliteStore>,
    filter: &FilterArgs,
    breakdown: Option<&str>,
    json: bool,
) -> Result<()> {
    let filter = build_filter(filter)?;
    let summary = ledger.summary(&filter).await?;
    if json {
        let breakdown = match breakdown {
            Some(category) => Some(ledger.breakdown(&filter, category).await?),
            None => None,
        };
        let out = serde_json::json!({ "summary": summary, "breakdown": breakdown });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if let Some(range) = filter.range {
        println!("Period: {range}");
    }
    println!("Transactions: {}", summary.transaction_count);
    println!("Gross spend:  {:>12}", summary.gross_spend.to_string());
    println!("Refunds:      {:>12}", summary.refunds.to_string());
    println!("Net spend:    {:>12}", summary.net_spend.to_string());
    print_buckets("By category", &summary.by_category);
    print_buckets("By person", &summary.by_person);

    if let Some(category) = breakdown {
        let buckets = ledger.breakdown(&filter, category).await?;
        print_buckets(&format!("{category} by subcategory"), &buckets);
    }
    Ok(())
}

pub async fn cmd_lists(ledger: &Ledger<SqliteStore>, kind: Option<ReferenceKind>) -> Result<()> {
    let kinds: Vec<ReferenceKind> = match kind {
        Some(kind) => vec![kind],
        None => ReferenceKind::ALL.to_vec(),
    };
    for kind in kinds {
        println!("{kind}:");
        for item in ledger.reference_list(kind).await? {
            println!("  {item}");
        }
    }
    Ok(())
}

pub fn cmd_config_show(db: Option<&Path>, config: &Config) -> Result<()> {
    println!("config file:    {}", crate::config::config_path()?.display());
    println!("database:       {}", config.database_path(db)?.display());
    println!(
        "default source: {}",
        config.default_source.as_deref().unwrap_or("(none)")
    );
    Ok(())
}
