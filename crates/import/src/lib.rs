pub mod amount;
pub mod columns;
pub mod date;
pub mod learn;
pub mod matcher;
pub mod pipeline;
pub mod reconcile;
pub mod table;

pub use amount::normalize_amount;
pub use columns::{ColumnMapping, RequiredColumns};
pub use date::parse_date;
pub use learn::induce;
pub use matcher::{Classification, RuleMatcher};
pub use pipeline::{dedup_against_history, import_table, ImportError, ImportOptions, ImportOutcome};
pub use reconcile::reconcile;
pub use table::{RawTable, TableError};
