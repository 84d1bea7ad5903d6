pub mod money;
pub mod period;
pub mod reference;
pub mod report;
pub mod rule;
pub mod transaction;

pub use money::Money;
pub use period::DateRange;
pub use reference::{default_rules, extend_reference_list, ReferenceKind};
pub use report::{
    subcategory_breakdown, summarize, BucketTotal, SearchField, SpendingSummary, TransactionFilter,
};
pub use rule::{normalize_keyword, Rule, RuleError, RuleSet};
pub use transaction::{
    is_default_category, IdentityKey, Transaction, TransactionId, TrashId, TrashedTransaction,
    DEFAULT_PERSON, UNCATEGORIZED, UNKNOWN_SOURCE,
};
