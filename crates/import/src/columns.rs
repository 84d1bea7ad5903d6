use serde::{Deserialize, Serialize};

/// Column index per semantic role, inferred from free-form header names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub source: Option<usize>,
    pub category: Option<usize>,
    pub subcategory: Option<usize>,
    pub person: Option<usize>,
    pub name: Option<usize>,
}

/// The roles an import cannot proceed without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredColumns {
    pub date: usize,
    pub description: usize,
    pub amount: usize,
}

impl ColumnMapping {
    /// Matches headers case-insensitively by substring. The first qualifying
    /// column wins each role.
    pub fn sniff<S: AsRef<str>>(headers: &[S]) -> Self {
        let lowered: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .collect();
        let find = |pred: &dyn Fn(&str) -> bool| lowered.iter().position(|h| pred(h.as_str()));

        ColumnMapping {
            date: find(&|h| h.contains("date")),
            description: find(&|h| h.contains("desc") || h.contains("memo")),
            amount: find(&|h| {
                h.contains("amount")
                    || h.contains("debit")
                    || h.contains("value")
                    || h.contains("hkd")
            }),
            source: find(&|h| h.contains("source")),
            category: find(&|h| h.contains("category") && !h.contains("sub")),
            subcategory: find(&|h| h.contains("sub")),
            person: find(&|h| h.contains("person")),
            name: find(&|h| h == "name"),
        }
    }

    /// Names of required roles that no header resolved to.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.date.is_none() {
            missing.push("date");
        }
        if self.description.is_none() {
            missing.push("description");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        missing
    }

    pub fn required(&self) -> Option<RequiredColumns> {
        Some(RequiredColumns {
            date: self.date?,
            description: self.description?,
            amount: self.amount?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_style_headers() {
        let mapping = ColumnMapping::sniff(&["Txn Date", "Memo", "Debit Amount"]);
        assert_eq!(mapping.date, Some(0));
        assert_eq!(mapping.description, Some(1));
        assert_eq!(mapping.amount, Some(2));
        assert!(mapping.missing_required().is_empty());
        assert_eq!(
            mapping.required(),
            Some(RequiredColumns { date: 0, description: 1, amount: 2 })
        );
    }

    #[test]
    fn missing_amount_column() {
        let mapping = ColumnMapping::sniff(&["Date", "Description", "Balance"]);
        assert_eq!(mapping.amount, None);
        assert_eq!(mapping.missing_required(), vec!["amount"]);
        assert!(mapping.required().is_none());
    }

    #[test]
    fn optional_roles() {
        let headers = [
            "Date", "Name", "Description", "HKD", "Source", "Category", "SubCategory", "Person",
        ];
        let mapping = ColumnMapping::sniff(&headers);
        assert_eq!(mapping.name, Some(1));
        assert_eq!(mapping.amount, Some(3));
        assert_eq!(mapping.source, Some(4));
        assert_eq!(mapping.category, Some(5));
        assert_eq!(mapping.subcategory, Some(6));
        assert_eq!(mapping.person, Some(7));
    }

    #[test]
    fn name_requires_exact_header() {
        let mapping = ColumnMapping::sniff(&["Date", "Merchant Name", "Memo", "Value"]);
        assert_eq!(mapping.name, None);
        let mapping = ColumnMapping::sniff(&["date", " NAME ", "memo", "value"]);
        assert_eq!(mapping.name, Some(1));
    }

    #[test]
    fn first_match_wins() {
        let mapping = ColumnMapping::sniff(&[
            "Posting Date",
            "Transaction Date",
            "Desc",
            "Amount",
            "Amount (Local)",
        ]);
        assert_eq!(mapping.date, Some(0));
        assert_eq!(mapping.amount, Some(3));
    }

    #[test]
    fn nothing_recognized() {
        let mapping = ColumnMapping::sniff::<&str>(&[]);
        assert_eq!(mapping.missing_required(), vec!["date", "description", "amount"]);
    }
}
