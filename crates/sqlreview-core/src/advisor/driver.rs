//! Live `EXPLAIN` access for row-estimating rules.

use crate::error::DriverError;
use regex::Regex;
use std::sync::OnceLock;

/// Upper bound on `EXPLAIN` queries a single rule instance may issue.
pub const MAXIMUM_EXPLAIN_COUNT: usize = 10;

/// A live database connection able to explain a statement.
///
/// Implementations prefix the statement with the engine's `EXPLAIN` syntax
/// and return the plan, one entry per output row.
pub trait QueryDriver: Send + Sync {
    fn explain(&self, statement: &str) -> Result<Vec<String>, DriverError>;
}

fn rows_regex() -> &'static Regex {
    static ROWS: OnceLock<Regex> = OnceLock::new();
    ROWS.get_or_init(|| Regex::new(r"rows=([0-9]+)").expect("Invalid rows regex"))
}

/// Largest `rows=N` estimate found in the plan, if any.
pub fn estimated_rows(plan: &[String]) -> Option<u64> {
    plan.iter()
        .flat_map(|line| rows_regex().captures_iter(line))
        .filter_map(|captures| captures.get(1)?.as_str().parse::<u64>().ok())
        .max()
}

/// Counts down the explains a rule instance has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplainBudget {
    remaining: usize,
}

impl Default for ExplainBudget {
    fn default() -> Self {
        Self {
            remaining: MAXIMUM_EXPLAIN_COUNT,
        }
    }
}

impl ExplainBudget {
    /// Consumes one explain; false once the budget is spent.
    pub fn try_spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_rows_takes_maximum() {
        let plan = vec![
            "Update on t  (cost=0.00..35.50 rows=10 width=10)".to_string(),
            "  ->  Seq Scan on t  (cost=0.00..35.50 rows=2550 width=10)".to_string(),
        ];
        assert_eq!(estimated_rows(&plan), Some(2550));
        assert_eq!(estimated_rows(&["Result".to_string()]), None);
        assert_eq!(estimated_rows(&[]), None);
    }

    #[test]
    fn test_budget_is_bounded() {
        let mut budget = ExplainBudget::default();
        let spent = (0..20).filter(|_| budget.try_spend()).count();
        assert_eq!(spent, MAXIMUM_EXPLAIN_COUNT);
        assert_eq!(budget.remaining(), 0);
    }
}
