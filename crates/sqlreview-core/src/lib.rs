pub mod advisor;
pub mod catalog;
pub mod error;
pub mod parser;
pub mod syntax;
pub mod types;

// Re-export the check entry points
pub use advisor::{
    check_with_diagnostics, sql_review_check, AdvisorRegistry, CheckContext, CheckResult,
    QueryDriver, RuleFailure,
};
pub use catalog::{Catalog, DatabaseMetadata};
pub use error::{AdvisorError, CatalogError, DriverError, ParseError, RuleError};
pub use parser::{parse_script, ParsedScript, ParsedStatement};

// Re-export types explicitly
pub use types::{
    // Advice codes
    advice_codes,
    Advice,
    AdviceStatus,
    Engine,
    Position,
    ReviewConfig,
    RuleLevel,
    RuleType,
    SqlReviewRule,
};

// Test utilities (must be at end of file)
#[cfg(test)]
pub mod test_utils;
