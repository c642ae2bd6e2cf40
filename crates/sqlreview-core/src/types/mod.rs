//! Request and response types for the review API.
//!
//! A review takes SQL text, an [`Engine`] and a list of [`SqlReviewRule`]s,
//! and produces a list of [`Advice`] records.

mod common;
mod request;

pub use common::{advice_codes, Advice, AdviceStatus, Position};
pub use request::{Engine, ReviewConfig, RuleLevel, RuleType, SqlReviewRule};
