//! Typed rule payloads and naming-template handling.

use crate::error::AdvisorError;
use crate::types::{RuleType, SqlReviewRule};
use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Name length limit applied when a naming payload leaves `maxLength` at 0.
pub const DEFAULT_NAME_LENGTH_LIMIT: usize = 63;

pub const TABLE_NAME_TOKEN: &str = "{{table}}";
pub const COLUMN_LIST_TOKEN: &str = "{{column_list}}";
pub const REFERENCING_TABLE_NAME_TOKEN: &str = "{{referencing_table}}";
pub const REFERENCING_COLUMN_NAME_TOKEN: &str = "{{referencing_column}}";
pub const REFERENCED_TABLE_NAME_TOKEN: &str = "{{referenced_table}}";
pub const REFERENCED_COLUMN_NAME_TOKEN: &str = "{{referenced_column}}";

/// Decodes the payload of `rule` into `T`.
pub fn parse_payload<T: DeserializeOwned>(rule: &SqlReviewRule) -> Result<T, AdvisorError> {
    let payload = rule
        .payload
        .as_ref()
        .ok_or(AdvisorError::MissingPayload {
            rule: rule.rule_type,
        })?;
    serde_json::from_value(payload.clone()).map_err(|err| AdvisorError::InvalidPayload {
        rule: rule.rule_type,
        reason: err.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamingRulePayload {
    pub format: String,
    #[serde(default)]
    pub max_length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StringArrayTypeRulePayload {
    #[serde(default)]
    pub list: Vec<String>,
}

impl StringArrayTypeRulePayload {
    /// Case-insensitive membership test.
    pub fn contains(&self, value: &str) -> bool {
        self.list.iter().any(|item| item.eq_ignore_ascii_case(value))
    }
}

/// Required columns, given either as `list` or the older `columnList`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequiredColumnRulePayload {
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub column_list: Vec<String>,
}

impl RequiredColumnRulePayload {
    pub fn columns(&self) -> &[String] {
        if self.list.is_empty() {
            &self.column_list
        } else {
            &self.list
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NumberTypeRulePayload {
    pub number: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentConventionRulePayload {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_length: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamingCaseRulePayload {
    /// Identifiers must be upper case when set, lower case otherwise.
    #[serde(default)]
    pub upper: bool,
}

/// Why a name failed a [`NamingFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingViolation {
    Format,
    Length,
}

/// A compiled `format` regex plus its length limit.
#[derive(Debug, Clone)]
pub struct NamingFormat {
    pub format: String,
    pub regex: Regex,
    pub max_length: usize,
}

impl NamingFormat {
    pub fn from_rule(rule: &SqlReviewRule) -> Result<Self, AdvisorError> {
        let payload: NamingRulePayload = parse_payload(rule)?;
        let regex = Regex::new(&payload.format).map_err(|source| AdvisorError::InvalidRegex {
            rule: rule.rule_type,
            source,
        })?;
        Ok(Self {
            format: payload.format,
            regex,
            max_length: effective_max_length(payload.max_length),
        })
    }

    /// First violation of `name`, format checked before length.
    pub fn check(&self, name: &str) -> Option<NamingViolation> {
        if !self.regex.is_match(name) {
            Some(NamingViolation::Format)
        } else if name.chars().count() > self.max_length {
            Some(NamingViolation::Length)
        } else {
            None
        }
    }
}

fn effective_max_length(max_length: usize) -> usize {
    if max_length == 0 {
        DEFAULT_NAME_LENGTH_LIMIT
    } else {
        max_length
    }
}

fn template_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{[^{}]+\}\}").expect("Invalid template token regex"))
}

/// Tokens a naming template may use for `rule_type`.
pub fn allowed_template_tokens(rule_type: RuleType) -> &'static [&'static str] {
    match rule_type {
        RuleType::NamingIndexIdx | RuleType::NamingIndexUk | RuleType::NamingIndexPk => {
            &[TABLE_NAME_TOKEN, COLUMN_LIST_TOKEN]
        }
        RuleType::NamingIndexFk => &[
            REFERENCING_TABLE_NAME_TOKEN,
            REFERENCING_COLUMN_NAME_TOKEN,
            REFERENCED_TABLE_NAME_TOKEN,
            REFERENCED_COLUMN_NAME_TOKEN,
        ],
        _ => &[],
    }
}

/// A naming template such as `^idx_{{table}}_{{column_list}}$`.
///
/// The literal text of the template is regex syntax. Tokens are replaced by
/// the escaped values of the object being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    pub template: String,
    pub tokens: Vec<String>,
    pub max_length: usize,
}

impl NamingTemplate {
    pub fn from_rule(rule: &SqlReviewRule) -> Result<Self, AdvisorError> {
        let payload: NamingRulePayload = parse_payload(rule)?;
        let allowed = allowed_template_tokens(rule.rule_type);
        let tokens: Vec<String> = template_token_regex()
            .find_iter(&payload.format)
            .map(|token| token.as_str().to_string())
            .collect();

        if let Some(invalid) = tokens.iter().find(|token| !allowed.contains(&token.as_str())) {
            return Err(AdvisorError::InvalidTemplate {
                rule: rule.rule_type,
                reason: format!("token {invalid} is not supported"),
            });
        }

        let template = Self {
            template: payload.format,
            tokens,
            max_length: effective_max_length(payload.max_length),
        };
        // Reject templates whose literal text is not a valid regex up front.
        template
            .regex(&HashMap::new())
            .map_err(|source| AdvisorError::InvalidRegex {
                rule: rule.rule_type,
                source,
            })?;
        Ok(template)
    }

    /// Template with every token replaced by its escaped value.
    ///
    /// Tokens without a value are replaced by the empty string.
    pub fn pattern(&self, values: &HashMap<&str, String>) -> String {
        let mut pattern = self.template.clone();
        for token in &self.tokens {
            let value = values
                .get(token.as_str())
                .map(|value| regex::escape(value))
                .unwrap_or_default();
            pattern = pattern.replace(token.as_str(), &value);
        }
        pattern
    }

    pub fn regex(&self, values: &HashMap<&str, String>) -> Result<Regex, regex::Error> {
        Regex::new(&self.pattern(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleLevel;
    use serde_json::json;

    fn rule(rule_type: RuleType, payload: serde_json::Value) -> SqlReviewRule {
        SqlReviewRule::new(rule_type, RuleLevel::Error).with_payload(payload)
    }

    #[test]
    fn test_missing_and_invalid_payload() {
        let missing = SqlReviewRule::new(RuleType::NamingTable, RuleLevel::Error);
        assert!(matches!(
            NamingFormat::from_rule(&missing),
            Err(AdvisorError::MissingPayload { .. })
        ));
        let invalid = rule(RuleType::NamingTable, json!({"format": 5}));
        assert!(matches!(
            NamingFormat::from_rule(&invalid),
            Err(AdvisorError::InvalidPayload { .. })
        ));
        let bad_regex = rule(RuleType::NamingTable, json!({"format": "(unclosed"}));
        assert!(matches!(
            NamingFormat::from_rule(&bad_regex),
            Err(AdvisorError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_naming_format_defaults_length() {
        let format =
            NamingFormat::from_rule(&rule(RuleType::NamingTable, json!({"format": "^[a-z_]+$"})))
                .unwrap();
        assert_eq!(format.max_length, DEFAULT_NAME_LENGTH_LIMIT);
        assert_eq!(format.check("orders"), None);
        assert_eq!(format.check("Orders"), Some(NamingViolation::Format));
        assert_eq!(format.check(&"a".repeat(64)), Some(NamingViolation::Length));
    }

    #[test]
    fn test_required_columns_accepts_legacy_key() {
        let payload: RequiredColumnRulePayload =
            serde_json::from_value(json!({"columnList": ["id", "created_ts"]})).unwrap();
        assert_eq!(payload.columns(), ["id", "created_ts"]);
        let payload: RequiredColumnRulePayload =
            serde_json::from_value(json!({"list": ["id"], "columnList": ["x"]})).unwrap();
        assert_eq!(payload.columns(), ["id"]);
    }

    #[test]
    fn test_template_substitutes_escaped_values() {
        let template = NamingTemplate::from_rule(&rule(
            RuleType::NamingIndexIdx,
            json!({"format": "^idx_{{table}}_{{column_list}}$"}),
        ))
        .unwrap();
        assert_eq!(template.tokens, vec![TABLE_NAME_TOKEN, COLUMN_LIST_TOKEN]);

        let values = HashMap::from([
            (TABLE_NAME_TOKEN, "user.v2".to_string()),
            (COLUMN_LIST_TOKEN, "a_b".to_string()),
        ]);
        let regex = template.regex(&values).unwrap();
        assert!(regex.is_match("idx_user.v2_a_b"));
        assert!(!regex.is_match("idx_userxv2_a_b"));
    }

    #[test]
    fn test_template_rejects_foreign_tokens() {
        let err = NamingTemplate::from_rule(&rule(
            RuleType::NamingIndexPk,
            json!({"format": "pk_{{referenced_table}}"}),
        ))
        .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidTemplate { .. }));
        assert!(err.to_string().contains("{{referenced_table}}"));

        assert!(NamingTemplate::from_rule(&rule(
            RuleType::NamingIndexFk,
            json!({"format": "^fk_{{referencing_table}}_{{referenced_table}}$"}),
        ))
        .is_ok());
    }
}
