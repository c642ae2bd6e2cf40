//! Script splitting and per-statement parsing.
//!
//! A script is tokenized once, split at top-level semicolons, and each
//! statement fragment is parsed on its own. Line numbers inside a parsed
//! statement therefore restart at 1; [`ParsedStatement::base_line`] records
//! how many script lines precede it.

use crate::error::ParseError;
use crate::types::Engine;
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};
use std::ops::Range;

/// One statement of a script with its source coordinates.
#[derive(Debug, Clone)]
pub struct ParsedStatement<'s> {
    /// Zero-based position of the statement in the script.
    pub index: usize,
    pub statement: Statement,
    /// Exact source text, without the terminating semicolon.
    pub text: &'s str,
    /// Byte range of `text` within the script.
    pub range: Range<usize>,
    /// Number of script lines before the statement's first line.
    pub base_line: usize,
    /// Column of the statement's first token on its first line (1-indexed).
    pub first_column: usize,
}

/// A fully parsed script.
#[derive(Debug, Clone)]
pub struct ParsedScript<'s> {
    pub source: &'s str,
    pub engine: Engine,
    pub statements: Vec<ParsedStatement<'s>>,
}

impl<'s> ParsedScript<'s> {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Parses `sql` as a sequence of statements for `engine`.
pub fn parse_script(sql: &str, engine: Engine) -> Result<ParsedScript<'_>, ParseError> {
    let dialect = engine.to_sqlparser_dialect();
    let tokens = Tokenizer::new(dialect.as_ref(), sql)
        .tokenize_with_location()
        .map_err(|err| ParseError::from(err).with_engine(engine))?;

    let line_starts = line_start_offsets(sql);
    let mut statements = Vec::new();

    for (first, last) in statement_bounds(&tokens) {
        let Some(start) = location_to_offset(sql, &line_starts, first.span.start) else {
            continue;
        };
        let Some(end) = location_to_offset(sql, &line_starts, last.span.end) else {
            continue;
        };
        if end <= start {
            continue;
        }

        let text = &sql[start..end];
        let base_line = (first.span.start.line as usize).saturating_sub(1);
        let first_column = first.span.start.column as usize;

        let parsed = Parser::parse_sql(dialect.as_ref(), text).map_err(|err| {
            ParseError::from(err)
                .relocate(base_line, first_column)
                .with_engine(engine)
        })?;

        for statement in parsed {
            statements.push(ParsedStatement {
                index: statements.len(),
                statement,
                text,
                range: start..end,
                base_line,
                first_column,
            });
        }
    }

    Ok(ParsedScript {
        source: sql,
        engine,
        statements,
    })
}

/// Returns the first and last significant token of every statement.
fn statement_bounds(tokens: &[TokenWithSpan]) -> Vec<(&TokenWithSpan, &TokenWithSpan)> {
    let mut bounds = Vec::new();
    let mut current: Option<(&TokenWithSpan, &TokenWithSpan)> = None;

    for token in tokens {
        match &token.token {
            Token::SemiColon => {
                if let Some(range) = current.take() {
                    bounds.push(range);
                }
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => {
                current = match current {
                    Some((first, _)) => Some((first, token)),
                    None => Some((token, token)),
                };
            }
        }
    }

    if let Some(range) = current {
        bounds.push(range);
    }
    bounds
}

fn line_start_offsets(sql: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        sql.char_indices()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(offset, _)| offset + 1),
    );
    starts
}

/// Converts a 1-based tokenizer location into a byte offset.
fn location_to_offset(sql: &str, line_starts: &[usize], location: Location) -> Option<usize> {
    let line = location.line as usize;
    let column = location.column as usize;
    if line == 0 || column == 0 {
        return None;
    }

    let line_start = *line_starts.get(line - 1)?;
    let line_end = line_starts.get(line).copied().unwrap_or(sql.len());
    let line_text = &sql[line_start..line_end];

    match line_text.char_indices().nth(column - 1) {
        Some((offset, _)) => Some(line_start + offset),
        None if line_text.chars().count() == column - 1 => Some(line_end),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement() {
        let script = parse_script("UPDATE t SET x = 1;", Engine::Postgres).unwrap();
        assert_eq!(script.statements.len(), 1);
        let stmt = &script.statements[0];
        assert_eq!(stmt.text, "UPDATE t SET x = 1");
        assert_eq!(stmt.base_line, 0);
        assert_eq!(stmt.first_column, 1);
    }

    #[test]
    fn test_base_line_and_text_of_later_statement() {
        let sql = "SELECT 1;\n\n  -- note\n  DELETE FROM t\n  WHERE id = 1;";
        let script = parse_script(sql, Engine::Postgres).unwrap();
        assert_eq!(script.statements.len(), 2);
        let delete = &script.statements[1];
        assert_eq!(delete.index, 1);
        assert_eq!(delete.base_line, 3);
        assert_eq!(delete.first_column, 3);
        assert_eq!(delete.text, "DELETE FROM t\n  WHERE id = 1");
        assert_eq!(&sql[delete.range.clone()], delete.text);
    }

    #[test]
    fn test_trailing_statement_without_semicolon() {
        let script = parse_script("SELECT 1; SELECT 2", Engine::Mysql).unwrap();
        assert_eq!(script.statements.len(), 2);
        assert_eq!(script.statements[1].text, "SELECT 2");
    }

    #[test]
    fn test_empty_and_comment_only_input() {
        assert!(parse_script("", Engine::Postgres).unwrap().is_empty());
        assert!(parse_script("  -- nothing\n;;", Engine::Postgres)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_syntax_error_reports_script_line() {
        let err = parse_script("SELECT 1;\nSELEC 2;", Engine::Postgres).unwrap_err();
        assert_eq!(err.position.map(|p| p.line), Some(2));
        assert_eq!(err.engine, Some(Engine::Postgres));
    }

    #[test]
    fn test_location_to_offset_multibyte() {
        let sql = "SELECT 'é', x";
        let starts = line_start_offsets(sql);
        let offset = location_to_offset(sql, &starts, Location { line: 1, column: 12 }).unwrap();
        assert_eq!(&sql[offset..], " x");
    }
}
