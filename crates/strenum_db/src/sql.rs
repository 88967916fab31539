//! Quoting and read-only guard utilities.
//!
//! Every identifier and literal that reaches a statement string passes
//! through one of the `quote_*` functions below. Nothing else in the crate
//! interpolates caller-supplied text.

use crate::types::{TableName, TypeName};
use std::error::Error;
use std::fmt;

/// PostgreSQL truncates identifiers and enum labels beyond `NAMEDATALEN - 1` bytes.
pub const MAX_NAME_BYTES: usize = 63;

const ALLOWED_PREFIXES: &[&str] = &["SELECT", "WITH"];
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "COPY", "GRANT",
    "REVOKE",
];

/// Input rejected by a quoting function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteError {
    message: String,
}

impl QuoteError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for QuoteError {}

/// Query rejected by [`validate_read_only`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlGuardError {
    message: String,
}

impl SqlGuardError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SqlGuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for SqlGuardError {}

/// Quote an identifier: `my "table"` -> `"my ""table"""`.
pub fn quote_ident(name: &str) -> Result<String, QuoteError> {
    validate_ident(name)?;
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    Ok(escaped)
}

/// Quote a string literal: `it's` -> `'it''s'`.
pub fn quote_literal(value: &str) -> Result<String, QuoteError> {
    if value.contains('\0') {
        return Err(QuoteError::new("Literal contains a NUL byte"));
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push('\'');
        }
        escaped.push(ch);
    }
    escaped.push('\'');
    Ok(escaped)
}

/// Quote an enum label (a literal with PostgreSQL's label length limit).
pub fn quote_label(label: &str) -> Result<String, QuoteError> {
    validate_label(label)?;
    quote_literal(label)
}

/// Quote a schema-qualified type name: `"public"."color"`.
pub fn quote_type(type_name: &TypeName) -> Result<String, QuoteError> {
    Ok(format!(
        "{}.{}",
        quote_ident(type_name.schema())?,
        quote_ident(type_name.name())?
    ))
}

/// Quote a table name, qualified when a schema is known.
pub fn quote_table(table: &TableName) -> Result<String, QuoteError> {
    match table.schema() {
        Some(schema) => Ok(format!(
            "{}.{}",
            quote_ident(schema)?,
            quote_ident(table.name())?
        )),
        None => quote_ident(table.name()),
    }
}

/// Check an identifier without quoting it.
pub fn validate_ident(name: &str) -> Result<(), QuoteError> {
    if name.is_empty() {
        return Err(QuoteError::new("Identifier is empty"));
    }
    if name.contains('\0') {
        return Err(QuoteError::new(format!(
            "Identifier {:?} contains a NUL byte",
            name
        )));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(QuoteError::new(format!(
            "Identifier \"{}\" is {} bytes long (max {})",
            name,
            name.len(),
            MAX_NAME_BYTES
        )));
    }
    Ok(())
}

/// Check an enum label without quoting it.
pub fn validate_label(label: &str) -> Result<(), QuoteError> {
    if label.is_empty() {
        return Err(QuoteError::new("Enum label is empty"));
    }
    if label.contains('\0') {
        return Err(QuoteError::new(format!(
            "Enum label {:?} contains a NUL byte",
            label
        )));
    }
    if label.len() > MAX_NAME_BYTES {
        return Err(QuoteError::new(format!(
            "Enum label \"{}\" is {} bytes long (max {})",
            label,
            label.len(),
            MAX_NAME_BYTES
        )));
    }
    Ok(())
}

/// Validate that a SQL query is read-only.
pub fn validate_read_only(sql: &str) -> Result<(), SqlGuardError> {
    let sanitized = sanitize_sql(sql);
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        return Err(SqlGuardError::new("Query is empty"));
    }

    validate_single_statement(&sanitized)?;

    let first = first_keyword(&sanitized)
        .ok_or_else(|| SqlGuardError::new("Query must start with SELECT or WITH"))?;
    if !ALLOWED_PREFIXES.contains(&first.as_str()) {
        return Err(SqlGuardError::new("Query must start with SELECT or WITH"));
    }

    for token in tokens_upper(&sanitized) {
        if FORBIDDEN_KEYWORDS.contains(&token.as_str()) {
            return Err(SqlGuardError::new(format!(
                "Query contains forbidden keyword: {}",
                token
            )));
        }
    }

    Ok(())
}

fn validate_single_statement(sql: &str) -> Result<(), SqlGuardError> {
    let mut semicolons = sql.match_indices(';').map(|(idx, _)| idx);
    let first = semicolons.next();
    if semicolons.next().is_some() {
        return Err(SqlGuardError::new("Multiple statements are not allowed"));
    }
    if let Some(idx) = first {
        if sql[idx + 1..].chars().any(|c| !c.is_whitespace()) {
            return Err(SqlGuardError::new("Multiple statements are not allowed"));
        }
    }
    Ok(())
}

fn first_keyword(sql: &str) -> Option<String> {
    let mut current = String::new();
    for ch in sql.chars() {
        if ch.is_ascii_alphabetic() {
            current.push(ch);
        } else if !current.is_empty() {
            break;
        }
    }
    if current.is_empty() {
        None
    } else {
        Some(current.to_ascii_uppercase())
    }
}

fn tokens_upper(sql: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in sql.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(current.to_ascii_uppercase());
            current.clear();
        }
    }
    if !current.is_empty() {
        tokens.push(current.to_ascii_uppercase());
    }
    tokens
}

/// Blank out literals, quoted identifiers and comments, keeping offsets.
fn sanitize_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
            }
            out.push(' ');
            continue;
        }
        if in_block_comment {
            if ch == '*' && matches!(chars.peek(), Some('/')) {
                chars.next();
                in_block_comment = false;
                out.push_str("  ");
                continue;
            }
            out.push(' ');
            continue;
        }
        if in_single {
            if ch == '\'' {
                if matches!(chars.peek(), Some('\'')) {
                    chars.next();
                    out.push_str("  ");
                    continue;
                }
                in_single = false;
            }
            out.push(' ');
            continue;
        }
        if in_double {
            if ch == '"' {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    out.push_str("  ");
                    continue;
                }
                in_double = false;
            }
            out.push(' ');
            continue;
        }

        match ch {
            '-' if matches!(chars.peek(), Some('-')) => {
                chars.next();
                in_line_comment = true;
                out.push_str("  ");
            }
            '/' if matches!(chars.peek(), Some('*')) => {
                chars.next();
                in_block_comment = true;
                out.push_str("  ");
            }
            '\'' => {
                in_single = true;
                out.push(' ');
            }
            '"' => {
                in_double = true;
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}
