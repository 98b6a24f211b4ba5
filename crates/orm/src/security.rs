//! SQL text safety helpers
//!
//! Generated statements embed table and column names verbatim and render
//! criteria values as literals, so both must be made safe here:
//! - identifiers are validated once, when metadata is resolved
//! - text literals are quoted with embedded quotes doubled
//! - blob literals use SQLite's `X'..'` hex form

use crate::error::{OrmError, OrmResult};

/// Characters allowed in SQL identifiers (alphanumeric, underscore)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// Keywords that cannot be used bare as table or column names
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP", "CREATE",
    "ALTER", "TABLE", "INDEX", "ORDER", "GROUP", "BY", "LIMIT", "OFFSET", "AND", "OR", "NOT",
    "NULL", "IN", "IS", "BETWEEN", "LIKE", "PRIMARY", "KEY", "VALUES", "SET",
];

/// Validate that an identifier can be embedded in generated SQL unquoted
///
/// # Examples
/// ```
/// use tessera_orm::security::validate_identifier;
///
/// assert!(validate_identifier("foo_bar").is_ok());
/// assert!(validate_identifier("1foo").is_err());
/// assert!(validate_identifier("order").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> OrmResult<()> {
    let first = identifier
        .chars()
        .next()
        .ok_or_else(|| OrmError::model_configuration("Identifier cannot be empty"))?;

    if identifier.len() > 128 {
        return Err(OrmError::model_configuration(format!(
            "Identifier '{}' is too long (max 128 characters)",
            identifier
        )));
    }

    if let Some(c) = identifier
        .chars()
        .find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c))
    {
        return Err(OrmError::model_configuration(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(OrmError::model_configuration(format!(
            "Identifier '{}' cannot start with a number",
            identifier
        )));
    }

    let upper = identifier.to_ascii_uppercase();
    if SQL_KEYWORDS.contains(&upper.as_str()) {
        return Err(OrmError::model_configuration(format!(
            "Identifier '{}' is a reserved SQL keyword",
            identifier
        )));
    }

    Ok(())
}

/// Quote a text literal, doubling embedded single quotes
///
/// # Examples
/// ```
/// use tessera_orm::security::quote_literal;
///
/// assert_eq!(quote_literal("x"), "'x'");
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render bytes as a blob literal
pub fn blob_literal(bytes: &[u8]) -> String {
    format!("X'{}'", hex::encode_upper(bytes))
}
