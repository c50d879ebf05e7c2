use thiserror::Error;

/// Errors raised while compiling mutation configuration. Any of these
/// rejects the whole configuration at setup time.
#[derive(Debug, Error)]
pub enum MutateConfigError {
    #[error(
        "Unknown mutate action: '{0}'. Valid actions are: rename, update, replace, convert, parse, gsub, uppercase, lowercase, strip, remove, split, join, merge"
    )]
    UnknownKind(String),

    #[error("Mutate {kind} action requires a table of fields")]
    ExpectedTable { kind: &'static str },

    #[error("Mutate {kind} action requires a list of field names")]
    ExpectedFieldList { kind: &'static str },

    #[error("Mutate {kind} action requires a string value, received '{value}' for '{field}'")]
    ExpectedString {
        kind: &'static str,
        field: String,
        value: String,
    },

    #[error("Mutate {kind} action requires boolean values, received '{value}' for '{field}'")]
    ExpectedBool {
        kind: &'static str,
        field: String,
        value: String,
    },

    #[error("Empty field name in mutate {kind} action")]
    EmptyField { kind: &'static str },

    #[error(
        "Mutate convert action received an invalid type '{value}' for '{field}'. Valid types are: string, integer, float, boolean, datetime"
    )]
    InvalidConvertType { field: String, value: String },

    #[error(
        "Mutate parse action received an invalid format '{value}' for '{field}'. Valid formats are: json"
    )]
    InvalidParseFormat { field: String, value: String },

    #[error(
        "Mutate gsub action requires [pattern, replacement] or [pattern, replacement, flags] for '{field}'"
    )]
    InvalidGsubSpec { field: String },

    #[error("Invalid gsub pattern for '{field}': {source}")]
    InvalidGsubPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid gsub flag '{flag}' for '{field}'. Valid flags are: i, m, s, x")]
    InvalidGsubFlag { field: String, flag: char },

    #[error("Mutate merge action requires a source field or list of source fields for '{field}'")]
    ExpectedSourceList { field: String },
}

/// Errors raised while running one action against one record. The
/// pipeline logs these and carries on with the remaining actions, so a
/// bad record never halts the stream.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Cannot convert {found} value to {target}")]
    Unconvertible {
        target: &'static str,
        found: &'static str,
    },

    #[error("Timestamp {0} is out of range")]
    TimestampOutOfRange(i64),

    #[error("Invalid gsub pattern '{pattern}' after expansion: {source}")]
    DynamicPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot parse field '{field}' as json: {message}")]
    Unparsable { field: String, message: String },
}
