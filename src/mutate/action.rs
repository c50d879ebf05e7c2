use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::mutate::convert::{ConvertType, render_string};
use crate::mutate::error::MutateConfigError;

/// The closed set of mutation kinds. Evaluation order is fixed by
/// `MUTATE_ORDER` in the parent module, not by this declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Rename,
    Update,
    Replace,
    Convert,
    Parse,
    Gsub,
    Uppercase,
    Lowercase,
    Strip,
    Remove,
    Split,
    Join,
    Merge,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rename => "rename",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Convert => "convert",
            Self::Parse => "parse",
            Self::Gsub => "gsub",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Strip => "strip",
            Self::Remove => "remove",
            Self::Split => "split",
            Self::Join => "join",
            Self::Merge => "merge",
        }
    }
}

impl FromStr for ActionKind {
    type Err = MutateConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rename" => Ok(Self::Rename),
            "update" => Ok(Self::Update),
            "replace" => Ok(Self::Replace),
            "convert" => Ok(Self::Convert),
            "parse" => Ok(Self::Parse),
            "gsub" => Ok(Self::Gsub),
            "uppercase" => Ok(Self::Uppercase),
            "lowercase" => Ok(Self::Lowercase),
            "strip" => Ok(Self::Strip),
            "remove" => Ok(Self::Remove),
            "split" => Ok(Self::Split),
            "join" => Ok(Self::Join),
            "merge" => Ok(Self::Merge),
            _ => Err(MutateConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// Formats the `parse` action can re-type a string field with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFormat {
    Json,
}

impl ParseFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Regex flags accepted in the optional third gsub element, matching the
/// regex crate's inline flag letters.
#[derive(Debug, Clone, Copy, Default)]
pub struct GsubFlags {
    case_insensitive: bool,
    multi_line: bool,
    dot_matches_new_line: bool,
    ignore_whitespace: bool,
}

impl GsubFlags {
    fn parse(field: &str, flags: &str) -> Result<Self, MutateConfigError> {
        let mut parsed = Self::default();
        for flag in flags.chars() {
            match flag {
                'i' => parsed.case_insensitive = true,
                'm' => parsed.multi_line = true,
                's' => parsed.dot_matches_new_line = true,
                'x' => parsed.ignore_whitespace = true,
                other => {
                    return Err(MutateConfigError::InvalidGsubFlag {
                        field: field.to_string(),
                        flag: other,
                    });
                }
            }
        }
        Ok(parsed)
    }

    pub(crate) fn compile(self, pattern: &str) -> Result<Regex, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .ignore_whitespace(self.ignore_whitespace)
            .build()
    }
}

/// A gsub needle, decided at configuration time: patterns without
/// placeholders compile once here, placeholder-bearing patterns stay as
/// templates and compile per record after expansion.
#[derive(Debug, Clone)]
pub enum GsubPattern {
    Static(Regex),
    Dynamic(String),
}

/// One gsub entry: needle, replacement template (expanded per record)
/// and the flags both compile paths share.
#[derive(Debug, Clone)]
pub struct GsubSpec {
    pub pattern: GsubPattern,
    pub replacement: String,
    pub(crate) flags: GsubFlags,
}

impl GsubSpec {
    fn compile(field: &str, spec: &Value) -> Result<Self, MutateConfigError> {
        let items = spec
            .as_array()
            .filter(|items| items.len() == 2 || items.len() == 3)
            .ok_or_else(|| MutateConfigError::InvalidGsubSpec {
                field: field.to_string(),
            })?;

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let Value::String(text) = item else {
                return Err(MutateConfigError::InvalidGsubSpec {
                    field: field.to_string(),
                });
            };
            parts.push(text.as_str());
        }

        let flags = match parts.get(2) {
            Some(raw) => GsubFlags::parse(field, raw)?,
            None => GsubFlags::default(),
        };

        let pattern = if parts[0].contains("%{") {
            GsubPattern::Dynamic(parts[0].to_string())
        } else {
            GsubPattern::Static(flags.compile(parts[0]).map_err(|source| {
                MutateConfigError::InvalidGsubPattern {
                    field: field.to_string(),
                    source,
                }
            })?)
        };

        Ok(Self {
            pattern,
            replacement: parts[1].to_string(),
            flags,
        })
    }
}

/// One configured mutation with its compiled parameters. Built once at
/// setup via `from_spec` and immutable afterwards, so a pipeline can be
/// shared across threads freely.
#[derive(Debug, Clone)]
pub enum Action {
    Rename(Vec<(String, String)>),
    Update(Vec<(String, String)>),
    Replace(Vec<(String, String)>),
    Convert(Vec<(String, ConvertType)>),
    Parse(Vec<(String, ParseFormat)>),
    Gsub(Vec<(String, GsubSpec)>),
    Uppercase(Vec<String>),
    Lowercase(Vec<String>),
    Strip(Vec<String>),
    Remove(Vec<String>),
    Split(Vec<(String, String)>),
    Join(Vec<(String, String)>),
    Merge(Vec<(String, Vec<String>)>),
}

impl Action {
    /// Compiles one raw `(kind, params)` configuration pair. Every
    /// validation failure here is fatal at setup time.
    pub fn from_spec(kind: &str, params: &Value) -> Result<Self, MutateConfigError> {
        let kind: ActionKind = kind.parse()?;
        match kind {
            ActionKind::Rename => Ok(Self::Rename(string_pairs(kind, params)?)),
            ActionKind::Update => Ok(Self::Update(string_pairs(kind, params)?)),
            ActionKind::Replace => Ok(Self::Replace(string_pairs(kind, params)?)),
            ActionKind::Convert => Ok(Self::Convert(convert_pairs(kind, params)?)),
            ActionKind::Parse => Ok(Self::Parse(parse_pairs(kind, params)?)),
            ActionKind::Gsub => Ok(Self::Gsub(gsub_pairs(kind, params)?)),
            ActionKind::Uppercase => Ok(Self::Uppercase(field_list(kind, params)?)),
            ActionKind::Lowercase => Ok(Self::Lowercase(field_list(kind, params)?)),
            ActionKind::Strip => Ok(Self::Strip(field_list(kind, params)?)),
            ActionKind::Remove => Ok(Self::Remove(field_list(kind, params)?)),
            ActionKind::Split => Ok(Self::Split(string_pairs(kind, params)?)),
            ActionKind::Join => Ok(Self::Join(string_pairs(kind, params)?)),
            ActionKind::Merge => Ok(Self::Merge(merge_pairs(kind, params)?)),
        }
    }

    /// Number of configured field entries, for summaries.
    pub fn field_count(&self) -> usize {
        match self {
            Self::Rename(pairs)
            | Self::Update(pairs)
            | Self::Replace(pairs)
            | Self::Split(pairs)
            | Self::Join(pairs) => pairs.len(),
            Self::Convert(pairs) => pairs.len(),
            Self::Parse(pairs) => pairs.len(),
            Self::Gsub(pairs) => pairs.len(),
            Self::Merge(pairs) => pairs.len(),
            Self::Uppercase(fields)
            | Self::Lowercase(fields)
            | Self::Strip(fields)
            | Self::Remove(fields) => fields.len(),
        }
    }

    /// The kind tag used for ordering and logging.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Rename(_) => ActionKind::Rename,
            Self::Update(_) => ActionKind::Update,
            Self::Replace(_) => ActionKind::Replace,
            Self::Convert(_) => ActionKind::Convert,
            Self::Parse(_) => ActionKind::Parse,
            Self::Gsub(_) => ActionKind::Gsub,
            Self::Uppercase(_) => ActionKind::Uppercase,
            Self::Lowercase(_) => ActionKind::Lowercase,
            Self::Strip(_) => ActionKind::Strip,
            Self::Remove(_) => ActionKind::Remove,
            Self::Split(_) => ActionKind::Split,
            Self::Join(_) => ActionKind::Join,
            Self::Merge(_) => ActionKind::Merge,
        }
    }
}

fn params_table(
    kind: ActionKind,
    params: &Value,
) -> Result<&Map<String, Value>, MutateConfigError> {
    params
        .as_object()
        .ok_or(MutateConfigError::ExpectedTable { kind: kind.name() })
}

fn ensure_field_name(kind: ActionKind, field: &str) -> Result<(), MutateConfigError> {
    if field.is_empty() {
        return Err(MutateConfigError::EmptyField { kind: kind.name() });
    }
    Ok(())
}

/// field→string params, shared by rename, update, replace, split and
/// join.
fn string_pairs(
    kind: ActionKind,
    params: &Value,
) -> Result<Vec<(String, String)>, MutateConfigError> {
    let table = params_table(kind, params)?;
    let mut pairs = Vec::with_capacity(table.len());
    for (field, value) in table {
        ensure_field_name(kind, field)?;
        let Value::String(text) = value else {
            return Err(MutateConfigError::ExpectedString {
                kind: kind.name(),
                field: field.clone(),
                value: render_string(value),
            });
        };
        pairs.push((field.clone(), text.clone()));
    }
    Ok(pairs)
}

fn convert_pairs(
    kind: ActionKind,
    params: &Value,
) -> Result<Vec<(String, ConvertType)>, MutateConfigError> {
    string_pairs(kind, params)?
        .into_iter()
        .map(|(field, value)| match ConvertType::from_name(&value) {
            Some(target) => Ok((field, target)),
            None => Err(MutateConfigError::InvalidConvertType { field, value }),
        })
        .collect()
}

fn parse_pairs(
    kind: ActionKind,
    params: &Value,
) -> Result<Vec<(String, ParseFormat)>, MutateConfigError> {
    string_pairs(kind, params)?
        .into_iter()
        .map(|(field, value)| match ParseFormat::from_name(&value) {
            Some(format) => Ok((field, format)),
            None => Err(MutateConfigError::InvalidParseFormat { field, value }),
        })
        .collect()
}

fn gsub_pairs(
    kind: ActionKind,
    params: &Value,
) -> Result<Vec<(String, GsubSpec)>, MutateConfigError> {
    let table = params_table(kind, params)?;
    let mut pairs = Vec::with_capacity(table.len());
    for (field, spec) in table {
        ensure_field_name(kind, field)?;
        pairs.push((field.clone(), GsubSpec::compile(field, spec)?));
    }
    Ok(pairs)
}

/// Field-name params for the case, strip and remove kinds: either a
/// plain list of names or a field→bool table where false disables the
/// entry.
fn field_list(kind: ActionKind, params: &Value) -> Result<Vec<String>, MutateConfigError> {
    match params {
        Value::Array(items) => {
            let mut fields = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(field) = item else {
                    return Err(MutateConfigError::ExpectedFieldList { kind: kind.name() });
                };
                ensure_field_name(kind, field)?;
                fields.push(field.clone());
            }
            Ok(fields)
        }
        Value::Object(table) => {
            let mut fields = Vec::with_capacity(table.len());
            for (field, value) in table {
                ensure_field_name(kind, field)?;
                let Value::Bool(enabled) = value else {
                    return Err(MutateConfigError::ExpectedBool {
                        kind: kind.name(),
                        field: field.clone(),
                        value: render_string(value),
                    });
                };
                if *enabled {
                    fields.push(field.clone());
                }
            }
            Ok(fields)
        }
        _ => Err(MutateConfigError::ExpectedFieldList { kind: kind.name() }),
    }
}

/// dest→sources params for merge; a single source name is promoted to a
/// one-element list.
fn merge_pairs(
    kind: ActionKind,
    params: &Value,
) -> Result<Vec<(String, Vec<String>)>, MutateConfigError> {
    let table = params_table(kind, params)?;
    let mut pairs = Vec::with_capacity(table.len());
    for (dest, value) in table {
        ensure_field_name(kind, dest)?;
        let sources = match value {
            Value::String(source) => vec![source.clone()],
            Value::Array(items) => {
                let mut sources = Vec::with_capacity(items.len());
                for item in items {
                    let Value::String(source) = item else {
                        return Err(MutateConfigError::ExpectedSourceList {
                            field: dest.clone(),
                        });
                    };
                    ensure_field_name(kind, source)?;
                    sources.push(source.clone());
                }
                sources
            }
            _ => {
                return Err(MutateConfigError::ExpectedSourceList {
                    field: dest.clone(),
                });
            }
        };
        pairs.push((dest.clone(), sources));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_kind_round_trip() {
        for name in [
            "rename",
            "update",
            "replace",
            "convert",
            "parse",
            "gsub",
            "uppercase",
            "lowercase",
            "strip",
            "remove",
            "split",
            "join",
            "merge",
        ] {
            let kind: ActionKind = name.parse().expect("known kind");
            assert_eq!(kind.name(), name);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = Action::from_spec("copy", &json!({"a": "b"}));
        assert!(matches!(result, Err(MutateConfigError::UnknownKind(_))));
    }

    #[test]
    fn test_rename_requires_string_values() {
        let result = Action::from_spec("rename", &json!({"old": 3}));
        assert!(matches!(
            result,
            Err(MutateConfigError::ExpectedString { kind: "rename", .. })
        ));
    }

    #[test]
    fn test_convert_rejects_unknown_type() {
        let result = Action::from_spec("convert", &json!({"port": "decimal"}));
        assert!(matches!(
            result,
            Err(MutateConfigError::InvalidConvertType { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        let result = Action::from_spec("parse", &json!({"payload": "yaml"}));
        assert!(matches!(
            result,
            Err(MutateConfigError::InvalidParseFormat { .. })
        ));
    }

    #[test]
    fn test_field_list_accepts_list_and_bool_table() {
        let from_list = Action::from_spec("remove", &json!(["a", "b"])).expect("valid list");
        let from_table =
            Action::from_spec("remove", &json!({"a": true, "b": true, "c": false}))
                .expect("valid table");
        let Action::Remove(list_fields) = from_list else {
            panic!("expected a remove action");
        };
        let Action::Remove(table_fields) = from_table else {
            panic!("expected a remove action");
        };
        assert_eq!(list_fields, vec!["a", "b"]);
        assert_eq!(table_fields, vec!["a", "b"]);
    }

    #[test]
    fn test_field_list_rejects_non_boolean_toggle() {
        let result = Action::from_spec("uppercase", &json!({"a": "yes"}));
        assert!(matches!(
            result,
            Err(MutateConfigError::ExpectedBool { kind: "uppercase", .. })
        ));
    }

    #[test]
    fn test_empty_field_name_is_rejected() {
        let result = Action::from_spec("rename", &json!({"": "new"}));
        assert!(matches!(result, Err(MutateConfigError::EmptyField { .. })));
    }

    #[test]
    fn test_gsub_precompiles_static_patterns() {
        let action =
            Action::from_spec("gsub", &json!({"msg": ["\\d+", "N"]})).expect("valid gsub");
        let Action::Gsub(pairs) = action else {
            panic!("expected a gsub action");
        };
        assert!(matches!(pairs[0].1.pattern, GsubPattern::Static(_)));
    }

    #[test]
    fn test_gsub_keeps_placeholder_patterns_dynamic() {
        let action = Action::from_spec("gsub", &json!({"msg": ["%{needle}", "X"]}))
            .expect("valid gsub");
        let Action::Gsub(pairs) = action else {
            panic!("expected a gsub action");
        };
        assert!(matches!(pairs[0].1.pattern, GsubPattern::Dynamic(_)));
    }

    #[test]
    fn test_gsub_rejects_bad_static_pattern() {
        let result = Action::from_spec("gsub", &json!({"msg": ["(unclosed", "X"]}));
        assert!(matches!(
            result,
            Err(MutateConfigError::InvalidGsubPattern { .. })
        ));
    }

    #[test]
    fn test_gsub_rejects_wrong_arity() {
        let result = Action::from_spec("gsub", &json!({"msg": ["only-pattern"]}));
        assert!(matches!(result, Err(MutateConfigError::InvalidGsubSpec { .. })));
    }

    #[test]
    fn test_gsub_rejects_unknown_flag() {
        let result = Action::from_spec("gsub", &json!({"msg": ["a", "b", "iz"]}));
        assert!(matches!(
            result,
            Err(MutateConfigError::InvalidGsubFlag { flag: 'z', .. })
        ));
    }

    #[test]
    fn test_merge_promotes_single_source() {
        let action = Action::from_spec("merge", &json!({"dest": "src"})).expect("valid merge");
        let Action::Merge(pairs) = action else {
            panic!("expected a merge action");
        };
        assert_eq!(pairs, vec![("dest".to_string(), vec!["src".to_string()])]);
    }

    #[test]
    fn test_merge_rejects_non_string_sources() {
        let result = Action::from_spec("merge", &json!({"dest": [1, 2]}));
        assert!(matches!(
            result,
            Err(MutateConfigError::ExpectedSourceList { .. })
        ));
    }
}
