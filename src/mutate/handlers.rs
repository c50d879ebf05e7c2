use serde_json::Value;

use crate::event::{MutateEvent, split_parts};
use crate::mutate::action::{Action, GsubPattern, GsubSpec, ParseFormat};
use crate::mutate::convert::{self, render_string};
use crate::mutate::error::ActionError;
use crate::mutate::expand::expand_patterns;

impl Action {
    /// Runs this action against one event. Per-field problems are
    /// logged and skipped right here; an `Err` bubbles to the pipeline,
    /// which logs it and moves on to the next action.
    pub fn apply(&self, event: &mut MutateEvent) -> Result<(), ActionError> {
        match self {
            Self::Rename(pairs) => rename(pairs, event),
            Self::Update(pairs) => update(pairs, event),
            Self::Replace(pairs) => replace(pairs, event),
            Self::Convert(pairs) => return convert_fields(pairs, event),
            Self::Parse(pairs) => return parse_fields(pairs, event),
            Self::Gsub(pairs) => return gsub(pairs, event),
            Self::Uppercase(fields) => case_fold(fields, event, Casing::Upper),
            Self::Lowercase(fields) => case_fold(fields, event, Casing::Lower),
            Self::Strip(fields) => strip(fields, event),
            Self::Remove(fields) => remove(fields, event),
            Self::Split(pairs) => split(pairs, event),
            Self::Join(pairs) => join(pairs, event),
            Self::Merge(pairs) => merge(pairs, event),
        }
        Ok(())
    }
}

/// Copies each `old` value to `new`, then deletes `old`. Pairs whose
/// source resolves to nothing are skipped.
fn rename(pairs: &[(String, String)], event: &mut MutateEvent) {
    for (old, new) in pairs {
        let Some(value) = event.get(old).cloned() else {
            continue;
        };
        event.set(new, value);
        event.remove(old);
    }
}

/// Sets each field to its expanded template, but only when the field
/// already exists. The template is expanded first either way, so a bad
/// reference is logged even when the assignment is then skipped.
fn update(pairs: &[(String, String)], event: &mut MutateEvent) {
    for (field, template) in pairs {
        let value = expand_patterns(event, template);
        if !event.has(field) {
            continue;
        }
        event.set(field, Value::String(value));
    }
}

/// Sets each field to its expanded template, creating it when absent.
fn replace(pairs: &[(String, String)], event: &mut MutateEvent) {
    for (field, template) in pairs {
        let value = expand_patterns(event, template);
        event.set(field, Value::String(value));
    }
}

/// Converts fields through the type converter. Sequences convert
/// element-wise; maps are rejected with a logged error and left alone.
fn convert_fields(
    pairs: &[(String, convert::ConvertType)],
    event: &mut MutateEvent,
) -> Result<(), ActionError> {
    for (field, target) in pairs {
        let converted = match event.get(field) {
            None => continue,
            Some(Value::Object(_)) => {
                log::error!("cannot convert hash: field={field}");
                continue;
            }
            Some(Value::Array(items)) => {
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    converted.push(match convert::convert_scalar(item, *target)? {
                        Some(value) => value,
                        None => item.clone(),
                    });
                }
                Value::Array(converted)
            }
            Some(scalar) => match convert::convert_scalar(scalar, *target)? {
                Some(value) => value,
                None => continue,
            },
        };
        event.set(field, converted);
    }
    Ok(())
}

/// Re-types string fields by parsing embedded JSON. Values that do not
/// look like an object or sequence literal are left as they are.
fn parse_fields(
    pairs: &[(String, ParseFormat)],
    event: &mut MutateEvent,
) -> Result<(), ActionError> {
    for (field, ParseFormat::Json) in pairs {
        let Some(Value::String(text)) = event.get(field) else {
            log::warn!("field value cannot be parsed as json: field={field}");
            continue;
        };

        let trimmed = text.trim();
        let structured = (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']'));
        if !structured {
            continue;
        }

        let parsed = match serde_json::from_str::<Value>(trimmed) {
            Ok(parsed) => parsed,
            // Fall back to json5 for JS-style literals with unquoted
            // keys or single quotes.
            Err(strict) => {
                json5::from_str::<Value>(trimmed).map_err(|_| ActionError::Unparsable {
                    field: field.clone(),
                    message: strict.to_string(),
                })?
            }
        };
        event.set(field, parsed);
    }
    Ok(())
}

/// Applies one substitution per field, element-wise for sequences.
/// Non-string values are logged and kept as they are.
fn gsub(pairs: &[(String, GsubSpec)], event: &mut MutateEvent) -> Result<(), ActionError> {
    for (field, spec) in pairs {
        let replaced = match event.get(field) {
            Some(Value::String(text)) => Value::String(gsub_value(event, text, spec)?),
            Some(Value::Array(items)) => {
                let mut replaced = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(text) => {
                            replaced.push(Value::String(gsub_value(event, text, spec)?));
                        }
                        other => {
                            log::error!("cannot gsub non-string value: field={field}");
                            replaced.push(other.clone());
                        }
                    }
                }
                Value::Array(replaced)
            }
            _ => {
                log::error!("cannot gsub non-string value: field={field}");
                continue;
            }
        };
        event.set(field, replaced);
    }
    Ok(())
}

/// Expands the replacement template, compiles the pattern if it was
/// dynamic, and substitutes every match. `$1`-style capture references
/// in the replacement are honored.
fn gsub_value(event: &MutateEvent, original: &str, spec: &GsubSpec) -> Result<String, ActionError> {
    let replacement = expand_patterns(event, &spec.replacement);
    let replaced = match &spec.pattern {
        GsubPattern::Static(regex) => {
            regex.replace_all(original, replacement.as_str()).into_owned()
        }
        GsubPattern::Dynamic(template) => {
            let pattern = expand_patterns(event, template);
            let regex = spec
                .flags
                .compile(&pattern)
                .map_err(|source| ActionError::DynamicPattern { pattern, source })?;
            regex.replace_all(original, replacement.as_str()).into_owned()
        }
    };
    Ok(replaced)
}

#[derive(Clone, Copy)]
enum Casing {
    Upper,
    Lower,
}

impl Casing {
    fn fold(self, text: &str) -> String {
        match self {
            Self::Upper => text.to_uppercase(),
            Self::Lower => text.to_lowercase(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Upper => "uppercase",
            Self::Lower => "lowercase",
        }
    }
}

/// Case-folds string fields, element-wise for sequences whose non-string
/// elements pass through untouched. Anything else is logged and left
/// unchanged.
fn case_fold(fields: &[String], event: &mut MutateEvent, casing: Casing) {
    for field in fields {
        let folded = match event.get(field) {
            Some(Value::String(text)) => Value::String(casing.fold(text)),
            Some(Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => Value::String(casing.fold(text)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            _ => {
                log::error!("can't {} field: field={field}", casing.label());
                continue;
            }
        };
        event.set(field, folded);
    }
}

/// Trims surrounding whitespace from string fields, element-wise for
/// sequences. Other types are left alone, silently.
fn strip(fields: &[String], event: &mut MutateEvent) {
    for field in fields {
        let stripped = match event.get(field) {
            Some(Value::String(text)) => Value::String(text.trim().to_string()),
            Some(Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => Value::String(text.trim().to_string()),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            _ => continue,
        };
        event.set(field, stripped);
    }
}

/// Deletes the named fields; absent fields are a no-op.
fn remove(fields: &[String], event: &mut MutateEvent) {
    for field in fields {
        event.remove(field);
    }
}

/// Splits string fields into sequences on a separator, without trailing
/// empty pieces. Non-string values log an error and stay put.
fn split(pairs: &[(String, String)], event: &mut MutateEvent) {
    for (field, separator) in pairs {
        let pieces = match event.get(field) {
            Some(Value::String(text)) => split_parts(text, separator)
                .into_iter()
                .map(|piece| Value::String(piece.to_string()))
                .collect::<Vec<_>>(),
            _ => {
                log::error!("can't split field: field={field}");
                continue;
            }
        };
        event.set(field, Value::Array(pieces));
    }
}

/// Joins sequence fields into separator-delimited text, flattening
/// nested sequences on the way. Non-sequence values are skipped without
/// noise.
fn join(pairs: &[(String, String)], event: &mut MutateEvent) {
    for (field, separator) in pairs {
        let joined = match event.get(field) {
            Some(Value::Array(items)) => join_values(items, separator),
            _ => continue,
        };
        event.set(field, Value::String(joined));
    }
}

fn join_values(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Array(nested) => join_values(nested, separator),
            other => render_string(other),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// Merges each source field into its destination. Two maps union their
/// keys with the source winning on conflict; any other combination
/// concatenates as sequences, with missing values behaving as empty. A
/// map on exactly one side is logged and skipped. The destination is
/// re-read before every source so consecutive merges accumulate.
fn merge(pairs: &[(String, Vec<String>)], event: &mut MutateEvent) {
    for (dest, sources) in pairs {
        for source in sources {
            let merged = match (event.get(dest).cloned(), event.get(source).cloned()) {
                (Some(Value::Object(mut dest_map)), Some(Value::Object(source_map))) => {
                    dest_map.extend(source_map);
                    Value::Object(dest_map)
                }
                (Some(Value::Object(_)), _) | (_, Some(Value::Object(_))) => {
                    log::error!(
                        "cannot merge an array and hash: dest_field={dest} added_field={source}"
                    );
                    continue;
                }
                (dest_value, source_value) => {
                    let mut items = into_sequence(dest_value);
                    items.extend(into_sequence(source_value));
                    Value::Array(items)
                }
            };
            event.set(dest, merged);
        }
    }
}

/// Sequence coercion for merge: sequences stay, a missing value is
/// empty, a scalar becomes a one-element sequence.
fn into_sequence(value: Option<Value>) -> Vec<Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(scalar) => vec![scalar],
    }
}
