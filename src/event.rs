use serde_json::{Map, Value};

/// Splits on `separator`, dropping trailing empty pieces; an empty
/// separator splits into characters. Shared by key expansion and the
/// `split` action.
pub(crate) fn split_parts<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()])
            .collect();
    }
    let mut pieces: Vec<&str> = text.split(separator).collect();
    while pieces.last() == Some(&"") {
        pieces.pop();
    }
    pieces
}

/// One in-flight record together with its per-invocation metadata.
///
/// All field access goes through dotted-key resolution when nesting
/// expansion is on; with it off, keys are taken verbatim, so a key
/// containing literal dots addresses a single flat field.
#[derive(Debug)]
pub struct MutateEvent {
    record: Map<String, Value>,
    /// Event timestamp in epoch seconds, addressable as `%{event_time}`.
    pub event_time: i64,
    /// Event tag, addressable as `%{event_tag}`.
    pub event_tag: String,
    expand_nesting: bool,
}

impl MutateEvent {
    pub fn new(record: Map<String, Value>, expand_nesting: bool) -> Self {
        Self {
            record,
            event_time: 0,
            event_tag: String::new(),
            expand_nesting,
        }
    }

    /// Consumes the wrapper and hands back the plain record.
    pub fn into_record(self) -> Map<String, Value> {
        self.record
    }

    fn expand_key<'k>(&self, key: &'k str) -> Vec<&'k str> {
        if self.expand_nesting {
            split_parts(key, ".")
        } else {
            vec![key]
        }
    }

    /// Resolves `key` to its value. Missing segments, non-map
    /// intermediates and explicit nulls all come back as `None`;
    /// resolution itself never fails.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = self.expand_key(key).into_iter();
        let mut current = self.record.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// True when `key` resolves to a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Assigns `value` at `key`, creating empty intermediate maps as
    /// needed. An intermediate segment holding a non-map value is
    /// replaced by a map; sequences are never created implicitly.
    pub fn set(&mut self, key: &str, value: Value) {
        let mut segments = self.expand_key(key);
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut self.record;
        for segment in segments {
            let slot = current
                .entry(segment)
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else {
                return;
            };
            current = next;
        }
        current.insert(last.to_string(), value);
    }

    /// Deletes the value at `key` from its parent container. Missing or
    /// non-map parents make this a no-op.
    pub fn remove(&mut self, key: &str) {
        let mut segments = self.expand_key(key);
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut self.record;
        for segment in segments {
            match current.get_mut(segment).and_then(Value::as_object_mut) {
                Some(next) => current = next,
                None => return,
            }
        }
        current.remove(last);
    }

    /// Drops nulls, whitespace-only strings and empty containers,
    /// depth-first, so containers emptied by their children's removal go
    /// too. Running it a second time changes nothing.
    pub fn prune(&mut self) {
        self.record.retain(|_, value| !prunable(value));
    }
}

/// Prunes `value`'s own children, then reports whether the parent should
/// drop `value` itself. Whitespace is only trimmed for the emptiness
/// test; surviving strings keep their original text.
fn prunable(value: &mut Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => {
            items.retain_mut(|item| !prunable(item));
            items.is_empty()
        }
        Value::Object(entries) => {
            entries.retain(|_, item| !prunable(item));
            entries.is_empty()
        }
        _ => false,
    }
}
