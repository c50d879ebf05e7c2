use std::env;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::event::MutateEvent;
use crate::mutate::convert::render_string;

static FIELD_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{([^}]+)\}").expect("valid field token regex"));
static ENV_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%e\{([^}]+)\}").expect("valid env token regex"));

/// Expands `%{field}` references and then `%e{NAME}` environment
/// references in a template. Each pass scans left to right once, so
/// substituted text is never re-expanded, and an environment value can
/// land inside text a field reference produced but not the other way
/// around. Unresolvable tokens are logged and kept verbatim so the
/// result is always well-formed text.
pub fn expand_patterns(event: &MutateEvent, template: &str) -> String {
    let expanded = expand_references(event, template);
    expand_environment(&expanded)
}

/// `%{...}` pass. The reserved tags `event_time` and `event_tag` come
/// from the event context; any other tag is lowercased and resolved
/// against the record.
fn expand_references(event: &MutateEvent, template: &str) -> String {
    FIELD_TOKEN_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let tag = &caps[1];
            let resolved = match tag {
                "event_time" => Some(event.event_time.to_string()),
                "event_tag" => Some(event.event_tag.clone()),
                _ => event.get(&tag.to_lowercase()).map(render_string),
            };
            resolved.unwrap_or_else(|| {
                log::error!("failed to replace tag: field={}", tag.to_lowercase());
                caps[0].to_string()
            })
        })
        .into_owned()
}

/// `%e{...}` pass. The reserved name `hostname` reads the HOSTNAME
/// variable; anything else reads the variable it names.
fn expand_environment(template: &str) -> String {
    ENV_TOKEN_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            let variable = if name == "hostname" { "HOSTNAME" } else { name };
            env::var(variable).unwrap_or_else(|_| {
                log::error!("failed to replace tag: variable={variable}");
                caps[0].to_string()
            })
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with(record: serde_json::Value) -> MutateEvent {
        let serde_json::Value::Object(map) = record else {
            panic!("test record must be an object");
        };
        let mut event = MutateEvent::new(map, true);
        event.event_time = 1_600_000_000;
        event.event_tag = "app.web".to_string();
        event
    }

    #[test]
    fn test_expands_field_references() {
        let event = event_with(json!({"host": "db-1", "port": 5432}));
        assert_eq!(
            expand_patterns(&event, "%{host}:%{port}"),
            "db-1:5432"
        );
    }

    #[test]
    fn test_field_tags_are_lowercased_before_lookup() {
        let event = event_with(json!({"level": "warn"}));
        assert_eq!(expand_patterns(&event, "%{LEVEL}"), "warn");
    }

    #[test]
    fn test_nested_field_references() {
        let event = event_with(json!({"http": {"status": 503}}));
        assert_eq!(expand_patterns(&event, "status=%{http.status}"), "status=503");
    }

    #[test]
    fn test_reserved_event_tags() {
        let event = event_with(json!({}));
        assert_eq!(
            expand_patterns(&event, "%{event_tag}@%{event_time}"),
            "app.web@1600000000"
        );
    }

    #[test]
    fn test_unresolved_reference_keeps_literal_token() {
        let event = event_with(json!({"present": "x"}));
        assert_eq!(
            expand_patterns(&event, "a=%{present} b=%{missing}"),
            "a=x b=%{missing}"
        );
    }

    #[test]
    fn test_container_values_render_as_json() {
        let event = event_with(json!({"tags": ["a", "b"]}));
        assert_eq!(expand_patterns(&event, "%{tags}"), r#"["a","b"]"#);
    }

    #[test]
    fn test_expands_environment_references() {
        // Process-global state; use a name no other test touches.
        unsafe { env::set_var("LOG_MUTATOR_EXPAND_TEST", "blue") };
        let event = event_with(json!({}));
        assert_eq!(
            expand_patterns(&event, "color=%e{LOG_MUTATOR_EXPAND_TEST}"),
            "color=blue"
        );
    }

    #[test]
    fn test_unresolved_environment_reference_keeps_literal_token() {
        let event = event_with(json!({}));
        assert_eq!(
            expand_patterns(&event, "%e{LOG_MUTATOR_NO_SUCH_VAR}"),
            "%e{LOG_MUTATOR_NO_SUCH_VAR}"
        );
    }

    #[test]
    fn test_field_pass_runs_before_environment_pass() {
        unsafe { env::set_var("LOG_MUTATOR_ORDER_TEST", "from-env") };
        let event = event_with(json!({"wrap": "<%e{LOG_MUTATOR_ORDER_TEST}>"}));
        assert_eq!(expand_patterns(&event, "%{wrap}"), "<from-env>");
    }
}
