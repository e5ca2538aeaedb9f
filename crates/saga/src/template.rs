//! Placeholder rendering for step requests and compensation payloads.
//!
//! A placeholder is a JSON string that consists entirely of `${namespace.path}`,
//! for example `"${input.amount}"` or `"${context.quote.value}"`. The resolved
//! JSON value replaces the whole string, so numbers stay numbers. Strings that
//! merely contain a placeholder are left alone, as are placeholders whose
//! namespace is unknown or whose path does not resolve.

use serde_json::Value;

use saga_store::JsonObject;

/// The sources a placeholder can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// The saga's original request payload.
    Input,
    /// Outputs accumulated from completed steps.
    Context,
    /// The response of the step being compensated.
    Response,
}

impl Namespace {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "input" => Some(Namespace::Input),
            "context" => Some(Namespace::Context),
            "response" => Some(Namespace::Response),
            _ => None,
        }
    }
}

/// Splits `"${ns.path}"` into its namespace and path.
pub fn parse_placeholder(s: &str) -> Option<(Namespace, &str)> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let (prefix, path) = inner.split_once('.')?;
    if path.is_empty() {
        return None;
    }
    Some((Namespace::from_prefix(prefix)?, path))
}

/// Walks a dotted path through nested objects and arrays.
fn lookup_path<'v>(root: &'v JsonObject, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// The values a template can be rendered against.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    input: &'a JsonObject,
    context: &'a JsonObject,
    response: Option<&'a JsonObject>,
}

impl<'a> Bindings<'a> {
    pub fn new(input: &'a JsonObject, context: &'a JsonObject) -> Self {
        Self {
            input,
            context,
            response: None,
        }
    }

    /// Makes `${response.*}` resolvable. Non-object responses expose nothing.
    pub fn with_response(mut self, response: &'a Value) -> Self {
        self.response = response.as_object();
        self
    }

    /// Resolves a single placeholder path.
    pub fn lookup(&self, namespace: Namespace, path: &str) -> Option<&'a Value> {
        let root = match namespace {
            Namespace::Input => self.input,
            Namespace::Context => self.context,
            Namespace::Response => self.response?,
        };
        lookup_path(root, path)
    }

    /// Renders `template`, recursing through objects and arrays.
    pub fn render(&self, template: &Value) -> Value {
        match template {
            Value::String(s) => parse_placeholder(s)
                .and_then(|(namespace, path)| self.lookup(namespace, path))
                .cloned()
                .unwrap_or_else(|| template.clone()),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.render(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_placeholder() {
        assert_eq!(
            parse_placeholder("${input.amount}"),
            Some((Namespace::Input, "amount"))
        );
        assert_eq!(
            parse_placeholder("${context.quote.value}"),
            Some((Namespace::Context, "quote.value"))
        );
        assert_eq!(parse_placeholder("${secrets.key}"), None);
        assert_eq!(parse_placeholder("${input.}"), None);
        assert_eq!(parse_placeholder("${input.amount"), None);
        assert_eq!(parse_placeholder("amount is ${input.amount}"), None);
    }

    #[test]
    fn test_render_preserves_types() {
        let input = object(json!({"amount": 12.5, "user": {"id": 7}}));
        let context = object(json!({"tx_id": "T1", "legs": [{"odds": 2.1}]}));
        let bindings = Bindings::new(&input, &context);

        let rendered = bindings.render(&json!({
            "amount": "${input.amount}",
            "user_id": "${input.user.id}",
            "tx": "${context.tx_id}",
            "first_odds": "${context.legs.0.odds}",
            "nested": ["${input.amount}", {"keep": true}],
            "literal": "hello"
        }));

        assert_eq!(
            rendered,
            json!({
                "amount": 12.5,
                "user_id": 7,
                "tx": "T1",
                "first_odds": 2.1,
                "nested": [12.5, {"keep": true}],
                "literal": "hello"
            })
        );
    }

    #[test]
    fn test_unresolved_placeholder_is_left_literal() {
        let input = JsonObject::new();
        let context = JsonObject::new();
        let bindings = Bindings::new(&input, &context);

        let rendered = bindings.render(&json!({
            "missing": "${context.nope}",
            "response": "${response.tx_id}",
            "unknown_ns": "${env.HOME}"
        }));

        assert_eq!(rendered["missing"], "${context.nope}");
        assert_eq!(rendered["response"], "${response.tx_id}");
        assert_eq!(rendered["unknown_ns"], "${env.HOME}");
    }

    #[test]
    fn test_response_namespace() {
        let input = object(json!({"bet_slip_id": "B1"}));
        let context = JsonObject::new();
        let response = json!({"transaction_id": "W-9"});
        let bindings = Bindings::new(&input, &context).with_response(&response);

        let rendered = bindings.render(&json!({
            "transaction_id": "${response.transaction_id}",
            "bet_slip_id": "${input.bet_slip_id}"
        }));
        assert_eq!(rendered, json!({"transaction_id": "W-9", "bet_slip_id": "B1"}));
    }
}
