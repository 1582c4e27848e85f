//! Run-wide configuration store
//!
//! Holds every task's configuration plus ad-hoc values written by inline tasks
//! during a run. Values are `serde_json::Value`s; strings may contain late-bound
//! `<%= key %>` placeholders which are resolved against the store at the moment a
//! task executes, so earlier tasks can feed values to later ones.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::{PipewrightError, PipewrightResult};

const OPEN: &str = "<%=";
const CLOSE: &str = "%>";
const MAX_TEMPLATE_DEPTH: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: BTreeMap<String, Value>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, returning the one it replaced
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Get a value by its exact key. Unset keys yield `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Look up a dotted path such as `jshint.all.src`.
    ///
    /// The longest stored key that prefixes the path wins, so keys which
    /// themselves contain dots (`env.NODE_ENV`) stay addressable.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }

        let parts: Vec<&str> = path.split('.').collect();
        for split in (1..parts.len()).rev() {
            let key = parts[..split].join(".");
            if let Some(root) = self.values.get(&key) {
                return parts[split..]
                    .iter()
                    .try_fold(root, |current, segment| match current {
                        Value::Object(map) => map.get(*segment),
                        Value::Array(items) => segment
                            .parse::<usize>()
                            .ok()
                            .and_then(|index| items.get(index)),
                        _ => None,
                    });
            }
        }
        None
    }

    /// Resolve every placeholder inside `value` against the current store contents
    pub fn resolve(&self, value: &Value) -> PipewrightResult<Value> {
        self.resolve_at_depth(value, 0)
    }

    /// The configuration for a task (or one target of a multi-target task), as
    /// it stands right now, with placeholders resolved.
    ///
    /// A target's `options` are the task-level `options` overlaid with the
    /// target's own. Tasks without stored configuration get `Value::Null`.
    pub fn task_config(&self, task: &str, target: Option<&str>) -> PipewrightResult<Value> {
        let stored = self.get(task);

        let raw = match target {
            None => stored.cloned().unwrap_or(Value::Null),
            Some(target) => {
                let task_options = stored.and_then(|v| v.get("options")).cloned();
                let mut target_value = match stored.and_then(|v| v.get(target)) {
                    Some(Value::Object(map)) => map.clone(),
                    Some(other) => {
                        let mut map = Map::new();
                        map.insert("value".to_string(), other.clone());
                        map
                    }
                    None => Map::new(),
                };
                let target_options = target_value.remove("options");
                if let Some(options) = merge_options(task_options, target_options) {
                    target_value.insert("options".to_string(), options);
                }
                Value::Object(target_value)
            }
        };

        self.resolve(&raw)
    }

    fn resolve_at_depth(&self, value: &Value, depth: usize) -> PipewrightResult<Value> {
        if depth > MAX_TEMPLATE_DEPTH {
            return Err(PipewrightError::Template(
                "placeholder resolution nested too deeply (self-referencing value?)".to_string(),
            ));
        }

        match value {
            Value::String(text) => self.resolve_string(text, depth),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_at_depth(item, depth))
                .collect::<PipewrightResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve_at_depth(v, depth)?)))
                .collect::<PipewrightResult<Map<_, _>>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, text: &str, depth: usize) -> PipewrightResult<Value> {
        if !text.contains(OPEN) {
            return Ok(Value::String(text.to_string()));
        }

        // A lone placeholder keeps the referenced value's type
        if let Some(key) = single_placeholder(text) {
            let referenced = self.referenced(key)?;
            return self.resolve_at_depth(referenced, depth + 1);
        }

        let mut output = String::new();
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| {
                PipewrightError::Template(format!("unterminated placeholder in '{}'", text))
            })?;
            let key = after_open[..end].trim();
            let resolved = self.resolve_at_depth(self.referenced(key)?, depth + 1)?;
            output.push_str(&render_inline(&resolved));
            rest = &after_open[end + CLOSE.len()..];
        }
        output.push_str(rest);

        Ok(Value::String(output))
    }

    fn referenced(&self, key: &str) -> PipewrightResult<&Value> {
        self.lookup(key).ok_or_else(|| {
            PipewrightError::Template(format!("undefined configuration key '{}'", key))
        })
    }
}

fn single_placeholder(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(OPEN) || inner.contains(CLOSE) {
        return None;
    }
    Some(inner.trim())
}

fn render_inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(render_inline).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn merge_options(base: Option<Value>, overlay: Option<Value>) -> Option<Value> {
    match (base, overlay) {
        (Some(Value::Object(mut base)), Some(Value::Object(overlay))) => {
            base.extend(overlay);
            Some(Value::Object(base))
        }
        (_, Some(overlay)) => Some(overlay),
        (base, None) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_key_is_none() {
        let store = ConfigStore::new();
        assert!(store.get("applicationJavaScriptFiles").is_none());
        assert!(store.lookup("a.b.c").is_none());
    }

    #[test]
    fn test_later_set_overwrites() {
        let mut store = ConfigStore::new();
        assert!(store.set("key", json!(1)).is_none());
        assert_eq!(store.set("key", json!(2)), Some(json!(1)));
        assert_eq!(store.get("key"), Some(&json!(2)));
    }

    #[test]
    fn test_dotted_lookup() {
        let mut store = ConfigStore::new();
        store.set("jshint", json!({ "all": { "src": ["a.js", "b.js"] } }));
        store.set("env.NODE_ENV", json!("test"));

        assert_eq!(store.lookup("jshint.all.src.1"), Some(&json!("b.js")));
        assert_eq!(store.lookup("env.NODE_ENV"), Some(&json!("test")));
        assert!(store.lookup("jshint.none").is_none());
    }

    #[test]
    fn test_lone_placeholder_keeps_arrays() {
        let mut store = ConfigStore::new();
        store.set("applicationCSSFiles", json!(["a.css", "b.css"]));

        let resolved = store
            .resolve(&json!({ "files": { "out.min.css": "<%= applicationCSSFiles %>" } }))
            .unwrap();
        assert_eq!(
            resolved,
            json!({ "files": { "out.min.css": ["a.css", "b.css"] } })
        );
    }

    #[test]
    fn test_embedded_placeholders_interpolate() {
        let mut store = ConfigStore::new();
        store.set("dist", json!("public/dist"));
        store.set("files", json!(["a", "b"]));

        let resolved = store
            .resolve(&json!("<%= dist %>/application.js (<%= files %>)"))
            .unwrap();
        assert_eq!(resolved, json!("public/dist/application.js (a,b)"));
    }

    #[test]
    fn test_placeholders_resolve_transitively() {
        let mut store = ConfigStore::new();
        store.set("base", json!("public"));
        store.set("dist", json!("<%= base %>/dist"));

        assert_eq!(store.resolve(&json!("<%= dist %>")).unwrap(), json!("public/dist"));
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let store = ConfigStore::new();
        let err = store.resolve(&json!("<%= missing %>")).unwrap_err();
        assert!(err.to_string().contains("undefined configuration key 'missing'"));
    }

    #[test]
    fn test_self_reference_is_error() {
        let mut store = ConfigStore::new();
        store.set("loop", json!("<%= loop %>"));
        assert!(store.resolve(&json!("<%= loop %>")).is_err());
    }

    #[test]
    fn test_unterminated_placeholder_is_error() {
        let mut store = ConfigStore::new();
        store.set("a", json!("x"));
        assert!(store.resolve(&json!("prefix <%= a")).is_err());
    }

    #[test]
    fn test_task_config_merges_target_options() {
        let mut store = ConfigStore::new();
        store.set(
            "jshint",
            json!({
                "options": { "jshintrc": true, "quiet": false },
                "allTests": { "src": ["tests/*.js"], "options": { "quiet": true } }
            }),
        );

        let config = store.task_config("jshint", Some("allTests")).unwrap();
        assert_eq!(
            config,
            json!({
                "src": ["tests/*.js"],
                "options": { "jshintrc": true, "quiet": true }
            })
        );
    }

    #[test]
    fn test_task_config_reads_current_values() {
        let mut store = ConfigStore::new();
        store.set("cssmin", json!({ "src": "<%= applicationCSSFiles %>" }));
        assert!(store.task_config("cssmin", None).is_err());

        store.set("applicationCSSFiles", json!(["a.css"]));
        assert_eq!(
            store.task_config("cssmin", None).unwrap(),
            json!({ "src": ["a.css"] })
        );
        assert_eq!(store.task_config("unconfigured", None).unwrap(), Value::Null);
    }
}
