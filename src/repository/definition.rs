//! Definitions and typed views over them
//!
//! A [`Definition`] is one JSON object exactly as authored. It is shared as
//! `Arc<Definition>` once loaded; edits clone it and produce a new value.
//! Accessors below interpret the handful of fields the compiler cares about
//! without committing to a fixed struct per kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root or attribute-level include directive
pub const INCLUDE_KEY: &str = "$include";
pub const ATTRIBUTES_KEY: &str = "attributes";
pub const PROFILE_KEY: &str = "profile";
pub const SRC_EXTENSION_KEY: &str = "src_extension";
pub const KEY_KEY: &str = "key";

/// One semi-structured schema document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Definition(Map<String, Value>);

impl Definition {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; only objects are definitions
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    // ===== Common fields =====

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn caption(&self) -> Option<&str> {
        self.get_str("caption")
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str("description")
    }

    pub fn extends(&self) -> Option<&str> {
        self.get_str("extends")
    }

    pub fn category(&self) -> Option<&str> {
        self.get_str("category")
    }

    pub fn uid(&self) -> Option<i64> {
        self.get("uid").and_then(Value::as_i64)
    }

    /// Extension a copied definition came from
    pub fn src_extension(&self) -> Option<&str> {
        self.get_str(SRC_EXTENSION_KEY)
    }

    /// Rendered key: explicit `key`, else `name`
    pub fn key(&self) -> Option<&str> {
        self.get_str(KEY_KEY).or_else(|| self.name())
    }

    /// Profiles this definition declares, by reference as written
    pub fn profiles(&self) -> Vec<&str> {
        string_list(self.get("profiles"))
    }

    /// Root-level `$include` references
    pub fn includes(&self) -> Vec<&str> {
        string_list(self.get(INCLUDE_KEY))
    }

    /// `$include` references inside `attributes`
    pub fn attribute_includes(&self) -> Vec<&str> {
        string_list(self.attributes().and_then(|a| a.get(INCLUDE_KEY)))
    }

    // ===== Attributes =====

    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.get(ATTRIBUTES_KEY).and_then(Value::as_object)
    }

    pub fn attributes_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.0.get_mut(ATTRIBUTES_KEY).and_then(Value::as_object_mut)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Map<String, Value>> {
        self.attributes_mut()?.get_mut(name)?.as_object_mut()
    }

    /// Insert or replace one attribute, creating `attributes` if needed
    pub fn insert_attribute(&mut self, name: impl Into<String>, attribute: Map<String, Value>) {
        let name = name.into();
        match self.0.get_mut(ATTRIBUTES_KEY) {
            Some(Value::Object(attrs)) => {
                attrs.insert(name, Value::Object(attribute));
            }
            _ => {
                let mut attrs = Map::new();
                attrs.insert(name, Value::Object(attribute));
                self.0.insert(ATTRIBUTES_KEY.to_string(), Value::Object(attrs));
            }
        }
    }

    /// A single attribute definition, skipping directives such as `$include`
    pub fn attribute(&self, name: &str) -> Option<&Map<String, Value>> {
        if name.starts_with('$') {
            return None;
        }
        self.attributes()?.get(name)?.as_object()
    }

    /// Attribute names in authored order, directives excluded
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .filter(|(k, v)| !k.starts_with('$') && v.is_object())
                    .map(|(k, _)| k.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for Definition {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Profile tags on one attribute (`profile` may be a string or a list)
pub fn profile_tags(attribute: &Map<String, Value>) -> Vec<&str> {
    string_list(attribute.get(PROFILE_KEY))
}

/// Last path segment of a profile reference (`win/host`, `profiles/host.json`)
pub fn profile_ref_name(reference: &str) -> &str {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    last.strip_suffix(".json").unwrap_or(last)
}

fn string_list(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defn(value: Value) -> Definition {
        Definition::from_value(value).unwrap()
    }

    #[test]
    fn test_only_objects_are_definitions() {
        assert!(Definition::from_value(json!([1, 2])).is_none());
        assert!(Definition::from_value(json!("x")).is_none());
    }

    #[test]
    fn test_common_fields() {
        let d = defn(json!({
            "name": "http_activity",
            "caption": "HTTP Activity",
            "extends": "network",
            "uid": 2,
            "profiles": ["cloud", "host"],
            "$include": "includes/thing.json"
        }));
        assert_eq!(d.name(), Some("http_activity"));
        assert_eq!(d.key(), Some("http_activity"));
        assert_eq!(d.extends(), Some("network"));
        assert_eq!(d.uid(), Some(2));
        assert_eq!(d.profiles(), vec!["cloud", "host"]);
        assert_eq!(d.includes(), vec!["includes/thing.json"]);
    }

    #[test]
    fn test_null_fields_are_absent() {
        let d = defn(json!({"name": null, "caption": "X"}));
        assert_eq!(d.name(), None);
        assert!(!d.contains("name"));
        assert!(d.contains("caption"));
    }

    #[test]
    fn test_attribute_views_skip_directives() {
        let d = defn(json!({
            "attributes": {
                "$include": ["profiles/cloud.json"],
                "status_code": {"requirement": "optional"},
                "odd": 3
            }
        }));
        assert_eq!(d.attribute_names(), vec!["status_code"]);
        assert_eq!(d.attribute_includes(), vec!["profiles/cloud.json"]);
        assert!(d.attribute("$include").is_none());
        assert!(d.attribute("odd").is_none());
    }

    #[test]
    fn test_profile_tags() {
        let attr = json!({"profile": ["cloud", "host"]});
        assert_eq!(profile_tags(attr.as_object().unwrap()), vec!["cloud", "host"]);
        let attr = json!({"profile": "cloud"});
        assert_eq!(profile_tags(attr.as_object().unwrap()), vec!["cloud"]);
    }

    #[test]
    fn test_profile_ref_name() {
        assert_eq!(profile_ref_name("cloud"), "cloud");
        assert_eq!(profile_ref_name("win/host"), "host");
        assert_eq!(profile_ref_name("profiles/host.json"), "host");
    }
}
