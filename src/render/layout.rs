//! Layout selection for content templates

use std::collections::HashMap;

use serde::Deserialize;

use crate::template::normalize_name;

/// Key matching every template
pub const WILDCARD: &str = "*";

/// Maps content templates to the layout that wraps them.
///
/// Lookup order for a template rendered by a request method:
/// 1. the exact template name
/// 2. `METHOD:name`
/// 3. the wildcard `*`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, String>")]
pub struct LayoutMap {
    layouts: HashMap<String, String>,
}

impl From<HashMap<String, String>> for LayoutMap {
    fn from(entries: HashMap<String, String>) -> Self {
        entries
            .into_iter()
            .fold(LayoutMap::new(), |map, (key, layout)| map.with(key, layout))
    }
}

impl LayoutMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Keys are `name`, `METHOD:name` or `*`.
    pub fn with(mut self, key: impl AsRef<str>, layout: impl AsRef<str>) -> Self {
        self.insert(key, layout);
        self
    }

    pub fn insert(&mut self, key: impl AsRef<str>, layout: impl AsRef<str>) {
        self.layouts
            .insert(normalize_key(key.as_ref()), normalize_name(layout.as_ref()));
    }

    /// Resolve the layout for `name` rendered by `method`
    pub fn resolve(&self, name: &str, method: &str) -> Option<&str> {
        let name = normalize_name(name);
        let method_key = format!("{}:{}", method.to_uppercase(), name);

        self.layouts
            .get(&name)
            .or_else(|| self.layouts.get(&method_key))
            .or_else(|| self.layouts.get(WILDCARD))
            .map(|s| s.as_str())
            // a layout never wraps itself
            .filter(|layout| *layout != name)
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    match key.split_once(':') {
        Some((method, name)) => format!("{}:{}", method.to_uppercase(), normalize_name(name)),
        None => normalize_name(key),
    }
}
