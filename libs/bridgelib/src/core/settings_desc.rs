// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Settings-description hints for a host-side settings UI.
//!
//! One JSON object per configurable setting, each with at least `name` and
//! `type` plus type-specific bounds or enum labels. This is descriptive
//! metadata only — the core never parses it, and hosts must not treat it as
//! a machine-readable schema.

use serde_json::{Map, Value, json};

/// Builds the `settings_desc` JSON an extension attaches to a stream's
/// enumeration entry.
#[derive(Debug, Default)]
pub struct SettingsDescBuilder {
    settings: Map<String, Value>,
}

impl SettingsDescBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, id: &str, setting: Value) -> &mut Self {
        self.settings.insert(id.to_string(), setting);
        self
    }

    pub fn add_int(&mut self, id: &str, name: &str, min_value: i64, max_value: i64) -> &mut Self {
        self.add(
            id,
            json!({
                "name": name,
                "type": "int",
                "min_value": min_value,
                "max_value": max_value,
            }),
        )
    }

    pub fn add_double(&mut self, id: &str, name: &str, min_value: f64, max_value: f64) -> &mut Self {
        self.add(
            id,
            json!({
                "name": name,
                "type": "double",
                "min_value": min_value,
                "max_value": max_value,
            }),
        )
    }

    pub fn add_bool(&mut self, id: &str, name: &str) -> &mut Self {
        self.add(id, json!({ "name": name, "type": "bool" }))
    }

    pub fn add_string(&mut self, id: &str, name: &str) -> &mut Self {
        self.add(id, json!({ "name": name, "type": "string" }))
    }

    pub fn add_enum(&mut self, id: &str, name: &str, enum_names: &[&str]) -> &mut Self {
        self.add(
            id,
            json!({
                "name": name,
                "type": "enum",
                "enum_names": enum_names,
            }),
        )
    }

    pub fn build(&self) -> String {
        Value::Object(self.settings.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_shape() {
        let mut builder = SettingsDescBuilder::new();
        builder
            .add_int("resolution_x", "Resolution X", 128, 8192)
            .add_bool("red_channel_only", "Red channel only")
            .add_enum("quality", "Quality", &["Low", "High"]);
        let parsed: serde_json::Value = serde_json::from_str(&builder.build()).unwrap();

        assert_eq!(parsed["resolution_x"]["type"], "int");
        assert_eq!(parsed["resolution_x"]["min_value"], 128);
        assert_eq!(parsed["red_channel_only"]["name"], "Red channel only");
        assert_eq!(parsed["quality"]["enum_names"][1], "High");
    }

    #[test]
    fn test_special_characters_survive() {
        let mut builder = SettingsDescBuilder::new();
        builder.add_string("label", "Name with \"quotes\" and \\ slashes");
        let parsed: serde_json::Value = serde_json::from_str(&builder.build()).unwrap();
        assert_eq!(parsed["label"]["name"], "Name with \"quotes\" and \\ slashes");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut builder = SettingsDescBuilder::new();
        builder.add_bool("b", "B").add_bool("a", "A");
        let text = builder.build();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
    }
}
