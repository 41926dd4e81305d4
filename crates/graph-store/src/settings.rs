//! Typed node settings
//!
//! The wire format is a flat `{key, label, type, value}` object where `type`
//! is one of `string`, `number`, `boolean` or `select`. In memory each
//! setting carries a [`SettingValue`] variant instead, so a boolean is a
//! `bool` and never the string `"true"`.
//!
//! Older payloads stored every value as a string; those are coerced on read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single configurable setting on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSetting", into = "RawSetting")]
pub struct NodeSetting {
    /// Stable key used by the node implementation
    pub key: String,
    /// Human-readable label
    pub label: String,
    /// Typed value
    pub value: SettingValue,
}

impl NodeSetting {
    /// Create a new setting
    pub fn new(key: impl Into<String>, label: impl Into<String>, value: SettingValue) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
        }
    }

    /// Build a setting from an untyped config entry
    ///
    /// The kind is inferred from the JSON type: booleans, numbers and
    /// strings map directly, string arrays become a select with the first
    /// entry chosen, anything else is kept as its JSON text.
    pub fn from_config_entry(key: &str, value: &Value) -> Self {
        let value = match value {
            Value::Bool(b) => SettingValue::Boolean(*b),
            Value::Number(n) => SettingValue::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => SettingValue::Text(s.clone()),
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let options: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                SettingValue::Select {
                    value: options.first().cloned().unwrap_or_default(),
                    options,
                }
            }
            Value::Null => SettingValue::Text(String::new()),
            other => SettingValue::Text(other.to_string()),
        };
        Self::new(key, humanize_key(key), value)
    }
}

/// The value of a setting, discriminated by kind
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// Free text
    Text(String),
    /// Numeric value
    Number(f64),
    /// Toggle
    Boolean(bool),
    /// One choice out of a fixed list
    Select { value: String, options: Vec<String> },
}

impl SettingValue {
    /// The wire name of this kind
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Text(_) => "string",
            SettingValue::Number(_) => "number",
            SettingValue::Boolean(_) => "boolean",
            SettingValue::Select { .. } => "select",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            SettingValue::Select { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Coerce a raw JSON value into the given kind
    fn coerce(kind: &str, raw: Value, options: Option<Vec<String>>) -> Result<Self, String> {
        match kind {
            "boolean" => match &raw {
                Value::Bool(b) => Ok(SettingValue::Boolean(*b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(SettingValue::Boolean(true)),
                    "false" | "" => Ok(SettingValue::Boolean(false)),
                    other => Err(format!("'{}' is not a boolean", other)),
                },
                Value::Null => Ok(SettingValue::Boolean(false)),
                other => Err(format!("{} is not a boolean", other)),
            },
            "number" => match &raw {
                Value::Number(n) => n
                    .as_f64()
                    .map(SettingValue::Number)
                    .ok_or_else(|| format!("{} is not a finite number", n)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(SettingValue::Number)
                    .ok_or_else(|| format!("'{}' is not a finite number", s)),
                Value::Null => Ok(SettingValue::Number(0.0)),
                other => Err(format!("{} is not a number", other)),
            },
            "select" => Ok(SettingValue::Select {
                value: value_to_text(raw),
                options: options.unwrap_or_default(),
            }),
            "string" | "text" => Ok(SettingValue::Text(value_to_text(raw))),
            unknown => {
                log::warn!("Unknown setting type '{}', treating it as text", unknown);
                Ok(SettingValue::Text(value_to_text(raw)))
            }
        }
    }
}

fn value_to_text(raw: Value) -> String {
    match raw {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Turn `max_tokens` / `maxTokens` into `Max Tokens`
fn humanize_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flat wire representation of a setting
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSetting {
    key: String,
    #[serde(default)]
    label: String,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
}

fn default_kind() -> String {
    "string".to_string()
}

impl TryFrom<RawSetting> for NodeSetting {
    type Error = String;

    fn try_from(raw: RawSetting) -> Result<Self, Self::Error> {
        let value = SettingValue::coerce(&raw.kind, raw.value, raw.options)
            .map_err(|e| format!("setting '{}': {}", raw.key, e))?;
        let label = if raw.label.is_empty() {
            humanize_key(&raw.key)
        } else {
            raw.label
        };
        Ok(NodeSetting {
            key: raw.key,
            label,
            value,
        })
    }
}

impl From<NodeSetting> for RawSetting {
    fn from(setting: NodeSetting) -> Self {
        let kind = setting.value.kind().to_string();
        let (value, options) = match setting.value {
            SettingValue::Text(s) => (Value::String(s), None),
            SettingValue::Number(n) => (
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                None,
            ),
            SettingValue::Boolean(b) => (Value::Bool(b), None),
            SettingValue::Select { value, options } => (Value::String(value), Some(options)),
        };
        RawSetting {
            key: setting.key,
            label: setting.label,
            kind,
            value,
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_string_boolean_is_coerced() {
        let setting: NodeSetting = serde_json::from_value(json!({
            "key": "stream",
            "label": "Stream",
            "type": "boolean",
            "value": "true"
        }))
        .unwrap();
        assert_eq!(setting.value, SettingValue::Boolean(true));
    }

    #[test]
    fn test_legacy_string_number_is_coerced() {
        let setting: NodeSetting = serde_json::from_value(json!({
            "key": "temperature",
            "label": "Temperature",
            "type": "number",
            "value": "0.7"
        }))
        .unwrap();
        assert_eq!(setting.value.as_f64(), Some(0.7));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result: Result<NodeSetting, _> = serde_json::from_value(json!({
            "key": "temperature",
            "type": "number",
            "value": "warm"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_number_string_is_rejected() {
        for raw in ["NaN", "inf", "-infinity"] {
            let result: Result<NodeSetting, _> = serde_json::from_value(json!({
                "key": "temperature",
                "type": "number",
                "value": raw
            }));
            assert!(result.is_err(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_select_keeps_options_on_the_wire() {
        let setting = NodeSetting::new(
            "model",
            "Model",
            SettingValue::Select {
                value: "small".to_string(),
                options: vec!["small".to_string(), "large".to_string()],
            },
        );
        let wire = serde_json::to_value(&setting).unwrap();
        assert_eq!(wire["type"], "select");
        assert_eq!(wire["value"], "small");
        assert_eq!(wire["options"], json!(["small", "large"]));
    }

    #[test]
    fn test_boolean_serializes_as_bool() {
        let setting = NodeSetting::new("stream", "Stream", SettingValue::Boolean(false));
        let wire = serde_json::to_value(&setting).unwrap();
        assert_eq!(wire["value"], json!(false));
    }

    #[test]
    fn test_config_entry_inference() {
        let setting = NodeSetting::from_config_entry("max_tokens", &json!(256));
        assert_eq!(setting.label, "Max Tokens");
        assert_eq!(setting.value, SettingValue::Number(256.0));

        let setting = NodeSetting::from_config_entry("apiMode", &json!(["fast", "slow"]));
        assert_eq!(setting.label, "Api Mode");
        assert_eq!(setting.value.as_str(), Some("fast"));
    }
}
