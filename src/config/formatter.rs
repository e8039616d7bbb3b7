use crate::constants::Format;
use crate::domain::ports::Formatter;
use crate::utils::error::{Result, StackmateError};
use serde_json::Value;

fn text(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data)
        .map_err(|e| StackmateError::config(format!("Configuration is not valid UTF-8: {}", e)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormatter;

impl Formatter for YamlFormatter {
    fn parse(&self, data: &[u8]) -> Result<Value> {
        Ok(serde_yaml::from_slice(data)?)
    }

    fn export(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(value)?.into_bytes())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn parse(&self, data: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(data)?)
    }

    fn export(&self, value: &Value) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// TOML has no null: exporting a document with null values fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFormatter;

impl Formatter for TomlFormatter {
    fn parse(&self, data: &[u8]) -> Result<Value> {
        Ok(toml::from_str(text(data)?)?)
    }

    fn export(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(toml::to_string(value)?.into_bytes())
    }
}

pub fn formatter_for(format: Format) -> Box<dyn Formatter> {
    match format {
        Format::Yml => Box::new(YamlFormatter),
        Format::Json => Box::new(JsonFormatter),
        Format::Toml => Box::new(TomlFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "provider": "aws",
            "region": "eu-central-1",
            "stages": { "production": { "app": { "type": "instance", "storage": 30 } } }
        })
    }

    #[test]
    fn test_toml_document() {
        let parsed = TomlFormatter
            .parse(
                br#"
provider = "aws"
region = "eu-central-1"

[stages.production.app]
type = "instance"
storage = 30
"#,
            )
            .unwrap();
        assert_eq!(parsed, document());
    }

    #[test]
    fn test_json_export_is_pretty() {
        let exported = String::from_utf8(JsonFormatter.export(&document()).unwrap()).unwrap();
        assert!(exported.starts_with("{\n  \"provider\": \"aws\""));
        assert!(exported.ends_with("}\n"));
    }

    #[test]
    fn test_yaml_keeps_key_order() {
        let parsed = YamlFormatter
            .parse(b"stages:\n  production:\n    db: {type: mysql}\n    app: {type: instance}\n")
            .unwrap();
        let names: Vec<&String> = parsed["stages"]["production"].as_object().unwrap().keys().collect();
        assert_eq!(names, vec!["db", "app"]);
    }

    #[test]
    fn test_parse_errors_surface() {
        assert!(matches!(
            JsonFormatter.parse(b"{ not json").unwrap_err(),
            StackmateError::JsonError(_)
        ));
        assert!(matches!(
            YamlFormatter.parse(b"a: [unclosed").unwrap_err(),
            StackmateError::YamlError(_)
        ));
        assert!(TomlFormatter.parse(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_toml_rejects_null() {
        assert!(TomlFormatter.export(&json!({ "key": null })).is_err());
    }
}
