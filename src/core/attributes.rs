//! Attribute parsing and rule-based validation shared by every service kind.
//!
//! A [`Schema`] is an ordered table of `field → {parser, rules, default}`.
//! [`Schema::apply`] runs every parser before any rule, so rules always see
//! coerced values, and reports every offending field at once.

use crate::domain::model::Credentials;
use crate::utils::error::{Result, StackmateError};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Coerces a raw attribute value. `Value::Null` means "absent".
pub type Parser = fn(&Value) -> std::result::Result<Value, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

pub mod parsers {
    use super::*;

    pub fn parse_any(value: &Value) -> std::result::Result<Value, String> {
        Ok(value.clone())
    }

    pub fn parse_string(value: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err("must be a string".to_string()),
        }
    }

    pub fn parse_integer(value: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Value::from)
                .ok_or_else(|| "must be an integer".to_string()),
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{}' is not an integer", s)),
            _ => Err("must be an integer".to_string()),
        }
    }

    pub fn parse_boolean(value: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", s)),
            },
            Value::Number(n) => Ok(Value::Bool(n.as_i64().unwrap_or(0) != 0)),
            _ => Err("must be a boolean".to_string()),
        }
    }

    /// A list of strings with duplicates removed, first occurrence wins.
    pub fn parse_string_list(value: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Array(Vec::new())),
            Value::Array(items) => {
                let mut unique: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    let Value::String(s) = item else {
                        return Err("every entry must be a string".to_string());
                    };
                    let entry = Value::String(s.trim().to_string());
                    if !unique.contains(&entry) {
                        unique.push(entry);
                    }
                }
                Ok(Value::Array(unique))
            }
            _ => Err("must be a list of strings".to_string()),
        }
    }

    pub fn parse_credentials(value: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Object(obj) => {
                let mut credentials = Map::new();
                for key in ["username", "password"] {
                    match obj.get(key) {
                        None | Some(Value::Null) => {}
                        Some(Value::String(s)) => {
                            credentials.insert(key.to_string(), Value::String(s.clone()));
                        }
                        Some(_) => return Err(format!("'{}' must be a string", key)),
                    }
                }
                Ok(Value::Object(credentials))
            }
            _ => Err("must be an object with a username and a password".to_string()),
        }
    }

    /// Expands a leading `~` to the home directory.
    pub fn parse_path(value: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) => {
                let s = s.trim();
                let expanded = match s.strip_prefix('~') {
                    Some(rest) => {
                        let home = std::env::var("HOME").unwrap_or_default();
                        PathBuf::from(home).join(rest.trim_start_matches('/'))
                    }
                    None => PathBuf::from(s),
                };
                Ok(Value::String(expanded.to_string_lossy().into_owned()))
            }
            _ => Err("must be a path".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Rule {
    Presence {
        message: String,
    },
    Inclusion {
        within: Vec<String>,
        message: String,
    },
    Numericality {
        only_integer: bool,
        greater_than: Option<i64>,
        at_most: Option<i64>,
        message: String,
    },
    /// The whole value must match the pattern (case-insensitive), compiled once.
    Format {
        regex: std::result::Result<Regex, regex::Error>,
        message: String,
    },
    Credentials {
        require_username: bool,
        require_password: bool,
    },
    PathExistence {
        require_directory: bool,
    },
}

impl Rule {
    pub fn presence(message: impl Into<String>) -> Self {
        Rule::Presence {
            message: message.into(),
        }
    }

    pub fn inclusion<I, S>(within: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Rule::Inclusion {
            within: within.into_iter().map(|s| s.as_ref().to_string()).collect(),
            message: message.into(),
        }
    }

    pub fn greater_than(bound: i64, message: impl Into<String>) -> Self {
        Rule::Numericality {
            only_integer: true,
            greater_than: Some(bound),
            at_most: None,
            message: message.into(),
        }
    }

    pub fn at_most(bound: i64, message: impl Into<String>) -> Self {
        Rule::Numericality {
            only_integer: true,
            greater_than: None,
            at_most: Some(bound),
            message: message.into(),
        }
    }

    pub fn format(pattern: &str, message: impl Into<String>) -> Self {
        Rule::Format {
            regex: Regex::new(&format!("(?i)^(?:{})$", pattern)),
            message: message.into(),
        }
    }

    /// Returns the failure reason, if any. Only `Presence` inspects absent or blank values.
    pub fn check(&self, value: &Value) -> Option<String> {
        if let Rule::Presence { message } = self {
            return is_blank(value).then(|| message.clone());
        }

        if value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty()) {
            return None;
        }

        match self {
            Rule::Presence { .. } => None,
            Rule::Inclusion { within, message } => {
                let candidate = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (!within.contains(&candidate)).then(|| message.clone())
            }
            Rule::Numericality {
                only_integer,
                greater_than,
                at_most,
                message,
            } => {
                let Some(number) = value.as_f64() else {
                    return Some(message.clone());
                };
                if *only_integer && number.fract() != 0.0 {
                    return Some(message.clone());
                }
                let too_small = greater_than.is_some_and(|bound| number <= bound as f64);
                let too_large = at_most.is_some_and(|bound| number > bound as f64);
                (too_small || too_large).then(|| message.clone())
            }
            Rule::Format { regex, message } => {
                let Some(s) = value.as_str() else {
                    return Some(message.clone());
                };
                match regex {
                    Ok(re) if re.is_match(s) => None,
                    Ok(_) => Some(message.clone()),
                    Err(e) => Some(format!("invalid pattern: {}", e)),
                }
            }
            Rule::Credentials {
                require_username,
                require_password,
            } => check_credentials(value, *require_username, *require_password),
            Rule::PathExistence { require_directory } => {
                let Some(s) = value.as_str() else {
                    return Some("must be a path".to_string());
                };
                let path = Path::new(s);
                if !path.exists() {
                    Some(format!("the path '{}' does not exist", s))
                } else if *require_directory && !path.is_dir() {
                    Some(format!("the path '{}' is not a directory", s))
                } else {
                    None
                }
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

fn check_credentials(value: &Value, require_username: bool, require_password: bool) -> Option<String> {
    let filled = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };

    let mut errored = Vec::new();
    if require_username && !filled("username") {
        errored.push("username");
    }
    if require_password && !filled("password") {
        errored.push("password");
    }

    match errored.len() {
        0 => None,
        1 => Some(format!("The '{}' field is invalid", errored[0])),
        _ => Some(format!("The '{}' fields are invalid", errored.join("' and '"))),
    }
}

#[derive(Clone)]
pub struct Field {
    pub parser: Parser,
    pub rules: Vec<Rule>,
    pub default: Option<Value>,
}

impl Field {
    pub fn new(parser: Parser) -> Self {
        Self {
            parser,
            rules: Vec::new(),
            default: None,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("rules", &self.rules)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<&'static str, Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or redeclares) a field. Redeclaring drops earlier rules and default.
    pub fn field(mut self, name: &'static str, parser: Parser) -> Self {
        self.fields.insert(name, Field::new(parser));
        self
    }

    pub fn rule(mut self, name: &'static str, rule: Rule) -> Self {
        self.fields
            .entry(name)
            .or_insert_with(|| Field::new(parsers::parse_any))
            .rules
            .push(rule);
        self
    }

    pub fn default_value(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.fields
            .entry(name)
            .or_insert_with(|| Field::new(parsers::parse_any))
            .default = Some(value.into());
        self
    }

    /// Unions two schemas; `other` wins on key collision.
    pub fn merge(mut self, other: Schema) -> Self {
        for (name, field) in other.fields {
            self.fields.insert(name, field);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Runs every parser. Fields that fail coercion are left out of the result.
    pub fn parse(&self, raw: &Map<String, Value>) -> (Attributes, Vec<FieldError>) {
        let mut parsed = Map::new();
        let mut errors = Vec::new();

        for (name, field) in &self.fields {
            let value = match raw.get(*name) {
                Some(v) if !v.is_null() => v.clone(),
                _ => field.default.clone().unwrap_or(Value::Null),
            };

            match (field.parser)(&value) {
                Ok(v) => {
                    parsed.insert(name.to_string(), v);
                }
                Err(reason) => errors.push(FieldError::new(*name, reason)),
            }
        }

        for key in raw.keys().filter(|k| !self.fields.contains_key(k.as_str())) {
            tracing::debug!("Ignoring unknown attribute '{}'", key);
        }

        (Attributes(parsed), errors)
    }

    /// Runs every rule over already parsed values, collecting every failure.
    pub fn validate(&self, attributes: &Attributes) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for (name, field) in &self.fields {
            let Some(value) = attributes.get(name) else {
                continue;
            };
            for rule in &field.rules {
                if let Some(reason) = rule.check(value) {
                    errors.push(FieldError::new(*name, reason));
                }
            }
        }

        errors
    }

    /// Parses then validates; any error aborts with the full list of offending fields.
    pub fn apply(&self, service: &str, raw: &Map<String, Value>) -> Result<Attributes> {
        let (attributes, mut errors) = self.parse(raw);
        errors.extend(self.validate(&attributes));

        if errors.is_empty() {
            Ok(attributes)
        } else {
            Err(StackmateError::FieldValidation {
                service: service.to_string(),
                fields: errors,
            })
        }
    }
}

/// Parsed attribute values of a single service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn credentials(&self, key: &str) -> Option<Credentials> {
        let value = self.0.get(key)?;
        Some(Credentials {
            username: value.get("username")?.as_str()?.to_string(),
            password: value.get("password")?.as_str()?.to_string(),
        })
    }

    pub fn require_string(&self, key: &str) -> Result<String> {
        self.str(key)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| self.missing(key))
    }

    pub fn require_integer(&self, key: &str) -> Result<i64> {
        self.integer(key).ok_or_else(|| self.missing(key))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn missing(&self, key: &str) -> StackmateError {
        StackmateError::FieldValidation {
            service: self.str("name").unwrap_or_default().to_string(),
            fields: vec![FieldError::new(key, "required")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parsers::*;
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn sample_schema() -> Schema {
        Schema::new()
            .field("size", parse_string)
            .rule("size", Rule::presence("You have to specify a size"))
            .rule("size", Rule::inclusion(&["small", "large"], "not in allowed set"))
            .field("nodes", parse_integer)
            .rule("nodes", Rule::greater_than(0, "needs at least one node"))
            .default_value("nodes", 1)
            .field("database", parse_string)
            .rule(
                "database",
                Rule::format("[a-z0-9_]*", "only letters, numbers and _"),
            )
    }

    #[test]
    fn test_parsers_coerce_values() {
        assert_eq!(parse_integer(&json!("42")), Ok(json!(42)));
        assert_eq!(parse_integer(&json!(3.0)), Ok(json!(3)));
        assert!(parse_integer(&json!("four")).is_err());
        assert_eq!(parse_string(&json!(8)), Ok(json!("8")));
        assert_eq!(parse_boolean(&json!("yes")), Ok(json!(true)));
        assert_eq!(
            parse_string_list(&json!(["a", "b", "a"])),
            Ok(json!(["a", "b"]))
        );
        assert!(parse_string_list(&json!(["a", 1])).is_err());
        assert_eq!(parse_string_list(&Value::Null), Ok(json!([])));
    }

    #[test]
    fn test_apply_collects_every_failure() {
        let schema = sample_schema();
        let err = schema
            .apply(
                "db",
                &raw(json!({ "size": "", "nodes": 0, "database": "no-dashes" })),
            )
            .unwrap_err();

        match err {
            StackmateError::FieldValidation { service, fields } => {
                assert_eq!(service, "db");
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["size", "nodes", "database"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_sees_parsed_values() {
        let schema = sample_schema();
        let attributes = schema
            .apply("db", &raw(json!({ "size": " small ", "nodes": "3" })))
            .unwrap();

        assert_eq!(attributes.str("size"), Some("small"));
        assert_eq!(attributes.integer("nodes"), Some(3));
    }

    #[test]
    fn test_defaults_fill_absent_values() {
        let attributes = sample_schema()
            .apply("db", &raw(json!({ "size": "large" })))
            .unwrap();
        assert_eq!(attributes.integer("nodes"), Some(1));
    }

    #[test]
    fn test_parse_failure_skips_rules_for_field() {
        let (_, parse_errors) = sample_schema().parse(&raw(json!({ "nodes": "many" })));
        assert_eq!(parse_errors.len(), 1);
        assert_eq!(parse_errors[0].field, "nodes");

        let err = sample_schema()
            .apply("db", &raw(json!({ "size": "small", "nodes": "many" })))
            .unwrap_err();
        let StackmateError::FieldValidation { fields, .. } = err else {
            panic!("expected field validation error");
        };
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_merge_later_definition_wins() {
        let base = Schema::new()
            .field("port", parse_integer)
            .rule("port", Rule::presence("required"));
        let overrides = Schema::new().field("port", parse_string);

        let merged = base.merge(overrides);
        let field = merged.get("port").unwrap();
        assert!(field.rules.is_empty());
        assert_eq!((field.parser)(&json!(80)), Ok(json!("80")));
    }

    #[test]
    fn test_credentials_rule_names_both_fields() {
        let rule = Rule::Credentials {
            require_username: true,
            require_password: true,
        };
        let reason = rule.check(&json!({})).unwrap();
        assert!(reason.contains("username"));
        assert!(reason.contains("password"));
        assert!(rule
            .check(&json!({ "username": "root", "password": "secret" }))
            .is_none());
    }

    #[test]
    fn test_blank_value_only_fails_presence() {
        let err = sample_schema()
            .apply("db", &raw(json!({ "size": "  " })))
            .unwrap_err();
        let StackmateError::FieldValidation { fields, .. } = err else {
            panic!("expected field validation error");
        };
        assert_eq!(fields, vec![FieldError::new("size", "You have to specify a size")]);
    }

    #[test]
    fn test_numericality_upper_bound() {
        let rule = Rule::at_most(65535, "port out of range");
        assert!(rule.check(&json!(65535)).is_none());
        assert_eq!(rule.check(&json!(70000)), Some("port out of range".to_string()));
        assert!(rule.check(&json!(-1)).is_none());
    }

    #[test]
    fn test_invalid_format_pattern_is_reported() {
        let rule = Rule::format("[unclosed", "bad");
        assert!(rule.check(&json!("anything")).unwrap().starts_with("invalid pattern"));
        assert!(rule.check(&Value::Null).is_none());
    }

    #[test]
    fn test_path_existence_rule() {
        let dir = tempfile::tempdir().unwrap();
        let rule = Rule::PathExistence {
            require_directory: true,
        };
        assert!(rule.check(&json!(dir.path().to_str().unwrap())).is_none());
        assert!(rule.check(&json!("/definitely/not/here")).is_some());
    }
}
