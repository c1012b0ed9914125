//! Document schemas: typed fields, per-field validation, and mapping
//! derivation.
//!
//! A [`Schema`] is an ordered set of named [`FieldSpec`]s. Validation is a
//! direct function of the serialized document — every persistence
//! operation runs it in full before anything reaches the store, and
//! values are normalized in place (most notably temporal fields, which
//! are canonicalized to ISO-8601 text).

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Store-side field types understood by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Full-text searchable field.
    Text,
    /// Exact match keyword field.
    Keyword,
    /// 32-bit integer.
    Integer,
    /// Single precision float.
    Float,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// IP address.
    Ip,
    /// Software version field.
    Version,
}

impl FieldType {
    /// Wire name of the field type.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Ip => "ip",
            FieldType::Version => "version",
        }
    }
}

/// Extra validator attached to a single field.
///
/// Runs after the built-in type validation and returns the normalized
/// value, or a message describing the rejection.
pub type FieldValidator = fn(&Value) -> std::result::Result<Value, String>;

/// A single field declaration: store type, wire attributes, and
/// validation rules.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    kind: FieldType,
    required: bool,
    attrs: Map<String, Value>,
    extra: Option<FieldValidator>,
}

impl FieldSpec {
    fn new(kind: FieldType) -> Self {
        Self {
            kind,
            required: true,
            attrs: Map::new(),
            extra: None,
        }
    }

    /// Create a new text field.
    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    /// Create a new keyword field.
    pub fn keyword() -> Self {
        Self::new(FieldType::Keyword)
    }

    /// Create a new integer field.
    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    /// Create a new float field.
    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    /// Create a new boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    /// Create a new date field.
    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    /// Create a new IP address field.
    pub fn ip() -> Self {
        Self::new(FieldType::Ip)
    }

    /// Create a new version field.
    pub fn version() -> Self {
        Self::new(FieldType::Version)
    }

    /// Allow the field to be absent or null.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the `ignore_above` mapping attribute (keyword fields).
    pub fn ignore_above(self, limit: u32) -> Self {
        self.attr("ignore_above", Value::from(limit))
    }

    /// Set the `format` mapping attribute (date fields).
    pub fn format(self, format: impl Into<String>) -> Self {
        self.attr("format", Value::String(format.into()))
    }

    /// Set an arbitrary mapping attribute.
    pub fn attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Attach an extra validator, run after the built-in one.
    pub fn with_validator(mut self, validator: FieldValidator) -> Self {
        self.extra = Some(validator);
        self
    }

    /// The declared store type.
    pub fn field_type(&self) -> FieldType {
        self.kind
    }

    /// Mapping entry for this field: `{"type": ..., attrs...}`.
    pub fn mapping(&self) -> Value {
        let mut entry = Map::new();
        entry.insert(
            "type".to_string(),
            Value::String(self.kind.as_str().to_string()),
        );
        for (name, value) in &self.attrs {
            entry.insert(name.clone(), value.clone());
        }
        Value::Object(entry)
    }

    /// Validate one value against this field, returning the normalized
    /// value to store.
    pub fn validate(&self, name: &str, value: &Value) -> Result<Value> {
        if value.is_null() {
            if self.required {
                return Err(Error::validation(name, "required field is missing"));
            }
            return Ok(Value::Null);
        }

        let normalized = match self.kind {
            FieldType::Text => value.clone(),
            FieldType::Keyword => validate_keyword(name, value)?,
            FieldType::Integer => validate_integer(name, value)?,
            FieldType::Float => validate_float(name, value)?,
            FieldType::Boolean => validate_boolean(name, value)?,
            FieldType::Date => validate_date(name, value)?,
            FieldType::Ip => validate_ip(name, value)?,
            FieldType::Version => validate_version(name, value)?,
        };

        match self.extra {
            Some(validator) => validator(&normalized).map_err(|m| Error::validation(name, m)),
            None => Ok(normalized),
        }
    }
}

fn validate_keyword(name: &str, value: &Value) -> Result<Value> {
    match value.as_str() {
        Some(s) if !s.is_empty() => Ok(value.clone()),
        _ => Err(Error::validation(
            name,
            "keyword field must be a non-empty string",
        )),
    }
}

fn validate_integer(name: &str, value: &Value) -> Result<Value> {
    if value.is_i64() || value.is_u64() {
        return Ok(value.clone());
    }
    if let Some(f) = value.as_f64() {
        if f.fract() == 0.0 {
            return Ok(Value::from(f as i64));
        }
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Value::from(n));
        }
    }
    Err(Error::validation(
        name,
        format!("invalid integer value {value}"),
    ))
}

fn validate_float(name: &str, value: &Value) -> Result<Value> {
    if let Some(f) = value.as_f64() {
        return Ok(Value::from(f));
    }
    if let Some(s) = value.as_str() {
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Ok(Value::from(f));
            }
        }
    }
    Err(Error::validation(
        name,
        format!("invalid float value {value}"),
    ))
}

fn validate_boolean(name: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) if s == "true" => Ok(Value::Bool(true)),
        Value::String(s) if s == "false" => Ok(Value::Bool(false)),
        _ => Err(Error::validation(
            name,
            format!("invalid boolean value {value}"),
        )),
    }
}

/// Canonicalize a temporal value to ISO-8601 text in UTC. Accepts RFC
/// 3339 strings, naive date/datetime strings, and integer epoch
/// milliseconds.
fn validate_date(name: &str, value: &Value) -> Result<Value> {
    if let Some(s) = value.as_str() {
        if let Some(parsed) = parse_datetime(s) {
            return Ok(Value::String(canonical(parsed)));
        }
        return Err(Error::validation(
            name,
            format!("could not parse date from the value '{s}'"),
        ));
    }
    if let Some(millis) = value.as_i64() {
        if let Some(parsed) = Utc.timestamp_millis_opt(millis).single() {
            return Ok(Value::String(canonical(parsed)));
        }
    }
    Err(Error::validation(
        name,
        format!("could not parse date from value {value}"),
    ))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

fn canonical(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn validate_ip(name: &str, value: &Value) -> Result<Value> {
    match value.as_str() {
        Some(s) if s.parse::<IpAddr>().is_ok() => Ok(value.clone()),
        _ => Err(Error::validation(
            name,
            format!("invalid IP address value {value}"),
        )),
    }
}

fn validate_version(name: &str, value: &Value) -> Result<Value> {
    if value.is_string() {
        Ok(value.clone())
    } else {
        Err(Error::validation(name, "version field must be a string"))
    }
}

/// An ordered, closed set of field declarations.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
    duplicates: Vec<String>,
}

impl Schema {
    /// Start declaring a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// True when no field is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Look up one field declaration.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub(crate) fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Mapping `properties` object derived from the declared fields.
    pub fn properties(&self) -> Value {
        let mut properties = Map::new();
        for (name, spec) in &self.fields {
            properties.insert(name.clone(), spec.mapping());
        }
        Value::Object(properties)
    }

    /// Validate a serialized document against the schema, normalizing
    /// values in place.
    ///
    /// The schema is closed: a key not declared here is rejected. Every
    /// declared field is checked, so a document is either fully valid or
    /// not sent at all.
    pub fn validate_document(&self, doc: &mut Map<String, Value>) -> Result<()> {
        for key in doc.keys() {
            if !self.fields.contains_key(key) {
                return Err(Error::validation(key, "field is not declared in the schema"));
            }
        }
        for (name, spec) in &self.fields {
            let value = doc.get(name).cloned().unwrap_or(Value::Null);
            let normalized = spec.validate(name, &value)?;
            doc.insert(name.clone(), normalized);
        }
        Ok(())
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: BTreeMap<String, FieldSpec>,
    duplicates: Vec<String>,
}

impl SchemaBuilder {
    /// Declare one field. Re-declaring a name is recorded and reported by
    /// the definition check.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        if self.fields.insert(name.clone(), spec).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Finish the declaration.
    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
            duplicates: self.duplicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shirt_schema() -> Schema {
        Schema::builder()
            .field("brand", FieldSpec::keyword())
            .field("color", FieldSpec::keyword())
            .build()
    }

    #[test]
    fn keyword_rejects_empty_string() {
        let spec = FieldSpec::keyword();
        assert!(spec.validate("brand", &json!("gucci")).is_ok());
        let err = spec.validate("brand", &json!("")).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "brand"));
    }

    #[test]
    fn integer_coerces_strings_and_whole_floats() {
        let spec = FieldSpec::integer();
        assert_eq!(spec.validate("n", &json!(7)).unwrap(), json!(7));
        assert_eq!(spec.validate("n", &json!("42")).unwrap(), json!(42));
        assert_eq!(spec.validate("n", &json!(3.0)).unwrap(), json!(3));
        assert!(spec.validate("n", &json!("seven")).is_err());
    }

    #[test]
    fn boolean_accepts_bool_and_bool_strings() {
        let spec = FieldSpec::boolean();
        assert_eq!(spec.validate("b", &json!(true)).unwrap(), json!(true));
        assert_eq!(spec.validate("b", &json!("false")).unwrap(), json!(false));
        assert!(spec.validate("b", &json!(1)).is_err());
    }

    #[test]
    fn date_normalizes_epoch_millis_to_iso() {
        let spec = FieldSpec::date();
        let normalized = spec.validate("ts", &json!(1_672_531_200_000_i64)).unwrap();
        assert_eq!(normalized, json!("2023-01-01T00:00:00.000000Z"));
    }

    #[test]
    fn date_normalizes_strings_to_utc() {
        let spec = FieldSpec::date();
        let normalized = spec.validate("ts", &json!("2023-01-01T02:00:00+02:00")).unwrap();
        assert_eq!(normalized, json!("2023-01-01T00:00:00.000000Z"));
        let normalized = spec.validate("ts", &json!("2023-01-01")).unwrap();
        assert_eq!(normalized, json!("2023-01-01T00:00:00.000000Z"));
        assert!(spec.validate("ts", &json!("not a date")).is_err());
    }

    #[test]
    fn ip_requires_parseable_address() {
        let spec = FieldSpec::ip();
        assert!(spec.validate("addr", &json!("10.71.15.111")).is_ok());
        assert!(spec.validate("addr", &json!("::1")).is_ok());
        assert!(spec.validate("addr", &json!("10.71.15")).is_err());
    }

    #[test]
    fn required_field_rejects_null() {
        let spec = FieldSpec::keyword();
        assert!(spec.validate("brand", &Value::Null).is_err());
        assert_eq!(
            FieldSpec::keyword().optional().validate("brand", &Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn schema_is_closed() {
        let schema = shirt_schema();
        let mut doc = Map::new();
        doc.insert("brand".to_string(), json!("gucci"));
        doc.insert("color".to_string(), json!("red"));
        doc.insert("size".to_string(), json!("xl"));
        let err = schema.validate_document(&mut doc).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "size"));
    }

    #[test]
    fn schema_rejects_missing_mandatory_field() {
        let schema = shirt_schema();
        let mut doc = Map::new();
        doc.insert("brand".to_string(), json!("gucci"));
        let err = schema.validate_document(&mut doc).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "color"));
    }

    #[test]
    fn builder_records_duplicate_declarations() {
        let schema = Schema::builder()
            .field("brand", FieldSpec::keyword())
            .field("brand", FieldSpec::text())
            .build();
        assert_eq!(schema.duplicates(), ["brand".to_string()]);
    }

    #[test]
    fn mapping_carries_wire_attributes() {
        let spec = FieldSpec::keyword().ignore_above(256);
        assert_eq!(spec.mapping(), json!({ "type": "keyword", "ignore_above": 256 }));
        let spec = FieldSpec::date().format("strict_date_optional_time_nanos||epoch_millis");
        assert_eq!(
            spec.mapping(),
            json!({ "type": "date", "format": "strict_date_optional_time_nanos||epoch_millis" })
        );
    }

    #[test]
    fn properties_lists_every_field() {
        let properties = shirt_schema().properties();
        assert_eq!(
            properties,
            json!({ "brand": { "type": "keyword" }, "color": { "type": "keyword" } })
        );
    }
}
