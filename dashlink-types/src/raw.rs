//! Raw remote records.
//!
//! The remote store hands us loosely-typed JSON: fields may be absent,
//! null, misspelled by an older client, or carry the wrong JSON type
//! (numbers as strings are common). `RawRecord` wraps the payload with
//! total accessors: they never panic, never return NaN, and treat any
//! unusable value as absent.

use serde_json::Value;

/// A raw, unvalidated record as received from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord(Value);

impl RawRecord {
    /// Wraps a raw JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns a null record (remote subtree missing or deleted).
    #[must_use]
    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Whether the record carries no data at all.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Borrows the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the record, returning the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Looks up a field by the first matching name in `names`.
    ///
    /// Alternate spellings exist because older client builds wrote
    /// different field names for the same data; the first present (even
    /// if null) wins.
    #[must_use]
    pub fn field(&self, names: &[&str]) -> Option<&Value> {
        let obj = self.0.as_object()?;
        names.iter().find_map(|name| obj.get(*name))
    }

    /// Extracts a string field, trying each spelling in order.
    #[must_use]
    pub fn str_field(&self, names: &[&str]) -> Option<&str> {
        self.field(names).and_then(Value::as_str)
    }

    /// Extracts a finite numeric field, trying each spelling in order.
    ///
    /// Accepts JSON numbers and numeric strings ("42", "1.5"). Anything
    /// non-finite (or unparseable) is treated as absent, so downstream
    /// defaults apply instead of NaN propagating into an entity.
    #[must_use]
    pub fn num_field(&self, names: &[&str]) -> Option<f64> {
        let value = self.field(names)?;
        let n = match value {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Extracts a non-negative integer field (counters, rewards, amounts).
    /// Negative or fractional inputs round toward zero and clamp at 0.
    #[must_use]
    pub fn u64_field(&self, names: &[&str]) -> Option<u64> {
        let n = self.num_field(names)?;
        Some(if n <= 0.0 { 0 } else { n.trunc() as u64 })
    }

    /// Extracts a boolean field. Accepts real booleans plus the string
    /// forms "true"/"false" and numeric 0/1 written by older builds.
    #[must_use]
    pub fn bool_field(&self, names: &[&str]) -> Option<bool> {
        match self.field(names)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        }
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Default for RawRecord {
    fn default() -> Self {
        Self::null()
    }
}
