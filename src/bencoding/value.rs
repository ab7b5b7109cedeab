use std::collections::BTreeMap;

use crate::error::ParseError;

#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    String(Vec<u8>),
    Integer(i64),
    List(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
}

impl Value {
    pub fn string(string: &str) -> Self {
        Self::String(string.as_bytes().to_vec())
    }

    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    pub fn dictionary() -> Self {
        Self::Dictionary(BTreeMap::new())
    }

    pub fn with_value(mut self, value: Value) -> Self {
        if let Self::List(values) = &mut self {
            values.push(value);
        }
        self
    }

    pub fn with_entry(mut self, key: &str, value: Value) -> Self {
        if let Self::Dictionary(entries) = &mut self {
            entries.insert(key.to_string(), value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Dictionary(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Removes `key` from a dictionary, failing when the key is absent.
    pub fn remove_entry(&mut self, key: &'static str) -> Result<Value, ParseError> {
        self.try_remove_entry(key)?
            .ok_or(ParseError::MissingKey(key))
    }

    /// Removes `key` from a dictionary if present.
    pub fn try_remove_entry(&mut self, key: &'static str) -> Result<Option<Value>, ParseError> {
        match self {
            Self::Dictionary(entries) => Ok(entries.remove(key)),
            _ => Err(ParseError::NotADictionary),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::List(_) => "list",
            Self::Dictionary(_) => "dictionary",
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(integer) => Ok(integer),
            other => Err(ParseError::UnexpectedType {
                expected: "integer",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<Value> for u64 {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let integer: i64 = value.try_into()?;
        u64::try_from(integer).map_err(|_| ParseError::NegativeInteger(integer))
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(bytes) => Ok(bytes),
            other => Err(ParseError::UnexpectedType {
                expected: "string",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let bytes: Vec<u8> = value.try_into()?;
        String::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8)
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::List(values) => Ok(values),
            other => Err(ParseError::UnexpectedType {
                expected: "list",
                found: other.kind(),
            }),
        }
    }
}
