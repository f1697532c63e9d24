//! Bencode value model

use std::collections::BTreeMap;

use num_bigint::BigInt;

/// A decoded bencode value.
///
/// Byte strings are raw bytes and need not be valid UTF-8 (piece hashes,
/// compact peer lists). Integers have no width limit; consumers narrow them
/// with [`Value::as_i64`] or [`Value::as_u64`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(BigInt),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    /// Build a byte string value from text
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Bytes(s.as_ref().as_bytes().to_vec())
    }

    /// Build an integer value
    pub fn integer(i: impl Into<BigInt>) -> Self {
        Value::Integer(i.into())
    }

    /// Build a dictionary from `(key, value)` pairs
    pub fn dict<K: AsRef<[u8]>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_vec(), v))
                .collect(),
        )
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Integer narrowed to `i64`; `None` for other variants or when it does not fit
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|i| i64::try_from(i).ok())
    }

    /// Integer narrowed to `u64`; `None` for other variants, negatives, or when it does not fit
    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Byte string as UTF-8 text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Look up a key when this value is a dictionary
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Bytes(_) => "byte string",
            Value::List(_) => "list",
            Value::Dict(_) => "dictionary",
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i.into())
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}
