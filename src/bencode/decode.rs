//! Bencode decoder
//!
//! A cursor over a byte slice that decodes one value at a time.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use tracing::trace;

use super::error::BencodeError;
use super::value::Value;

/// Maximum nesting depth of lists and dictionaries.
pub const MAX_DEPTH: usize = 64;

/// Cursor-based decoder.
///
/// After a successful [`Decoder::decode_next`] the cursor sits on the first
/// byte after the decoded value. On failure the cursor is left where it was
/// before the call.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Decode the value starting at the cursor.
    pub fn decode_next(&mut self) -> Result<Value, BencodeError> {
        let start = self.pos;
        let result = self.value(0);
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof(self.pos))
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep(MAX_DEPTH));
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            byte => Err(BencodeError::UnexpectedByte {
                byte,
                position: self.pos,
            }),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        let position = self.pos;
        self.pos += 1;

        let start = self.pos;
        let end = self.data[start..]
            .iter()
            .position(|&b| b == b'e')
            .map(|i| start + i)
            .ok_or(BencodeError::UnexpectedEof(self.data.len()))?;

        let digits = &self.data[start..end];
        let invalid = |reason: &str| BencodeError::InvalidInteger {
            position,
            reason: reason.to_string(),
        };

        let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
        if unsigned.is_empty() {
            return Err(invalid("no digits"));
        }
        if !unsigned.iter().all(u8::is_ascii_digit) {
            return Err(invalid("non-digit character"));
        }
        if unsigned[0] == b'0' && (unsigned.len() > 1 || digits.len() != unsigned.len()) {
            return Err(invalid("leading zero"));
        }

        let value = BigInt::parse_bytes(digits, 10).ok_or_else(|| invalid("not a decimal number"))?;

        self.pos = end + 1;
        Ok(Value::Integer(value))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, BencodeError> {
        let position = self.pos;
        let colon = self.data[position..]
            .iter()
            .position(|&b| b == b':')
            .map(|i| position + i)
            .ok_or(BencodeError::UnexpectedEof(self.data.len()))?;

        let digits = &self.data[position..colon];
        if digits.is_empty()
            || !digits.iter().all(u8::is_ascii_digit)
            || (digits.len() > 1 && digits[0] == b'0')
        {
            return Err(BencodeError::InvalidStringLength(position));
        }

        let len: usize = String::from_utf8_lossy(digits)
            .parse()
            .map_err(|_| BencodeError::InvalidStringLength(position))?;

        let start = colon + 1;
        if len > self.data.len() - start {
            return Err(BencodeError::UnexpectedEof(self.data.len()));
        }

        self.pos = start + len;
        Ok(self.data[start..self.pos].to_vec())
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }

        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut map = BTreeMap::new();

        while self.peek()? != b'e' {
            let key = self.key()?;
            let value = self.value(depth + 1)?;
            // Duplicate keys: last write wins.
            map.insert(key, value);
        }

        self.pos += 1;
        Ok(Value::Dict(map))
    }

    fn key(&mut self) -> Result<Vec<u8>, BencodeError> {
        match self.peek()? {
            b'0'..=b'9' => self.bytes(),
            _ => Err(BencodeError::NonStringKey(self.pos)),
        }
    }
}

/// Decode exactly one value; any bytes after it are an error.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    trace!("Decoding {} bytes of bencode", data.len());
    let mut decoder = Decoder::new(data);
    let value = decoder.decode_next()?;

    if decoder.remaining() != 0 {
        return Err(BencodeError::TrailingData(decoder.position()));
    }

    Ok(value)
}

/// Return the raw encoded bytes of `key`'s value in the top-level dictionary.
///
/// The returned slice is exactly what appears in `data`, which is what the
/// info-hash must be computed over. Returns `Ok(None)` when the key is
/// absent or the top-level value is not a dictionary.
pub fn find_raw_value<'a>(data: &'a [u8], key: &[u8]) -> Result<Option<&'a [u8]>, BencodeError> {
    let mut decoder = Decoder::new(data);
    if decoder.peek()? != b'd' {
        decoder.decode_next()?;
        return Ok(None);
    }
    decoder.pos += 1;

    let mut found = None;
    while decoder.peek()? != b'e' {
        let k = decoder.key()?;
        let start = decoder.pos;
        decoder.value(1)?;
        if k == key {
            found = Some(&data[start..decoder.pos]);
        }
    }

    Ok(found)
}
