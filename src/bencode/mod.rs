//! Bencode codec
//!
//! Decoding and canonical encoding of the bencode format used by torrent
//! descriptors and tracker responses.
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e`, any width | `i42e` |
//! | Byte string | `<length>:<bytes>` | `4:spam` |
//! | List | `l<values>e` | `l4:spami42ee` |
//! | Dictionary | `d<key><value>...e` | `d3:cow3:mooe` |
//!
//! Dictionaries are kept in a `BTreeMap`, so encoding always emits keys in
//! byte-lexicographic order.

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, find_raw_value, Decoder, MAX_DEPTH};
pub use encode::{encode, encode_into};
pub use error::BencodeError;
pub use num_bigint::BigInt;
pub use value::Value;

/// Error raised by the decoder on malformed input.
pub type DecodeError = BencodeError;

#[cfg(test)]
mod tests;
