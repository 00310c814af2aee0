// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Recursive Length Prefix encoding, limited to what a legacy transaction needs: byte
//! strings, unsigned integers and (nested) lists of those.

use alloy_primitives::{Bytes, U256};
use alloy_rlp::{BufMut, Encodable, Header};
use thiserror::Error as ThisError;

/// Errors raised while decoding an RLP stream.
///
/// Every variant is a flavour of malformed encoding; decoding never returns a partial
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum RlpError {
    /// A length prefix overruns the input, a length-of-length is malformed, or a prefix
    /// is not in canonical form.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(#[from] alloy_rlp::Error),
    /// Bytes remain after the top-level item.
    #[error("malformed encoding: {0} trailing bytes")]
    TrailingBytes(usize),
    /// The top-level item is a string where a list is required.
    #[error("malformed encoding: expected a list")]
    ExpectedList,
    /// An integer field carries a leading zero byte.
    #[error("malformed encoding: integer with leading zero")]
    LeadingZero,
    /// An integer field does not fit the target type.
    #[error("malformed encoding: integer overflow")]
    Overflow,
}

/// A single RLP item: either a byte string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Bytes),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// The empty byte string, encoded as `0x80`.
    pub const fn empty() -> Self {
        RlpItem::Bytes(Bytes::new())
    }

    /// An unsigned integer in its minimal big-endian form.
    pub fn uint(value: U256) -> Self {
        RlpItem::Bytes(minimal_be_bytes(value))
    }

    /// Same as [RlpItem::uint] for a `u64`.
    pub fn u64(value: u64) -> Self {
        RlpItem::Bytes(minimal_be_bytes_u64(value))
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        RlpItem::Bytes(value.into())
    }

    /// Returns the payload if this item is a byte string.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RlpItem::Bytes(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    /// Returns the children if this item is a list.
    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::Bytes(_) => None,
            RlpItem::List(items) => Some(items),
        }
    }
}

fn list_payload_length(items: &[RlpItem]) -> usize {
    items.iter().map(Encodable::length).sum()
}

impl Encodable for RlpItem {
    #[inline]
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            RlpItem::Bytes(bytes) => Encodable::encode(&bytes[..], out),
            RlpItem::List(items) => {
                Header {
                    list: true,
                    payload_length: list_payload_length(items),
                }
                .encode(out);
                items.iter().for_each(|item| item.encode(out));
            }
        }
    }

    #[inline]
    fn length(&self) -> usize {
        match self {
            RlpItem::Bytes(bytes) => Encodable::length(&bytes[..]),
            RlpItem::List(items) => {
                let payload_length = list_payload_length(items);
                payload_length + alloy_rlp::length_of_length(payload_length)
            }
        }
    }
}

/// Converts an unsigned integer into its minimal big-endian byte string.
///
/// Leading zero bytes are stripped and zero becomes the empty string. The builder and
/// the codec both go through this function so they cannot disagree on integer shape.
pub fn minimal_be_bytes(value: U256) -> Bytes {
    let bytes = value.to_be_bytes::<32>();
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len());
    Bytes::copy_from_slice(&bytes[start..])
}

/// Same as [minimal_be_bytes] for a `u64`.
pub fn minimal_be_bytes_u64(value: u64) -> Bytes {
    minimal_be_bytes(U256::from(value))
}

/// Strips leading zero bytes from an arbitrary big-endian byte string.
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Encodes a single item.
pub fn encode(item: &RlpItem) -> Vec<u8> {
    let mut out = Vec::with_capacity(item.length());
    item.encode(&mut out);
    out
}

/// Encodes `items` as one list.
pub fn encode_list(items: &[RlpItem]) -> Vec<u8> {
    let payload_length = list_payload_length(items);
    let mut out = Vec::with_capacity(payload_length + alloy_rlp::length_of_length(payload_length));
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    items.iter().for_each(|item| item.encode(&mut out));
    out
}

/// Lists nested deeper than this are rejected as malformed.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Decodes a stream that must consist of exactly one list and returns its children.
///
/// Nested lists are decoded recursively into [RlpItem::List], up to
/// [MAX_NESTING_DEPTH] levels including the outer list.
pub fn decode(bytes: &[u8]) -> Result<Vec<RlpItem>, RlpError> {
    let mut buf = bytes;
    let item = decode_item(&mut buf)?;
    if !buf.is_empty() {
        return Err(RlpError::TrailingBytes(buf.len()));
    }
    match item {
        RlpItem::List(items) => Ok(items),
        RlpItem::Bytes(_) => Err(RlpError::ExpectedList),
    }
}

/// Decodes the next item from `buf` and advances past it.
pub fn decode_item(buf: &mut &[u8]) -> Result<RlpItem, RlpError> {
    decode_nested(buf, 0)
}

fn decode_nested(buf: &mut &[u8], depth: usize) -> Result<RlpItem, RlpError> {
    let header = Header::decode(buf)?;
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    let (mut payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;

    if !header.list {
        return Ok(RlpItem::Bytes(Bytes::copy_from_slice(payload)));
    }
    if depth >= MAX_NESTING_DEPTH {
        return Err(alloy_rlp::Error::Custom("lists nested too deeply").into());
    }
    let mut items = Vec::new();
    while !payload.is_empty() {
        items.push(decode_nested(&mut payload, depth + 1)?);
    }
    Ok(RlpItem::List(items))
}

/// Interprets a decoded byte string as a canonical unsigned integer.
pub fn decode_uint(bytes: &[u8]) -> Result<U256, RlpError> {
    if bytes.first() == Some(&0) {
        return Err(RlpError::LeadingZero);
    }
    if bytes.len() > 32 {
        return Err(RlpError::Overflow);
    }
    Ok(U256::from_be_slice(bytes))
}

/// Same as [decode_uint] for values that must fit a `u64`.
pub fn decode_u64(bytes: &[u8]) -> Result<u64, RlpError> {
    let value = decode_uint(bytes)?;
    u64::try_from(value).map_err(|_| RlpError::Overflow)
}
