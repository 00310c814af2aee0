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

use std::{fs::File, io::BufReader, path::Path};

use alloy_primitives::{hex, Address, Bytes, ChainId, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sigcheck_core::{ChainContext, TransactionFields, TransactionKind};
use thiserror::Error as ThisError;

pub const DEFAULT_NONCE: u64 = 0;
pub const DEFAULT_GAS_PRICE: u64 = 0x6d6e2edc00;
pub const DEFAULT_GAS_LIMIT: u64 = 0x2dc6c0;

const BUILTIN_VECTORS: &str = include_str!("../data/eth_legacy.json");

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum VectorError {
    #[error("field `{field}` is not valid hex: {value}")]
    InvalidHex { field: &'static str, value: String },
    #[error("`to` must be 20 bytes, got {0}")]
    InvalidAddress(usize),
    #[error("`value` does not fit 256 bits")]
    ValueOverflow,
}

/// The variable part of a vector, as hex strings without `0x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// One conformance case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestVector {
    pub name: String,
    pub op: Operation,
    #[serde(default)]
    pub chain_id: Option<ChainId>,
}

impl TestVector {
    /// Builds the transaction fields, filling in the fixed nonce, gas price and gas limit.
    ///
    /// Every call returns a fresh value.
    pub fn fields(&self) -> Result<TransactionFields, VectorError> {
        let to = match &self.op.to {
            None => TransactionKind::Create,
            Some(to) => {
                let bytes = decode_hex("to", to)?;
                if bytes.len() != 20 {
                    return Err(VectorError::InvalidAddress(bytes.len()));
                }
                TransactionKind::Call(Address::from_slice(&bytes))
            }
        };
        let value = decode_hex("value", &self.op.value)?;
        if value.len() > 32 {
            return Err(VectorError::ValueOverflow);
        }
        let data = match &self.op.data {
            None => Bytes::new(),
            Some(data) => decode_hex("data", data)?.into(),
        };

        Ok(TransactionFields {
            nonce: DEFAULT_NONCE,
            gas_price: U256::from(DEFAULT_GAS_PRICE),
            gas_limit: U256::from(DEFAULT_GAS_LIMIT),
            to,
            value: U256::from_be_slice(&value),
            data,
        })
    }

    pub fn chain(&self) -> ChainContext {
        ChainContext::from(self.chain_id)
    }
}

/// Hex without `0x`; an odd number of digits gets a leading `0`.
fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, VectorError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}"))
    } else {
        hex::decode(digits)
    };
    decoded.map_err(|_| VectorError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

/// The legacy cases the harness ships with.
pub fn builtin_vectors() -> anyhow::Result<Vec<TestVector>> {
    serde_json::from_str(BUILTIN_VECTORS).context("failed to parse built-in vectors")
}

/// Reads a JSON array of vectors from `path`.
pub fn load_vectors(path: impl AsRef<Path>) -> anyhow::Result<Vec<TestVector>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse vectors in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use rstest::rstest;
    use sigcheck_core::{build_unsigned_message, rlp};

    use super::*;

    fn find(name: &str) -> TestVector {
        builtin_vectors()
            .unwrap()
            .into_iter()
            .find(|vector| vector.name == name)
            .unwrap()
    }

    #[test]
    fn builtin_table() {
        let vectors = builtin_vectors().unwrap();
        assert_eq!(vectors.len(), 10);
        for vector in &vectors {
            vector.fields().unwrap();
        }
        let legacy: Vec<_> = vectors
            .iter()
            .filter(|vector| vector.chain_id.is_none())
            .map(|vector| vector.name.as_str())
            .collect();
        assert_eq!(legacy, ["basic_transfer_pre_eip155", "contract_deploy_pre_eip155"]);
        assert_eq!(find("basic_transfer_no_eip155").chain_id, Some(14));
        assert_eq!(find("contract_deploy_no_eip155").chain_id, Some(14));
    }

    #[test]
    fn basic_transfer_message() {
        let vector = find("basic_transfer");
        let message = build_unsigned_message(&vector.fields().unwrap(), vector.chain());
        assert_eq!(
            message.as_bytes(),
            hex!("e980856d6e2edc00832dc6c094df073477da421520cf03af261b782282c304ad6684abcdef00800e8080")
        );
    }

    #[rstest]
    #[case("basic_transfer_no_eip155", 9)]
    #[case("contract_deploy_no_eip155", 9)]
    #[case("basic_transfer_pre_eip155", 6)]
    #[case("contract_deploy_pre_eip155", 6)]
    fn payload_shape(#[case] name: &str, #[case] items: usize) {
        let vector = find(name);
        let message = build_unsigned_message(&vector.fields().unwrap(), vector.chain());
        assert_eq!(rlp::decode(message.as_bytes()).unwrap().len(), items);
    }

    #[test]
    fn odd_length_value() {
        let vector = find("contract_deploy_no_eip155");
        let fields = vector.fields().unwrap();
        assert_eq!(fields.value, U256::from(1));
        assert_eq!(fields.to, TransactionKind::Create);
        assert_eq!(fields.data.len(), 68);
    }

    #[test]
    fn mixed_case_address() {
        let fields = find("erc20_transfer").fields().unwrap();
        assert_eq!(
            fields.to,
            TransactionKind::Call(Address::from(hex!("1d80c49bbbcd1c0911346656b529df9e5c2f783d")))
        );
    }

    #[test]
    fn fresh_values() {
        let vector = find("legacy_contract_call");
        let mut first = vector.fields().unwrap();
        first.nonce = 7;
        assert_eq!(vector.fields().unwrap().nonce, DEFAULT_NONCE);
    }

    #[test]
    fn invalid_vectors() {
        let vector = TestVector {
            name: "bad".into(),
            op: Operation {
                to: Some("abcd".into()),
                value: "00".into(),
                data: None,
            },
            chain_id: None,
        };
        assert_eq!(vector.fields(), Err(VectorError::InvalidAddress(2)));

        let vector = TestVector {
            op: Operation {
                to: None,
                value: "zz".into(),
                data: None,
            },
            ..vector
        };
        assert!(matches!(
            vector.fields(),
            Err(VectorError::InvalidHex { field: "value", .. })
        ));

        assert!(serde_json::from_str::<TestVector>(
            r#"{"name":"x","op":{"value":"01","gas":"01"},"chainId":14}"#
        )
        .is_err());
    }
}
