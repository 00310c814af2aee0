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

use alloy_primitives::{hex, Bytes, ChainId};
use k256::ecdsa::Signature as K256Signature;
use serde::{Deserialize, Serialize};

use crate::{rlp::trim_leading_zeros, VerifyError};

/// A `(v, r, s)` triple as returned by the signer.
///
/// `r` and `s` are kept exactly as received: big-endian, at most 32 bytes, not
/// necessarily padded. They are only padded when handed to the curve arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub v: u64,
    pub r: Bytes,
    pub s: Bytes,
}

impl TxSignature {
    /// Parses the hex strings a signing device answers with.
    ///
    /// Strings may carry a `0x` prefix and may have odd length, in which case a single
    /// `0` nibble is prepended.
    pub fn from_hex_parts(v: &str, r: &str, s: &str) -> Result<Self, VerifyError> {
        let v_bytes = decode_hex_padded(v)?;
        let v_bytes = trim_leading_zeros(&v_bytes);
        if v_bytes.len() > 8 {
            return Err(VerifyError::InvalidSignatureEncoding("v does not fit 64 bits"));
        }
        let v = v_bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);

        Ok(Self {
            v,
            r: decode_hex_padded(r)?.into(),
            s: decode_hex_padded(s)?.into(),
        })
    }

    /// Returns the chain ID encoded in `v`, if any.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self.v {
            // EIP-155 encodes the chain_id in the V value
            value @ 35..=u64::MAX => Some((value - 35) / 2),
            _ => None,
        }
    }

    /// `r` left-padded to 32 bytes.
    pub fn padded_r(&self) -> Result<[u8; 32], VerifyError> {
        pad_scalar(&self.r, "r longer than 32 bytes")
    }

    /// `s` left-padded to 32 bytes.
    pub fn padded_s(&self) -> Result<[u8; 32], VerifyError> {
        pad_scalar(&self.s, "s longer than 32 bytes")
    }

    /// Builds the curve-level signature.
    ///
    /// Fails with [VerifyError::InvalidSignatureEncoding] if `r` or `s` does not fit
    /// 32 bytes. A well-sized but unusable scalar (zero, or not below the group order)
    /// yields `Ok(None)`.
    pub(crate) fn to_k256(&self) -> Result<Option<K256Signature>, VerifyError> {
        let r = self.padded_r()?;
        let s = self.padded_s()?;
        Ok(K256Signature::from_scalars(r, s).ok())
    }
}

fn pad_scalar(bytes: &[u8], reason: &'static str) -> Result<[u8; 32], VerifyError> {
    // redundant leading zeros are tolerated as long as the value fits
    let bytes = trim_leading_zeros(bytes);
    if bytes.len() > 32 {
        return Err(VerifyError::InvalidSignatureEncoding(reason));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

fn decode_hex_padded(value: &str) -> Result<Vec<u8>, VerifyError> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    let decoded = if value.len() % 2 == 1 {
        hex::decode(format!("0{value}"))
    } else {
        hex::decode(value)
    };
    decoded.map_err(|_| VerifyError::InvalidSignatureEncoding("invalid hex"))
}

/// Which `s` values a verifier accepts.
///
/// For every valid `(r, s)` the pair `(r, n - s)` is valid as well. Since EIP-2 the
/// protocol only admits the low half; raw ECDSA admits both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SPolicy {
    /// Only `s <= n / 2` is accepted.
    #[default]
    LowOnly,
    /// Both `s` and `n - s` are accepted.
    Either,
}

impl SPolicy {
    /// Applies the policy to `signature`.
    ///
    /// Returns the low-s form together with a flag telling whether `s` was flipped, or
    /// `None` when the policy rejects the signature.
    pub(crate) fn apply(self, signature: K256Signature) -> Option<(K256Signature, bool)> {
        match (signature.normalize_s(), self) {
            (None, _) => Some((signature, false)),
            (Some(_), SPolicy::LowOnly) => None,
            (Some(normalized), SPolicy::Either) => Some((normalized, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn odd_length_hex() {
        let sig = TxSignature::from_hex_parts("1b", "abc", "0x0def").unwrap();
        assert_eq!(sig.v, 27);
        assert_eq!(&sig.r[..], &hex!("0abc"));
        assert_eq!(&sig.s[..], &hex!("0def"));
    }

    #[test]
    fn padding() {
        let sig = TxSignature {
            v: 27,
            r: Bytes::copy_from_slice(&hex!("0102")),
            s: Bytes::from(vec![0x00; 33]),
        };
        let mut expected = [0u8; 32];
        expected[30..].copy_from_slice(&hex!("0102"));
        assert_eq!(sig.padded_r().unwrap(), expected);
        // 33 zero bytes still fit 32 bytes once trimmed
        assert_eq!(sig.padded_s().unwrap(), [0u8; 32]);

        let long = TxSignature {
            v: 27,
            r: Bytes::from(vec![0x01; 33]),
            s: Bytes::new(),
        };
        assert!(matches!(
            long.padded_r(),
            Err(VerifyError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn eip155_chain_id() {
        let sig = |v| TxSignature {
            v,
            ..Default::default()
        };
        assert_eq!(sig(27).chain_id(), None);
        assert_eq!(sig(28).chain_id(), None);
        assert_eq!(sig(63).chain_id(), Some(14));
        assert_eq!(sig(64).chain_id(), Some(14));
        assert_eq!(sig(263).chain_id(), Some(114));
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(TxSignature::from_hex_parts("zz", "00", "00").is_err());
        assert!(TxSignature::from_hex_parts("010203040506070809", "00", "00").is_err());
    }

    #[test]
    fn policy_serde() {
        assert_eq!(
            serde_json::to_string(&SPolicy::LowOnly).unwrap(),
            "\"low-only\""
        );
        assert_eq!(
            serde_json::from_str::<SPolicy>("\"either\"").unwrap(),
            SPolicy::Either
        );
    }
}
