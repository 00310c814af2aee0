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

use alloy_primitives::{hex, Address, Bytes, ChainId, TxNumber, B256, U256};
use k256::{
    ecdsa::{RecoveryId, VerifyingKey as K256VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey as K256PublicKey,
};
use serde::{Deserialize, Serialize};

use crate::{
    keccak::{address_from_uncompressed, keccak_b256},
    rlp::{self, decode_u64, decode_uint, RlpError, RlpItem},
    signature::{SPolicy, TxSignature},
    VerifyError,
};

/// Number of items in the body of a legacy transaction.
pub const LEGACY_FIELD_COUNT: usize = 6;
/// Number of items in a signed legacy transaction, and in an EIP-155 signing payload.
pub const SIGNED_FIELD_COUNT: usize = 9;

/// Represents the type of a transaction: either a contract creation or a call to an
/// existing account.
///
/// It avoids using an [Option] because the recipient of a contract creation is encoded
/// as the empty string, not as an absent item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionKind {
    #[default]
    Create,
    Call(Address),
}

impl TransactionKind {
    fn to_rlp_item(self) -> RlpItem {
        match self {
            TransactionKind::Create => RlpItem::empty(),
            TransactionKind::Call(addr) => RlpItem::bytes(Bytes::copy_from_slice(addr.as_slice())),
        }
    }

    fn from_rlp_bytes(bytes: &[u8]) -> Result<Self, RlpError> {
        match bytes.len() {
            0 => Ok(TransactionKind::Create),
            20 => Ok(TransactionKind::Call(Address::from_slice(bytes))),
            _ => Err(alloy_rlp::Error::UnexpectedLength.into()),
        }
    }
}

impl From<Option<Address>> for TransactionKind {
    fn from(value: Option<Address>) -> Self {
        value.map_or(TransactionKind::Create, TransactionKind::Call)
    }
}

impl From<TransactionKind> for Option<Address> {
    fn from(value: TransactionKind) -> Self {
        match value {
            TransactionKind::Create => None,
            TransactionKind::Call(addr) => Some(addr),
        }
    }
}

/// The six fields of a legacy transaction, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionFields {
    /// Number of transactions previously sent by the sender.
    pub nonce: TxNumber,
    /// Price in Wei per unit of gas.
    pub gas_price: U256,
    /// Maximum amount of gas for the execution.
    pub gas_limit: U256,
    /// Recipient, or [TransactionKind::Create] for contract creation.
    pub to: TransactionKind,
    /// Amount in Wei transferred to the recipient.
    pub value: U256,
    /// Call data or init code; empty when absent.
    pub data: Bytes,
}

impl TransactionFields {
    /// Returns the six body items, every integer in minimal form.
    pub fn to_rlp_items(&self) -> Vec<RlpItem> {
        vec![
            RlpItem::u64(self.nonce),
            RlpItem::uint(self.gas_price),
            RlpItem::uint(self.gas_limit),
            self.to.to_rlp_item(),
            RlpItem::uint(self.value),
            RlpItem::bytes(self.data.clone()),
        ]
    }

    /// Parses the body from the first six decoded items; further items are ignored.
    pub fn from_rlp_items(items: &[RlpItem]) -> Result<Self, RlpError> {
        let [nonce, gas_price, gas_limit, to, value, data] = match items.get(..LEGACY_FIELD_COUNT) {
            Some([a, b, c, d, e, f]) => [a, b, c, d, e, f].map(string_item),
            _ => {
                return Err(alloy_rlp::Error::ListLengthMismatch {
                    expected: LEGACY_FIELD_COUNT,
                    got: items.len(),
                }
                .into())
            }
        };

        Ok(Self {
            nonce: decode_u64(nonce?)?,
            gas_price: decode_uint(gas_price?)?,
            gas_limit: decode_uint(gas_limit?)?,
            to: TransactionKind::from_rlp_bytes(to?)?,
            value: decode_uint(value?)?,
            data: Bytes::copy_from_slice(data?),
        })
    }
}

fn string_item(item: &RlpItem) -> Result<&[u8], RlpError> {
    item.as_bytes()
        .map(|bytes| &bytes[..])
        .ok_or(RlpError::MalformedEncoding(alloy_rlp::Error::UnexpectedList))
}

/// The network a transaction is bound to.
///
/// A present chain ID selects EIP-155 replay protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChainContext {
    pub chain_id: Option<ChainId>,
}

impl ChainContext {
    /// No replay protection.
    pub const fn legacy() -> Self {
        Self { chain_id: None }
    }

    /// EIP-155 replay protection for `chain_id`.
    pub const fn eip155(chain_id: ChainId) -> Self {
        Self {
            chain_id: Some(chain_id),
        }
    }
}

impl From<Option<ChainId>> for ChainContext {
    fn from(chain_id: Option<ChainId>) -> Self {
        Self { chain_id }
    }
}

/// The exact bytes handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnsignedMessage(Bytes);

impl UnsignedMessage {
    /// Wraps bytes received from elsewhere, e.g. on the command line.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Lower-case hex without `0x`, the form the signer is given.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// The Keccak-256 digest that gets signed.
    pub fn signing_hash(&self) -> B256 {
        keccak_b256(&self.0)
    }
}

impl AsRef<[u8]> for UnsignedMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Builds the unsigned legacy payload.
///
/// The six body items are encoded as one list. According to EIP-155, if a chain ID is
/// present, `(chain_id, 0, 0)` is appended, the zeros standing in for `r` and `s`.
pub fn build_unsigned_message(fields: &TransactionFields, chain: ChainContext) -> UnsignedMessage {
    let mut items = fields.to_rlp_items();
    if let Some(chain_id) = chain.chain_id {
        items.extend([RlpItem::u64(chain_id), RlpItem::empty(), RlpItem::empty()]);
    }
    UnsignedMessage(rlp::encode_list(&items).into())
}

/// Computes the `v` value for a legacy signature with the given y-parity.
///
/// `27 + parity` without a chain ID, `35 + 2 * chain_id + parity` with one. The value
/// saturates rather than wrapping for absurd chain IDs.
pub fn legacy_v(chain: ChainContext, y_odd: bool) -> u64 {
    let parity = y_odd as u64;
    match chain.chain_id {
        None => 27 + parity,
        Some(chain_id) => chain_id
            .saturating_mul(2)
            .saturating_add(35)
            .saturating_add(parity),
    }
}

/// A signed legacy transaction, bound to the chain context it is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub fields: TransactionFields,
    pub signature: TxSignature,
    pub chain: ChainContext,
}

impl LegacyTransaction {
    /// Rebuilds a transaction from the nine decoded wire items.
    ///
    /// `v`, `r` and `s` must be canonical integers: no leading zeros, `r` and `s` at
    /// most 32 bytes.
    pub fn from_rlp_items(items: &[RlpItem], chain: ChainContext) -> Result<Self, VerifyError> {
        if items.len() != SIGNED_FIELD_COUNT {
            return Err(RlpError::from(alloy_rlp::Error::ListLengthMismatch {
                expected: SIGNED_FIELD_COUNT,
                got: items.len(),
            })
            .into());
        }
        let fields = TransactionFields::from_rlp_items(items)?;

        let v = decode_u64(string_item(&items[6])?)?;
        let r = string_item(&items[7])?;
        let s = string_item(&items[8])?;
        decode_uint(r)?;
        decode_uint(s)?;

        Ok(Self {
            fields,
            signature: TxSignature {
                v,
                r: Bytes::copy_from_slice(r),
                s: Bytes::copy_from_slice(s),
            },
            chain,
        })
    }

    /// Decodes signed wire bytes.
    pub fn decode(bytes: &[u8], chain: ChainContext) -> Result<Self, VerifyError> {
        let items = rlp::decode(bytes)?;
        Self::from_rlp_items(&items, chain)
    }

    /// Encodes the signed nine-item form.
    pub fn encode(&self) -> Vec<u8> {
        let mut items = self.fields.to_rlp_items();
        items.extend([
            RlpItem::u64(self.signature.v),
            RlpItem::bytes(Bytes::copy_from_slice(rlp::trim_leading_zeros(&self.signature.r))),
            RlpItem::bytes(Bytes::copy_from_slice(rlp::trim_leading_zeros(&self.signature.s))),
        ]);
        rlp::encode_list(&items)
    }

    /// Returns the parity of the y-value of the curve point for which `signature.r` is
    /// the x-value. This is encoded in `v`, which must agree with the bound chain.
    fn is_y_odd(&self) -> Result<bool, VerifyError> {
        let v = self.signature.v;
        let parity = match self.chain.chain_id {
            None => v.checked_sub(27),
            Some(chain_id) => {
                if self.signature.chain_id() != Some(chain_id) {
                    return Err(VerifyError::RecoveryFailure("v does not match the chain ID"));
                }
                v.checked_sub(35 + 2 * chain_id)
            }
        };
        match parity {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(VerifyError::RecoveryFailure("v invalid")),
        }
    }

    /// The message this transaction's signature covers.
    pub fn signing_message(&self) -> UnsignedMessage {
        build_unsigned_message(&self.fields, self.chain)
    }

    /// Keccak-256 of [LegacyTransaction::signing_message].
    pub fn signing_hash(&self) -> B256 {
        self.signing_message().signing_hash()
    }

    /// Recovers the address of the sender from the signature.
    pub fn recover_from(&self, policy: SPolicy) -> Result<Address, VerifyError> {
        let is_y_odd = self.is_y_odd()?;
        let signature = self
            .signature
            .to_k256()?
            .ok_or(VerifyError::RecoveryFailure("r, s invalid"))?;
        let (signature, flipped) = policy
            .apply(signature)
            .ok_or(VerifyError::RecoveryFailure("s is not in the lower half"))?;

        let verify_key = K256VerifyingKey::recover_from_prehash(
            self.signing_hash().as_slice(),
            &signature,
            RecoveryId::new(is_y_odd ^ flipped, false),
        )
        .map_err(|_| VerifyError::RecoveryFailure("invalid signature"))?;

        let public_key = K256PublicKey::from(&verify_key);
        let public_key = public_key.to_encoded_point(false);
        address_from_uncompressed(public_key.as_bytes())
            .ok_or(VerifyError::RecoveryFailure("unexpected public key encoding"))
    }
}
