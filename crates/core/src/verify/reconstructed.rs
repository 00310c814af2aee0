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

use alloy_primitives::{Address, Bytes};

use crate::{
    rlp::{self, trim_leading_zeros, RlpError, RlpItem},
    signature::SPolicy,
    transaction::{ChainContext, LegacyTransaction, LEGACY_FIELD_COUNT},
    TxSignature, VerifyError,
};

/// Turns an unsigned payload and a signature into signed wire bytes.
///
/// Only the six body items of `unsigned` are kept; any EIP-155 placeholder is replaced
/// by `v`, `r` and `s` in minimal form.
pub fn assemble_signed_transaction(
    unsigned: impl AsRef<[u8]>,
    signature: &TxSignature,
) -> Result<Bytes, VerifyError> {
    let mut items = rlp::decode(unsigned.as_ref())?;
    if items.len() < LEGACY_FIELD_COUNT {
        return Err(RlpError::from(alloy_rlp::Error::ListLengthMismatch {
            expected: LEGACY_FIELD_COUNT,
            got: items.len(),
        })
        .into());
    }
    items.truncate(LEGACY_FIELD_COUNT);

    let r = signature.padded_r()?;
    let s = signature.padded_s()?;
    items.extend([
        RlpItem::u64(signature.v),
        RlpItem::bytes(Bytes::copy_from_slice(trim_leading_zeros(&r))),
        RlpItem::bytes(Bytes::copy_from_slice(trim_leading_zeros(&s))),
    ]);

    Ok(rlp::encode_list(&items).into())
}

/// Recovers the sender of signed wire bytes, interpreted under `chain`.
///
/// This never consults an expected key. Anything that does not decode to exactly nine
/// canonical items, or whose signature does not yield a point on the curve, is an
/// error rather than some unrelated address.
pub fn verify_reconstructed(
    signed: impl AsRef<[u8]>,
    chain: ChainContext,
    policy: SPolicy,
) -> Result<Address, VerifyError> {
    let tx = LegacyTransaction::decode(signed.as_ref(), chain)?;
    tx.recover_from(policy)
}
