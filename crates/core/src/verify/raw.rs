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

use alloy_primitives::hex;
use k256::ecdsa::{signature::hazmat::PrehashVerifier, VerifyingKey};

use crate::{keccak::keccak, signature::SPolicy, TxSignature, VerifyError};

/// Checks `signature` over the Keccak-256 digest of `message` against a known key.
///
/// `v` plays no part here. Returns `Ok(false)` for a signature that does not verify,
/// including zero or out-of-range scalars and a high `s` under [SPolicy::LowOnly]. Only
/// an `r` or `s` that does not fit 32 bytes is an error.
pub fn verify_raw(
    message: impl AsRef<[u8]>,
    signature: &TxSignature,
    public_key: &VerifyingKey,
    policy: SPolicy,
) -> Result<bool, VerifyError> {
    let digest = keccak(message);
    let Some(signature) = signature.to_k256()? else {
        return Ok(false);
    };
    // k256 only verifies the low-s form
    let Some((signature, _)) = policy.apply(signature) else {
        return Ok(false);
    };
    Ok(public_key.verify_prehash(&digest, &signature).is_ok())
}

/// Parses a SEC1 encoded secp256k1 public key, compressed or uncompressed, from hex.
pub fn parse_public_key(public_key: &str) -> Result<VerifyingKey, VerifyError> {
    let public_key = public_key.strip_prefix("0x").unwrap_or(public_key);
    let bytes = hex::decode(public_key).map_err(|_| VerifyError::InvalidPublicKey)?;
    VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| VerifyError::InvalidPublicKey)
}
