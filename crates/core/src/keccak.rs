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

use alloy_primitives::{Address, B256};
use tiny_keccak::{Hasher, Keccak};

/// Computes the Keccak-256 hash of the provided data.
///
/// This is the digest the signer is asked to sign and the one both verification paths
/// re-derive from the unsigned message.
#[inline]
pub fn keccak(data: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data.as_ref());
    let mut output = [0; 32];
    hasher.finalize(&mut output);
    output
}

/// Same as [keccak], wrapped in a [B256].
#[inline]
pub fn keccak_b256(data: impl AsRef<[u8]>) -> B256 {
    B256::from(keccak(data))
}

/// Derives the account address from an uncompressed SEC1 public key (`0x04 || x || y`).
///
/// Returns `None` for any other key encoding.
pub fn address_from_uncompressed(public_key: &[u8]) -> Option<Address> {
    match public_key {
        [0x04, coordinates @ ..] if coordinates.len() == 64 => {
            let hash = keccak(coordinates);
            Some(Address::from_slice(&hash[12..]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::*;

    #[test]
    fn empty() {
        assert_eq!(
            keccak_b256(b""),
            b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn rejects_compressed_key() {
        assert!(address_from_uncompressed(&[0x02; 33]).is_none());
        assert!(address_from_uncompressed(&[0x04; 64]).is_none());
    }
}
