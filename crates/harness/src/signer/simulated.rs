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

//! An in-process signing device.
//!
//! It reproduces the checks a hardware wallet applies before it signs a legacy EVM
//! transaction, then signs with a fixed secp256k1 key.

use std::time::Duration;

use alloy_primitives::{hex, ChainId};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use log::debug;
use sigcheck_core::{
    keccak::keccak,
    legacy_v,
    rlp::{self, decode_u64, minimal_be_bytes_u64, RlpError, RlpItem},
    transaction::{LEGACY_FIELD_COUNT, SIGNED_FIELD_COUNT},
    ChainContext, TransactionFields, TransactionKind,
};

use super::{DerivationPath, RejectReason, SignatureResponse, Signer, SignerError, SignerFactory};

/// Chains the device signs for: Flare, Coston, Songbird and Coston2.
pub const ALLOWED_CHAIN_IDS: [ChainId; 4] = [14, 16, 19, 114];

const EIP2930_MARKER: u8 = 0x01;
const EIP1559_MARKER: u8 = 0x02;
const LEGACY_MARKER: u8 = 0xc0;

/// `transfer(address,uint256)`
const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const ERC20_TRANSFER_DATA_LEN: usize = 4 + 32 + 32;

/// What the device understood of a payload it agreed to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub fields: TransactionFields,
    pub chain: ChainContext,
}

impl ParsedTransaction {
    /// An ERC-20 `transfer` can be shown field by field, so it is signed outside of
    /// expert mode.
    pub fn is_erc20_transfer(&self) -> bool {
        matches!(self.fields.to, TransactionKind::Call(_))
            && self.fields.data.len() == ERC20_TRANSFER_DATA_LEN
            && self.fields.data.starts_with(&ERC20_TRANSFER_SELECTOR)
    }
}

/// Parses an unsigned payload the way the device firmware does.
pub fn parse_transaction(payload: &[u8]) -> Result<ParsedTransaction, RejectReason> {
    match payload.first() {
        Some(&EIP2930_MARKER | &EIP1559_MARKER) => return Err(RejectReason::UnsupportedTx),
        Some(&marker) if marker >= LEGACY_MARKER => {}
        _ => return Err(RejectReason::UnsupportedTx),
    }

    let items = rlp::decode(payload).map_err(|err| match err {
        RlpError::TrailingBytes(_) => RejectReason::UnexpectedCharacters,
        RlpError::ExpectedList => RejectReason::UnexpectedValue,
        _ => RejectReason::Malformed,
    })?;
    let fields = TransactionFields::from_rlp_items(&items).map_err(|_| RejectReason::Malformed)?;

    let chain = match items.len() {
        LEGACY_FIELD_COUNT => ChainContext::legacy(),
        SIGNED_FIELD_COUNT => {
            let chain_id = items[6]
                .as_bytes()
                .ok_or(RejectReason::Malformed)
                .and_then(|bytes| decode_u64(bytes).map_err(|_| RejectReason::Malformed))?;
            if !ALLOWED_CHAIN_IDS.contains(&chain_id) {
                return Err(RejectReason::InvalidChainId);
            }
            // the placeholders must be empty or a single zero byte
            if !items[7..].iter().all(is_zero_placeholder) {
                return Err(RejectReason::InvalidRsValues);
            }
            ChainContext::eip155(chain_id)
        }
        _ => return Err(RejectReason::Malformed),
    };

    Ok(ParsedTransaction { fields, chain })
}

fn is_zero_placeholder(item: &RlpItem) -> bool {
    matches!(item.as_bytes().map(|bytes| &bytes[..]), Some([] | [0]))
}

/// A device session.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    key: SigningKey,
    expert_mode: bool,
    approve: bool,
    delay: Option<Duration>,
}

impl SimulatedDevice {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            expert_mode: false,
            approve: true,
            delay: None,
        }
    }

    pub fn expert_mode(&self) -> bool {
        self.expert_mode
    }

    /// Checks and signs `payload` synchronously.
    pub fn sign_payload(
        &self,
        path: &DerivationPath,
        payload: &[u8],
    ) -> Result<SignatureResponse, SignerError> {
        if !path.is_ethereum() {
            return Err(SignerError::Rejected(RejectReason::InvalidPath));
        }
        let parsed = parse_transaction(payload).map_err(SignerError::Rejected)?;
        if !parsed.is_erc20_transfer() && !self.expert_mode {
            return Err(SignerError::Rejected(RejectReason::ExpertModeRequired));
        }
        if !self.approve {
            return Err(SignerError::Rejected(RejectReason::UserRejected));
        }

        let digest = keccak(payload);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|err| SignerError::Unavailable(format!("signing failed: {err}")))?;
        let (r, s) = signature.split_bytes();
        let v = legacy_v(parsed.chain, recovery_id.is_y_odd());
        debug!("signed payload with digest {} and v = {v}", hex::encode(digest));

        Ok(SignatureResponse {
            v: hex::encode(minimal_be_bytes_u64(v)),
            r: hex::encode(r),
            s: hex::encode(s),
        })
    }
}

#[async_trait]
impl Signer for SimulatedDevice {
    async fn toggle_expert_mode(&mut self) -> Result<(), SignerError> {
        self.expert_mode = !self.expert_mode;
        Ok(())
    }

    async fn sign_evm_transaction(
        &mut self,
        path: &DerivationPath,
        unsigned_hex: &str,
        _metadata: Option<&[u8]>,
    ) -> Result<SignatureResponse, SignerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let payload = hex::decode(unsigned_hex)
            .map_err(|_| SignerError::Rejected(RejectReason::UnexpectedValue))?;
        self.sign_payload(path, &payload)
    }
}

/// Opens a fresh [SimulatedDevice], in normal mode, for every case.
#[derive(Debug, Clone)]
pub struct SimulatedDeviceFactory {
    key: SigningKey,
    approve: bool,
    delay: Option<Duration>,
}

impl SimulatedDeviceFactory {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            approve: true,
            delay: None,
        }
    }

    /// Makes every session answer a signing request with a user rejection.
    pub fn rejecting(mut self) -> Self {
        self.approve = false;
        self
    }

    /// Delays every signing response, e.g. to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SignerFactory for SimulatedDeviceFactory {
    type Session = SimulatedDevice;

    async fn open(&self) -> Result<Self::Session, SignerError> {
        Ok(SimulatedDevice {
            approve: self.approve,
            delay: self.delay,
            ..SimulatedDevice::new(self.key.clone())
        })
    }
}
