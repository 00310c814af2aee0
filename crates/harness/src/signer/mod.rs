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

//! The external signing authority, as seen by the harness.
//!
//! A signer is an injected capability: the runner only ever talks to a [Signer] session
//! handed out by a [SignerFactory], so the conformance logic runs unchanged against the
//! [simulated::SimulatedDevice] or a [scripted::ScriptedSigner].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigcheck_core::{TxSignature, VerifyError};
use thiserror::Error as ThisError;

pub use path::DerivationPath;

pub mod path;
pub mod scripted;
pub mod simulated;

/// The answer of a signer: `v`, `r` and `s` as hex strings without `0x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResponse {
    pub v: String,
    pub r: String,
    pub s: String,
}

impl SignatureResponse {
    /// Parses the hex strings, padding odd lengths with a leading `0`.
    pub fn to_signature(&self) -> Result<TxSignature, VerifyError> {
        TxSignature::from_hex_parts(&self.v, &self.r, &self.s)
    }
}

/// Why a device refused to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("unsupported transaction type")]
    UnsupportedTx,
    #[error("payload is not a single RLP list")]
    UnexpectedValue,
    #[error("unexpected bytes after the transaction")]
    UnexpectedCharacters,
    #[error("malformed transaction fields")]
    Malformed,
    #[error("chain ID not allowed")]
    InvalidChainId,
    #[error("EIP-155 placeholder r and s must be zero")]
    InvalidRsValues,
    #[error("blind signing requires expert mode")]
    ExpertModeRequired,
    #[error("derivation path not allowed")]
    InvalidPath,
    #[error("rejected by the user")]
    UserRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SignerError {
    /// Timeout, dropped transport or a session that could not be opened.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// The device answered, and the answer was no.
    #[error("signer rejected the request: {0}")]
    Rejected(RejectReason),
    /// The device answered with something that is not a signature.
    #[error("invalid signer response: {0}")]
    InvalidResponse(String),
}

/// One session with a signing authority.
#[async_trait]
pub trait Signer: Send {
    /// Flips the device between normal and expert mode.
    async fn toggle_expert_mode(&mut self) -> Result<(), SignerError>;

    /// Asks for a signature over the Keccak-256 digest of `unsigned_hex`.
    ///
    /// `unsigned_hex` is the lower-case hex form of the RLP payload. `metadata` carries
    /// optional auxiliary data such as token descriptors; the vectors never set it.
    async fn sign_evm_transaction(
        &mut self,
        path: &DerivationPath,
        unsigned_hex: &str,
        metadata: Option<&[u8]>,
    ) -> Result<SignatureResponse, SignerError>;
}

/// Hands out independent signer sessions; every conformance case opens its own.
#[async_trait]
pub trait SignerFactory: Send + Sync {
    type Session: Signer + 'static;

    async fn open(&self) -> Result<Self::Session, SignerError>;
}
