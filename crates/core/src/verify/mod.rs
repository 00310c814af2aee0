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

//! The two verification paths.
//!
//! [raw] checks the ECDSA signature over the digest against a known public key.
//! [reconstructed] assembles the signed wire transaction and recovers its sender. The
//! paths share nothing beyond the codec, so a bug in one is not masked by the other.

use thiserror::Error as ThisError;

use crate::rlp::RlpError;

pub mod raw;
pub mod reconstructed;

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum VerifyError {
    /// `r` or `s` is not expressible as a 32-byte integer, or is not valid hex.
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(&'static str),
    /// No sender could be recovered from the signed transaction.
    #[error("recovery failed: {0}")]
    RecoveryFailure(&'static str),
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error(transparent)]
    Malformed(#[from] RlpError),
}
