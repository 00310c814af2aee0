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

//! Deterministic construction of legacy Ethereum transaction payloads and two
//! independent ways of checking a signature over them.

pub mod keccak;
pub mod rlp;
pub mod signature;
pub mod transaction;
pub mod verify;

pub use rlp::RlpError;
pub use signature::{SPolicy, TxSignature};
pub use transaction::{
    build_unsigned_message, legacy_v, ChainContext, LegacyTransaction, TransactionFields,
    TransactionKind, UnsignedMessage,
};
pub use verify::{
    raw::{parse_public_key, verify_raw},
    reconstructed::{assemble_signed_transaction, verify_reconstructed},
    VerifyError,
};
