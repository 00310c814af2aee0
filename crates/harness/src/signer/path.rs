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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Bit marking a hardened BIP-32 index.
pub const HARDENED: u32 = 0x8000_0000;
/// Maximum number of components a signing device accepts.
pub const MAX_DEPTH: usize = 10;
/// The account the conformance vectors are signed with.
pub const ETH_PATH: &str = "m/44'/60'/0'/0'/0";

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum PathError {
    #[error("derivation path is empty")]
    Empty,
    #[error("derivation path has {0} components, at most {MAX_DEPTH} are allowed")]
    TooDeep(usize),
    #[error("invalid derivation path component `{0}`")]
    InvalidComponent(String),
}

/// A BIP-32 derivation path such as `m/44'/60'/0'/0'/0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Whether the path lies under the Ethereum coin type, `44'/60'`.
    pub fn is_ethereum(&self) -> bool {
        matches!(self.0[..], [purpose, coin, ..] if purpose == 44 | HARDENED && coin == 60 | HARDENED)
    }

    /// Serializes the path the way it is sent to a device: the number of components
    /// followed by each index as a big-endian `u32`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 * self.0.len());
        // MAX_DEPTH keeps the count within one byte
        out.push(self.0.len() as u8);
        for index in &self.0 {
            out.extend_from_slice(&index.to_be_bytes());
        }
        out
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        DerivationPath(vec![44 | HARDENED, 60 | HARDENED, HARDENED, HARDENED, 0])
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("m/").unwrap_or(s);
        if s.is_empty() || s == "m" {
            return Err(PathError::Empty);
        }

        let components = s
            .split('/')
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };
                match digits.parse::<u32>() {
                    Ok(index) if index < HARDENED => {
                        Ok(if hardened { index | HARDENED } else { index })
                    }
                    _ => Err(PathError::InvalidComponent(part.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if components.len() > MAX_DEPTH {
            return Err(PathError::TooDeep(components.len()));
        }
        Ok(DerivationPath(components))
    }
}

impl TryFrom<String> for DerivationPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DerivationPath> for String {
    fn from(value: DerivationPath) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}
