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

use std::{fs::File, io::BufReader, path::Path, time::Duration};

use alloy_primitives::hex;
use anyhow::{bail, Context};
use k256::ecdsa::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sigcheck_core::{parse_public_key, SPolicy};

use crate::{runner::RunnerSettings, signer::DerivationPath};

/// Secret key of the simulated device. Test-only: it is public knowledge.
pub const DEFAULT_SIGNER_KEY: &str =
    "4646464646464646464646464646464646464646464646464646464646464646";

/// Harness settings, loadable from a JSON file and overridable on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarnessConfig {
    pub derivation_path: DerivationPath,
    /// SEC1 public key signatures are checked against. Derived from `signer_key` when
    /// absent.
    pub expected_public_key: Option<String>,
    /// Hex secret key of the simulated device.
    pub signer_key: String,
    pub signer_timeout_secs: u64,
    pub s_policy: SPolicy,
    pub expert_mode: bool,
    pub max_concurrent_cases: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            derivation_path: DerivationPath::default(),
            expected_public_key: None,
            signer_key: DEFAULT_SIGNER_KEY.to_string(),
            signer_timeout_secs: 60,
            s_policy: SPolicy::default(),
            expert_mode: true,
            max_concurrent_cases: 8,
        }
    }
}

impl HarnessConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn signing_key(&self) -> anyhow::Result<SigningKey> {
        let key = self.signer_key.strip_prefix("0x").unwrap_or(&self.signer_key);
        let bytes = hex::decode(key).context("signer key is not valid hex")?;
        SigningKey::from_slice(&bytes).context("invalid signer key")
    }

    /// The configured public key, or the one of the signer key.
    pub fn expected_key(&self) -> anyhow::Result<VerifyingKey> {
        match &self.expected_public_key {
            Some(public_key) => {
                parse_public_key(public_key).context("invalid expected public key")
            }
            None => Ok(*self.signing_key()?.verifying_key()),
        }
    }

    pub fn runner_settings(&self) -> anyhow::Result<RunnerSettings> {
        if self.signer_timeout_secs == 0 {
            bail!("signer timeout must be positive");
        }
        Ok(RunnerSettings {
            path: self.derivation_path.clone(),
            expected_key: self.expected_key()?,
            timeout: Duration::from_secs(self.signer_timeout_secs),
            policy: self.s_policy,
            expert_mode: self.expert_mode,
            max_concurrent_cases: self.max_concurrent_cases.max(1),
        })
    }
}
