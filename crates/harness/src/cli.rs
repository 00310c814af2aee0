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

use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
};

use clap::ValueEnum;
use sigcheck_core::SPolicy;

use crate::{config::HarnessConfig, signer::DerivationPath};

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "sigcheck")]
#[command(bin_name = "sigcheck")]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Run the conformance vectors against the simulated signing device
    Run(RunArgs),
    /// Print the unsigned payload of one vector
    Build(BuildArgs),
    /// Check a signature over a payload with both verification paths
    Verify(VerifyArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, Hash, PartialEq, Eq)]
pub enum SPolicyArg {
    /// Only accept s in the lower half of the curve order
    LowOnly,
    /// Accept both s and n - s
    Either,
}

impl From<SPolicyArg> for SPolicy {
    fn from(value: SPolicyArg) -> Self {
        match value {
            SPolicyArg::LowOnly => SPolicy::LowOnly,
            SPolicyArg::Either => SPolicy::Either,
        }
    }
}

impl Display for SPolicyArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // use the name of the clap::ValueEnum
        match self.to_possible_value() {
            Some(value) => write!(f, "{}", value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SignerArgs {
    #[clap(short = 'c', long, require_equals = true)]
    /// JSON config file; the flags below take precedence over it
    pub config: Option<PathBuf>,

    #[clap(short = 'p', long, require_equals = true)]
    /// BIP-32 derivation path of the signing account
    ///
    /// [default: m/44'/60'/0'/0'/0]
    pub path: Option<DerivationPath>,

    #[clap(short = 'k', long, require_equals = true)]
    /// Hex secret key of the simulated device
    pub signer_key: Option<String>,

    #[clap(long, require_equals = true)]
    /// Hex SEC1 public key signatures must verify against
    pub public_key: Option<String>,

    #[clap(short = 't', long, require_equals = true)]
    /// Seconds to wait for the signer before a case fails
    pub timeout: Option<u64>,

    #[clap(short = 's', long, require_equals = true, value_enum)]
    /// Which s values the verifiers accept
    pub s_policy: Option<SPolicyArg>,

    #[clap(short = 'j', long, require_equals = true)]
    /// Maximum number of cases in flight
    pub jobs: Option<usize>,

    #[clap(long, default_value_t = false)]
    /// Do not switch sessions into expert mode
    pub no_expert_mode: bool,
}

impl SignerArgs {
    /// Loads the config file, if any, and applies the command line overrides.
    pub fn config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };
        if let Some(path) = &self.path {
            config.derivation_path = path.clone();
        }
        if let Some(key) = &self.signer_key {
            config.signer_key = key.clone();
        }
        if let Some(public_key) = &self.public_key {
            config.expected_public_key = Some(public_key.clone());
        }
        if let Some(timeout) = self.timeout {
            config.signer_timeout_secs = timeout;
        }
        if let Some(policy) = self.s_policy {
            config.s_policy = policy.into();
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_cases = jobs;
        }
        if self.no_expert_mode {
            config.expert_mode = false;
        }
        Ok(config)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[clap(flatten)]
    pub signer_args: SignerArgs,

    #[clap(short = 'f', long, require_equals = true)]
    /// JSON file with conformance vectors; the built-in table when absent
    pub vectors: Option<PathBuf>,

    #[clap(short = 'o', long, require_equals = true)]
    /// Write the JSON report to this file
    pub report: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    #[clap(short = 'f', long, require_equals = true)]
    /// JSON file with conformance vectors; the built-in table when absent
    pub vectors: Option<PathBuf>,

    #[clap(short = 'n', long, require_equals = true)]
    /// Name of the vector
    pub name: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct VerifyArgs {
    #[clap(short = 'm', long, require_equals = true)]
    /// Hex of the unsigned payload
    pub message: String,

    #[clap(short = 'v', long, require_equals = true)]
    /// Hex recovery value
    pub v: String,

    #[clap(short = 'r', long, require_equals = true)]
    /// Hex r
    pub r: String,

    #[clap(short = 's', long, require_equals = true)]
    /// Hex s
    pub s: String,

    #[clap(long, require_equals = true)]
    /// Hex SEC1 public key of the signer
    pub public_key: String,

    #[clap(long, require_equals = true)]
    /// Chain ID the payload is bound to, if any
    pub chain_id: Option<u64>,

    #[clap(long, require_equals = true, value_enum, default_value_t = SPolicyArg::LowOnly)]
    /// Which s values the verifiers accept
    pub s_policy: SPolicyArg,
}
