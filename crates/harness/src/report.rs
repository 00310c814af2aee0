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

use std::{fs::File, io::BufWriter, path::Path};

use alloy_primitives::{Address, ChainId};
use anyhow::Context;
use serde::Serialize;

use crate::{runner::CaseFailure, signer::SignatureResponse, vectors::TestVector};

/// Outcome of a single conformance case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseReport {
    pub name: String,
    pub chain_id: Option<ChainId>,
    /// Hex of the payload handed to the signer.
    pub unsigned_tx: Option<String>,
    pub signature: Option<SignatureResponse>,
    /// Sender recovered from the reconstructed transaction.
    pub recovered: Option<Address>,
    pub failure: Option<CaseFailure>,
}

impl CaseReport {
    pub(crate) fn new(vector: &TestVector) -> Self {
        Self {
            name: vector.name.clone(),
            chain_id: vector.chain_id,
            unsigned_tx: None,
            signature: None,
            recovered: None,
            failure: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// All case outcomes, in the order of the input table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConformanceReport {
    pub cases: Vec<CaseReport>,
}

impl ConformanceReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|case| case.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CaseFailure)> {
        self.cases
            .iter()
            .filter_map(|case| case.failure.as_ref().map(|failure| (case.name.as_str(), failure)))
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}
