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

use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::Address;
use k256::ecdsa::VerifyingKey;
use log::{debug, error, info, warn};
use serde::Serialize;
use sigcheck_core::{
    assemble_signed_transaction, build_unsigned_message, keccak::address_from_uncompressed,
    verify_raw, verify_reconstructed, SPolicy, UnsignedMessage,
};
use thiserror::Error as ThisError;
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};

use crate::{
    report::{CaseReport, ConformanceReport},
    signer::{DerivationPath, RejectReason, SignatureResponse, Signer, SignerError, SignerFactory},
    vectors::TestVector,
};

/// Result of one verification path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PathOutcome {
    Passed,
    Failed(String),
}

impl PathOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, PathOutcome::Passed)
    }
}

impl fmt::Display for PathOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathOutcome::Passed => write!(f, "passed"),
            PathOutcome::Failed(reason) => write!(f, "failed, {reason}"),
        }
    }
}

/// Why a conformance case did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ThisError)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseFailure {
    #[error("could not build the transaction: {reason}")]
    Build { reason: String },
    #[error("signer unavailable: {reason}")]
    SignerUnavailable { reason: String },
    #[error("signer rejected the transaction: {reason}")]
    SignerRejected { reason: RejectReason },
    #[error("invalid signer response: {reason}")]
    InvalidResponse { reason: String },
    #[error("verification failed (raw: {raw}; reconstructed: {reconstructed})")]
    Verification {
        raw: PathOutcome,
        reconstructed: PathOutcome,
    },
    #[error("case aborted: {reason}")]
    Aborted { reason: String },
}

impl From<SignerError> for CaseFailure {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Unavailable(reason) => CaseFailure::SignerUnavailable { reason },
            SignerError::Rejected(reason) => CaseFailure::SignerRejected { reason },
            SignerError::InvalidResponse(reason) => CaseFailure::InvalidResponse { reason },
        }
    }
}

/// Everything a case needs besides the signer itself.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub path: DerivationPath,
    /// Key Path A checks signatures against.
    pub expected_key: VerifyingKey,
    /// Bound on the whole signer exchange of one case.
    pub timeout: Duration,
    pub policy: SPolicy,
    /// Switch every session into expert mode before signing.
    pub expert_mode: bool,
    pub max_concurrent_cases: usize,
}

impl RunnerSettings {
    pub fn new(expected_key: VerifyingKey) -> Self {
        Self {
            path: DerivationPath::default(),
            expected_key,
            timeout: Duration::from_secs(60),
            policy: SPolicy::default(),
            expert_mode: true,
            max_concurrent_cases: 8,
        }
    }

    /// Account address of [RunnerSettings::expected_key].
    pub fn expected_address(&self) -> Option<Address> {
        address_from_uncompressed(self.expected_key.to_encoded_point(false).as_bytes())
    }
}

/// Runs conformance vectors against sessions of one signer factory.
pub struct ConformanceRunner<F> {
    factory: Arc<F>,
    settings: Arc<RunnerSettings>,
}

impl<F> ConformanceRunner<F>
where
    F: SignerFactory + 'static,
{
    pub fn new(factory: F, settings: RunnerSettings) -> Self {
        Self {
            factory: Arc::new(factory),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Runs a single case with its own signer session.
    pub async fn run_case(&self, vector: &TestVector) -> CaseReport {
        run_case(self.factory.as_ref(), &self.settings, vector).await
    }

    /// Runs every case concurrently, at most `max_concurrent_cases` at a time.
    ///
    /// A failing case never stops the others. Reports come back in input order.
    pub async fn run_all(&self, vectors: &[TestVector]) -> ConformanceReport {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_cases.max(1)));
        let mut join_set = JoinSet::new();
        for (index, vector) in vectors.iter().cloned().enumerate() {
            let factory = self.factory.clone();
            let settings = self.settings.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await;
                (index, run_case(factory.as_ref(), &settings, &vector).await)
            });
        }

        let mut cases: Vec<Option<CaseReport>> = vec![None; vectors.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => cases[index] = Some(report),
                Err(err) => error!("Conformance case task failed: {err}"),
            }
        }

        let cases = cases
            .into_iter()
            .zip(vectors)
            .map(|(report, vector)| {
                report.unwrap_or_else(|| {
                    let mut report = CaseReport::new(vector);
                    report.failure = Some(CaseFailure::Aborted {
                        reason: "task did not complete".to_string(),
                    });
                    report
                })
            })
            .collect();
        ConformanceReport { cases }
    }
}

async fn run_case<F: SignerFactory>(
    factory: &F,
    settings: &RunnerSettings,
    vector: &TestVector,
) -> CaseReport {
    let mut report = CaseReport::new(vector);
    match execute(factory, settings, vector, &mut report).await {
        Ok(()) => info!("{}: passed", vector.name),
        Err(failure) => {
            warn!("{}: {failure}", vector.name);
            report.failure = Some(failure);
        }
    }
    report
}

async fn execute<F: SignerFactory>(
    factory: &F,
    settings: &RunnerSettings,
    vector: &TestVector,
    report: &mut CaseReport,
) -> Result<(), CaseFailure> {
    let chain = vector.chain();
    let fields = vector.fields().map_err(|err| CaseFailure::Build {
        reason: err.to_string(),
    })?;
    let message = build_unsigned_message(&fields, chain);
    let unsigned_hex = message.to_hex();
    debug!("{}: tx {unsigned_hex}", vector.name);
    report.unsigned_tx = Some(unsigned_hex);

    let response = timeout(settings.timeout, request_signature(factory, settings, &message))
        .await
        .map_err(|_| CaseFailure::SignerUnavailable {
            reason: format!("no response within {:?}", settings.timeout),
        })??;
    report.signature = Some(response.clone());

    let signature = response
        .to_signature()
        .map_err(|err| CaseFailure::InvalidResponse {
            reason: err.to_string(),
        })?;

    // both paths always run, so a report names every path that disagreed
    let raw = match verify_raw(&message, &signature, &settings.expected_key, settings.policy) {
        Ok(true) => PathOutcome::Passed,
        Ok(false) => PathOutcome::Failed("signature does not verify against the expected key".into()),
        Err(err) => PathOutcome::Failed(err.to_string()),
    };
    let reconstructed = match assemble_signed_transaction(&message, &signature)
        .and_then(|signed| verify_reconstructed(&signed, chain, settings.policy))
    {
        Ok(sender) => {
            if settings.expected_address() != Some(sender) {
                warn!("{}: recovered unexpected sender {sender}", vector.name);
            }
            report.recovered = Some(sender);
            PathOutcome::Passed
        }
        Err(err) => PathOutcome::Failed(err.to_string()),
    };

    if raw.passed() && reconstructed.passed() {
        Ok(())
    } else {
        Err(CaseFailure::Verification { raw, reconstructed })
    }
}

async fn request_signature<F: SignerFactory>(
    factory: &F,
    settings: &RunnerSettings,
    message: &UnsignedMessage,
) -> Result<SignatureResponse, CaseFailure> {
    let mut session = factory.open().await?;
    if settings.expert_mode {
        session.toggle_expert_mode().await?;
    }
    let response = session
        .sign_evm_transaction(&settings.path, &message.to_hex(), None)
        .await?;
    Ok(response)
}
