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
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;

use super::{DerivationPath, SignatureResponse, Signer, SignerError, SignerFactory};

/// A signer that answers every request with the same canned outcome.
///
/// Requests are recorded so tests can check exactly what was submitted.
#[derive(Debug, Clone)]
pub struct ScriptedSigner {
    outcome: Result<SignatureResponse, SignerError>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Signer for ScriptedSigner {
    async fn toggle_expert_mode(&mut self) -> Result<(), SignerError> {
        Ok(())
    }

    async fn sign_evm_transaction(
        &mut self,
        _path: &DerivationPath,
        unsigned_hex: &str,
        _metadata: Option<&[u8]>,
    ) -> Result<SignatureResponse, SignerError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(unsigned_hex.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedSignerFactory {
    outcome: Result<SignatureResponse, SignerError>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSignerFactory {
    /// Every session returns `response`.
    pub fn responding(response: SignatureResponse) -> Self {
        Self::new(Ok(response))
    }

    /// Every session fails with `error`.
    pub fn failing(error: SignerError) -> Self {
        Self::new(Err(error))
    }

    fn new(outcome: Result<SignatureResponse, SignerError>) -> Self {
        Self {
            outcome,
            delay: None,
            requests: Arc::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The hex payloads submitted so far, across all sessions.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SignerFactory for ScriptedSignerFactory {
    type Session = ScriptedSigner;

    async fn open(&self) -> Result<Self::Session, SignerError> {
        Ok(ScriptedSigner {
            outcome: self.outcome.clone(),
            delay: self.delay,
            requests: self.requests.clone(),
        })
    }
}
