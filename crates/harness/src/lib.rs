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

use std::path::Path;

use alloy_primitives::hex;
use anyhow::{bail, Context};
use log::{error, info};
use sigcheck_core::{
    assemble_signed_transaction, build_unsigned_message, parse_public_key, verify_raw,
    verify_reconstructed, TxSignature, UnsignedMessage,
};

use crate::{
    cli::{BuildArgs, Cli, RunArgs, VerifyArgs},
    runner::ConformanceRunner,
    signer::simulated::SimulatedDeviceFactory,
    vectors::{builtin_vectors, load_vectors, TestVector},
};

pub mod cli;
pub mod config;
pub mod report;
pub mod runner;
pub mod signer;
pub mod vectors;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli {
        Cli::Run(args) => run_vectors(args).await,
        Cli::Build(args) => build(args),
        Cli::Verify(args) => verify(args),
    }
}

fn read_vectors(path: Option<&Path>) -> anyhow::Result<Vec<TestVector>> {
    match path {
        Some(path) => load_vectors(path),
        None => builtin_vectors(),
    }
}

async fn run_vectors(args: RunArgs) -> anyhow::Result<()> {
    let config = args.signer_args.config()?;
    let settings = config.runner_settings()?;
    let vectors = read_vectors(args.vectors.as_deref())?;
    info!(
        "Running {} vectors with path {} and {:?} s values ...",
        vectors.len(),
        settings.path,
        settings.policy
    );

    let factory = SimulatedDeviceFactory::new(config.signing_key()?);
    let runner = ConformanceRunner::new(factory, settings);
    let report = runner.run_all(&vectors).await;

    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!("Report written to {}.", path.display());
    }
    for (name, failure) in report.failures() {
        error!("{name}: {failure}");
    }
    info!("{} passed, {} failed.", report.passed(), report.failed());
    if !report.all_passed() {
        bail!("{} of {} cases failed", report.failed(), report.cases.len());
    }
    Ok(())
}

fn build(args: BuildArgs) -> anyhow::Result<()> {
    let vectors = read_vectors(args.vectors.as_deref())?;
    let vector = vectors
        .iter()
        .find(|vector| vector.name == args.name)
        .with_context(|| format!("no vector named {}", args.name))?;
    let message = build_unsigned_message(&vector.fields()?, vector.chain());
    println!("{}", message.to_hex());
    Ok(())
}

fn verify(args: VerifyArgs) -> anyhow::Result<()> {
    let message = args.message.strip_prefix("0x").unwrap_or(&args.message);
    let message = UnsignedMessage::from_bytes(hex::decode(message).context("invalid message hex")?);
    let signature = TxSignature::from_hex_parts(&args.v, &args.r, &args.s)?;
    let public_key = parse_public_key(&args.public_key)?;
    let chain = args.chain_id.into();
    let policy = args.s_policy.into();

    let raw = verify_raw(&message, &signature, &public_key, policy)?;
    info!("Raw signature check: {}", if raw { "passed" } else { "failed" });

    let reconstructed = assemble_signed_transaction(&message, &signature)
        .and_then(|signed| verify_reconstructed(&signed, chain, policy));
    match &reconstructed {
        Ok(sender) => info!("Reconstructed transaction recovers sender {sender}."),
        Err(err) => error!("Reconstructed transaction check failed: {err}"),
    }

    if !raw || reconstructed.is_err() {
        bail!("signature verification failed");
    }
    Ok(())
}
