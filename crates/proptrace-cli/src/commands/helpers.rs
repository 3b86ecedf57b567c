use std::path::Path;

use miette::IntoDiagnostic;
use proptrace_engine::GeneratorConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::GenerationArgs;

/// Version of the JSON documents printed or written by the CLI.
pub(crate) const REPORT_SCHEMA_VERSION: u32 = 1;

/// Defaults, then the `--config` file, then individual flags.
pub(crate) fn resolve_config(args: &GenerationArgs) -> miette::Result<GeneratorConfig> {
    let mut config = match &args.config {
        Some(path) => GeneratorConfig::from_json_file(path).into_diagnostic()?,
        None => GeneratorConfig::default(),
    };
    if let Some(length) = args.length {
        config.trace_length = length;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(accounts) = &args.accounts {
        config.accounts = accounts
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
    }
    if let Some(p) = args.pattern_probability {
        config.pattern_probability = p;
    }
    config.validate().into_diagnostic()?;
    Ok(config)
}

pub(crate) fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

pub(crate) fn sha256_hex_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_hex_bytes(&bytes))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> miette::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    std::fs::write(path, json).into_diagnostic()
}
