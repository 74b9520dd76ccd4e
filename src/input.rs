use std::path::Path;

use anyhow::Result;

use crate::errors::BenchError;
use crate::types::{BenchmarkInput, MemoryConfig};

/// Read a benchmark input file (TOML).
pub fn load_input(path: &Path) -> Result<BenchmarkInput> {
    let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let input = parse_input(&text).map_err(|detail| BenchError::ConfigParse {
        path: path.to_path_buf(),
        detail,
    })?;
    Ok(input)
}

pub fn parse_input(text: &str) -> std::result::Result<BenchmarkInput, String> {
    toml::from_str(text).map_err(|e| e.message().to_string())
}

/// Check the input and parse its memory configurations, in input order.
///
/// Lazy dependencies must also appear under `[dependencies]`: a dynamic
/// import of a package that was never installed measures nothing useful.
pub fn validate(input: &BenchmarkInput) -> Result<Vec<MemoryConfig>, BenchError> {
    if input.iterations == 0 {
        return Err(BenchError::NoIterations);
    }

    if input.memory.is_empty() {
        return Err(BenchError::NoConfigurations);
    }

    if let Some(name) = input
        .lazy
        .iter()
        .find(|name| !input.dependencies.contains(name))
    {
        return Err(BenchError::UnknownLazyDependency { name: name.clone() });
    }

    input
        .memory
        .iter()
        .map(|value| parse_memory(value))
        .collect()
}

fn parse_memory(value: &str) -> Result<MemoryConfig, BenchError> {
    match value.trim().parse::<u32>() {
        Ok(mb) if mb > 0 => Ok(MemoryConfig {
            label: value.to_string(),
            mb,
        }),
        _ => Err(BenchError::InvalidMemoryLimit {
            value: value.to_string(),
        }),
    }
}
