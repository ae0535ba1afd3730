//! Shared fixture documents for the workspace test suites.
//!
//! Fixtures are generic parsed trees (the loader's input format) stored under
//! `fixtures/` at the workspace root and listed in `fixtures/manifest.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    documents: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = fixtures_root().join(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

pub mod documents {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.documents.keys().cloned().collect()
    }

    /// Raw document JSON text.
    pub fn json(name: &str) -> Result<String> {
        let rel = MANIFEST
            .documents
            .get(name)
            .ok_or_else(|| anyhow!("unknown document fixture '{name}'"))?;
        read_to_string(rel)
    }

    /// Document as a generic parsed tree.
    pub fn tree(name: &str) -> Result<serde_json::Value> {
        let text = json(name)?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse fixture '{name}'"))
    }
}
