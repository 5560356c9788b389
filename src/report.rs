use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::propagate::{CopiedFile, CopyFailure, Propagation};
use crate::settings::SettingsPatch;

/// Machine-readable summary of a run, written with `--report`.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub version: &'static str,
    pub git_hash: Option<&'static str>,
    pub root: PathBuf,
    pub dry_run: bool,
    pub copied: Vec<CopiedFile>,
    pub failed: Vec<CopyFailure>,
    pub settings: Option<SettingsPatch>,
    pub success: bool,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(root: &Path, dry_run: bool) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: option_env!("GIT_HASH"),
            root: root.to_path_buf(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_propagation(&mut self, propagation: &Propagation) {
        self.copied = propagation.copied.clone();
        self.failed = propagation.failures.clone();
    }

    pub fn finish(&mut self, outcome: &Result<()>) {
        self.success = outcome.is_ok();
        self.error = outcome.as_ref().err().map(|e| format!("{:#}", e));
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))
    }
}
