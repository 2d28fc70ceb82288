//! Harness configuration: where the external tools live and how long each
//! invocation may take.
//!
//! Precedence, lowest to highest: built-in defaults, an optional config file
//! (JSON or YAML), `NAMEDIFF_*` environment variables, CLI flags. The last
//! layer is applied by the frontend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::OperationKind;

pub const REFERENCE_TOOL_ENV: &str = "NAMEDIFF_REFERENCE_TOOL";
pub const CANDIDATE_TOOL_ENV: &str = "NAMEDIFF_CANDIDATE_TOOL";
pub const OTOOL_ENV: &str = "NAMEDIFF_OTOOL";
pub const LIPO_ENV: &str = "NAMEDIFF_LIPO";

/// Executables the harness shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Trusted implementation (Apple's `install_name_tool`).
    pub reference_tool: PathBuf,
    /// Implementation under test. Frontends may build one when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_tool: Option<PathBuf>,
    /// Load-command lister, invoked as `otool -l <file>`.
    pub otool: PathBuf,
    /// Architecture lister, invoked as `lipo -info <file>`.
    pub lipo: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            reference_tool: PathBuf::from("install_name_tool"),
            candidate_tool: None,
            otool: PathBuf::from("otool"),
            lipo: PathBuf::from("lipo"),
        }
    }
}

impl ToolPaths {
    /// Overlay any `NAMEDIFF_*` variables present in the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var_os(key).map(PathBuf::from));
    }

    /// Overlay values from an arbitrary lookup; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let get = |key: &str| lookup(key).filter(|p| !p.as_os_str().is_empty());
        if let Some(p) = get(REFERENCE_TOOL_ENV) {
            self.reference_tool = p;
        }
        if let Some(p) = get(CANDIDATE_TOOL_ENV) {
            self.candidate_tool = Some(p);
        }
        if let Some(p) = get(OTOOL_ENV) {
            self.otool = p;
        }
        if let Some(p) = get(LIPO_ENV) {
            self.lipo = p;
        }
    }
}

/// Per-invocation time limits, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub tool_secs: u64,
    pub inspect_secs: u64,
    pub arch_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { tool_secs: 30, inspect_secs: 30, arch_secs: 10 }
    }
}

impl Timeouts {
    pub fn tool(&self) -> Duration {
        Duration::from_secs(self.tool_secs)
    }

    pub fn inspect(&self) -> Duration {
        Duration::from_secs(self.inspect_secs)
    }

    pub fn arch(&self) -> Duration {
        Duration::from_secs(self.arch_secs)
    }
}

/// Serializable harness configuration, typically `namediff.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub tools: ToolPaths,
    pub timeouts: Timeouts,
    /// Require byte-identical output instead of structural equivalence.
    pub strict: bool,
    /// Record universal binaries as skipped without running any tool.
    pub skip_fat: bool,
    /// Allow-list of operations; `None` selects the default four.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<OperationKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Where per-file scratch directories are created; the system temp dir
    /// when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn operations(&self) -> Vec<OperationKind> {
        self.operations.clone().unwrap_or_else(|| OperationKind::DEFAULT.to_vec())
    }
}

/// Load a config file; `.json` is parsed as JSON, anything else as YAML.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&body).context("Failed to parse config JSON")?
    } else {
        serde_yaml::from_str(&body).context("Failed to parse config YAML")?
    };
    Ok(config)
}
