use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};

/// Cargo example target that provides the candidate editor.
pub const CANDIDATE_EXAMPLE: &str = "install_name_tool";

/// Where `cargo build --release --example install_name_tool` leaves the binary.
pub fn candidate_binary_path(source_root: &Path) -> PathBuf {
    source_root
        .join("target")
        .join("release")
        .join("examples")
        .join(format!("{CANDIDATE_EXAMPLE}{}", env::consts::EXE_SUFFIX))
}

/// Build the candidate tool from the crate at `source_root`.
pub fn build_candidate_tool(source_root: &Path) -> Result<PathBuf> {
    println!("Building candidate {CANDIDATE_EXAMPLE}...");
    let cargo = env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo"));
    let output = Command::new(&cargo)
        .args(["build", "--release", "--example", CANDIDATE_EXAMPLE])
        .current_dir(source_root)
        .output()
        .with_context(|| format!("Failed to spawn cargo in {}", source_root.display()))?;
    if !output.status.success() {
        return Err(anyhow!(
            "Failed to build candidate tool: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let path = candidate_binary_path(source_root);
    if !path.is_file() {
        return Err(anyhow!("Build succeeded but {} is missing", path.display()));
    }
    Ok(path)
}
