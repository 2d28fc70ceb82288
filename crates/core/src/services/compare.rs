//! Equivalence judgement between two tool outputs.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::model::BinaryMetadata;
use crate::services::inspect::MetadataExtractor;

pub const IDENTICAL: &str = "identical";

/// Verdict plus a one-line diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub equivalent: bool,
    pub message: String,
}

impl Comparison {
    fn equivalent(message: impl Into<String>) -> Self {
        Self { equivalent: true, message: message.into() }
    }

    fn different(message: impl Into<String>) -> Self {
        Self { equivalent: false, message: message.into() }
    }
}

/// Strict-mode diagnostic for two byte buffers that are not identical.
///
/// Reports the first differing offset, or the size mismatch when one buffer
/// is a prefix of the other. Returns `None` for identical buffers.
pub fn byte_difference(a: &[u8], b: &[u8]) -> Option<String> {
    if let Some((offset, (x, y))) = a.iter().zip(b).enumerate().find(|(_, (x, y))| x != y) {
        return Some(format!("First difference at offset 0x{offset:x}: 0x{x:02x} vs 0x{y:02x}"));
    }
    if a.len() != b.len() {
        return Some(format!("Size difference: {} vs {} bytes", a.len(), b.len()));
    }
    None
}

/// Load-command fields that differ between two snapshots, `a` named first.
///
/// Identity must match exactly; search paths and referenced libraries are
/// compared as sets since dyld does not assign meaning to their order.
pub fn structural_differences(a: &BinaryMetadata, b: &BinaryMetadata) -> Vec<String> {
    let mut diffs = Vec::new();
    if a.identity_path != b.identity_path {
        diffs.push(format!(
            "install_name: {} vs {}",
            format_identity(&a.identity_path),
            format_identity(&b.identity_path)
        ));
    }
    if as_set(&a.search_paths) != as_set(&b.search_paths) {
        diffs.push(format!(
            "rpaths: {} vs {}",
            format_list(&a.search_paths),
            format_list(&b.search_paths)
        ));
    }
    if as_set(&a.referenced_libraries) != as_set(&b.referenced_libraries) {
        diffs.push(format!(
            "dylibs: {} vs {}",
            format_list(&a.referenced_libraries),
            format_list(&b.referenced_libraries)
        ));
    }
    diffs
}

fn as_set(items: &[String]) -> BTreeSet<&str> {
    items.iter().map(String::as_str).collect()
}

fn format_identity(identity: &Option<String>) -> String {
    identity.clone().unwrap_or_else(|| "None".to_string())
}

/// `['a', 'b']`; `[]` when empty.
pub fn format_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", quoted.join(", "))
}

pub struct Comparator<'a> {
    pub extractor: &'a MetadataExtractor<'a>,
}

impl<'a> Comparator<'a> {
    pub fn new(extractor: &'a MetadataExtractor<'a>) -> Self {
        Self { extractor }
    }

    /// Decide whether the files at `a` and `b` are equivalent.
    ///
    /// Byte-identical files are always equivalent. Otherwise strict mode
    /// reports the byte-level difference and structural mode re-inspects both
    /// files and compares identity, search paths and referenced libraries.
    pub fn compare(&self, a: &Path, b: &Path, strict: bool) -> io::Result<Comparison> {
        let data_a = fs::read(a)?;
        let data_b = fs::read(b)?;

        if data_a == data_b {
            return Ok(Comparison::equivalent(IDENTICAL));
        }

        if strict {
            let message = byte_difference(&data_a, &data_b)
                .unwrap_or_else(|| "Unknown difference".to_string());
            return Ok(Comparison::different(message));
        }

        let meta_a = self.extractor.load_commands(a);
        let meta_b = self.extractor.load_commands(b);
        let diffs = structural_differences(&meta_a, &meta_b);
        if !diffs.is_empty() {
            return Ok(Comparison::different(diffs.join("; ")));
        }

        let size_diff = data_a.len().abs_diff(data_b.len());
        Ok(Comparison::equivalent(format!("Structural match (size diff: {size_diff} bytes)")))
    }
}
