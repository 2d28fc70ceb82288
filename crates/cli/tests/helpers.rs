use std::fs;
use std::path::Path;

use namediff::{canonicalize_or_current, display_name, sha256_file};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_resolves_existing_paths() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested");
    fs::create_dir_all(&nested).expect("create nested");

    let result = canonicalize_or_current(&nested).expect("canonicalize nested");
    assert_eq!(result, nested.canonicalize().expect("canonicalize nested"));
}

#[test]
fn canonicalize_or_current_joins_missing_relative_paths_onto_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current(Path::new("no-such-tool-here")).expect("fallback");
    assert_eq!(result, cwd.join("no-such-tool-here"));
}

#[test]
fn display_name_prefers_file_name() {
    assert_eq!(display_name(Path::new("/usr/lib/libz.1.dylib")), "libz.1.dylib");
    assert_eq!(display_name(Path::new("/")), "/");
}

#[test]
fn sha256_file_matches_known_hash() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("abc");
    fs::write(&path, b"abc").unwrap();
    assert_eq!(
        sha256_file(&path).unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    let err = sha256_file(&tmp.path().join("missing")).unwrap_err();
    assert!(err.to_string().contains("Failed to open file for hashing"));
}
