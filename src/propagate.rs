use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SetupError;

#[derive(Debug, Clone, Serialize)]
pub struct CopiedFile {
    pub name: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct Propagation {
    pub copied: Vec<CopiedFile>,
    pub failures: Vec<CopyFailure>,
    pub dry_run: bool,
}

impl Propagation {
    pub fn total(&self) -> usize {
        self.copied.len() + self.failures.len()
    }

    pub fn into_result(self) -> Result<Self, SetupError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(SetupError::Copy {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }
}

fn require_dir(what: &'static str, path: &Path) -> Result<(), SetupError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(SetupError::MissingPath {
            what,
            path: path.to_path_buf(),
        })
    }
}

// Shell-style matching: a leading `*` does not pick up dotfiles.
fn name_matches(matcher: &GlobMatcher, name: &str) -> bool {
    !name.starts_with('.') && matcher.is_match(name)
}

// Dry runs still stat the source so unreadable entries surface as failures.
fn copy_one(from: &Path, to: &Path, dry_run: bool) -> std::io::Result<u64> {
    if dry_run {
        fs::metadata(from).map(|m| m.len())
    } else {
        fs::copy(from, to)
    }
}

/// Copy every regular file in `source` whose name matches `pattern` into
/// `dest`, overwriting files of the same name.
///
/// A failed copy does not stop the remaining ones; failures are collected in
/// the returned [`Propagation`].
pub fn propagate(source: &Path, dest: &Path, pattern: &str, dry_run: bool) -> Result<Propagation, SetupError> {
    require_dir("external scripts directory", source)?;
    require_dir("project scripts directory", dest)?;
    let matcher = Glob::new(pattern)?.compile_matcher();

    let entries = fs::read_dir(source).map_err(|e| SetupError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut matched: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SetupError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if !name_matches(&matcher, &name) {
            continue;
        }
        // follows symlinks, so a link to a script is copied as its target
        if !entry.path().is_file() {
            debug!(name = %name, "skipping non-file entry");
            continue;
        }
        matched.push((name, entry.path()));
    }
    matched.sort();

    let mut out = Propagation {
        dry_run,
        ..Propagation::default()
    };
    for (name, from) in matched {
        let to = dest.join(&name);
        match copy_one(&from, &to, dry_run) {
            Ok(bytes) if dry_run => {
                info!(name = %name, to = %to.display(), bytes, "would copy");
                out.copied.push(CopiedFile { name, bytes });
            }
            Ok(bytes) => {
                info!(name = %name, to = %to.display(), bytes, "copied");
                out.copied.push(CopiedFile { name, bytes });
            }
            Err(e) => {
                warn!(name = %name, to = %to.display(), error = %e, "copy failed");
                out.failures.push(CopyFailure {
                    name,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Scripts");
        let dst = tmp.path().join("Assets").join("Scripts");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        (tmp, src, dst)
    }

    #[test]
    fn copies_matching_files_only() {
        let (_tmp, src, dst) = dirs();
        fs::write(src.join("GripperController.cs"), "class GripperController {}").unwrap();
        fs::write(src.join("PlaceTarget.cs"), "class PlaceTarget {}").unwrap();
        fs::write(src.join("README.md"), "docs").unwrap();
        fs::write(src.join("Notes.cs.meta"), "meta").unwrap();

        let out = propagate(&src, &dst, "*.cs", false).unwrap();
        let names: Vec<_> = out.copied.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["GripperController.cs", "PlaceTarget.cs"]);
        assert_eq!(
            fs::read(dst.join("PlaceTarget.cs")).unwrap(),
            fs::read(src.join("PlaceTarget.cs")).unwrap()
        );
        assert!(!dst.join("README.md").exists());
        assert!(!dst.join("Notes.cs.meta").exists());
    }

    #[test]
    fn overwrites_existing_destination_files() {
        let (_tmp, src, dst) = dirs();
        fs::write(src.join("PlaceTarget.cs"), "new").unwrap();
        fs::write(dst.join("PlaceTarget.cs"), "old contents").unwrap();
        propagate(&src, &dst, "*.cs", false).unwrap();
        assert_eq!(fs::read_to_string(dst.join("PlaceTarget.cs")).unwrap(), "new");
    }

    #[test]
    fn skips_dotfiles_and_directories() {
        let (_tmp, src, dst) = dirs();
        fs::write(src.join(".Hidden.cs"), "x").unwrap();
        fs::create_dir(src.join("Folder.cs")).unwrap();
        let out = propagate(&src, &dst, "*.cs", false).unwrap();
        assert!(out.copied.is_empty());
        assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
    }

    #[test]
    fn empty_source_is_a_no_op() {
        let (_tmp, src, dst) = dirs();
        let out = propagate(&src, &dst, "*.cs", false).unwrap().into_result().unwrap();
        assert_eq!(out.total(), 0);
    }

    #[test]
    fn dry_run_reports_without_copying() {
        let (_tmp, src, dst) = dirs();
        fs::write(src.join("PlaceTarget.cs"), "abc").unwrap();
        let out = propagate(&src, &dst, "*.cs", true).unwrap();
        assert_eq!(out.copied.len(), 1);
        assert_eq!(out.copied[0].bytes, 3);
        assert!(!dst.join("PlaceTarget.cs").exists());
    }

    #[test]
    fn missing_directories_are_reported() {
        let (tmp, src, dst) = dirs();
        let err = propagate(&tmp.path().join("nope"), &dst, "*.cs", false).unwrap_err();
        assert!(matches!(err, SetupError::MissingPath { what: "external scripts directory", .. }));
        let err = propagate(&src, &tmp.path().join("nope"), "*.cs", false).unwrap_err();
        assert!(matches!(err, SetupError::MissingPath { what: "project scripts directory", .. }));
    }

    #[test]
    fn failed_copy_does_not_stop_the_rest() {
        let (_tmp, src, dst) = dirs();
        fs::write(src.join("A.cs"), "a").unwrap();
        fs::write(src.join("B.cs"), "b").unwrap();
        // a directory in the way makes the copy of A.cs fail
        fs::create_dir(dst.join("A.cs")).unwrap();

        let out = propagate(&src, &dst, "*.cs", false).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].name, "A.cs");
        assert_eq!(out.copied.len(), 1);
        assert_eq!(fs::read_to_string(dst.join("B.cs")).unwrap(), "b");

        let err = out.into_result().unwrap_err();
        assert!(matches!(err, SetupError::Copy { failed: 1, total: 2 }));
    }

    #[test]
    fn dry_run_stat_errors_are_failures() {
        let (_tmp, src, dst) = dirs();
        let err = copy_one(&src.join("Gone.cs"), &dst.join("Gone.cs"), true).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        fs::write(src.join("Here.cs"), "1234").unwrap();
        assert_eq!(copy_one(&src.join("Here.cs"), &dst.join("Here.cs"), true).unwrap(), 4);
        assert!(!dst.join("Here.cs").exists());
    }
}
