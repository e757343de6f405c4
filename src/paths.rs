//! Typed paths for the files an enrichment run owns.
//!
//! The checkpoint log, progressive snapshot and run report sit next to the
//! output file unless overridden, so re-running the same command resumes.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunPaths {
    output: PathBuf,
    checkpoint: PathBuf,
    snapshot: PathBuf,
}

impl RunPaths {
    /// Derive sibling paths from `output`, honoring explicit overrides.
    pub fn for_output(output: &Path, checkpoint: Option<&Path>, snapshot: Option<&Path>) -> Self {
        Self {
            output: output.to_path_buf(),
            checkpoint: checkpoint
                .map(Path::to_path_buf)
                .unwrap_or_else(|| sibling(output, ".checkpoint.jsonl")),
            snapshot: snapshot
                .map(Path::to_path_buf)
                .unwrap_or_else(|| sibling(output, ".partial.json")),
        }
    }

    /// Final enriched collection.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Append-only checkpoint log.
    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    /// Progressive snapshot overwritten after every record.
    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }

    /// Machine-readable run summary.
    pub fn report(&self) -> PathBuf {
        sibling(&self.output, ".report.json")
    }
}

/// `dir/name.json` -> `dir/name<suffix>`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| OsString::from("awards"));
    let mut name = stem;
    name.push(suffix);
    path.with_file_name(name)
}
