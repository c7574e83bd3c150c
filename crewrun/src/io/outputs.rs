//! Output directory access: existence snapshot, reads, and atomic writes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Output files present before a run started.
///
/// Taken once so that files written during the run never count as
/// pre-existing for later tasks routed to the same file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    existing: BTreeSet<PathBuf>,
}

impl OutputSnapshot {
    pub fn capture<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let existing = paths
            .into_iter()
            .filter(|path| path.is_file())
            .map(Path::to_path_buf)
            .collect();
        Self { existing }
    }

    pub fn existed(&self, path: &Path) -> bool {
        self.existing.contains(path)
    }
}

pub fn read_output(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read output {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read an output file if it exists, returning `None` for missing files.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    read_output(path).map(Some)
}

/// Atomically replace `path` with `contents` (temp file + rename).
pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("output path missing parent {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("create output dir {}", parent.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("output path missing file name {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp output {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace output {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_only_sees_files_present_at_capture() {
        let temp = tempfile::tempdir().expect("tempdir");
        let before = temp.path().join("Task_Plan.md");
        let later = temp.path().join("Task_Result.md");
        fs::write(&before, "old plan").expect("write");

        let snapshot = OutputSnapshot::capture([before.as_path(), later.as_path()]);
        fs::write(&later, "new").expect("write");

        assert!(snapshot.existed(&before));
        assert!(!snapshot.existed(&later));
    }

    #[test]
    fn write_output_creates_dirs_and_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("output").join("nested").join("report.md");

        write_output(&path, "first").expect("write");
        write_output(&path, "second").expect("overwrite");

        assert_eq!(read_output(&path).expect("read"), "second");
        assert!(!path.with_file_name("report.md.tmp").exists());
    }

    #[test]
    fn read_optional_handles_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            read_optional(&temp.path().join("missing.md")).expect("read"),
            None
        );
    }
}
