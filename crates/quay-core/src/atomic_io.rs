use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

/// Writes text using a temp file + rename so readers never observe partial data.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let temp_name = format!(
        ".{}.{}-{}.tmp",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("state"),
        std::process::id(),
        current_unix_timestamp_ms()
    );
    let temp_path = parent_dir.join(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to move temporary file {} into place at {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_text_atomic;
    use std::path::Path;

    #[test]
    fn unit_write_text_atomic_rejects_empty_path() {
        assert!(write_text_atomic(Path::new(""), "x").is_err());
    }

    #[test]
    fn unit_write_text_atomic_rejects_directory_target() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        assert!(write_text_atomic(tempdir.path(), "x").is_err());
    }

    #[test]
    fn functional_write_text_atomic_creates_missing_parents() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let nested = tempdir.path().join("a").join("b").join("state.json");
        write_text_atomic(&nested, "payload").expect("write");
        assert_eq!(std::fs::read_to_string(&nested).expect("read"), "payload");
    }

    #[test]
    fn regression_write_text_atomic_replaces_existing_file() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("state.json");
        write_text_atomic(&path, "first").expect("write first");
        write_text_atomic(&path, "second").expect("write second");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "second");
    }
}
