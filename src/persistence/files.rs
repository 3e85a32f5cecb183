use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of the data directory, both local and in the home directory
pub const DATA_DIR_NAME: &str = ".taskclock";

/// Get the data directory - checks for local .taskclock first, then falls back to global ~/.taskclock
pub fn get_data_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;

    if let Some(local_dir) = find_local_data_dir(&current_dir) {
        return Ok(local_dir);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DATA_DIR_NAME))
}

/// Resolve the data directory, preferring an explicit override
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => get_data_dir(),
    }
}

/// Find local .taskclock directory by walking up the directory tree
fn find_local_data_dir(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let candidate = current.join(DATA_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        current = current.parent()?;
    }
}

/// Ensure a directory exists
pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(dir.to_path_buf())
}

/// Initialize a local .taskclock directory inside `parent`
pub fn init_local_data_dir<P: AsRef<Path>>(parent: P) -> Result<PathBuf> {
    let data_dir = parent.as_ref().join(DATA_DIR_NAME);

    if data_dir.exists() {
        anyhow::bail!("Data directory already exists: {}", data_dir.display());
    }

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create directory: {}", data_dir.display()))?;

    Ok(data_dir)
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .context("File path has no parent directory")?;

    ensure_dir(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)
        .context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, `None` if the file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir().unwrap();
        assert!(dir.to_string_lossy().contains(DATA_DIR_NAME));
    }

    #[test]
    fn test_resolve_data_dir_prefers_override() {
        let dir = resolve_data_dir(Some(PathBuf::from("/tmp/custom"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn test_find_local_data_dir_walks_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = init_local_data_dir(temp_dir.path()).unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_local_data_dir(&nested), Some(data_dir));
    }

    #[test]
    fn test_init_local_data_dir_twice_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        init_local_data_dir(temp_dir.path()).unwrap();
        assert!(init_local_data_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.json");

        atomic_write(&test_file, "{}").unwrap();

        let read_content = read_file(&test_file).unwrap();
        assert_eq!(read_content.as_deref(), Some("{}"));
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nested").join("state.json");

        atomic_write(&test_file, "[]").unwrap();
        assert!(test_file.exists());
    }

    #[test]
    fn test_read_nonexistent_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nonexistent.json");

        assert!(read_file(&test_file).unwrap().is_none());
    }
}
