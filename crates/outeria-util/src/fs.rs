use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temp file path used while staging `path`: `.<name>.tmp.<pid>` in the same directory,
/// so the final rename never crosses a filesystem boundary.
fn staging_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ))
}

fn write_staged(temp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn rename_into_place(temp: &Path, path: &Path) -> io::Result<()> {
    match fs::rename(temp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists.
            if cfg!(windows) {
                fs::copy(temp, path)?;
                let _ = fs::remove_file(temp);
                Ok(())
            } else {
                let _ = fs::remove_file(temp);
                Err(e)
            }
        }
    }
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// Readers see either the old contents or the new contents, never a partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = staging_path(path);
    if let Err(e) = write_staged(&temp, bytes) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    rename_into_place(&temp, path)
}

/// Write a set of files as one unit.
///
/// Every file is staged first; only when all staged writes succeed are they renamed
/// into place. If staging fails, no target file is touched and the staged temp
/// files are removed. Parent directories are created as needed.
///
/// # Errors
/// Returns the first staging or rename error.
pub fn atomic_write_all(files: &[(PathBuf, Vec<u8>)]) -> io::Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());

    for (path, bytes) in files {
        let temp = staging_path(path);
        let result = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| write_staged(&temp, bytes));

        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            for (t, _) in &staged {
                let _ = fs::remove_file(t);
            }
            return Err(e);
        }
        staged.push((temp, path.as_path()));
    }

    for (temp, path) in staged {
        rename_into_place(&temp, path)?;
    }
    Ok(())
}

/// Remove a file, treating "not found" as success.
///
/// # Errors
/// Returns any error other than `NotFound`.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// `path` relative to `root` with forward slashes, or `path` unchanged when it
/// lies outside `root`.
#[must_use]
pub fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.js");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_atomic_write_no_temp_left_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.js");

        atomic_write(&path, b"content").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].as_ref().unwrap().file_name().to_str().unwrap(),
            "bundle.js"
        );
    }

    #[test]
    fn test_atomic_write_all_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let js = dir.path().join("dist/outeria.min.js");
        let map = dir.path().join("dist/outeria.min.js.map");

        atomic_write_all(&[(js.clone(), b"js".to_vec()), (map.clone(), b"{}".to_vec())])
            .unwrap();

        assert_eq!(fs::read_to_string(js).unwrap(), "js");
        assert_eq!(fs::read_to_string(map).unwrap(), "{}");
        assert_eq!(fs::read_dir(dir.path().join("dist")).unwrap().count(), 2);
    }

    #[test]
    fn test_atomic_write_all_leaves_targets_untouched_on_failure() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("outeria.min.js");
        fs::write(&good, "old").unwrap();

        // A regular file used as a directory makes the second staging write fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let bad = blocker.join("outeria.min.css");

        let result = atomic_write_all(&[(good.clone(), b"new".to_vec()), (bad, b"css".to_vec())]);
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&good).unwrap(), "old");

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.contains(".tmp.")), "{names:?}");
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stale.js");
        assert!(!remove_if_exists(&path).unwrap());

        fs::write(&path, "stale").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_relative_display() {
        assert_eq!(
            relative_display(Path::new("/p"), Path::new("/p/src/outeria.scss")),
            "src/outeria.scss"
        );
        assert_eq!(
            relative_display(Path::new("/p"), Path::new("/q/x.css")),
            "/q/x.css"
        );
    }
}
