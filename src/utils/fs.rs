use crate::error::{BinwrapError, Result};
use std::path::{Component, Path, PathBuf};

/// Create `path` and any missing parents with mode 0755.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }

        builder
            .create(path)
            .map_err(|e| BinwrapError::at_path(path, e))?;
    }
    Ok(())
}

pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| BinwrapError::at_path(path, e))?;
    }

    // On Windows, executable permission is determined by file extension
    #[cfg(windows)]
    {
        let _ = path;
    }

    Ok(())
}

pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| BinwrapError::at_path(path, e))?;
    }

    #[cfg(windows)]
    {
        let _ = (path, mode);
    }

    Ok(())
}

/// Join an archive entry name onto `root` without touching the filesystem.
///
/// Returns `Ok(None)` when the entry names the root itself. Absolute entries
/// are re-rooted under `root`; any `..` that climbs above `root` is rejected.
pub fn join_within(root: &Path, entry: &str) -> Result<Option<PathBuf>> {
    let mut relative = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(entry).components() {
        match component {
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Component::ParentDir => {
                if depth == 0 {
                    return Err(BinwrapError::IllegalEntryPath {
                        entry: entry.to_string(),
                    });
                }
                relative.pop();
                depth -= 1;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if depth == 0 {
        return Ok(None);
    }

    Ok(Some(root.join(relative)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_within_keeps_nested_paths() {
        let root = Path::new("/dest");
        assert_eq!(
            join_within(root, "bin/tool").unwrap(),
            Some(PathBuf::from("/dest/bin/tool"))
        );
        assert_eq!(
            join_within(root, "./a/../b").unwrap(),
            Some(PathBuf::from("/dest/b"))
        );
        assert_eq!(
            join_within(root, "/etc/passwd").unwrap(),
            Some(PathBuf::from("/dest/etc/passwd"))
        );
    }

    #[test]
    fn test_join_within_root_itself() {
        assert_eq!(join_within(Path::new("/dest"), "./").unwrap(), None);
        assert_eq!(join_within(Path::new("/dest"), "a/..").unwrap(), None);
    }

    #[test]
    fn test_join_within_rejects_escape() {
        let root = Path::new("/dest");
        for entry in ["../evil", "a/../../evil", "./../x", ".."] {
            let err = join_within(root, entry).unwrap_err();
            assert!(
                matches!(err, BinwrapError::IllegalEntryPath { .. }),
                "{entry} should be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_dir_exists_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("a/b/c");
        ensure_dir_exists(&dir).unwrap();
        assert!(dir.is_dir());

        let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        // umask may only remove bits
        assert_eq!(mode & !0o755, 0);
    }
}
