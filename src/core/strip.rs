use crate::error::{BinwrapError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

fn sorted_entries(dir: &Path) -> Result<Vec<(OsString, bool)>> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| BinwrapError::at_path(dir, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| BinwrapError::at_path(dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| BinwrapError::at_path(entry.path(), e))?
            .is_dir();
        entries.push((entry.file_name(), is_dir));
    }

    entries.sort();
    Ok(entries)
}

/// Drop `count` levels of wrapping directories below `dest`.
///
/// At each level the first directory (by name) is descended into. Everything
/// found at the final level is moved up to `dest`, and the directories that
/// were descended through are removed if they ended up empty.
pub fn strip_dirs(dest: &Path, count: usize) -> Result<()> {
    if count == 0 {
        return Ok(());
    }

    let mut descended: Vec<OsString> = Vec::new();
    let mut dir = dest.to_path_buf();

    for _ in 0..count {
        let next = sorted_entries(&dir)?
            .into_iter()
            .find(|(_, is_dir)| *is_dir)
            .map(|(name, _)| name);

        match next {
            Some(name) => {
                dir.push(&name);
                descended.push(name);
            }
            None => break,
        }
    }

    if descended.is_empty() {
        tracing::debug!(dest = %dest.display(), "nothing to strip");
        return Ok(());
    }

    let payload = sorted_entries(&dir)?;

    // A payload entry named like the outermost wrapper would collide with it
    // on the way up, so move the wrapper aside first.
    let outer = dest.join(&descended[0]);
    let mut staged = outer.clone();
    if payload.iter().any(|(name, _)| *name == descended[0]) {
        staged = dest.join(format!(".binwrap-strip-{}", std::process::id()));
        std::fs::rename(&outer, &staged).map_err(|e| BinwrapError::at_path(&outer, e))?;
        dir = descended[1..].iter().fold(staged.clone(), |acc, name| acc.join(name));
    }

    for (name, _) in &payload {
        let from = dir.join(name);
        let to = dest.join(name);
        std::fs::rename(&from, &to).map_err(|e| BinwrapError::at_path(&from, e))?;
    }

    let mut wrappers: Vec<PathBuf> = Vec::with_capacity(descended.len());
    let mut current = staged;
    wrappers.push(current.clone());
    for name in &descended[1..] {
        current = current.join(name);
        wrappers.push(current.clone());
    }

    for wrapper in wrappers.iter().rev() {
        if let Err(e) = std::fs::remove_dir(wrapper) {
            tracing::debug!(path = %wrapper.display(), error = %e, "leaving wrapper directory in place");
        }
    }

    tracing::debug!(dest = %dest.display(), levels = descended.len(), "stripped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_strip_zero_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("pkg/tool"), "bin");

        strip_dirs(temp.path(), 0).unwrap();

        assert!(temp.path().join("pkg/tool").is_file());
    }

    #[test]
    fn test_strip_one_level() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("tool-1.0/tool"), "bin");
        write(&temp.path().join("tool-1.0/lib/libtool.so"), "lib");

        strip_dirs(temp.path(), 1).unwrap();

        assert_eq!(names(temp.path()), vec!["lib", "tool"]);
        assert_eq!(std::fs::read_to_string(temp.path().join("tool")).unwrap(), "bin");
        assert!(temp.path().join("lib/libtool.so").is_file());
    }

    #[test]
    fn test_strip_two_levels() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("libwebp-0.6.0/bin/cwebp"), "cwebp");
        write(&temp.path().join("libwebp-0.6.0/bin/dwebp"), "dwebp");

        strip_dirs(temp.path(), 2).unwrap();

        assert_eq!(names(temp.path()), vec!["cwebp", "dwebp"]);
    }

    #[test]
    fn test_strip_payload_named_like_wrapper() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("tool/tool"), "bin");
        write(&temp.path().join("tool/LICENSE"), "mit");

        strip_dirs(temp.path(), 1).unwrap();

        assert_eq!(names(temp.path()), vec!["LICENSE", "tool"]);
        assert_eq!(std::fs::read_to_string(temp.path().join("tool")).unwrap(), "bin");
    }

    #[test]
    fn test_strip_keeps_non_empty_wrappers() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("outer/inner/tool"), "bin");
        write(&temp.path().join("outer/NOTES"), "notes");

        strip_dirs(temp.path(), 2).unwrap();

        assert_eq!(names(temp.path()), vec!["outer", "tool"]);
        assert_eq!(names(&temp.path().join("outer")), vec!["NOTES"]);
    }

    #[test]
    fn test_strip_without_directories_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("tool"), "bin");

        strip_dirs(temp.path(), 3).unwrap();

        assert_eq!(names(temp.path()), vec!["tool"]);
    }

    #[test]
    fn test_strip_missing_dest_errors() {
        let temp = tempfile::tempdir().unwrap();
        let err = strip_dirs(&temp.path().join("nope"), 1).unwrap_err();
        assert!(matches!(err, BinwrapError::PathIo { .. }));
    }
}
