//! File helpers used through namespace joins

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use hostns_core::{Error, FileInfo, Result};
use tracing::debug;

/// Read a whole file as UTF-8
pub fn read_file_content(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io_at(path, e))
}

/// Write `content` to `path`, creating parent directories and truncating
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::io_at(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::io_at(path, e))
}

/// Flush a file's data and metadata to disk
pub fn sync_file(path: &Path) -> Result<()> {
    File::open(path)
        .and_then(|file| file.sync_all())
        .map_err(|e| Error::io_at(path, e))
}

/// Create `path` and its parents, then set its modification time
pub fn create_directory(path: &Path, modified: SystemTime) -> Result<PathBuf> {
    fs::create_dir_all(path).map_err(|e| Error::io_at(path, e))?;

    File::open(path)
        .and_then(|dir| dir.set_modified(modified))
        .map_err(|e| Error::io_at(path, e))?;

    debug!(path = %path.display(), "Created directory");
    Ok(path.to_path_buf())
}

/// Recursively copy the directory `src` to `dst`
///
/// Fails with `AlreadyExists` if `dst` exists and `overwrite` is false.
pub fn copy_directory(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    let metadata = fs::metadata(src).map_err(|e| Error::io_at(src, e))?;
    if !metadata.is_dir() {
        return Err(Error::InvalidConfig {
            message: format!("not a directory: {}", src.display()),
        });
    }

    if !overwrite && dst.exists() {
        return Err(Error::io_at(dst, io::ErrorKind::AlreadyExists.into()));
    }

    copy_tree(src, dst, true)
}

/// Copy a file, or every file under a directory, from `src` to `dst`
///
/// Existing destination files are replaced only when `overwrite` is true.
pub fn copy_files(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    let metadata = fs::metadata(src).map_err(|e| Error::io_at(src, e))?;
    if metadata.is_dir() {
        copy_tree(src, dst, overwrite)
    } else {
        copy_file(src, dst, overwrite)
    }
}

fn copy_tree(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::io_at(dst, e))?;

    for entry in fs::read_dir(src).map_err(|e| Error::io_at(src, e))? {
        let entry = entry.map_err(|e| Error::io_at(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if entry.file_type().map_err(|e| Error::io_at(&from, e))?.is_dir() {
            copy_tree(&from, &to, overwrite)?;
        } else {
            copy_file(&from, &to, overwrite)?;
        }
    }

    Ok(())
}

fn copy_file(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && dst.exists() {
        return Err(Error::io_at(dst, io::ErrorKind::AlreadyExists.into()));
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }

    fs::copy(src, dst).map_err(|e| Error::io_at(src, e))?;
    Ok(())
}

/// Remove a directory and everything below it
pub fn delete_directory(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| Error::io_at(path, e))
}

/// Remove a file or directory tree; a missing path is not an error
pub fn delete_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io_at(path, e)),
    };

    if metadata.is_dir() {
        delete_directory(path)
    } else {
        fs::remove_file(path).map_err(|e| Error::io_at(path, e))
    }
}

/// Entries of a directory, sorted by path
pub fn read_directory(path: &Path) -> Result<Vec<FileInfo>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(path).map_err(|e| Error::io_at(path, e))? {
        let entry = entry.map_err(|e| Error::io_at(path, e))?;
        let entry_path = entry.path();
        let metadata = entry.metadata().map_err(|e| Error::io_at(&entry_path, e))?;
        entries.push(file_info(entry_path, &metadata)?);
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Zero-length regular files anywhere under `dir`
pub fn get_empty_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut empty = Vec::new();
    collect_empty_files(dir, &mut empty)?;
    empty.sort();
    Ok(empty)
}

fn collect_empty_files(dir: &Path, empty: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| Error::io_at(dir, e))? {
        let entry = entry.map_err(|e| Error::io_at(dir, e))?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| Error::io_at(&path, e))?;

        if metadata.is_dir() {
            collect_empty_files(&path, empty)?;
        } else if metadata.is_file() && metadata.len() == 0 {
            empty.push(path);
        }
    }

    Ok(())
}

/// Metadata of a single path
pub fn get_file_info(path: &Path) -> Result<FileInfo> {
    let metadata = fs::metadata(path).map_err(|e| Error::io_at(path, e))?;
    file_info(path.to_path_buf(), &metadata)
}

fn file_info(path: PathBuf, metadata: &Metadata) -> Result<FileInfo> {
    let modified = metadata.modified().map_err(|e| Error::io_at(&path, e))?;

    Ok(FileInfo {
        size: metadata.len(),
        is_dir: metadata.is_dir(),
        mode: metadata.permissions().mode(),
        modified,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.txt");

        write_file(&path, "hello").unwrap();
        sync_file(&path).unwrap();

        assert_eq!(read_file_content(&path).unwrap(), "hello");

        write_file(&path, "bye").unwrap();
        assert_eq!(read_file_content(&path).unwrap(), "bye");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_file_content(Path::new("/nonexistent/file")).unwrap_err();
        assert!(matches!(err, Error::IoAt { .. }));
    }

    #[test]
    fn test_create_directory_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b");
        let mtime = UNIX_EPOCH + Duration::from_secs(1_600_000_000);

        let created = create_directory(&path, mtime).unwrap();

        assert_eq!(created, path);
        let info = get_file_info(&path).unwrap();
        assert!(info.is_dir);
        assert_eq!(info.modified, mtime);
    }

    #[test]
    fn test_copy_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        write_file(&src.join("a.txt"), "a").unwrap();
        write_file(&src.join("sub").join("b.txt"), "b").unwrap();

        copy_directory(&src, &dst, false).unwrap();

        assert_eq!(read_file_content(&dst.join("a.txt")).unwrap(), "a");
        assert_eq!(read_file_content(&dst.join("sub").join("b.txt")).unwrap(), "b");

        assert!(copy_directory(&src, &dst, false).is_err());
        copy_directory(&src, &dst, true).unwrap();
    }

    #[test]
    fn test_copy_files_respects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        write_file(&src, "new").unwrap();
        write_file(&dst, "old").unwrap();

        assert!(copy_files(&src, &dst, false).is_err());
        assert_eq!(read_file_content(&dst).unwrap(), "old");

        copy_files(&src, &dst, true).unwrap();
        assert_eq!(read_file_content(&dst).unwrap(), "new");
    }

    #[test]
    fn test_delete_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        let tree = dir.path().join("tree");
        write_file(&file, "x").unwrap();
        write_file(&tree.join("inner"), "y").unwrap();

        delete_path(&file).unwrap();
        delete_path(&tree).unwrap();
        delete_path(&dir.path().join("missing")).unwrap();

        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn test_delete_directory_missing() {
        assert!(delete_directory(Path::new("/nonexistent/dir")).is_err());
    }

    #[test]
    fn test_read_directory_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("b"), "").unwrap();
        write_file(&dir.path().join("a"), "data").unwrap();
        write_file(&dir.path().join("sub").join("c"), "").unwrap();

        let entries = read_directory(dir.path()).unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "sub"]);
        assert_eq!(entries[0].size, 4);
        assert!(entries[2].is_dir);

        let empty = get_empty_files(dir.path()).unwrap();
        assert_eq!(
            empty,
            vec![dir.path().join("b"), dir.path().join("sub").join("c")]
        );
    }
}
