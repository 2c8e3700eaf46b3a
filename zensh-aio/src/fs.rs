/*
File: zensh-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations shared by the extractor and installer.
*/
use std::{
    fs::{self, File, OpenOptions, Permissions},
    io::{self, BufWriter, Read, Write},
    os::unix::fs::{symlink, OpenOptionsExt, PermissionsExt},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use tempfile::NamedTempFile;
use tracing::{debug, error};
use zensh_common::error::{Result, ZenshError};

/// Creates `path` (and parents) if missing. Succeeds when it already is a
/// directory, fails when something else sits there.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ZenshError::DirectoryAlreadyExists(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Creating directory recursively: {}", path.display());
            fs::create_dir_all(path).map_err(|e| {
                error!("Failed create dir {}: {}", path.display(), e);
                ZenshError::from(e)
            })
        }
        Err(e) => Err(ZenshError::from(e)),
    }
}

/// Removes a directory and all its contents. Returns `false` when nothing was there.
pub fn remove_directory_recursive(path: &Path) -> Result<bool> {
    debug!("Removing directory recursively: {}", path.display());
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            error!("Failed remove dir_all {}: {}", path.display(), e);
            Err(ZenshError::from(e))
        }
    }
}

/// Joins an archive-relative path onto `root`, refusing anything that would
/// escape it. `None` for paths with no normal component (e.g. `./`).
pub fn safe_join(root: &Path, relative: &Path) -> Result<Option<PathBuf>> {
    let mut out = root.to_path_buf();
    let mut pushed = false;
    for comp in relative.components() {
        match comp {
            Component::Normal(p) => {
                out.push(p);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                error!(
                    "Disallowed/unsafe component {:?} in archive path {}",
                    comp,
                    relative.display()
                );
                return Err(ZenshError::UnsafePath(relative.display().to_string()));
            }
        }
    }
    Ok(pushed.then_some(out))
}

/// Streams `reader` into a new file created with `mode` (subject to umask).
pub fn write_file_with_mode<R: Read + ?Sized>(path: &Path, reader: &mut R, mode: u32) -> Result<u64> {
    debug!("Writing file {} (mode {:o})", path.display(), mode);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| {
            error!("Failed create file {}: {}", path.display(), e);
            ZenshError::from(e)
        })?;
    let mut writer = BufWriter::new(file);
    let written = io::copy(reader, &mut writer)?;
    writer.flush()?;
    Ok(written)
}

/// Creates a symbolic link at `link` pointing to `target`.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    debug!("Creating symlink {} -> {}", link.display(), target.display());
    symlink(target, link).map_err(|e| {
        error!(
            "Failed create symlink {} -> {}: {}",
            link.display(),
            target.display(),
            e
        );
        ZenshError::from(e)
    })
}

/// Creates a hard link at `link` to the existing file `original`.
pub fn create_hard_link(original: &Path, link: &Path) -> Result<()> {
    debug!("Creating hard link {} => {}", link.display(), original.display());
    fs::hard_link(original, link).map_err(|e| {
        error!(
            "Failed create hard link {} => {}: {}",
            link.display(),
            original.display(),
            e
        );
        ZenshError::from(e)
    })
}

/// Sets permission bits. Only the lower 12 bits of `mode` are used.
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    let mode = mode & 0o7777;
    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|e| {
        error!("Failed set permissions on {}: {}", path.display(), e);
        ZenshError::from(e)
    })
}

/// Atomically writes data to a file using a temporary file in the same directory.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        ZenshError::Generic(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    ensure_dir(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();
    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        ZenshError::Io(Arc::new(e.error))
    })?;

    set_permissions(original_path, 0o644)
}

/// Opens an existing file for reading.
pub fn open_file(path: &Path) -> Result<File> {
    debug!("Opening file: {}", path.display());
    File::open(path).map_err(ZenshError::from)
}
