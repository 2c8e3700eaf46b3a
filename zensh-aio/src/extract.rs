// zensh-aio/src/extract.rs
// Sniffs the container format of a byte stream and unpacks it, unwrapping
// nested compression layers until an archive or a plain file is reached.

use std::fmt;
use std::fs;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, error};
use xz2::read::XzDecoder;
use zensh_common::error::{Result, ZenshError};
use zip::ZipArchive;

use crate::fs::{
    create_hard_link, create_symlink, ensure_dir, safe_join, set_permissions,
    write_file_with_mode,
};

/// Bytes needed to see every signature; the tar magic sits at 0x101.
pub const DETECT_LENGTH: usize = 0x101 + 8;

const DEFAULT_FILE_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    GZip,
    BZip2,
    Xz,
    Zip,
    Tar,
    Unknown,
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveType::GZip => "GZip",
            ArchiveType::BZip2 => "BZip2",
            ArchiveType::Xz => "Xz",
            ArchiveType::Zip => "Zip",
            ArchiveType::Tar => "Tar",
            ArchiveType::Unknown => "Unknown",
        })
    }
}

const SIGNATURES: &[(ArchiveType, usize, &[u8])] = &[
    (ArchiveType::GZip, 0, b"\x1f\x8b"),
    (ArchiveType::BZip2, 0, b"BZh"),
    (ArchiveType::Xz, 0, b"\xfd7zXZ\x00"),
    (ArchiveType::Zip, 0, b"PK\x03\x04"),
    (ArchiveType::Tar, 0x101, b"ustar\x0000"),
    (ArchiveType::Tar, 0x101, b"ustar  \x00"),
];

/// Classifies a stream prefix by its magic bytes.
pub fn classify(head: &[u8]) -> ArchiveType {
    SIGNATURES
        .iter()
        .find(|(_, offset, magic)| head.get(*offset..offset + magic.len()) == Some(*magic))
        .map_or(ArchiveType::Unknown, |(kind, _, _)| *kind)
}

/// A reader that can look ahead without consuming.
pub struct PeekReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Returns the next `n` bytes without consuming them. Errors with
    /// `UnexpectedEof` if the stream ends first.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let mut chunk = [0u8; 8192];
        while self.buf.len() < n {
            let read = match self.inner.read(&mut chunk) {
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream ended after {} bytes, {} needed to detect its type",
                        self.buf.len(),
                        n
                    ),
                ));
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(&self.buf[..n])
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let n = out.len().min(self.buf.len() - self.pos);
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            if self.pos == self.buf.len() {
                self.buf.clear();
                self.pos = 0;
            }
            return Ok(n);
        }
        self.inner.read(out)
    }
}

/// Detects the container type of `reader` without consuming any bytes.
pub fn detect<R: Read>(reader: &mut PeekReader<R>) -> Result<ArchiveType> {
    let head = reader.peek(DETECT_LENGTH)?;
    Ok(classify(head))
}

/// Unpacks `reader` into `destination`.
///
/// Compressed streams are decompressed and detected again, so `tar.gz`,
/// `tar.xz` and friends need no special casing. Tar and zip archives are
/// walked entry by entry and then flattened: a lone top-level directory is
/// hoisted into `destination`. Anything unrecognised is written verbatim as
/// `default_name` inside `destination`.
pub fn extract_archive<R: Read>(destination: &Path, default_name: &str, reader: R) -> Result<()> {
    debug!(
        "Extracting stream into '{}' (default name '{}')",
        destination.display(),
        default_name
    );
    unpack(destination, default_name, Box::new(reader))
}

fn unpack<'a>(destination: &Path, default_name: &str, reader: Box<dyn Read + 'a>) -> Result<()> {
    let mut reader = PeekReader::new(reader);
    let kind = detect(&mut reader)?;
    debug!("Detected {} stream for {}", kind, destination.display());

    match kind {
        ArchiveType::GZip => unpack(destination, default_name, Box::new(GzDecoder::new(reader))),
        ArchiveType::BZip2 => unpack(destination, default_name, Box::new(BzDecoder::new(reader))),
        ArchiveType::Xz => unpack(destination, default_name, Box::new(XzDecoder::new(reader))),
        ArchiveType::Tar => {
            extract_tar(destination, reader)?;
            flatten_single_directory(destination)
        }
        ArchiveType::Zip => {
            extract_zip(destination, reader)?;
            flatten_single_directory(destination)
        }
        ArchiveType::Unknown => write_single_file(destination, default_name, reader),
    }
}

fn write_single_file<R: Read>(destination: &Path, default_name: &str, mut reader: R) -> Result<()> {
    let file_name = Path::new(default_name)
        .file_name()
        .ok_or_else(|| ZenshError::UnsafePath(default_name.to_string()))?;
    ensure_dir(destination)?;
    let target = destination.join(file_name);
    let written = write_file_with_mode(&target, &mut reader, DEFAULT_FILE_MODE)?;
    debug!("Wrote {} bytes to {}", written, target.display());
    Ok(())
}

fn extract_tar<R: Read>(destination: &Path, reader: R) -> Result<()> {
    ensure_dir(destination)?;
    let mut archive = Archive::new(reader);

    for entry_result in archive.entries()? {
        let mut entry = entry_result.map_err(|e| {
            ZenshError::Generic(format!(
                "Error reading TAR entry for {}: {}",
                destination.display(),
                e
            ))
        })?;
        let entry_type = entry.header().entry_type();

        // Metadata records, not filesystem entries.
        if matches!(
            entry_type,
            EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName | EntryType::GNULongLink
        ) {
            continue;
        }

        let original_path = entry.path()?.into_owned();
        let Some(target) = safe_join(destination, &original_path)? else {
            continue;
        };
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        let mode = entry.header().mode().ok();

        match entry_type {
            EntryType::Regular | EntryType::Continuous => {
                write_file_with_mode(&target, &mut entry, mode.unwrap_or(0o644) & 0o7777)?;
            }
            EntryType::Link => {
                let link_name = required_link_name(entry.link_name()?, &original_path)?;
                let original = safe_join(destination, &link_name)?
                    .ok_or_else(|| ZenshError::UnsafePath(link_name.display().to_string()))?;
                create_hard_link(&original, &target)?;
            }
            EntryType::Symlink => {
                let link_name = required_link_name(entry.link_name()?, &original_path)?;
                create_symlink(&link_name, &target)?;
            }
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
                if let Some(mode) = mode {
                    set_permissions(&target, mode)?;
                }
            }
            other => {
                error!(
                    "Unsupported TAR entry type {:?} for {}",
                    other,
                    original_path.display()
                );
                return Err(ZenshError::UnknownEntryType(other.as_byte() as char));
            }
        }
    }
    Ok(())
}

fn required_link_name(
    link_name: Option<std::borrow::Cow<'_, Path>>,
    entry_path: &Path,
) -> Result<std::path::PathBuf> {
    link_name.map(|l| l.into_owned()).ok_or_else(|| {
        ZenshError::Generic(format!("link entry {} has no target", entry_path.display()))
    })
}

fn extract_zip<R: Read>(destination: &Path, mut reader: R) -> Result<()> {
    // The zip central directory lives at the end, so spool the stream first.
    let mut spool = tempfile::tempfile()?;
    io::copy(&mut reader, &mut spool)?;
    spool.seek(SeekFrom::Start(0))?;

    let mut archive = ZipArchive::new(BufReader::new(spool))
        .map_err(|e| ZenshError::Generic(format!("Failed to open ZIP: {e}")))?;
    ensure_dir(destination)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ZenshError::Generic(format!("Failed to access ZIP entry: {e}")))?;
        let relative = file
            .enclosed_name()
            .ok_or_else(|| ZenshError::UnsafePath(file.name().to_string()))?;
        let Some(target) = safe_join(destination, &relative)? else {
            continue;
        };
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        let mode = file.unix_mode();

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            if let Some(mode) = mode {
                set_permissions(&target, mode)?;
            }
        } else if file.is_symlink() {
            let mut link = String::new();
            file.read_to_string(&mut link)?;
            create_symlink(Path::new(&link), &target)?;
        } else {
            write_file_with_mode(&target, &mut file, mode.unwrap_or(0o644) & 0o7777)?;
        }
    }
    Ok(())
}

/// While `destination` holds exactly one entry and it is a directory, moves
/// that directory's children up one level and removes it.
pub fn flatten_single_directory(destination: &Path) -> Result<()> {
    loop {
        let entries = fs::read_dir(destination)?.collect::<io::Result<Vec<_>>>()?;
        let [only] = entries.as_slice() else {
            return Ok(());
        };
        if !only.file_type()?.is_dir() {
            return Ok(());
        }

        // Rename first so a grandchild sharing the wrapper's name cannot collide.
        let staging = destination.join(format!(".zensh-flatten-{}", std::process::id()));
        debug!(
            "Flattening wrapper directory {} into {}",
            only.path().display(),
            destination.display()
        );
        fs::rename(only.path(), &staging)?;
        for child in fs::read_dir(&staging)? {
            let child = child?;
            fs::rename(child.path(), destination.join(child.file_name()))?;
        }
        fs::remove_dir(&staging)?;
    }
}
