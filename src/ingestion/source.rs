//! Source classification and enumeration.
//!
//! A [`SourceInput`] is classified into a [`Source`] (directory, archive on disk, or archive in
//! memory) and enumerated into a flat, name-sorted list of [`FileHandle`]s. Archives on disk are
//! read into memory up front so both archive representations produce the same handles.

use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{IngestionError, IngestionResult};

/// Caller-facing source value accepted by [`crate::reader::DataReader::read`].
#[derive(Clone)]
pub enum SourceInput {
    /// A directory path or a path to an archive file.
    Path(PathBuf),
    /// An in-memory archive.
    Bytes(Bytes),
}

impl fmt::Debug for SourceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceInput::Path(p) => f.debug_tuple("Path").field(p).finish(),
            SourceInput::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
        }
    }
}

impl From<PathBuf> for SourceInput {
    fn from(p: PathBuf) -> Self {
        SourceInput::Path(p)
    }
}

impl From<&Path> for SourceInput {
    fn from(p: &Path) -> Self {
        SourceInput::Path(p.to_path_buf())
    }
}

impl From<&PathBuf> for SourceInput {
    fn from(p: &PathBuf) -> Self {
        SourceInput::Path(p.clone())
    }
}

impl From<&str> for SourceInput {
    fn from(p: &str) -> Self {
        SourceInput::Path(PathBuf::from(p))
    }
}

impl From<String> for SourceInput {
    fn from(p: String) -> Self {
        SourceInput::Path(PathBuf::from(p))
    }
}

impl From<Bytes> for SourceInput {
    fn from(b: Bytes) -> Self {
        SourceInput::Bytes(b)
    }
}

impl From<Vec<u8>> for SourceInput {
    fn from(b: Vec<u8>) -> Self {
        SourceInput::Bytes(Bytes::from(b))
    }
}

impl From<&[u8]> for SourceInput {
    fn from(b: &[u8]) -> Self {
        SourceInput::Bytes(Bytes::copy_from_slice(b))
    }
}

impl SourceInput {
    /// Decide how the input will be enumerated.
    ///
    /// Existing directory -> [`Source::Directory`], existing file -> [`Source::ArchiveFile`],
    /// bytes -> [`Source::ArchiveBytes`]. Anything else is [`IngestionError::UnsupportedSource`].
    pub fn classify(self) -> IngestionResult<Source> {
        match self {
            SourceInput::Bytes(b) => Ok(Source::ArchiveBytes(b)),
            SourceInput::Path(p) if p.is_dir() => Ok(Source::Directory(p)),
            SourceInput::Path(p) if p.is_file() => Ok(Source::ArchiveFile(p)),
            SourceInput::Path(p) => Err(IngestionError::UnsupportedSource {
                message: format!(
                    "'{}' is neither an existing directory nor an existing file",
                    p.display()
                ),
            }),
        }
    }
}

/// A classified source.
#[derive(Clone)]
pub enum Source {
    Directory(PathBuf),
    ArchiveFile(PathBuf),
    ArchiveBytes(Bytes),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Directory(p) => write!(f, "directory {}", p.display()),
            Source::ArchiveFile(p) => write!(f, "archive {}", p.display()),
            Source::ArchiveBytes(b) => write!(f, "in-memory archive ({} bytes)", b.len()),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({self})")
    }
}

impl Source {
    /// List every loadable file, sorted by logical name.
    pub fn enumerate(&self) -> IngestionResult<Vec<FileHandle>> {
        let mut handles = match self {
            Source::Directory(dir) => enumerate_directory(dir)?,
            Source::ArchiveFile(path) => enumerate_archive(Bytes::from(fs::read(path)?))?,
            Source::ArchiveBytes(bytes) => enumerate_archive(bytes.clone())?,
        };
        handles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(handles)
    }
}

/// Direct children of `dir` that are regular files, no recursion.
///
/// Symlinks count when their target is a regular file; dangling links are skipped.
pub fn enumerate_directory(dir: &Path) -> IngestionResult<Vec<FileHandle>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.path().is_file() {
            out.push(FileHandle::from_path(entry.into_path()));
        }
    }
    Ok(out)
}

/// Every file entry of a zip archive. Directory entries are skipped.
///
/// The central directory is parsed once; every handle shares it through a cloned archive.
pub fn enumerate_archive(archive: Bytes) -> IngestionResult<Vec<FileHandle>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut out = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let name = {
            let entry = zip.by_index_raw(index)?;
            if entry.is_dir() {
                continue;
            }
            entry.name().to_string()
        };
        out.push(FileHandle {
            name,
            location: Location::ArchiveEntry {
                archive: zip.clone(),
                index,
            },
        });
    }
    Ok(out)
}

/// An addressable, readable byte source plus its logical name.
#[derive(Clone)]
pub struct FileHandle {
    name: String,
    location: Location,
}

#[derive(Clone)]
enum Location {
    File(PathBuf),
    Memory(Bytes),
    ArchiveEntry {
        archive: ZipArchive<Cursor<Bytes>>,
        index: usize,
    },
}

/// What a decoder gets to read from.
pub enum Contents<'a> {
    /// A file on disk; decoders may open it directly.
    Path(&'a Path),
    /// Fully materialized bytes (archive entries, in-memory handles).
    Bytes(Bytes),
}

impl FileHandle {
    /// Handle for a file on disk. The logical name is the path as given.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.to_string_lossy().into_owned(),
            location: Location::File(path),
        }
    }

    /// Handle for an in-memory file with the given logical name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            location: Location::Memory(bytes.into()),
        }
    }

    /// Logical name (a path or an archive entry name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Access the handle's data.
    ///
    /// Archive entries are decompressed here, so this is the blocking part of a decode task.
    pub fn contents(&self) -> IngestionResult<Contents<'_>> {
        match &self.location {
            Location::File(p) => Ok(Contents::Path(p.as_path())),
            Location::Memory(b) => Ok(Contents::Bytes(b.clone())),
            Location::ArchiveEntry { archive, index } => {
                let mut zip = archive.clone();
                let mut entry = zip.by_index(*index)?;
                let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
                entry.read_to_end(&mut buf)?;
                Ok(Contents::Bytes(Bytes::from(buf)))
            }
        }
    }

    /// Read the whole handle into memory.
    pub fn read_bytes(&self) -> IngestionResult<Bytes> {
        match self.contents()? {
            Contents::Path(p) => Ok(Bytes::from(fs::read(p)?)),
            Contents::Bytes(b) => Ok(b),
        }
    }

    /// Read the whole handle as UTF-8 text.
    pub fn read_to_string(&self) -> IngestionResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| IngestionError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.location {
            Location::File(_) => "file",
            Location::Memory(_) => "memory",
            Location::ArchiveEntry { .. } => "archive-entry",
        };
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_path_is_unsupported_source() {
        let err = SourceInput::from("/definitely/not/here/xyz").classify().unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedSource { .. }));
    }

    #[test]
    fn bytes_classify_as_archive_without_inspection() {
        let src = SourceInput::from(vec![1_u8, 2, 3]).classify().unwrap();
        assert!(matches!(src, Source::ArchiveBytes(_)));
    }

    #[test]
    fn invalid_archive_bytes_fail_at_enumeration() {
        let src = SourceInput::from(b"not a zip".as_slice()).classify().unwrap();
        let err = src.enumerate().unwrap_err();
        assert!(matches!(err, IngestionError::Zip(_)));
    }

    #[test]
    fn archive_handles_read_their_own_entries() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.add_directory("sub/", SimpleFileOptions::default()).unwrap();
        for (name, body) in [("b.csv", "id\n2\n"), ("a.csv", "id\n1\n"), ("sub/c.csv", "id\n3\n")] {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let handles = SourceInput::from(bytes).classify().unwrap().enumerate().unwrap();
        let names: Vec<&str> = handles.iter().map(FileHandle::name).collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "sub/c.csv"]);
        assert_eq!(handles[1].read_to_string().unwrap(), "id\n2\n");
        assert_eq!(handles[0].read_to_string().unwrap(), "id\n1\n");
        assert_eq!(handles[2].read_to_string().unwrap(), "id\n3\n");
    }

    #[test]
    fn in_memory_handle_reads_back() {
        let h = FileHandle::from_bytes("a.csv", "id\n1\n");
        assert_eq!(h.name(), "a.csv");
        assert_eq!(h.read_to_string().unwrap(), "id\n1\n");
    }
}
