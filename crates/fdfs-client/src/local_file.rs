//! Local files staged for upload

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use fdfs_core::protocol::FILE_EXT_NAME_MAX_LEN;
use fdfs_core::{FdfsError, Result};

/// An open, non-empty local file with its size and extension.
///
/// The handle is closed when the value is dropped.
#[derive(Debug)]
pub struct LocalFile {
    file: File,
    path: PathBuf,
    size: u64,
    ext_name: String,
}

impl LocalFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(FdfsError::NotAFile(path.to_path_buf()));
        }
        let size = metadata.len();
        if size == 0 {
            return Err(FdfsError::EmptyFile(path.to_path_buf()));
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
            ext_name: ext_name_of(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn ext_name(&self) -> &str {
        &self.ext_name
    }
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Text after the last `.` of the file name, cut to the wire field width.
///
/// Dotfiles count: `.bashrc` has the extension `bashrc`.
pub fn ext_name_of(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    let name = name.to_string_lossy();
    match name.rsplit_once('.') {
        Some((_, ext)) => truncate_ext(ext),
        None => String::new(),
    }
}

/// Cut an extension to at most 6 bytes without splitting a character.
pub fn truncate_ext(ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    let mut end = ext.len().min(FILE_EXT_NAME_MAX_LEN);
    while !ext.is_char_boundary(end) {
        end -= 1;
    }
    ext[..end].to_string()
}
