//! Core types shared by the tracker and storage exchanges

use std::fmt;
use std::str::FromStr;

use crate::error::FdfsError;
use crate::protocol::GROUP_NAME_MAX_LEN;

/// Identifier of a stored object: `<group>/<remote filename>`.
///
/// Returned by an upload and required by downloads and deletes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileId {
    /// Storage group the object lives in (at most 16 bytes)
    pub group_name: String,
    /// Name the storage node assigned, e.g. `M00/00/00/abc.jpg`
    pub remote_filename: String,
}

impl FileId {
    /// Build an identifier from its parts.
    ///
    /// Fails if the group name does not fit the 16-byte wire field.
    pub fn new(
        group_name: impl Into<String>,
        remote_filename: impl Into<String>,
    ) -> Result<Self, FdfsError> {
        let group_name = group_name.into();
        let remote_filename = remote_filename.into();
        if group_name.len() > GROUP_NAME_MAX_LEN {
            return Err(FdfsError::InvalidFileId(format!(
                "{}/{}",
                group_name, remote_filename
            )));
        }
        Ok(Self {
            group_name,
            remote_filename,
        })
    }
}

impl FromStr for FileId {
    type Err = FdfsError;

    /// Split on the first `/`; everything after it is the remote filename.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((group, remote)) => Self::new(group, remote),
            None => Err(FdfsError::InvalidFileId(s.to_string())),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_name, self.remote_filename)
    }
}

/// Storage node chosen by a tracker for exactly one operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageDescriptor {
    /// Group the storage node belongs to
    pub group_name: String,
    /// `ip:port` of the storage node
    pub addr: String,
    /// Which of the node's store paths to write into
    pub store_path_index: u8,
}
