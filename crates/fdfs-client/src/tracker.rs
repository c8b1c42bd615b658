//! Tracker queries
//!
//! A tracker answers one question: which storage node (and which of its
//! store paths) should serve an operation. The exchange is a single
//! request frame followed by a single response frame:
//!
//! ```text
//! HeaderSent -> HeaderReceived -> BodyReceived -> Done
//!      \              \                \
//!       +--------------+----------------+--> Failed
//! ```

use std::io::{Read, Write};

use tracing::debug;

use fdfs_core::protocol::{self, tracker_cmd, Header, QUERY_STORE_BODY_LEN};
use fdfs_core::{FileId, Result, StorageDescriptor};

/// What the storage node is needed for
#[derive(Clone, Copy, Debug)]
pub enum TrackerQuery<'a> {
    /// Any group, for a new upload
    Store,
    /// The node holding an existing file, for reading it
    Fetch(&'a FileId),
    /// The node owning an existing file, for modifying or deleting it
    Update(&'a FileId),
}

impl<'a> TrackerQuery<'a> {
    pub fn cmd(&self) -> u8 {
        match self {
            TrackerQuery::Store => tracker_cmd::QUERY_STORE_WITHOUT_GROUP_ONE,
            TrackerQuery::Fetch(_) => tracker_cmd::QUERY_FETCH_ONE,
            TrackerQuery::Update(_) => tracker_cmd::QUERY_UPDATE,
        }
    }

    pub fn target(&self) -> Option<&'a FileId> {
        match self {
            TrackerQuery::Store => None,
            TrackerQuery::Fetch(id) | TrackerQuery::Update(id) => Some(*id),
        }
    }
}

/// Ask a tracker for a storage node over an established connection.
///
/// Any error leaves the connection in an unknown protocol state.
pub fn query_storage<C: Read + Write>(
    conn: &mut C,
    query: TrackerQuery<'_>,
) -> Result<StorageDescriptor> {
    let request = protocol::tracker_query_request(query.cmd(), query.target());
    conn.write_all(&request)?;
    conn.flush()?;

    let header = Header::read_response(conn)?;
    let body = protocol::read_body(conn, header.pkg_len, QUERY_STORE_BODY_LEN)?;
    let storage = protocol::decode_storage_descriptor(&body)?;

    debug!(
        "Tracker chose storage {} (group {}, path {}) for {:?}",
        storage.addr, storage.group_name, storage.store_path_index, query
    );
    Ok(storage)
}
