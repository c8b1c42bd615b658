//! Storage node transfers
//!
//! Upload, download and delete over a connection to the storage node a
//! tracker picked. File bytes are streamed; nothing is buffered in full.

use std::io::{self, Read, Write};

use tracing::debug;

use fdfs_core::protocol::{self, Header, GROUP_NAME_MAX_LEN, REMOTE_FILENAME_MAX_LEN};
use fdfs_core::{FdfsError, FileId, Result};

/// Send `file_size` bytes from `source` and return the id the node assigned.
///
/// A source that ends early fails with `UnexpectedEof`; by then the frame
/// is incomplete and the connection must not be reused.
pub fn upload<C, R>(
    conn: &mut C,
    store_path_index: u8,
    file_size: u64,
    ext_name: &str,
    source: &mut R,
) -> Result<FileId>
where
    C: Read + Write,
    R: Read + ?Sized,
{
    let request = protocol::upload_request(store_path_index, file_size, ext_name);
    conn.write_all(&request)?;

    let sent = io::copy(&mut source.take(file_size), conn)?;
    if sent != file_size {
        return Err(FdfsError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source ended after {} of {} bytes", sent, file_size),
        )));
    }
    conn.flush()?;

    let header = Header::read_response(conn)?;
    let body = protocol::read_body(
        conn,
        header.pkg_len,
        GROUP_NAME_MAX_LEN + REMOTE_FILENAME_MAX_LEN,
    )?;
    let file_id = protocol::decode_file_id(&body)?;
    debug!("Uploaded {} bytes as {}", file_size, file_id);
    Ok(file_id)
}

/// Stream `length` bytes of a file starting at `offset` into `sink`.
///
/// A `length` of 0 reads to the end of the file. Returns the number of
/// bytes written, which is always the length the node declared.
pub fn download<C, W>(
    conn: &mut C,
    file_id: &FileId,
    offset: u64,
    length: u64,
    sink: &mut W,
) -> Result<u64>
where
    C: Read + Write,
    W: Write + ?Sized,
{
    let request = protocol::download_request(file_id, offset, length);
    conn.write_all(&request)?;
    conn.flush()?;

    let header = Header::read_response(conn)?;
    let received = io::copy(&mut Read::by_ref(conn).take(header.pkg_len), sink)?;
    if received != header.pkg_len {
        return Err(FdfsError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "connection closed after {} of {} bytes",
                received, header.pkg_len
            ),
        )));
    }
    debug!("Downloaded {} bytes of {}", received, file_id);
    Ok(received)
}

pub fn delete<C: Read + Write>(conn: &mut C, file_id: &FileId) -> Result<()> {
    let request = protocol::delete_request(file_id);
    conn.write_all(&request)?;
    conn.flush()?;

    let header = Header::read_response(conn)?;
    if header.pkg_len != 0 {
        return Err(FdfsError::MalformedResponse(format!(
            "delete response carries {} unexpected bytes",
            header.pkg_len
        )));
    }
    debug!("Deleted {}", file_id);
    Ok(())
}
