//! Wire protocol definitions
//!
//! Every tracker and storage exchange starts with the same 10-byte header:
//!
//! ```text
//! offset 0..7   payload length (u64, big-endian)
//! offset 8      command code
//! offset 9      status (0 on requests, 0 = success on responses)
//! ```
//!
//! Request bodies are built from fixed-width fields (zero padded text,
//! big-endian integers) followed by variable-length filename or file bytes
//! whose size is implied by the header's payload length.

use std::io::{self, Read};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FdfsError, Result};
use crate::types::{FileId, StorageDescriptor};

/// Size of the frame header
pub const HEADER_LEN: usize = 10;

/// Width of the group name field
pub const GROUP_NAME_MAX_LEN: usize = 16;

/// Width of the storage IP field in tracker responses
pub const IP_ADDRESS_LEN: usize = 15;

/// Width of the storage port field in tracker responses
pub const PORT_LEN: usize = 8;

/// Width of the file extension field in upload requests
pub const FILE_EXT_NAME_MAX_LEN: usize = 6;

/// Longest remote filename a storage node assigns
pub const REMOTE_FILENAME_MAX_LEN: usize = 128;

/// Tracker body for fetch/update queries: group + ip + port
pub const QUERY_FETCH_BODY_LEN: usize = GROUP_NAME_MAX_LEN + IP_ADDRESS_LEN + PORT_LEN;

/// Tracker body for store queries: fetch body + store path index
pub const QUERY_STORE_BODY_LEN: usize = QUERY_FETCH_BODY_LEN + 1;

/// Command code carried by every response
pub const RESP_CMD: u8 = 100;

pub mod tracker_cmd {
    pub const QUERY_STORE_WITHOUT_GROUP_ONE: u8 = 101;
    pub const QUERY_FETCH_ONE: u8 = 102;
    pub const QUERY_UPDATE: u8 = 103;
}

pub mod storage_cmd {
    pub const UPLOAD_FILE: u8 = 11;
    pub const DELETE_FILE: u8 = 12;
    pub const DOWNLOAD_FILE: u8 = 14;
}

/// Frame header shared by requests and responses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Bytes following the header
    pub pkg_len: u64,
    pub cmd: u8,
    pub status: u8,
}

impl Header {
    pub fn request(cmd: u8, pkg_len: u64) -> Self {
        Self {
            pkg_len,
            cmd,
            status: 0,
        }
    }

    pub fn response(pkg_len: u64, status: u8) -> Self {
        Self {
            pkg_len,
            cmd: RESP_CMD,
            status,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&self.pkg_len.to_be_bytes());
        buf[8] = self.cmd;
        buf[9] = self.status;
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        let mut buf = &buf[..];
        Self {
            pkg_len: buf.get_u64(),
            cmd: buf.get_u8(),
            status: buf.get_u8(),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf)?;
        Ok(Self::decode(&buf))
    }

    /// Read a response header and reject anything but a successful response.
    ///
    /// On a non-zero status nothing past the header is consumed.
    pub fn read_response<R: Read>(reader: &mut R) -> Result<Self> {
        let header = Self::read_from(reader)?;
        if header.cmd != RESP_CMD {
            return Err(FdfsError::MalformedResponse(format!(
                "unexpected response command {}",
                header.cmd
            )));
        }
        header.check_status()?;
        Ok(header)
    }

    pub fn check_status(&self) -> Result<()> {
        match self.status {
            0 => Ok(()),
            status => Err(FdfsError::RemoteStatus(status)),
        }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.encode());
    }
}

/// Append `value` as a zero-padded field of exactly `width` bytes.
///
/// Longer values are truncated to the field width.
pub fn put_fixed_str(buf: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, width - n);
}

/// Decode a fixed-width text field, dropping the zero padding.
pub fn get_fixed_str(field: &[u8]) -> String {
    let end = field
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Tracker query, optionally bound to an existing file.
///
/// Store queries carry no body; fetch and update queries carry the
/// 16-byte group field followed by the raw remote filename.
pub fn tracker_query_request(cmd: u8, target: Option<&FileId>) -> BytesMut {
    let body_len = target
        .map(|id| GROUP_NAME_MAX_LEN + id.remote_filename.len())
        .unwrap_or(0);
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    Header::request(cmd, body_len as u64).put(&mut buf);
    if let Some(id) = target {
        put_file_target(&mut buf, id);
    }
    buf
}

/// Header and metadata of an upload; the file bytes follow on the wire.
pub fn upload_request(store_path_index: u8, file_size: u64, ext_name: &str) -> BytesMut {
    let meta_len = 1 + 8 + FILE_EXT_NAME_MAX_LEN;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + meta_len);
    Header::request(storage_cmd::UPLOAD_FILE, meta_len as u64 + file_size).put(&mut buf);
    buf.put_u8(store_path_index);
    buf.put_u64(file_size);
    put_fixed_str(&mut buf, ext_name, FILE_EXT_NAME_MAX_LEN);
    buf
}

/// Download request: group field, filename, offset, length.
///
/// A `length` of 0 reads to the end of the file.
pub fn download_request(file_id: &FileId, offset: u64, length: u64) -> BytesMut {
    let body_len = GROUP_NAME_MAX_LEN + file_id.remote_filename.len() + 16;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    Header::request(storage_cmd::DOWNLOAD_FILE, body_len as u64).put(&mut buf);
    put_file_target(&mut buf, file_id);
    buf.put_u64(offset);
    buf.put_u64(length);
    buf
}

pub fn delete_request(file_id: &FileId) -> BytesMut {
    let body_len = GROUP_NAME_MAX_LEN + file_id.remote_filename.len();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    Header::request(storage_cmd::DELETE_FILE, body_len as u64).put(&mut buf);
    put_file_target(&mut buf, file_id);
    buf
}

fn put_file_target(buf: &mut BytesMut, file_id: &FileId) {
    put_fixed_str(buf, &file_id.group_name, GROUP_NAME_MAX_LEN);
    buf.put_slice(file_id.remote_filename.as_bytes());
}

/// Read a response body of `len` bytes, refusing anything above `max`.
pub fn read_body<R: Read>(reader: &mut R, len: u64, max: usize) -> Result<Vec<u8>> {
    if len > max as u64 {
        return Err(FdfsError::MalformedResponse(format!(
            "response body is {} bytes (max {})",
            len, max
        )));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Parse a tracker response body into a storage descriptor.
///
/// Layout: group[16] ip[15] port(u64) and, for store queries, one
/// trailing store path index byte.
pub fn decode_storage_descriptor(body: &[u8]) -> Result<StorageDescriptor> {
    if body.len() != QUERY_FETCH_BODY_LEN && body.len() != QUERY_STORE_BODY_LEN {
        return Err(FdfsError::MalformedResponse(format!(
            "tracker body is {} bytes, expected {} or {}",
            body.len(),
            QUERY_FETCH_BODY_LEN,
            QUERY_STORE_BODY_LEN
        )));
    }

    let mut buf = body;
    let group_name = get_fixed_str(&buf[..GROUP_NAME_MAX_LEN]);
    buf.advance(GROUP_NAME_MAX_LEN);
    let ip = get_fixed_str(&buf[..IP_ADDRESS_LEN]);
    buf.advance(IP_ADDRESS_LEN);
    let port = buf.get_u64();
    let store_path_index = if buf.has_remaining() { buf.get_u8() } else { 0 };

    if ip.is_empty() {
        return Err(FdfsError::MalformedResponse("tracker returned an empty ip".into()));
    }
    let port = u16::try_from(port).map_err(|_| {
        FdfsError::MalformedResponse(format!("tracker returned port {} out of range", port))
    })?;

    Ok(StorageDescriptor {
        group_name,
        addr: format!("{}:{}", ip, port),
        store_path_index,
    })
}

/// Parse an upload response body: group[16] followed by the remote filename.
pub fn decode_file_id(body: &[u8]) -> Result<FileId> {
    if body.len() <= GROUP_NAME_MAX_LEN
        || body.len() > GROUP_NAME_MAX_LEN + REMOTE_FILENAME_MAX_LEN
    {
        return Err(FdfsError::MalformedResponse(format!(
            "upload response body is {} bytes",
            body.len()
        )));
    }
    let group_name = get_fixed_str(&body[..GROUP_NAME_MAX_LEN]);
    let remote_filename = String::from_utf8(body[GROUP_NAME_MAX_LEN..].to_vec())
        .map_err(|_| FdfsError::MalformedResponse("remote filename is not utf-8".into()))?;
    FileId::new(group_name, remote_filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = Header::request(tracker_cmd::QUERY_FETCH_ONE, 0x0102);
        let bytes = header.encode();
        assert_eq!(bytes, [0, 0, 0, 0, 0, 0, 0x01, 0x02, 102, 0]);
        assert_eq!(Header::decode(&bytes), header);
    }

    #[test]
    fn test_read_response_status() {
        // Status 2 followed by bytes that must not be consumed
        let mut wire = Header::response(0, 2).encode().to_vec();
        wire.extend_from_slice(b"trailing");
        let mut cursor = Cursor::new(wire);

        let err = Header::read_response(&mut cursor).unwrap_err();
        assert_eq!(err.remote_status(), Some(2));
        assert_eq!(cursor.position(), HEADER_LEN as u64);
    }

    #[test]
    fn test_read_response_wrong_command() {
        let header = Header::request(storage_cmd::UPLOAD_FILE, 0);
        let mut cursor = Cursor::new(header.encode().to_vec());
        assert!(matches!(
            Header::read_response(&mut cursor),
            Err(FdfsError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_short_header_is_io_error() {
        let mut cursor = Cursor::new(vec![0u8; 4]);
        assert!(matches!(Header::read_response(&mut cursor), Err(FdfsError::Io(_))));
    }

    #[test]
    fn test_read_body_limit() {
        let mut cursor = Cursor::new(vec![7u8; 64]);
        assert!(matches!(
            read_body(&mut cursor, 64, 40),
            Err(FdfsError::MalformedResponse(_))
        ));
        assert_eq!(cursor.position(), 0);
        assert_eq!(read_body(&mut cursor, 40, 40).unwrap().len(), 40);
    }

    #[test]
    fn test_fixed_str() {
        let mut buf = BytesMut::new();
        put_fixed_str(&mut buf, "group1", GROUP_NAME_MAX_LEN);
        assert_eq!(buf.len(), GROUP_NAME_MAX_LEN);
        assert_eq!(&buf[..6], b"group1");
        assert!(buf[6..].iter().all(|&b| b == 0));
        assert_eq!(get_fixed_str(&buf), "group1");

        let mut buf = BytesMut::new();
        put_fixed_str(&mut buf, "targzarchive", FILE_EXT_NAME_MAX_LEN);
        assert_eq!(&buf[..], b"targza");
    }

    #[test]
    fn test_query_requests() {
        let store = tracker_query_request(tracker_cmd::QUERY_STORE_WITHOUT_GROUP_ONE, None);
        assert_eq!(store.len(), HEADER_LEN);
        assert_eq!(store[8], 101);

        let id: FileId = "group1/M00/00/00/abc.jpg".parse().unwrap();
        let fetch = tracker_query_request(tracker_cmd::QUERY_FETCH_ONE, Some(&id));
        let header = Header::decode(fetch[..HEADER_LEN].try_into().unwrap());
        assert_eq!(header.pkg_len, (16 + "M00/00/00/abc.jpg".len()) as u64);
        assert_eq!(fetch.len(), HEADER_LEN + header.pkg_len as usize);
        assert_eq!(&fetch[HEADER_LEN + 16..], b"M00/00/00/abc.jpg");
    }

    #[test]
    fn test_upload_request() {
        let req = upload_request(3, 1000, "jpg");
        let header = Header::decode(req[..HEADER_LEN].try_into().unwrap());
        assert_eq!(header.cmd, storage_cmd::UPLOAD_FILE);
        assert_eq!(header.pkg_len, 15 + 1000);
        assert_eq!(req.len(), HEADER_LEN + 15);
        assert_eq!(req[HEADER_LEN], 3);
        assert_eq!(&req[HEADER_LEN + 1..HEADER_LEN + 9], &1000u64.to_be_bytes());
        assert_eq!(&req[HEADER_LEN + 9..], b"jpg\0\0\0");
    }

    #[test]
    fn test_download_request() {
        let id: FileId = "group1/M00/00/00/abc".parse().unwrap();
        let req = download_request(&id, 5, 0);
        let header = Header::decode(req[..HEADER_LEN].try_into().unwrap());
        assert_eq!(header.pkg_len as usize, 16 + 13 + 16);
        let tail = &req[req.len() - 16..];
        assert_eq!(&tail[..8], &5u64.to_be_bytes());
        assert_eq!(&tail[8..], &0u64.to_be_bytes());
    }

    fn tracker_body(ip: &str, port: u64, index: Option<u8>) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_fixed_str(&mut buf, "group1", GROUP_NAME_MAX_LEN);
        put_fixed_str(&mut buf, ip, IP_ADDRESS_LEN);
        buf.put_u64(port);
        if let Some(index) = index {
            buf.put_u8(index);
        }
        buf.to_vec()
    }

    #[test]
    fn test_decode_storage_descriptor() {
        let desc = decode_storage_descriptor(&tracker_body("10.0.0.7", 23000, Some(2))).unwrap();
        assert_eq!(desc.group_name, "group1");
        assert_eq!(desc.addr, "10.0.0.7:23000");
        assert_eq!(desc.store_path_index, 2);

        let desc = decode_storage_descriptor(&tracker_body("10.0.0.7", 23000, None)).unwrap();
        assert_eq!(desc.store_path_index, 0);
    }

    #[test]
    fn test_decode_storage_descriptor_malformed() {
        assert!(matches!(
            decode_storage_descriptor(&[0u8; 20]),
            Err(FdfsError::MalformedResponse(_))
        ));
        assert!(decode_storage_descriptor(&tracker_body("10.0.0.7", 70000, None)).is_err());
        assert!(decode_storage_descriptor(&tracker_body("", 23000, None)).is_err());
    }

    #[test]
    fn test_decode_file_id() {
        let mut body = BytesMut::new();
        put_fixed_str(&mut body, "group1", GROUP_NAME_MAX_LEN);
        body.put_slice(b"M00/00/00/abc.jpg");
        let id = decode_file_id(&body).unwrap();
        assert_eq!(id.to_string(), "group1/M00/00/00/abc.jpg");

        assert!(decode_file_id(&body[..GROUP_NAME_MAX_LEN]).is_err());
    }
}
