//! In-process tracker and storage servers for tests

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;

use fdfs_core::protocol::{
    put_fixed_str, storage_cmd, tracker_cmd, Header, GROUP_NAME_MAX_LEN, IP_ADDRESS_LEN,
};

/// ENOENT, as the storage node reports a missing file
pub const STATUS_NOT_FOUND: u8 = 2;

/// Scripted connection: reads come from a canned reply, writes are recorded
pub struct MockConn {
    reply: Cursor<Vec<u8>>,
    pub written: Vec<u8>,
}

impl MockConn {
    pub fn replying(header: Header, body: &[u8]) -> Self {
        let mut reply = header.encode().to_vec();
        reply.extend_from_slice(body);
        Self {
            reply: Cursor::new(reply),
            written: Vec::new(),
        }
    }

    pub fn read_position(&self) -> u64 {
        self.reply.position()
    }
}

impl Read for MockConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reply.read(buf)
    }
}

impl Write for MockConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn tracker_body(ip: &str, port: u64, store_path_index: Option<u8>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_fixed_str(&mut buf, "group1", GROUP_NAME_MAX_LEN);
    put_fixed_str(&mut buf, ip, IP_ADDRESS_LEN);
    buf.put_u64(port);
    if let Some(index) = store_path_index {
        buf.put_u8(index);
    }
    buf.to_vec()
}

pub fn file_id_body(group: &str, remote_filename: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_fixed_str(&mut buf, group, GROUP_NAME_MAX_LEN);
    buf.put_slice(remote_filename.as_bytes());
    buf.to_vec()
}

/// How a mock tracker answers queries
#[derive(Clone, Copy, Debug)]
pub enum TrackerBehavior {
    /// Point every query at the storage address
    Normal,
    /// Answer with this status and no body
    Status(u8),
    /// Answer with a body of the wrong size
    ShortBody,
}

/// Address of an unused local port; dialing it is refused
pub fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Accept loop shared by the mock servers
fn serve<F>(handler: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(TcpStream) -> io::Result<()> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    let handler = Arc::new(handler);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let _ = handler(stream);
            });
        }
    });

    (addr, accepted)
}

pub struct MockTracker {
    pub addr: String,
    accepted: Arc<AtomicUsize>,
}

impl MockTracker {
    pub fn spawn(storage_addr: &str, behavior: TrackerBehavior) -> Self {
        let (ip, port) = storage_addr.rsplit_once(':').unwrap();
        let (ip, port) = (ip.to_string(), port.parse::<u64>().unwrap());

        let (addr, accepted) = serve(move |mut stream| loop {
            let header = match Header::read_from(&mut stream) {
                Ok(header) => header,
                Err(_) => return Ok(()),
            };
            let mut body = vec![0u8; header.pkg_len as usize];
            stream.read_exact(&mut body)?;

            let reply = match behavior {
                TrackerBehavior::Normal => {
                    let index = (header.cmd == tracker_cmd::QUERY_STORE_WITHOUT_GROUP_ONE)
                        .then_some(0);
                    tracker_body(&ip, port, index)
                }
                TrackerBehavior::Status(status) => {
                    stream.write_all(&Header::response(0, status).encode())?;
                    continue;
                }
                TrackerBehavior::ShortBody => vec![0u8; 20],
            };
            stream.write_all(&Header::response(reply.len() as u64, 0).encode())?;
            stream.write_all(&reply)?;
        });

        Self { addr, accepted }
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

pub struct MockStorage {
    pub addr: String,
    accepted: Arc<AtomicUsize>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    pub fn spawn() -> Self {
        let files: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::default();
        let next_id = Arc::new(AtomicUsize::new(1));
        let store = Arc::clone(&files);

        let (addr, accepted) = serve(move |mut stream| loop {
            let header = match Header::read_from(&mut stream) {
                Ok(header) => header,
                Err(_) => return Ok(()),
            };
            match header.cmd {
                storage_cmd::UPLOAD_FILE => {
                    let mut meta = [0u8; 15];
                    stream.read_exact(&mut meta)?;
                    let size = u64::from_be_bytes(meta[1..9].try_into().unwrap());
                    let ext = fdfs_core::protocol::get_fixed_str(&meta[9..]);
                    let mut content = vec![0u8; size as usize];
                    stream.read_exact(&mut content)?;

                    let n = next_id.fetch_add(1, Ordering::SeqCst);
                    let name = if ext.is_empty() {
                        format!("M00/00/00/{:04}", n)
                    } else {
                        format!("M00/00/00/{:04}.{}", n, ext)
                    };
                    store.lock().insert(name.clone(), content);

                    let reply = file_id_body("group1", &name);
                    stream.write_all(&Header::response(reply.len() as u64, 0).encode())?;
                    stream.write_all(&reply)?;
                }
                storage_cmd::DOWNLOAD_FILE => {
                    let mut body = vec![0u8; header.pkg_len as usize];
                    stream.read_exact(&mut body)?;
                    let split = body.len() - 16;
                    let name = String::from_utf8_lossy(&body[GROUP_NAME_MAX_LEN..split]).into_owned();
                    let offset = u64::from_be_bytes(body[split..split + 8].try_into().unwrap()) as usize;
                    let length = u64::from_be_bytes(body[split + 8..].try_into().unwrap()) as usize;

                    let content = store.lock().get(&name).cloned();
                    match content {
                        Some(content) if offset <= content.len() => {
                            let end = if length == 0 {
                                content.len()
                            } else {
                                (offset + length).min(content.len())
                            };
                            let slice = &content[offset..end];
                            stream.write_all(&Header::response(slice.len() as u64, 0).encode())?;
                            stream.write_all(slice)?;
                        }
                        _ => stream.write_all(&Header::response(0, STATUS_NOT_FOUND).encode())?,
                    }
                }
                storage_cmd::DELETE_FILE => {
                    let mut body = vec![0u8; header.pkg_len as usize];
                    stream.read_exact(&mut body)?;
                    let name = String::from_utf8_lossy(&body[GROUP_NAME_MAX_LEN..]).into_owned();
                    let status = match store.lock().remove(&name) {
                        Some(_) => 0,
                        None => STATUS_NOT_FOUND,
                    };
                    stream.write_all(&Header::response(0, status).encode())?;
                }
                _ => return Ok(()),
            }
        });

        Self {
            addr,
            accepted,
            files,
        }
    }

    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}
