//! Append-only event store — binary protobuf log.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only — no mutation, no deletion, no reordering
//!   - fsync after every write
//!   - Sequence strictly increasing (validated on append)

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;

use crate::proto_types::ProtoEventEnvelope;

/// Largest frame accepted when reading or writing the log.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append-only event log backed by a binary file.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    last_sequence: u64,
}

impl EventStore {
    /// Open or create an event log at the given path.
    /// Reads existing frames to find the last sequence number.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_sequence = if path.exists() {
            read_frames(path)?.last().map_or(0, |e| e.sequence)
        } else {
            0
        };

        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    /// Append one frame and fsync. The sequence must follow the last one.
    pub fn append_event(&mut self, event: &ProtoEventEnvelope) -> io::Result<()> {
        let expected = self.last_sequence + 1;
        if event.sequence != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "event log expects sequence {}, got {}",
                    expected, event.sequence
                ),
            ));
        }

        let frame = encode_frame(event)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&frame)?;
        file.sync_all()?;

        self.last_sequence = event.sequence;
        Ok(())
    }

    /// Every frame in the log, in sequence order.
    pub fn load_all_events(&self) -> io::Result<Vec<ProtoEventEnvelope>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_frames(&self.path)
    }

    /// Sequence of the last frame (0 for an empty log).
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Length prefix and body as one buffer, so a frame is one write.
fn encode_frame(event: &ProtoEventEnvelope) -> io::Result<Vec<u8>> {
    let len = event.encoded_len();
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("event {} encodes to {} bytes", event.sequence, len),
        ));
    }
    let mut buf = Vec::with_capacity(4 + len);
    buf.extend_from_slice(&(len as u32).to_le_bytes());
    event
        .encode(&mut buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    Ok(buf)
}

/// Read the next frame; `None` at a clean end of file.
fn read_frame<R: Read>(reader: &mut R, after: u64) -> io::Result<Option<ProtoEventEnvelope>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(invalid_data(format!(
            "frame after event {} has length {}",
            after, len
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| invalid_data(format!("frame after event {} is truncated: {}", after, e)))?;

    ProtoEventEnvelope::decode(body.as_slice())
        .map(Some)
        .map_err(|e| invalid_data(format!("frame after event {} does not decode: {}", after, e)))
}

/// Read a whole log, checking that sequences run 1, 2, 3, ...
fn read_frames(path: &Path) -> io::Result<Vec<ProtoEventEnvelope>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut events: Vec<ProtoEventEnvelope> = Vec::new();

    loop {
        let last = events.last().map_or(0, |e| e.sequence);
        let Some(event) = read_frame(&mut reader, last)? else {
            break;
        };
        if event.sequence != last + 1 {
            return Err(invalid_data(format!(
                "event {} follows event {} in the log",
                event.sequence, last
            )));
        }
        events.push(event);
    }

    Ok(events)
}
