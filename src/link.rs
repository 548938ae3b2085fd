//! Framed request/response protocol for pushing and pulling configurations
//! over a byte-stream link to the device.
//!
//! One frame is `<START>` + document bytes + `<END>`; there is no length
//! prefix and no checksum, integrity rides on the document parsing. The
//! protocol is strictly one exchange at a time: the device side has no
//! request identifiers, so callers must hold the link exclusively (which the
//! `&mut` receiver enforces) and must not start a second exchange while one
//! is outstanding. No retries happen here; on `TimedOut` or `Parse` the
//! caller decides whether to try again.

use std::io;
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde_json::Value;
use snafu::{ResultExt, Snafu};

use crate::config::Configuration;
use crate::document;

pub const FRAME_START: &[u8] = b"<START>";
pub const FRAME_END: &[u8] = b"<END>";

/// Deadline for the device to acknowledge a pushed configuration (it writes
/// the received document to EEPROM before echoing it back).
pub const PUSH_ACK_TIMEOUT: Duration = Duration::from_secs(20);
/// Deadline for a read-back response.
pub const PULL_TIMEOUT: Duration = Duration::from_secs(5);

const READ_REQUEST: &[u8] = br#"{"command":"read"}"#;
const MAX_FRAME_LEN: usize = 16 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Snafu)]
pub enum TransportError {
    #[snafu(display("no response from device within {}s", deadline.as_secs_f32()))]
    TimedOut { deadline: Duration },

    #[snafu(display("device responded but the payload is not a valid document: {source}"))]
    Parse { source: serde_json::Error },

    #[snafu(display("stream unavailable: {source}"))]
    Stream { source: io::Error },

    #[snafu(display("response exceeded {limit} bytes without an end marker"))]
    Overrun { limit: usize },
}

/// An open bidirectional byte stream to the device. Opening and closing the
/// stream is the caller's business; this layer only frames traffic over it.
pub trait ConfigLink {
    /// Writes the whole buffer to the stream.
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Reads whatever bytes are currently pending, returning 0 when nothing
    /// has arrived yet. Must not block past its own short internal timeout,
    /// so the caller can keep checking the frame deadline.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Pushes a configuration to the device and waits for the acknowledgment
/// frame. Returns the acknowledgment document (typically an echo of the
/// stored configuration).
pub fn push_config<L: ConfigLink>(
    link: &mut L,
    cfg: &Configuration,
) -> Result<Value, TransportError> {
    push_with_deadline(link, cfg, PUSH_ACK_TIMEOUT)
}

/// Requests the device's stored configuration and returns the raw document;
/// pass it to [`document::decode`] to obtain a [`Configuration`].
pub fn pull_document<L: ConfigLink>(link: &mut L) -> Result<Value, TransportError> {
    pull_with_deadline(link, PULL_TIMEOUT)
}

fn push_with_deadline<L: ConfigLink>(
    link: &mut L,
    cfg: &Configuration,
    deadline: Duration,
) -> Result<Value, TransportError> {
    // Rendering a Value cannot fail, so the outbound path has no error arm.
    let payload = document::encode(cfg).to_string().into_bytes();
    write_frame(link, &payload)?;
    let body = await_frame(link, deadline)?;
    let ack = serde_json::from_slice(&body).context(ParseSnafu)?;
    log::trace!("Device acknowledged configuration: {ack}");
    Ok(ack)
}

fn pull_with_deadline<L: ConfigLink>(
    link: &mut L,
    deadline: Duration,
) -> Result<Value, TransportError> {
    write_frame(link, READ_REQUEST)?;
    let body = await_frame(link, deadline)?;
    serde_json::from_slice(&body).context(ParseSnafu)
}

fn write_frame<L: ConfigLink>(link: &mut L, payload: &[u8]) -> Result<(), TransportError> {
    let mut frame = Vec::with_capacity(FRAME_START.len() + payload.len() + FRAME_END.len() + 1);
    frame.extend_from_slice(FRAME_START);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(FRAME_END);
    // The device-side reader is line oriented.
    frame.push(b'\n');
    log::trace!("Sending frame ({} bytes)", frame.len());
    link.send(&frame)
}

/// Accumulates stream bytes until a complete frame shows up or the deadline
/// elapses. Noise before the start marker is discarded as it arrives; the
/// frame itself is bounded, so a device streaming an endless body without an
/// end marker cannot grow the buffer without limit.
fn await_frame<L: ConfigLink>(
    link: &mut L,
    deadline: Duration,
) -> Result<Vec<u8>, TransportError> {
    // The deadline runs from the moment the outbound write completed.
    let started = Instant::now();
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        if started.elapsed() >= deadline {
            return Err(TransportError::TimedOut { deadline });
        }
        let n = link.read_available(&mut chunk)?;
        if n == 0 {
            sleep(POLL_INTERVAL);
            continue;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(body) = extract_frame(&buffer) {
            log::trace!("Received frame ({} bytes)", body.len());
            return Ok(body.to_vec());
        }
        match find(&buffer, FRAME_START) {
            Some(start) => {
                buffer.drain(..start);
                // Only bytes belonging to the frame count against the bound,
                // checked after the scan so a frame completing right at the
                // limit is still accepted.
                if buffer.len() > MAX_FRAME_LEN {
                    return Err(TransportError::Overrun { limit: MAX_FRAME_LEN });
                }
            }
            None => {
                // Keep only a tail that could be a partial start marker.
                if buffer.len() >= FRAME_START.len() {
                    buffer.drain(..buffer.len() - (FRAME_START.len() - 1));
                }
            }
        }
    }
}

fn extract_frame(buffer: &[u8]) -> Option<&[u8]> {
    let start = find(buffer, FRAME_START)?;
    let body_start = start + FRAME_START.len();
    let body_len = find(&buffer[body_start..], FRAME_END)?;
    Some(&buffer[body_start..body_start + body_len])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
