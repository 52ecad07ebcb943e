//! Length-prefixed frame transport
//!
//! Commands go out as one Latin-1 line terminated by `\n`. Every response is
//! a single frame: an 8-byte big-endian payload length followed by exactly
//! that many payload bytes.
//!
//! I/O errors after the request starts going out leave the stream at an
//! unknown position and are reported as [`KdbError::TransportBroken`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{FrameStage, KdbError, KdbResult};

const HEADER_LEN: usize = 8;

/// Sends commands and reads frames over an established stream
#[derive(Debug)]
pub struct FrameTransport<S> {
    stream: S,
    read_chunk_size: usize,
}

impl<S> FrameTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream; payload reads request at most `read_chunk_size` bytes at a time
    pub fn new(stream: S, read_chunk_size: usize) -> Self {
        Self {
            stream,
            read_chunk_size: read_chunk_size.max(1),
        }
    }

    /// Write an encoded command followed by a newline
    pub async fn send(&mut self, request: &[u8]) -> KdbResult<()> {
        let mut line = Vec::with_capacity(request.len() + 1);
        line.extend_from_slice(request);
        line.push(b'\n');

        trace!("Sending {} byte command", line.len());
        self.stream
            .write_all(&line)
            .await
            .map_err(|e| broken(FrameStage::Request, e))?;
        self.stream
            .flush()
            .await
            .map_err(|e| broken(FrameStage::Request, e))?;
        Ok(())
    }

    /// Read one complete frame and return its payload
    pub async fn receive(&mut self) -> KdbResult<Vec<u8>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self
                .stream
                .read(&mut header[filled..])
                .await
                .map_err(|e| broken(FrameStage::Header, e))?;
            if n == 0 {
                return Err(KdbError::TransportClosed {
                    stage: FrameStage::Header,
                    received: filled as u64,
                    expected: HEADER_LEN as u64,
                });
            }
            filled += n;
        }

        let length = u64::from_be_bytes(header);
        trace!("Reading frame payload of {} bytes", length);

        let mut payload = Vec::new();
        let mut buf = vec![0u8; self.read_chunk_size];
        let mut remaining = length;
        while remaining > 0 {
            let want = remaining.min(self.read_chunk_size as u64) as usize;
            let n = self
                .stream
                .read(&mut buf[..want])
                .await
                .map_err(|e| broken(FrameStage::Payload, e))?;
            if n == 0 {
                return Err(KdbError::TransportClosed {
                    stage: FrameStage::Payload,
                    received: length - remaining,
                    expected: length,
                });
            }
            payload.extend_from_slice(&buf[..n]);
            remaining -= n as u64;
        }

        Ok(payload)
    }
}

fn broken(stage: FrameStage, source: std::io::Error) -> KdbError {
    KdbError::TransportBroken { stage, source }
}

/// Encode text with one byte per character (code points 0-255)
pub fn encode_latin1(text: &str) -> KdbResult<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                KdbError::InvalidCommand(format!(
                    "character {:?} cannot be encoded as Latin-1",
                    c
                ))
            })
        })
        .collect()
}
