//! Remote calls over a single store connection

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::transport::{encode_latin1, FrameTransport};
use crate::config::KdbConfig;
use crate::decode::{ArrowIpcDecoder, ResultDecoder};
use crate::error::{KdbError, KdbResult};
use crate::executor::Merge;
use crate::types::Command;

/// Executes one remote function call and returns its decoded result
#[async_trait]
pub trait RemoteCall: Send {
    type Output: Merge + Send;

    async fn call(&mut self, command: &Command) -> KdbResult<Self::Output>;
}

/// A store connection: renders the command, sends it, reads one frame back
/// and decodes it.
///
/// A payload starting with `'` is an error raised by the store; the rest of
/// the payload is its message. Arrow IPC streams never start with that byte.
///
/// A call dropped between sending its request and reading the whole response
/// leaves that response on the stream. Every later call then fails with
/// [`KdbError::Desynchronized`] instead of reading it.
pub struct KdbConnection<S, D = ArrowIpcDecoder> {
    transport: FrameTransport<S>,
    decoder: D,
    awaiting_response: bool,
}

impl KdbConnection<TcpStream, ArrowIpcDecoder> {
    /// Open a TCP connection to the store named in `config`
    pub async fn connect(config: &KdbConfig) -> KdbResult<Self> {
        let addr = config.validate()?;
        info!("Connecting to kdb+ store {} at {}", config.name, addr);

        let stream = tokio::time::timeout(
            config.transport.connect_timeout(),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| KdbError::Timeout(config.transport.connect_timeout_ms))??;
        stream.set_nodelay(true)?;

        info!("Connected to kdb+ store at {}", addr);
        Ok(Self::new(
            stream,
            config.transport.read_chunk_size,
            ArrowIpcDecoder,
        ))
    }
}

impl<S, D> KdbConnection<S, D>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    D: ResultDecoder,
{
    pub fn new(stream: S, read_chunk_size: usize, decoder: D) -> Self {
        Self {
            transport: FrameTransport::new(stream, read_chunk_size),
            decoder,
            awaiting_response: false,
        }
    }
}

#[async_trait]
impl<S, D> RemoteCall for KdbConnection<S, D>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    D: ResultDecoder,
    D::Output: Merge,
{
    type Output = D::Output;

    async fn call(&mut self, command: &Command) -> KdbResult<D::Output> {
        if self.awaiting_response {
            return Err(KdbError::Desynchronized);
        }

        let query = command.render();
        let request = encode_latin1(&query)?;
        debug!("Calling {}: {}", command.function, query);

        self.awaiting_response = true;
        self.transport.send(&request).await?;
        let payload = self.transport.receive().await?;
        self.awaiting_response = false;

        if let Some(message) = payload.strip_prefix(b"'") {
            return Err(KdbError::Store(message.iter().map(|&b| char::from(b)).collect()));
        }
        self.decoder.decode(&payload)
    }
}

// Implement Debug manually; the stream itself is not interesting
impl<S, D> std::fmt::Debug for KdbConnection<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdbConnection")
            .field("awaiting_response", &self.awaiting_response)
            .finish_non_exhaustive()
    }
}
