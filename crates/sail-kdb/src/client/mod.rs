//! kdb+ client implementation
//!
//! This module provides the client that resolves remote function names to
//! their chunking policy and runs each call through the adaptive executor
//! over a single store connection.

pub mod connection;
pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use self::connection::{KdbConnection, RemoteCall};
use crate::config::KdbConfig;
use crate::error::KdbResult;
use crate::executor::{AdaptiveExecutor, ExecutionEvent, ExecutionListener};
use crate::policy::PolicyRegistry;
use crate::types::{Command, Kwargs, QValue};

/// Client for calling remote functions on a kdb+ store
///
/// Calls hold the connection for their whole split/retry tree, so
/// concurrent `invoke`s on one client run one after another.
pub struct KdbClient<C> {
    /// Client name
    name: String,

    /// The single store connection
    connection: Mutex<C>,

    /// Function policies
    registry: Arc<PolicyRegistry>,

    /// Pause before each retry
    backoff: Duration,

    /// Client statistics and optional event forwarding
    listener: ClientListener,
}

/// Client statistics for monitoring
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    /// Total number of `invoke` calls
    pub total_invocations: u64,

    /// Invocations that produced a result
    pub successful_invocations: u64,

    /// Invocations that returned an error
    pub failed_invocations: u64,

    /// Number of retried requests
    pub retried_requests: u64,

    /// Number of requests halved after an oversized rejection
    pub split_requests: u64,
}

#[derive(Default)]
struct ClientListener {
    total_invocations: AtomicU64,
    successful_invocations: AtomicU64,
    failed_invocations: AtomicU64,
    retried_requests: AtomicU64,
    split_requests: AtomicU64,
    forward: Option<Arc<dyn ExecutionListener>>,
}

impl ExecutionListener for ClientListener {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::Split { .. } => {
                self.split_requests.fetch_add(1, Ordering::Relaxed);
            }
            ExecutionEvent::Retry { .. } => {
                self.retried_requests.fetch_add(1, Ordering::Relaxed);
            }
            ExecutionEvent::RetriesExhausted { .. } => {}
        }
        if let Some(forward) = &self.forward {
            forward.on_event(event);
        }
    }
}

impl KdbClient<KdbConnection<TcpStream>> {
    /// Connect to the store named in `config`
    pub async fn connect(config: KdbConfig) -> KdbResult<Self> {
        let connection = KdbConnection::connect(&config).await?;
        Ok(Self::new(connection, &config))
    }
}

impl<C: RemoteCall> KdbClient<C> {
    /// Create a client over an established connection
    pub fn new(connection: C, config: &KdbConfig) -> Self {
        let registry = PolicyRegistry::from_config(config);
        info!(
            "Creating kdb+ client {} with {} function policies",
            config.name,
            registry.len()
        );
        Self::with_registry(
            config.name.clone(),
            connection,
            Arc::new(registry),
            config.retry.backoff(),
        )
    }

    /// Create a client sharing an existing policy registry
    pub fn with_registry(
        name: impl Into<String>,
        connection: C,
        registry: Arc<PolicyRegistry>,
        backoff: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            connection: Mutex::new(connection),
            registry,
            backoff,
            listener: ClientListener::default(),
        }
    }

    /// Also deliver split/retry events to `listener`
    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.listener.forward = Some(listener);
        self
    }

    /// Call remote `function` with positional and keyword arguments
    pub async fn invoke(
        &self,
        function: &str,
        args: Vec<QValue>,
        kwargs: Kwargs,
    ) -> KdbResult<C::Output> {
        self.call(Command::new(function, args, kwargs)).await
    }

    /// Call a prepared command
    pub async fn call(&self, command: Command) -> KdbResult<C::Output> {
        let policy = self.registry.resolve(&command.function);
        debug!(
            "Invoking {} (chunk_dims={:?}, max_retries={})",
            command.function, policy.chunk_dims, policy.max_retries
        );

        self.listener
            .total_invocations
            .fetch_add(1, Ordering::Relaxed);

        let executor = AdaptiveExecutor::new(policy, self.backoff, &self.listener);
        let mut connection = self.connection.lock().await;
        let result = executor.execute(&mut *connection, command, 0).await;

        let counter = if result.is_ok() {
            &self.listener.successful_invocations
        } else {
            &self.listener.failed_invocations
        };
        counter.fetch_add(1, Ordering::Relaxed);

        result
    }

    /// Get client statistics
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            total_invocations: self.listener.total_invocations.load(Ordering::Relaxed),
            successful_invocations: self.listener.successful_invocations.load(Ordering::Relaxed),
            failed_invocations: self.listener.failed_invocations.load(Ordering::Relaxed),
            retried_requests: self.listener.retried_requests.load(Ordering::Relaxed),
            split_requests: self.listener.split_requests.load(Ordering::Relaxed),
        }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take back the underlying connection
    pub fn into_inner(self) -> C {
        self.connection.into_inner()
    }
}

// Implement Debug manually to avoid printing the connection
impl<C> std::fmt::Debug for KdbClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdbClient")
            .field("name", &self.name)
            .field("functions", &self.registry.len())
            .field("backoff", &self.backoff)
            .finish()
    }
}
