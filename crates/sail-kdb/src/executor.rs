//! Adaptive split/retry execution of remote calls
//!
//! A call that fails is classified by its error:
//!
//! - a broken connection or a request that cannot be built is returned at
//!   once;
//! - a "too big" rejection halves the first qualifying chunk dimension and
//!   runs both halves recursively, left before right, concatenating their
//!   results;
//! - anything else is retried after a fixed pause until the policy's retry
//!   bound is reached, after which the last error is returned unchanged.
//!
//! Halving does not consume retry budget: both halves start from the retry
//! count the parent had when it split.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::client::connection::RemoteCall;
use crate::error::{ErrorKind, KdbResult};
use crate::policy::FunctionPolicy;
use crate::types::{Command, QValue};

/// Results that can be concatenated after a split
pub trait Merge: Sized {
    /// Append `other` after `self`
    fn merge(self, other: Self) -> KdbResult<Self>;
}

impl<T> Merge for Vec<T> {
    fn merge(mut self, other: Self) -> KdbResult<Self> {
        self.extend(other);
        Ok(self)
    }
}

/// Split and retry decisions, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    Split {
        function: String,
        dimension: String,
        left: usize,
        right: usize,
        retries: u32,
    },
    Retry {
        function: String,
        attempt: u32,
        max_retries: u32,
        error: String,
    },
    RetriesExhausted {
        function: String,
        max_retries: u32,
        error: String,
    },
}

/// Receives execution events as they happen
pub trait ExecutionListener: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

impl ExecutionListener for () {
    fn on_event(&self, _event: &ExecutionEvent) {}
}

/// Runs one remote call under a [`FunctionPolicy`]
pub struct AdaptiveExecutor<'a> {
    policy: &'a FunctionPolicy,
    backoff: Duration,
    listener: &'a dyn ExecutionListener,
}

impl<'a> AdaptiveExecutor<'a> {
    pub fn new(
        policy: &'a FunctionPolicy,
        backoff: Duration,
        listener: &'a dyn ExecutionListener,
    ) -> Self {
        Self {
            policy,
            backoff,
            listener,
        }
    }

    /// Execute `command` on `conn`, starting with `retries` already used
    pub fn execute<'c, C>(
        &'c self,
        conn: &'c mut C,
        command: Command,
        retries: u32,
    ) -> BoxFuture<'c, KdbResult<C::Output>>
    where
        C: RemoteCall,
    {
        Box::pin(async move {
            let error = match conn.call(&command).await {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

            if matches!(
                error.kind(),
                ErrorKind::TransportFatal | ErrorKind::InvalidRequest
            ) {
                return Err(error);
            }

            if error.is_oversized() {
                if let Some((dimension, left, right)) = self.find_split(&command) {
                    self.emit(ExecutionEvent::Split {
                        function: command.function.clone(),
                        dimension: dimension.to_string(),
                        left: left.len(),
                        right: right.len(),
                        retries,
                    });
                    info!(
                        "Subdividing {} on '{}': {} items into {} and {}",
                        command.function,
                        dimension,
                        left.len() + right.len(),
                        left.len(),
                        right.len()
                    );

                    let left_command = command.with_kwarg(dimension, QValue::List(left));
                    let right_command = command.with_kwarg(dimension, QValue::List(right));

                    let left_output = self.execute(&mut *conn, left_command, retries).await?;
                    let right_output = self.execute(&mut *conn, right_command, retries).await?;
                    return left_output.merge(right_output);
                }
            }

            if retries < self.policy.max_retries {
                let attempt = retries + 1;
                self.emit(ExecutionEvent::Retry {
                    function: command.function.clone(),
                    attempt,
                    max_retries: self.policy.max_retries,
                    error: error.to_string(),
                });
                warn!(
                    "Retry {}/{} for {} due to error: {}. Retrying after {:?}",
                    attempt, self.policy.max_retries, command.function, error, self.backoff
                );

                tokio::time::sleep(self.backoff).await;
                return self.execute(conn, command, attempt).await;
            }

            self.emit(ExecutionEvent::RetriesExhausted {
                function: command.function.clone(),
                max_retries: self.policy.max_retries,
                error: error.to_string(),
            });
            warn!(
                "Max retries ({}) exceeded for {}: {}",
                self.policy.max_retries, command.function, error
            );
            Err(error)
        })
    }

    /// First chunk dimension holding a list of more than one item, halved
    fn find_split<'c>(
        &'c self,
        command: &Command,
    ) -> Option<(&'c str, Vec<QValue>, Vec<QValue>)> {
        self.policy.chunk_dims.iter().find_map(|dimension| {
            let items = command.kwargs.get(dimension)?.as_list()?;
            if items.len() <= 1 {
                return None;
            }
            let (left, right) = split_sequence(items);
            Some((dimension.as_str(), left, right))
        })
    }

    fn emit(&self, event: ExecutionEvent) {
        self.listener.on_event(&event);
    }
}

/// Halve `items` into the first `n / 2` and the remaining `n - n / 2` items
pub fn split_sequence<T: Clone>(items: &[T]) -> (Vec<T>, Vec<T>) {
    let (left, right) = items.split_at(items.len() / 2);
    (left.to_vec(), right.to_vec())
}
