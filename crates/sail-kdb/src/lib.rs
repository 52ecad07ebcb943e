//! Resilient kdb+ client for Sail
//!
//! This crate calls functions on a kdb+ store over a single TCP connection
//! and reads their results back as Arrow record batches. Calls whose
//! arguments the store rejects as too big are split along configured
//! keyword arguments and retried, recursively, until every part succeeds.
//!
//! # Features
//!
//! - **Frame transport**: length-prefixed responses reassembled from partial reads
//! - **Adaptive chunking**: oversized list arguments halved in declared order
//! - **Bounded retries**: fixed backoff, per-function retry bounds
//! - **Arrow results**: IPC stream payloads decoded into record batches
//!
//! # Example
//!
//! ```no_run
//! use sail_kdb::{KdbClient, KdbConfig, Kwargs, QValue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KdbConfig {
//!         uri: "kdb://localhost:5001".to_string(),
//!         ..Default::default()
//!     }
//!     .with_function("getDataByDate", &["symbols"], 3);
//!
//!     let client = KdbClient::connect(config).await?;
//!
//!     let mut kwargs = Kwargs::new();
//!     kwargs.insert(
//!         "symbols".to_string(),
//!         QValue::symbols(["AAPL", "GOOG", "MSFT", "AMZN", "FB", "TSLA"]),
//!     );
//!     kwargs.insert("date".to_string(), QValue::from("2025.01.01"));
//!
//!     let table = client.invoke("getDataByDate", vec![], kwargs).await?;
//!     println!("Fetched {} rows", table.num_rows());
//!
//!     Ok(())
//! }
//! ```

// Re-export commonly used types
pub use client::connection::{KdbConnection, RemoteCall};
pub use client::transport::FrameTransport;
pub use client::{ClientStats, KdbClient};
pub use config::{FunctionConfig, KdbConfig, KdbRetryConfig, KdbTransportConfig};
pub use decode::{ArrowIpcDecoder, ArrowTable, ResultDecoder};
pub use error::{ErrorKind, FrameStage, KdbError, KdbResult};
pub use executor::{AdaptiveExecutor, ExecutionEvent, ExecutionListener, Merge};
pub use policy::{FunctionPolicy, PolicyRegistry};
pub use types::{Command, Kwargs, QValue, QueryBuilder, Symbol};

// Public modules
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod executor;
pub mod policy;
pub mod types;
