//! Decoding of frame payloads into Arrow record batches

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::ipc::reader::StreamReader;
use tracing::{trace, warn};

use crate::error::{KdbError, KdbResult};
use crate::executor::Merge;

/// Turns a raw frame payload into a result value
pub trait ResultDecoder: Send + Sync {
    type Output: Send;

    fn decode(&self, payload: &[u8]) -> KdbResult<Self::Output>;
}

/// Tabular result: a schema and the batches read under it
#[derive(Debug, Clone)]
pub struct ArrowTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl ArrowTable {
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            batches: Vec::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Batches are concatenated only when both sides share a schema; a side
/// without batches takes the other's schema.
impl Merge for ArrowTable {
    fn merge(mut self, other: Self) -> KdbResult<Self> {
        if self.batches.is_empty() {
            return Ok(other);
        }
        if other.batches.is_empty() {
            return Ok(self);
        }
        if self.schema != other.schema {
            let left = field_names(&self.schema);
            let right = field_names(&other.schema);
            warn!("Split results have different schemas: [{}] and [{}]", left, right);
            return Err(KdbError::SchemaMismatch { left, right });
        }
        self.batches.extend(other.batches);
        Ok(self)
    }
}

fn field_names(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|field| field.name().as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads payloads encoded as an Arrow IPC stream
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowIpcDecoder;

impl ResultDecoder for ArrowIpcDecoder {
    type Output = ArrowTable;

    fn decode(&self, payload: &[u8]) -> KdbResult<ArrowTable> {
        let reader = StreamReader::try_new(Cursor::new(payload), None)
            .map_err(|e| KdbError::Decode(format!("invalid Arrow IPC stream: {}", e)))?;
        let schema = reader.schema();
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| KdbError::Decode(format!("failed to read record batch: {}", e)))?;

        trace!(
            "Decoded {} batches ({} bytes) from Arrow IPC stream",
            batches.len(),
            payload.len()
        );
        Ok(ArrowTable { schema, batches })
    }
}
