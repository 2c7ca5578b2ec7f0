//! Line-delimited JSON protocol between the process-pool supervisor and
//! its long-lived workers.
//!
//! The supervisor writes one `WorkerRequest` per line to the worker's
//! stdin; the worker answers every `Evaluate` with exactly one
//! `WorkerReply` line on stdout and exits on `Shutdown` or end of input.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kernel::SegmentKernel;
use crate::segment::Segment;

/// Failure reading or writing protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("protocol i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Supervisor to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Evaluate { index: usize, segment: Segment },
    Shutdown,
}

/// Worker to supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    Partial { index: usize, value: f64 },
    Failed { index: usize, reason: String },
}

/// Write one message as a JSON line and flush.
pub fn write_message<W: Write, T: Serialize>(
    writer: &mut W,
    message: &T,
) -> Result<(), ProtocolError> {
    serde_json::to_writer(&mut *writer, message)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read the next message; `Ok(None)` at end of input.
pub fn read_message<R: BufRead, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<Option<T>, ProtocolError> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return Ok(Some(serde_json::from_str(line.trim())?));
        }
    }
}

/// Worker loop: answer requests until `Shutdown` or end of input.
///
/// Returns the number of segments evaluated.
pub fn serve<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    kernel: &dyn SegmentKernel,
) -> Result<usize, ProtocolError> {
    let mut served = 0;
    while let Some(request) = read_message::<_, WorkerRequest>(reader)? {
        match request {
            WorkerRequest::Evaluate { index, segment } => {
                let reply = match kernel.evaluate(segment) {
                    Ok(value) => WorkerReply::Partial { index, value },
                    Err(err) => WorkerReply::Failed {
                        index,
                        reason: err.to_string(),
                    },
                };
                write_message(writer, &reply)?;
                served += 1;
            }
            WorkerRequest::Shutdown => break,
        }
    }
    debug!(served, "pool worker finished");
    Ok(served)
}
