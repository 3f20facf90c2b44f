//! Scenario replay pipeline
//!
//! Reads lifecycle commands from a CSV scenario file, applies them to an
//! engine strictly in file order, and writes the final transactable states
//! to the output writer. Command failures are recoverable — logged with
//! their would-be HTTP status and skipped — while I/O failures abort the
//! replay.

use std::io::Write;
use std::path::Path;

use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::warn;

use crate::core::LifecycleEngine;
use crate::io::{write_states_csv, AsyncReader};
use crate::types::EngineError;

const BATCH_SIZE: usize = 256;

/// Replay a scenario file against the engine and write final states
pub async fn replay(
    engine: &LifecycleEngine,
    input_path: &Path,
    output: &mut dyn Write,
) -> Result<(), EngineError> {
    if !input_path.exists() {
        return Err(EngineError::FileNotFound {
            path: input_path.display().to_string(),
        });
    }

    let file = tokio::fs::File::open(input_path).await?;
    let mut reader = AsyncReader::new(file.compat());

    loop {
        let batch = reader.read_batch(BATCH_SIZE).await;
        if batch.is_empty() {
            break;
        }
        // Scenario rows are causally ordered; apply them one at a time.
        for command in batch {
            if let Err(e) = engine.apply(command).await {
                warn!(status = e.status_code(), error = %e, "command rejected");
            }
        }
    }

    write_states_csv(&engine.transactables(), &engine.payments(), output)
}
