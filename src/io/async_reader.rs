//! Asynchronous CSV reader with stream interface
//!
//! Provides a streaming interface over scenario commands from a CSV file.
//! Supports batch reading so the replay loop can amortize parsing while
//! still applying commands strictly in file order.
//!
//! Invalid rows are logged and skipped; the stream continues with the next
//! row, matching the recoverable-error treatment of the rest of the engine.

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

use crate::io::csv_format::{convert_csv_command, CsvCommand};
use crate::types::Command;

/// Asynchronous CSV command reader
///
/// Maintains streaming behavior with constant memory usage.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read a batch of commands
    ///
    /// Reads up to `batch_size` rows, converting them to commands. Invalid
    /// rows are logged and skipped. Returns an empty vector at end of file.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Command> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<CsvCommand>();

        while batch.len() < batch_size {
            match rows.next().await {
                Some(Ok(row)) => match convert_csv_command(row) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(error = %e, "skipping invalid command row"),
                },
                Some(Err(e)) => warn!(error = %e, "skipping unparseable CSV row"),
                None => break,
            }
        }

        batch
    }
}
