use log::{debug, info, trace, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::capture::manager::{stopped, CaptureManager};
use crate::console::render::{self, ConsoleWriter};
use crate::models::packet::{PacketRecord, FIELD_COUNT};

/// Why the ingestion loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEnd {
    /// The provider closed its output
    EndOfStream,

    /// The run was stopped while lines may still have been pending
    Stopped,
}

/// Counters local to one ingestion run, for the shutdown log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub end: IngestEnd,
    pub lines_read: u64,
    pub lines_skipped: u64,
    pub render_failures: u64,
}

/// Consume provider lines until the stream closes or the run is stopped.
///
/// Every complete record is counted, paused or not. Rendering happens only
/// while unpaused and when the display filter accepts the record. Reaching
/// the end of the stream stops the whole run. A packet line that cannot be
/// printed is dropped; counting carries on.
pub async fn run_ingestion<R, C>(
    mut reader: R,
    manager: Arc<CaptureManager>,
    separator: char,
    mut console: C,
) -> IngestSummary
where
    R: AsyncBufRead + Unpin,
    C: ConsoleWriter,
{
    info!("Starting ingestion loop");

    let mut shutdown = manager.shutdown_listener();
    let mut buffer = Vec::new();
    let mut lines_read = 0u64;
    let mut lines_skipped = 0u64;
    let mut render_failures = 0u64;

    let end = loop {
        if !manager.is_running() {
            break IngestEnd::Stopped;
        }

        buffer.clear();
        let read = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break IngestEnd::Stopped,
            read = reader.read_until(b'\n', &mut buffer) => read,
        };

        match read {
            Ok(0) => {
                info!("Capture provider closed its output");
                manager.stop();
                break IngestEnd::EndOfStream;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Error reading provider output: {}", e);
                manager.stop();
                break IngestEnd::EndOfStream;
            }
        }

        // A stop may have landed while this line was being read.
        if !manager.is_running() {
            break IngestEnd::Stopped;
        }

        lines_read += 1;
        let line = String::from_utf8_lossy(&buffer);
        let Some(packet) = PacketRecord::parse(&line, separator) else {
            lines_skipped += 1;
            trace!("Skipping line with fewer than {} fields: {:?}", FIELD_COUNT, line.trim_end());
            continue;
        };

        manager.record_packet(packet.protocol());

        if manager.should_render(&packet) {
            if let Err(e) = console.emit(|out| render::write_packet(out, &packet)) {
                render_failures += 1;
                debug!("Unable to print packet line: {}", e);
            }
        }
    };

    debug!(
        "Ingestion loop finished ({:?}): {} lines read, {} skipped, {} not printed",
        end, lines_read, lines_skipped, render_failures
    );

    IngestSummary {
        end,
        lines_read,
        lines_skipped,
        render_failures,
    }
}
