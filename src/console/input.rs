use log::{debug, warn};
use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc;

use crate::utils::error::AppResult;

/// Pending operator lines buffered between the reader thread and the command loop
pub const COMMAND_QUEUE: usize = 16;

/// Read operator lines on a dedicated thread and forward them over a channel.
///
/// Terminal reads cannot be cancelled, so the thread is detached: when the
/// run ends it stays parked on its read and dies with the process.
pub fn spawn_operator_reader<R>(reader: R) -> AppResult<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);

    thread::Builder::new()
        .name("operator-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            debug!("Command loop gone, operator reader exiting");
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Error reading operator input: {}", e);
                        return;
                    }
                }
            }
            debug!("Operator input reached end of file");
        })?;

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn forwards_lines_then_closes() {
        let mut rx = spawn_operator_reader(Cursor::new("pause\nfilter tcp\n")).unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("pause"));
        assert_eq!(rx.recv().await.as_deref(), Some("filter tcp"));
        assert_eq!(rx.recv().await, None);
    }
}
