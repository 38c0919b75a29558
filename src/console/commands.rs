use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::capture::manager::{stopped, CaptureManager};
use crate::console::render::ConsoleWriter;
use crate::models::filter::DisplayFilter;

/// Operator command, one per input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Pause,
    Resume,
    /// `filter clear`
    ClearFilter,
    /// `filter <expr>`
    SetFilter(String),
}

impl Command {
    /// Parse one operator line. Unknown input yields `None` and is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim().to_lowercase();
        match line.as_str() {
            "stop" => Some(Command::Stop),
            "pause" => Some(Command::Pause),
            "resume" => Some(Command::Resume),
            _ => match line.strip_prefix("filter ")? {
                "clear" => Some(Command::ClearFilter),
                expression => Some(Command::SetFilter(expression.to_string())),
            },
        }
    }
}

/// Apply `command` and print the resulting status.
///
/// Returns `false` once the command loop should end. A status line that
/// cannot be written never undoes or blocks the command itself.
pub fn execute<C: ConsoleWriter>(command: &Command, manager: &CaptureManager, console: &mut C) -> bool {
    match command {
        Command::Stop => {
            report_status(manager, console);
            manager.stop();
            return false;
        }
        Command::Pause => manager.set_paused(true),
        Command::Resume => manager.set_paused(false),
        Command::ClearFilter => manager.set_filter(DisplayFilter::default()),
        Command::SetFilter(expression) => manager.set_filter(DisplayFilter::parse(expression)),
    }

    report_status(manager, console);
    true
}

fn report_status<C: ConsoleWriter>(manager: &CaptureManager, console: &mut C) {
    let status = manager.status();
    if let Err(e) = console.emit(|out| status.write_to(out)) {
        debug!("Unable to print status line: {}", e);
    }
}

/// Interpret operator lines until `stop`, until the run is stopped elsewhere,
/// or until the operator channel closes.
pub async fn run_command_loop<C: ConsoleWriter>(
    mut commands: mpsc::Receiver<String>,
    manager: Arc<CaptureManager>,
    mut console: C,
) {
    info!("Starting command loop");
    let mut shutdown = manager.shutdown_listener();

    loop {
        let line = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            line = commands.recv() => line,
        };

        let Some(line) = line else {
            // Capture keeps going; Ctrl-C still stops it.
            info!("Operator input closed");
            break;
        };

        let Some(command) = Command::parse(&line) else {
            debug!("Ignoring operator input {:?}", line);
            continue;
        };

        debug!("Operator command: {:?}", command);
        if !execute(&command, &manager, &mut console) {
            break;
        }
    }

    info!("Command loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::render::testing::{BrokenConsole, CapturedConsole};
    use crate::models::filter::FilterRule;
    use crate::models::packet::PacketRecord;
    use std::time::Duration;

    #[test]
    fn parses_the_command_set() {
        assert_eq!(Command::parse("stop"), Some(Command::Stop));
        assert_eq!(Command::parse("  PAUSE \n"), Some(Command::Pause));
        assert_eq!(Command::parse("resume"), Some(Command::Resume));
        assert_eq!(Command::parse("filter clear"), Some(Command::ClearFilter));
        assert_eq!(
            Command::parse("Filter Host 8.8.8.8"),
            Some(Command::SetFilter("host 8.8.8.8".to_string()))
        );
    }

    #[test]
    fn unknown_input_is_ignored() {
        for line in ["", "stpo", "filter", "filters tcp", "help", "stop now"] {
            assert_eq!(Command::parse(line), None, "{line:?}");
        }
    }

    #[test]
    fn filter_commands_store_upper_cased_expressions() {
        let manager = CaptureManager::new();
        let mut console = CapturedConsole::default();

        execute(&Command::parse("filter port 443").unwrap(), &manager, &mut console);
        let status = manager.status();
        assert_eq!(status.filter, "PORT 443");
        assert_eq!(console.lines().len(), 1);
        assert!(console.lines()[0].contains("FILTER: PORT 443 | STATE: RUNNING"));
    }

    #[test]
    fn clearing_an_empty_filter_is_a_no_op() {
        let manager = CaptureManager::new();
        let before = manager.status();

        execute(&Command::ClearFilter, &manager, &mut CapturedConsole::default());

        assert_eq!(manager.status(), before);
    }

    #[test]
    fn filter_then_clear_restores_match_all() {
        let manager = CaptureManager::new();
        let mut console = CapturedConsole::default();
        let udp = PacketRecord::parse("a|b|||1|2|eth:ip:udp", '|').unwrap();

        execute(&Command::parse("filter tcp").unwrap(), &manager, &mut console);
        assert!(!manager.should_render(&udp));

        execute(&Command::parse("filter clear").unwrap(), &manager, &mut console);
        assert!(manager.should_render(&udp));
        assert_eq!(manager.status().filter, "ALL");
        assert_eq!(DisplayFilter::default().rule(), &FilterRule::All);
    }

    #[test]
    fn pause_and_resume_report_state() {
        let manager = CaptureManager::new();
        let mut console = CapturedConsole::default();

        assert!(execute(&Command::Pause, &manager, &mut console));
        assert!(execute(&Command::Resume, &manager, &mut console));

        let lines = console.lines();
        assert!(lines[0].ends_with("STATE: PAUSED"));
        assert!(lines[1].ends_with("STATE: RUNNING"));
    }

    #[tokio::test]
    async fn stop_reports_then_ends_the_run() {
        let manager = Arc::new(CaptureManager::new());
        let console = CapturedConsole::default();
        let (tx, rx) = mpsc::channel(8);

        for line in ["hello", "pause", "stop", "resume"] {
            tx.send(line.to_string()).await.unwrap();
        }

        run_command_loop(rx, manager.clone(), console.clone()).await;

        assert!(!manager.is_running());
        let lines = console.lines();
        assert_eq!(lines.len(), 2, "unknown input prints nothing, resume never runs");
        assert!(lines[1].ends_with("STATE: PAUSED"));
    }

    #[tokio::test]
    async fn closed_input_leaves_the_run_going() {
        let manager = Arc::new(CaptureManager::new());
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(tx);

        run_command_loop(rx, manager.clone(), CapturedConsole::default()).await;

        assert!(manager.is_running());
    }

    #[tokio::test]
    async fn external_stop_ends_the_loop() {
        let manager = Arc::new(CaptureManager::new());
        let (_tx, rx) = mpsc::channel::<String>(1);

        let task = tokio::spawn(run_command_loop(
            rx,
            manager.clone(),
            CapturedConsole::default(),
        ));
        manager.stop();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("command loop noticed the stop")
            .unwrap();
    }

    #[tokio::test]
    async fn unwritable_console_still_applies_commands() {
        let manager = Arc::new(CaptureManager::new());
        let (tx, rx) = mpsc::channel(8);

        for line in ["pause", "filter udp", "stop"] {
            tx.send(line.to_string()).await.unwrap();
        }

        tokio::time::timeout(
            Duration::from_secs(1),
            run_command_loop(rx, manager.clone(), BrokenConsole),
        )
        .await
        .expect("command loop kept going past the write errors");

        let status = manager.status();
        assert!(status.paused);
        assert_eq!(status.filter, "UDP");
        assert!(!manager.is_running());
    }
}
