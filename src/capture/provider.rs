use log::{debug, info, warn};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::models::config::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// Fields requested from tshark, in the order the ingestion loop expects
pub const CAPTURE_FIELDS: [&str; 7] = [
    "ip.src",
    "ip.dst",
    "tcp.srcport",
    "tcp.dstport",
    "udp.srcport",
    "udp.dstport",
    "frame.protocols",
];

/// How to launch the external capture provider
#[derive(Debug, Clone)]
pub struct TsharkProvider {
    program: String,
    interfaces: Vec<String>,
    separator: char,
    capture_file: PathBuf,
}

impl TsharkProvider {
    pub fn new(config: &AppConfig, capture_file: PathBuf) -> Self {
        Self {
            program: config.tshark_path.clone(),
            interfaces: config.interfaces.clone(),
            separator: config.separator,
            capture_file,
        }
    }

    /// Arguments for a live capture that writes the raw packets to the
    /// capture file and prints one delimited line per packet.
    pub fn capture_args(&self) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            "-w".to_string(),
            self.capture_file.display().to_string(),
        ];

        for iface in &self.interfaces {
            args.push("-i".to_string());
            args.push(iface.clone());
        }

        args.push("-T".to_string());
        args.push("fields".to_string());
        for field in CAPTURE_FIELDS {
            args.push("-e".to_string());
            args.push(field.to_string());
        }
        args.push("-E".to_string());
        args.push(format!("separator={}", self.separator));

        args
    }

    /// Launch the provider. Failing here is fatal for the run.
    pub fn spawn(&self) -> AppResult<RunningProvider> {
        self.launch(&self.capture_args())
    }

    fn launch(&self, args: &[String]) -> AppResult<RunningProvider> {
        info!("Starting capture provider: {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AppError::ProviderStart {
                program: self.program.clone(),
                source,
            })?;

        // Drain stderr so the provider never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|stderr| {
            let program = self.program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("{} output: {}", program, line);
                }
            })
        });

        let stdout = child.stdout.take();
        Ok(RunningProvider {
            child,
            stdout,
            stderr_task,
        })
    }
}

/// A launched provider process
pub struct RunningProvider {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
}

impl RunningProvider {
    /// Take the packet line stream. Only available once.
    pub fn take_output(&mut self) -> AppResult<BufReader<ChildStdout>> {
        self.stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| AppError::ProviderError("provider output already taken".to_string()))
    }

    /// Ask the provider to finish its capture file and exit, killing it if it
    /// is still running after `grace`.
    pub async fn stop(mut self, grace: Duration) -> AppResult<ExitStatus> {
        if let Err(e) = interrupt(&mut self.child) {
            warn!("Failed to interrupt capture provider: {}", e);
        }

        let waited = tokio::time::timeout(grace, self.child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    "Capture provider still running after {:?}, killing it",
                    grace
                );
                self.child.kill().await?;
                self.child.wait().await?
            }
        };

        if let Some(task) = self.stderr_task.take() {
            // The pipe closes with the process; don't hang on a stray grandchild.
            if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
                debug!("Provider stderr still open after exit");
            }
        }

        info!("Capture provider exited with {}", status);
        Ok(status)
    }
}

/// Deliver an interrupt, the same signal tshark gets from Ctrl-C
#[cfg(unix)]
fn interrupt(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // our own child and has not been reaped yet.
    if unsafe { libc::kill(pid, libc::SIGINT) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

/// Ask the provider for its list of capture interfaces (`tshark -D`)
pub async fn list_interfaces(program: &str) -> AppResult<Vec<String>> {
    let output = Command::new(program)
        .arg("-D")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| AppError::ProviderStart {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::ProviderError(format!(
            "interface listing failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    fn provider(program: &str, interfaces: &[&str]) -> TsharkProvider {
        let config = AppConfig {
            tshark_path: program.to_string(),
            ..AppConfig::default()
        }
        .with_interfaces(interfaces.iter().copied());
        TsharkProvider::new(&config, PathBuf::from("captures/capture_test.pcap"))
    }

    #[test]
    fn capture_args_request_the_seven_fields() {
        let args = provider("tshark", &["1", "2"]).capture_args();

        assert_eq!(
            args,
            vec![
                "-l", "-w", "captures/capture_test.pcap",
                "-i", "1", "-i", "2",
                "-T", "fields",
                "-e", "ip.src", "-e", "ip.dst",
                "-e", "tcp.srcport", "-e", "tcp.dstport",
                "-e", "udp.srcport", "-e", "udp.dstport",
                "-e", "frame.protocols",
                "-E", "separator=|",
            ]
        );
    }

    #[test]
    fn default_interface_is_any() {
        let args = provider("tshark", &[]).capture_args();
        let pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[pos + 1], "any");
    }

    #[tokio::test]
    async fn missing_binary_is_a_startup_error() {
        let err = provider("/nonexistent/tshark-binary", &[]).spawn().err().unwrap();
        assert!(matches!(err, AppError::ProviderStart { .. }));
    }

    #[tokio::test]
    async fn listing_with_missing_binary_fails() {
        let err = list_interfaces("/nonexistent/tshark-binary").await.unwrap_err();
        assert!(matches!(err, AppError::ProviderStart { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_interrupts_a_running_process() {
        let mut running = TsharkProvider {
            program: "sleep".to_string(),
            interfaces: Vec::new(),
            separator: '|',
            capture_file: PathBuf::new(),
        }
        .launch(&["30".to_string()])
        .unwrap();
        let mut output = running.take_output().unwrap();
        assert!(running.take_output().is_err());

        let status = running.stop(Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());

        let mut line = String::new();
        assert_eq!(output.read_line(&mut line).await.unwrap(), 0);
    }
}
