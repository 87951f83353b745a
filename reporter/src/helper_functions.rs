use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::ReportError;

/// Number of line-terminator-delimited records in a file.
pub fn count_lines(path: &Path) -> Result<u64, ReportError> {
    let file = File::open(path).map_err(|e| ReportError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut count = 0u64;
    for line in reader.lines() {
        line.map_err(|e| ReportError::io(path, e))?;
        count += 1;
    }
    Ok(count)
}

/// Total line count over every direct child of `folder` with the given
/// extension. A missing folder or an empty match set is a normal condition
/// and yields 0.
pub fn count_lines_in_folder(folder: &Path, extension: &str) -> Result<u64, ReportError> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("folder {} not readable ({}), counting 0 lines", folder.display(), e);
            return Ok(0);
        }
    };

    let mut count = 0u64;
    for entry in entries {
        let entry = entry.map_err(|e| ReportError::io(folder, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            count += count_lines(&path)?;
        }
    }
    Ok(count)
}

/// Reader thread over one of the child's pipes. The pipes must be drained
/// while the child runs: an undrained pipe fills the OS buffer and blocks the
/// child on write, which would then look hung to the poll loop.
fn drain_pipe(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Run an external command, capturing stdout, with a hard deadline. The
/// deadline is for hung tools, not a cap on output size: stdout and stderr
/// are drained concurrently with the wait. The child is killed on timeout and
/// the timeout is fatal for the run.
pub fn run_with_timeout(
    mut cmd: Command,
    tool: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ReportError> {
    debug!("spawning {}: {:?}", tool, cmd);

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReportError::Tool {
            tool: tool.to_string(),
            detail: format!("failed to spawn: {}", e),
        })?;

    let stdout_reader = drain_pipe(child.stdout.take());
    let stderr_reader = drain_pipe(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ReportError::ToolTimeout {
                        tool: tool.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(ReportError::Tool {
                    tool: tool.to_string(),
                    detail: format!("wait failed: {}", e),
                })
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(ReportError::Tool {
            tool: tool.to_string(),
            detail: format!("exited with {}: {}", status, stderr.trim()),
        });
    }

    Ok(stdout)
}
