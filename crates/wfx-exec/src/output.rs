use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};
use wfx_model::TaskId;

/// How process output lines are forwarded to `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Max line length before truncation.
    pub max_line_length: usize,
    /// Log stdout at INFO level (false = DEBUG).
    pub stdout_info: bool,
    /// Log stderr at WARN level (false = DEBUG).
    pub stderr_warn: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: true,
            stderr_warn: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// Forward every line of `reader` to the log until EOF.
pub(crate) fn spawn_line_logger<R>(reader: R, task: TaskId, stream: Stream, cfg: LogConfig)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => emit(&task, stream, &cfg, truncate(&line, cfg.max_line_length)),
                Ok(None) => break,
                Err(e) => {
                    debug!(task = %task, stream = stream.as_str(), error = %e, "output reader failed");
                    break;
                }
            }
        }
    });
}

fn emit(task: &TaskId, stream: Stream, cfg: &LogConfig, line: &str) {
    match stream {
        Stream::Stdout if cfg.stdout_info => info!(task = %task, stream = "stdout", "{line}"),
        Stream::Stderr if cfg.stderr_warn => warn!(task = %task, stream = "stderr", "{line}"),
        _ => debug!(task = %task, stream = stream.as_str(), "{line}"),
    }
}

/// Cut `line` to at most `max` bytes on a char boundary.
fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
