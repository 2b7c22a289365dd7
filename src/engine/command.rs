//! Engine running as a separate OS process.
//!
//! A crash or hang of the engine cannot take the worker down with it: a
//! crash surfaces as a non-zero exit, a hang is cut short by the timeout.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::EngineConfig;

use super::{EngineError, EngineJob, ReconstructionEngine};

/// File the mapper options are written to, next to the database.
pub const OPTIONS_FILE: &str = "options.json";

/// File receiving the engine's stdout and stderr, next to the database.
pub const LOG_FILE: &str = "engine.log";

/// Interval between exit checks while a timeout is armed.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Lines of engine output quoted when the engine fails.
const LOG_TAIL_LINES: usize = 10;

/// Runs a configured external program per reconstruction.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    config: EngineConfig,
}

impl CommandEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Substitute the job's paths into the configured argument templates.
    ///
    /// An argument that is exactly one placeholder receives the path
    /// unchanged; embedded placeholders are substituted as text.
    fn render_args(&self, job: &EngineJob<'_>, options_path: &Path) -> Vec<OsString> {
        let placeholders: [(&str, &Path); 4] = [
            ("{database}", job.database_path),
            ("{image_path}", job.image_path),
            ("{output_path}", job.output_path),
            ("{options}", options_path),
        ];

        self.config
            .args
            .iter()
            .map(|arg| {
                if let Some((_, path)) = placeholders.iter().find(|(key, _)| *key == arg.as_str()) {
                    return path.as_os_str().to_os_string();
                }
                let rendered = placeholders.iter().fold(arg.clone(), |acc, (key, path)| {
                    acc.replace(key, &path.to_string_lossy())
                });
                OsString::from(rendered)
            })
            .collect()
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, EngineError> {
        let Some(secs) = self.config.timeout_secs else {
            return Ok(child.wait()?);
        };

        let timeout = Duration::from_secs(secs);
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                kill_process_group(child);
                let _ = child.wait();
                return Err(EngineError::Timeout { secs });
            }
            thread::sleep(WAIT_POLL);
        }
    }
}

impl ReconstructionEngine for CommandEngine {
    fn reconstruct(&self, job: &EngineJob<'_>) -> Result<(), EngineError> {
        let work_dir = job.database_path.parent().unwrap_or_else(|| Path::new("."));

        let options_path = work_dir.join(OPTIONS_FILE);
        {
            let mut writer = BufWriter::new(File::create(&options_path)?);
            serde_json::to_writer_pretty(&mut writer, job.options)
                .map_err(std::io::Error::from)?;
            writer.flush()?;
        }

        let log_path = work_dir.join(LOG_FILE);
        let log = File::create(&log_path)?;
        let log_err = log.try_clone()?;

        let args = self.render_args(job, &options_path);
        debug!("Launching {} {:?}", self.config.program.display(), args);

        let mut command = Command::new(&self.config.program);
        // Own process group, so a timeout also reaches the engine's children
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let status = self.wait(&mut child)?;
        if status.success() {
            return Ok(());
        }

        if let Some(tail) = log_tail(&log_path) {
            warn!("Engine output before failure:\n{}", tail);
        }
        Err(EngineError::Exit { status })
    }
}

/// Kill the engine and everything it spawned.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // The engine leads its own group, so its pid is the group id
        let pgid = child.id() as libc::pid_t;
        // SAFETY: kill(2) only sends a signal; a stale group id fails with ESRCH.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    // The child may exit between the check and the kill
    let _ = child.kill();
}

fn log_tail(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let lines: Vec<&str> = contents.lines().collect();
    if lines.is_empty() {
        return None;
    }
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    Some(lines[start..].join("\n"))
}
