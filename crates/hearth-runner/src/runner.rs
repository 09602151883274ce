//! Skill process runner
//!
//! One process per invoked action. The intent file path is appended to the
//! configured command line; stdout is demultiplexed into diagnostics and
//! result lines while the process runs.

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::frame::{Frame, StdoutDemux};
use crate::intent_file::IntentFile;
use async_trait::async_trait;
use hearth_skills::SkillConfig;
use hearth_types::{IntentContext, SkillOutput};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Executes one resolved action and reports its streamed results
#[async_trait]
pub trait SkillExecutor: Send + Sync {
    /// Run the action described by `intent`.
    ///
    /// Every parsed result line is sent on `events` as it arrives; the last
    /// one is returned as the authoritative result.
    ///
    /// # Errors
    /// Returns an error on spawn failure, stderr output, abnormal exit,
    /// timeout, or when no result line was produced
    async fn invoke(
        &self,
        intent: IntentContext,
        skill: &SkillConfig,
        events: mpsc::UnboundedSender<SkillOutput>,
    ) -> Result<SkillOutput>;
}

/// [`SkillExecutor`] spawning one OS process per invocation
pub struct SkillProcessRunner {
    config: RunnerConfig,
}

impl SkillProcessRunner {
    /// Create a runner from its configuration
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        info!(
            "Skill runner configured: {} {:?} (timeout: {:?})",
            config.command,
            config.args,
            config.timeout()
        );
        Self { config }
    }

    /// Runner configuration
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn spawn(&self, intent_path: &std::path::Path) -> Result<Child> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        cmd.arg(intent_path);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        cmd.spawn().map_err(|source| RunnerError::Spawn {
            command: self.config.command.clone(),
            source,
        })
    }

    /// Read stdout to the end, dispatching frames as they complete
    async fn pump<R>(
        &self,
        mut stdout: R,
        demux: &mut StdoutDemux,
        events: &mpsc::UnboundedSender<SkillOutput>,
        label: &str,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut chunk = [0u8; 4096];
        loop {
            let read = stdout.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            for frame in demux.feed(&chunk[..read]) {
                dispatch(frame, events, label);
            }
        }
        if let Some(frame) = demux.finish() {
            dispatch(frame, events, label);
        }
        Ok(())
    }

    /// Terminate, then kill after the grace period
    async fn terminate(&self, child: &mut Child, label: &str) {
        if let Some(pid) = child.id() {
            if send_sigterm(pid).await {
                let grace = self.config.kill_grace();
                if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                    debug!("Skill {} terminated", label);
                    return;
                }
                warn!("Skill {} ignored SIGTERM for {:?}, killing", label, grace);
            }
        }

        if let Err(e) = child.kill().await {
            warn!("Failed to kill skill {}: {}", label, e);
        }
    }
}

#[cfg(unix)]
async fn send_sigterm(pid: u32) -> bool {
    Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
async fn send_sigterm(_pid: u32) -> bool {
    false
}

fn dispatch(frame: Frame, events: &mpsc::UnboundedSender<SkillOutput>, label: &str) {
    match frame {
        Frame::Diagnostic(message) => {
            debug!(target: "hearth::skill", skill = %label, "{}", message);
        }
        Frame::Result(output) => {
            if events.send(*output).is_err() {
                debug!("Result of {} dropped, nobody is listening", label);
            }
        }
        Frame::Malformed { line, error } => {
            error!("Skill {} printed an invalid line ({}): {}", label, error, line);
        }
        Frame::Blank => {}
    }
}

fn check_exit(status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::ExitStatus {
            code: status.code(),
        })
    }
}

#[async_trait]
impl SkillExecutor for SkillProcessRunner {
    async fn invoke(
        &self,
        intent: IntentContext,
        skill: &SkillConfig,
        events: mpsc::UnboundedSender<SkillOutput>,
    ) -> Result<SkillOutput> {
        let label = intent
            .skill_action()
            .map_or_else(|| skill.name.clone(), |r| r.to_string());

        // Removed when the guard drops, on every path out of this function
        let intent_file = IntentFile::new(&intent, skill)
            .write(&self.config.intent_dir)
            .await?;

        info!("Invoking skill {} (turn {})", label, intent.id);

        let mut child = self.spawn(intent_file.path())?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Io(std::io::Error::other("stdout not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Io(std::io::Error::other("stderr not captured")))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        });

        let mut demux = StdoutDemux::new(self.config.log_marker.clone());

        let run = async {
            self.pump(stdout, &mut demux, &events, &label).await?;
            child.wait().await.map_err(RunnerError::from)
        };

        let status = match self.config.timeout() {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(status) => status?,
                Err(_) => {
                    error!("Skill {} timed out after {:?}", label, limit);
                    self.terminate(&mut child, &label).await;
                    stderr_task.abort();
                    return Err(RunnerError::Timeout(limit));
                }
            },
            None => run.await?,
        };

        let stderr_output = match stderr_task.await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(RunnerError::Io(e)),
            Err(e) => return Err(RunnerError::Io(std::io::Error::other(e))),
        };

        if !stderr_output.trim().is_empty() {
            error!("Skill {} wrote to stderr: {}", label, stderr_output.trim());
            return Err(RunnerError::Stderr(stderr_output.trim().to_string()));
        }

        check_exit(status)?;

        debug!(
            "Skill {} finished: {} result line(s), {} malformed",
            label,
            demux.result_count(),
            demux.malformed_count()
        );

        demux.into_result().ok_or(RunnerError::NoResult)
    }
}
