// ABOUTME: External program invocation behind a narrow, fakeable trait
// ABOUTME: Tool lookup on PATH, argv/env/stdin plumbing, exit status mapping

use crate::error::ExportError;
use crate::utils::scrub_secrets;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use zeroize::Zeroizing;

/// An external executable the pipeline depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub name: &'static str,
    pub install_hint: &'static str,
}

pub const PG_DUMP: Tool = Tool {
    name: "pg_dump",
    install_hint: "Install PostgreSQL client tools (e.g., \"brew install libpq\" or \
                   \"apt-get install postgresql-client\") and try again.",
};

pub const DUCKDB: Tool = Tool {
    name: "duckdb",
    install_hint: "Install DuckDB from https://duckdb.org/install and try again.",
};

/// A planned call to an external program.
///
/// Values are kept as discrete argv elements, environment overrides, or a
/// stdin script; nothing is ever joined into a shell command line. Anything
/// registered with [`Invocation::secret`] is masked in `Debug` output and
/// scrubbed from captured stderr.
#[derive(Clone)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
    envs: Vec<(String, Zeroizing<String>)>,
    stdin: Option<Zeroizing<String>>,
    secrets: Vec<Zeroizing<String>>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: None,
            secrets: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Environment override for the child. Values are never printed.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), Zeroizing::new(value.into())));
        self
    }

    /// Script written to the child's stdin, which is then closed
    pub fn stdin(mut self, script: impl Into<String>) -> Self {
        self.stdin = Some(Zeroizing::new(script.into()));
        self
    }

    pub fn secret(mut self, value: impl Into<String>) -> Self {
        self.secrets.push(Zeroizing::new(value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as UTF-8 strings, lossy
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn stdin_script(&self) -> Option<&str> {
        self.stdin.as_ref().map(|s| s.as_str())
    }

    fn secret_strs(&self) -> Vec<&str> {
        self.secrets.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secrets = self.secret_strs();
        let args: Vec<String> = self
            .args_lossy()
            .iter()
            .map(|a| scrub_secrets(a, &secrets))
            .collect();
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();

        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &args)
            .field("env", &env_keys)
            .field("stdin_bytes", &self.stdin.as_ref().map_or(0, |s| s.len()))
            .finish()
    }
}

/// What a finished child left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the child was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs.
///
/// [`SystemRunner`] spawns real processes; tests substitute a recorder.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Full path of `program` if it is on the search path
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run to completion and capture the result. A non-zero exit is not an
    /// error at this level; only failing to start or talk to the child is.
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;
}

/// Spawns real child processes through Tokio.
///
/// Children are killed if the awaiting future is dropped, which is how an
/// aborted export cancels work that is still in flight.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &invocation.envs {
            cmd.env(key, value.as_str());
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExportError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let pipe = child.stdin.take();
        let script = invocation.stdin.as_ref();
        let feed = async move {
            if let (Some(mut pipe), Some(script)) = (pipe, script) {
                pipe.write_all(script.as_bytes()).await?;
                pipe.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output
            .with_context(|| format!("Failed to wait for {}", invocation.program))?;

        if let Err(e) = fed {
            // A child that dies early closes its stdin; its exit status says more.
            if output.status.success() {
                return Err(e)
                    .with_context(|| format!("Failed to write script to {}", invocation.program));
            }
            tracing::debug!("Writing stdin to {} failed: {}", invocation.program, e);
        }

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        })
    }
}

/// Fail fast with an install hint if `tool` is not on the search path.
pub fn require_tool(runner: &dyn ProcessRunner, tool: &Tool) -> Result<PathBuf> {
    match runner.locate(tool.name) {
        Some(path) => {
            tracing::debug!("Found {} at {}", tool.name, path.display());
            Ok(path)
        }
        None => Err(ExportError::ToolMissing {
            tool: tool.name.to_string(),
            hint: tool.install_hint,
        }
        .into()),
    }
}

/// Run `invocation` and require a zero exit status.
///
/// `step` names the operation in logs and in the resulting
/// [`ExportError::ProcessFailed`].
pub async fn invoke(
    runner: &dyn ProcessRunner,
    invocation: &Invocation,
    step: &str,
) -> Result<ProcessOutput> {
    tracing::debug!("Running {}: {:?}", step, invocation);

    let output = runner.run(invocation).await?;
    tracing::debug!(
        "{} finished in {:.2?} ({})",
        step,
        output.duration,
        output.status_description()
    );

    if !output.success() {
        let stderr = scrub_secrets(output.stderr.trim(), &invocation.secret_strs());
        return Err(ExportError::ProcessFailed {
            step: step.to_string(),
            status: output.status_description(),
            stderr: if stderr.is_empty() {
                "<no output>".to_string()
            } else {
                stderr
            },
        }
        .into());
    }

    Ok(output)
}
