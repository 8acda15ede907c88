// ABOUTME: Test doubles for the process runner and the secret prompt
// ABOUTME: Record every call instead of spawning pg_dump or duckdb

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use schemafetcher::commands::{self, Runtime};
use schemafetcher::credentials::SecretPrompt;
use schemafetcher::process::{Invocation, ProcessOutput, ProcessRunner};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Pretends every tool exists (unless listed as missing) and records calls.
///
/// Discovery scripts get `listing` on stdout. Any invocation whose args or
/// stdin contain one of `failures` exits 1 with a stderr message.
pub struct FakeRunner {
    pub missing: Vec<&'static str>,
    pub listing: String,
    pub failures: Vec<String>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            missing: Vec::new(),
            listing: "table_name\n".to_string(),
            failures: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tables(mut self, tables: &[&str]) -> Self {
        self.listing = std::iter::once("table_name")
            .chain(tables.iter().copied())
            .collect::<Vec<_>>()
            .join("\n");
        self.listing.push('\n');
        self
    }

    pub fn with_listing(mut self, listing: &str) -> Self {
        self.listing = listing.to_string();
        self
    }

    pub fn missing(mut self, tool: &'static str) -> Self {
        self.missing.push(tool);
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failures.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program() == program)
            .collect()
    }

    /// Table exports only, discovery excluded
    pub fn exports(&self) -> Vec<Invocation> {
        self.calls_to("duckdb")
            .into_iter()
            .filter(|c| c.stdin_script().is_some_and(|s| s.contains("COPY (")))
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing.contains(&program) {
            None
        } else {
            Some(PathBuf::from("/usr/local/bin").join(program))
        }
    }

    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let args = invocation.args_lossy().join(" ");
        let script = invocation.stdin_script().unwrap_or("");

        let failed = self
            .failures
            .iter()
            .any(|needle| args.contains(needle.as_str()) || script.contains(needle.as_str()));
        if failed {
            return Ok(ProcessOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "simulated failure\n".to_string(),
                duration: Duration::from_millis(3),
            });
        }

        let stdout = if script.contains("information_schema.tables") {
            self.listing.clone()
        } else {
            String::new()
        };

        Ok(ProcessOutput {
            code: Some(0),
            stdout,
            stderr: String::new(),
            duration: Duration::from_millis(3),
        })
    }
}

/// Returns a fixed answer and counts how often it was asked
pub struct ScriptedPrompt {
    answer: String,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretPrompt for ScriptedPrompt {
    fn read_secret(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// Run the CLI in-process with the given doubles
pub async fn run_cli(
    args: &[&str],
    runner: &FakeRunner,
    prompt: &ScriptedPrompt,
    env_database_url: Option<&str>,
) -> u8 {
    let runtime = Runtime {
        runner,
        prompt,
        env_database_url: env_database_url.map(str::to_string),
    };
    let argv = std::iter::once("schemafetcher").chain(args.iter().copied());
    commands::run(argv, &runtime).await
}
