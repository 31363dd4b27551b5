use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// stderr when present, otherwise stdout, trimmed.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs `git <args>` in a directory.
///
/// An `Err` means the program could not be started at all. A
/// [`io::ErrorKind::NotFound`] error is read as "git is not installed".
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cwd: &Path, args: &[&str]) -> io::Result<CommandOutput>;
}

/// Spawns the real git binary.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
}

impl GitRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl CommandRunner for GitRunner {
    async fn run(&self, cwd: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        let out = tokio::process::Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: out.status.success(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}
