//! Git utility helpers.
//!
//! Clones shell out to `git` via `std::process::Command`.

use anyhow::{Context, Result, bail};
use std::io::IsTerminal;
use std::path::Path;
use std::process::{Command, Stdio};

/// Capability to materialize a repository checkout inside a directory.
pub trait Cloner {
    /// Clone `url` into a new folder inside `into`.
    fn clone_repo(&self, url: &str, into: &Path) -> Result<()>;
}

/// [`Cloner`] backed by the `git` executable.
///
/// The default cloner never waits for input: a clone that needs credentials
/// fails at once. An interactive cloner lets git prompt on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCloner {
    interactive: bool,
}

impl GitCloner {
    pub fn interactive() -> Self {
        Self { interactive: true }
    }

    /// Interactive only when stdin is a terminal.
    pub fn for_stdin() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal(),
        }
    }

    fn command(&self, dir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(dir);
        if self.interactive {
            cmd.stdin(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null()).env("GIT_TERMINAL_PROMPT", "0");
        }
        cmd
    }

    /// Run a git command inside `dir`, failing on non-zero exit.
    ///
    /// stderr is captured and folded into the error message. Credential
    /// prompts go to the controlling terminal, not stderr.
    fn run_git_in(&self, dir: &Path, args: &[&str]) -> Result<()> {
        let output = self
            .command(dir, args)
            .output()
            .context("failed to execute git")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git {} failed (exit {}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

impl Cloner for GitCloner {
    fn clone_repo(&self, url: &str, into: &Path) -> Result<()> {
        self.run_git_in(into, &["clone", "--quiet", url])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
