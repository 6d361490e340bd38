//! Process launching and the stderr-as-reply collection protocol.
//!
//! Every bridge operation spawns exactly one toolchain subprocess and waits
//! for it. The toolchain's contract: human-readable progress on stdout
//! (forwarded to the console, never parsed) and exactly one JSON document on
//! stderr, consumed in full once the stream closes. The child's exit code is
//! not interpreted; the reply text alone decides success or failure.
//!
//! Two launch modes exist, selected once at startup:
//! - **Direct**: run the entry-point script as-is (macOS, Linux).
//! - **Shell-bridged**: indirect through a fixed compatibility shell
//!   (WSL bash on Windows), translating native paths into the shell's
//!   convention and forcing a restricted `PATH` for the invocation. The
//!   toolchain scripts are first staged into a shell-side scratch directory,
//!   once per session.

use crate::error::{ProvisionError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Fixed compatibility shell used on Windows.
pub const WSL_BASH: &str = r"C:\Windows\system32\bash.exe";

/// Restricted PATH applied to every shell-bridged invocation.
const SHELL_ONLY_PATH: &str =
    "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Name of the staged scripts directory inside the scratch area.
const STAGED_DIR_NAME: &str = "toolchain";

#[derive(Debug, Clone)]
enum LaunchMode {
    Direct,
    Shell { shell: PathBuf },
}

/// Per-process launch context.
///
/// Owns the optional scratch path: staged at most once, reused for every
/// subsequent call, never re-validated for existence, removed only by
/// [`LaunchSession::clean_up`].
#[derive(Debug)]
pub struct LaunchSession {
    mode: LaunchMode,
    scratch: Option<String>,
}

impl LaunchSession {
    /// Select the launch mode for the current host.
    #[must_use]
    pub fn for_host() -> Self {
        #[cfg(windows)]
        {
            Self::shell_bridged(WSL_BASH)
        }
        #[cfg(not(windows))]
        {
            Self::direct()
        }
    }

    #[must_use]
    pub fn direct() -> Self {
        Self {
            mode: LaunchMode::Direct,
            scratch: None,
        }
    }

    /// Shell-bridged mode with an explicit shell binary. Production uses
    /// [`WSL_BASH`]; tests exercise the same protocol with a local shell.
    #[must_use]
    pub fn shell_bridged(shell: impl Into<PathBuf>) -> Self {
        Self {
            mode: LaunchMode::Shell {
                shell: shell.into(),
            },
            scratch: None,
        }
    }

    #[must_use]
    pub fn scratch_path(&self) -> Option<&str> {
        self.scratch.as_deref()
    }

    /// Stage the toolchain scripts into the shell's scratch area.
    ///
    /// First call creates a fresh temporary directory through the shell and
    /// copies the scripts into it; the resulting path is cached for the rest
    /// of the process. Direct mode needs no staging and returns `None`.
    /// Failure to stage is fatal for the operation that triggered it.
    pub async fn ensure_staged(&mut self, scripts_dir: &Path) -> Result<Option<String>> {
        let LaunchMode::Shell { shell } = &self.mode else {
            return Ok(None);
        };
        if let Some(scratch) = &self.scratch {
            return Ok(Some(scratch.clone()));
        }

        let output = shell_exec(shell, "mktemp -d").await?;
        if !output.status.success() {
            return Err(ProvisionError::Staging(format!(
                "mktemp -d failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let tmp = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if tmp.is_empty() {
            return Err(ProvisionError::Staging(
                "mktemp -d produced no path".to_string(),
            ));
        }

        let source = to_shell_path(scripts_dir);
        let copy_cmd = format!("cp -R '{source}' {tmp}/{STAGED_DIR_NAME}");
        let output = shell_exec(shell, &copy_cmd).await?;
        if !output.status.success() {
            return Err(ProvisionError::Staging(format!(
                "copying toolchain scripts failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let scratch = format!("{tmp}/{STAGED_DIR_NAME}");
        self.scratch = Some(scratch.clone());
        Ok(Some(scratch))
    }

    /// Spawn one toolchain subprocess and collect its reply.
    ///
    /// stdin is inherited (the toolchain may prompt for 2FA), stdout is
    /// forwarded to the console line by line as it arrives, stderr is
    /// buffered in full and returned as the raw reply text after the child
    /// exits.
    pub async fn spawn_and_collect(
        &mut self,
        program: &Path,
        args: &[String],
        scripts_dir: &Path,
    ) -> Result<String> {
        let mut cmd = match self.mode.clone() {
            LaunchMode::Direct => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            LaunchMode::Shell { shell } => {
                let scratch = self
                    .ensure_staged(scripts_dir)
                    .await?
                    .ok_or_else(|| ProvisionError::Staging("no scratch path".to_string()))?;
                let script = program
                    .file_name()
                    .ok_or_else(|| {
                        ProvisionError::Staging(format!(
                            "entry point has no file name: {}",
                            program.display()
                        ))
                    })?
                    .to_string_lossy()
                    .into_owned();
                let cmdline = format!(
                    "{SHELL_ONLY_PATH} {scratch}/{script} {}",
                    shell_join(args)
                );
                let mut cmd = Command::new(shell);
                cmd.args(["-c", &cmdline]);
                cmd
            }
        };

        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| ProvisionError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let forward = async {
            if let Some(out) = stdout {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    println!("{line}");
                }
            }
        };
        let collect = async {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr {
                err.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };

        let ((), collected) = tokio::join!(forward, collect);
        let reply = collected?;

        // Exit status is deliberately not consulted; the reply text is the
        // sole success signal.
        let _ = child.wait().await;

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Remove the scratch directory, if one was ever staged.
    ///
    /// Safe to call unconditionally: with no scratch path this performs no
    /// filesystem operation at all.
    pub async fn clean_up(&mut self) -> Result<()> {
        let LaunchMode::Shell { shell } = &self.mode else {
            return Ok(());
        };
        let Some(scratch) = self.scratch.take() else {
            return Ok(());
        };
        let output = shell_exec(shell, &format!("rm -rf '{scratch}'")).await?;
        if !output.status.success() {
            return Err(ProvisionError::Staging(format!(
                "removing scratch directory failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Run one command line through the compatibility shell, capturing output.
async fn shell_exec(shell: &Path, cmdline: &str) -> Result<std::process::Output> {
    Command::new(shell)
        .args(["-c", cmdline])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ProvisionError::Spawn {
            program: shell.display().to_string(),
            source,
        })
}

/// Translate a native path into the compatibility shell's convention.
///
/// Drive-letter paths become `/mnt/<drive>/...` with forward slashes; paths
/// without a drive prefix only get their separators normalized.
#[must_use]
pub fn to_shell_path(path: &Path) -> String {
    let forward = path.to_string_lossy().replace('\\', "/");
    let mut chars = forward.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
            let rest: String = chars.collect();
            format!("/mnt/{}{}", drive.to_ascii_lowercase(), rest)
        }
        _ => forward,
    }
}

/// Join positional arguments for a `-c` invocation, single-quoting each so
/// operands with spaces survive the shell round trip.
#[must_use]
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| format!("'{}'", arg.replace('\'', r"'\''")))
        .collect::<Vec<_>>()
        .join(" ")
}
