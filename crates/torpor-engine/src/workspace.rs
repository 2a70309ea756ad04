//! Workspace references and the remote-execution collaborator contract.
//!
//! The engine snapshots a staged workspace archive (one file on the local
//! machine). Producing that archive from a remote GPU machine's working
//! directory — and cleaning it up afterwards — belongs to the session
//! layer; the only capability consumed here is [`RemoteExec`], which runs
//! a shell command somewhere and returns its output. No assumption is
//! made about the transport behind it.

use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// A staged workspace archive on the local filesystem.
#[derive(Debug, Clone)]
pub struct WorkspaceRef {
    /// Path to the archive file (snapshot source or restore target).
    pub archive: PathBuf,
}

impl WorkspaceRef {
    /// Reference an archive path.
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
        }
    }

    /// The `.partial` staging path used while a restore is incomplete.
    pub fn staging_path(&self) -> PathBuf {
        let mut os = self.archive.as_os_str().to_owned();
        os.push(".partial");
        PathBuf::from(os)
    }
}

impl AsRef<Path> for WorkspaceRef {
    fn as_ref(&self) -> &Path {
        &self.archive
    }
}

/// Output of a remotely-executed command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

/// A remote workspace location, addressed for command execution.
#[derive(Debug, Clone)]
pub struct RemoteWorkspace {
    /// Host to execute on.
    pub host: String,
    /// Port for the execution transport.
    pub port: u16,
    /// Absolute workspace directory path on the remote machine.
    pub path: String,
}

/// Remote command execution capability, provided by the session layer.
#[async_trait::async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run a shell command on the given host and return its output.
    async fn run_remote_command(
        &self,
        host: &str,
        port: u16,
        command: &str,
    ) -> Result<CommandOutput, EngineError>;
}

/// Measure a remote workspace directory's size in bytes (`du -sb`).
pub async fn remote_workspace_size(
    exec: &dyn RemoteExec,
    workspace: &RemoteWorkspace,
) -> Result<u64, EngineError> {
    let command = format!("du -sb {} | cut -f1", shell_quote(&workspace.path));
    let output = exec
        .run_remote_command(&workspace.host, workspace.port, &command)
        .await?;
    if output.exit_code != 0 {
        return Err(EngineError::RemoteCommand {
            command,
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }
    output
        .stdout
        .trim()
        .parse::<u64>()
        .map_err(|_| EngineError::RemoteCommand {
            command,
            exit_code: output.exit_code,
            stderr: format!("unparseable du output: {:?}", output.stdout),
        })
}

/// Remove a staged archive on the remote machine after upload.
pub async fn cleanup_remote_archive(
    exec: &dyn RemoteExec,
    workspace: &RemoteWorkspace,
    archive_path: &str,
) -> Result<(), EngineError> {
    let command = format!("rm -f {}", shell_quote(archive_path));
    let output = exec
        .run_remote_command(&workspace.host, workspace.port, &command)
        .await?;
    if output.exit_code != 0 {
        return Err(EngineError::RemoteCommand {
            command,
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }
    Ok(())
}

/// Single-quote a path for the remote shell.
fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}
