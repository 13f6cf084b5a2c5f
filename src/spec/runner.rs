//! The `Runner` trait (§6) and its reference implementation: a thin wrapper
//! around the `tmux` binary. The executor never shells out directly — every
//! mux-affecting side effect goes through this seam so tests can swap in a
//! `FakeRunner`.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{debug, trace};

/// Captured stdout/stderr/exit status of a single invocation (§6 RunOutput).
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// The narrow seam between the executor and an actual multiplexer process
/// (§6 Runner). Implementors receive a fully compiled argv — substitution,
/// sentinel interception and policy checks have already happened upstream.
pub trait Runner {
    /// Run a command, discarding its output; error on non-zero exit.
    fn run(&self, argv: &[String], timeout: Option<Duration>) -> anyhow::Result<()>;

    /// Run a command and capture its output regardless of exit status.
    fn run_output(&self, argv: &[String], timeout: Option<Duration>) -> anyhow::Result<RunOutput>;
}

/// Parse the `TMUX` env var's `socket_path,pid,idx` shape and return the
/// socket path component, if any (§4.6 testable property 12).
fn inherited_socket_path() -> Option<String> {
    let tmux = std::env::var("TMUX").ok()?;
    let (path, _rest) = tmux.split_once(',')?;
    if path.is_empty() { None } else { Some(path.to_string()) }
}

/// True when `argv` already carries an explicit `-S`/`-L` socket override.
fn has_socket_override(argv: &[String]) -> bool {
    argv.iter().any(|a| a == "-S" || a == "-L")
}

/// Shells out to the `tmux` binary found on `$PATH`, inheriting the calling
/// session's socket when the caller is already inside one and the compiled
/// command does not itself specify a socket.
pub struct TmuxRunner {
    binary: String,
}

impl Default for TmuxRunner {
    fn default() -> Self {
        TmuxRunner {
            binary: "tmux".to_string(),
        }
    }
}

impl TmuxRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        TmuxRunner { binary: binary.into() }
    }

    fn build_command(&self, argv: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        if !has_socket_override(argv)
            && let Some(socket) = inherited_socket_path()
        {
            cmd.arg("-S").arg(socket);
        }
        cmd.args(argv);
        cmd
    }
}

impl Runner for TmuxRunner {
    fn run(&self, argv: &[String], timeout: Option<Duration>) -> anyhow::Result<()> {
        let output = self.run_output(argv, timeout)?;
        if !output.success() {
            return Err(anyhow!(
                "tmux {} failed (exit {}): {}",
                argv.join(" "),
                output.status,
                output.stderr.trim()
            ));
        }
        Ok(())
    }

    fn run_output(&self, argv: &[String], timeout: Option<Duration>) -> anyhow::Result<RunOutput> {
        trace!(binary = %self.binary, argv = ?argv, "runner:run_output start");
        let mut cmd = self.build_command(argv);

        let output = if let Some(d) = timeout {
            run_with_timeout(&mut cmd, d)
                .with_context(|| format!("tmux {} timed out after {:?}", argv.join(" "), d))?
        } else {
            cmd.output()
                .with_context(|| format!("failed to execute tmux {}", argv.join(" ")))?
        };

        let result = RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(-1),
        };
        debug!(status = result.status, "runner:run_output done");
        Ok(result)
    }
}

fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> anyhow::Result<std::process::Output> {
    use std::io::Read;

    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    let mut child = cmd.spawn()?;
    let start = std::time::Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            if let Some(mut s) = child.stdout.take() {
                s.read_to_end(&mut stdout)?;
            }
            if let Some(mut s) = child.stderr.take() {
                s.read_to_end(&mut stderr)?;
            }
            return Ok(std::process::Output { status, stdout, stderr });
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out"));
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// True when the tmux server itself exited cleanly as a side effect (rather
/// than the individual command failing) — the one case callers tolerate a
/// non-zero `kill-session`/`new-session` exit on an already-empty server.
pub fn is_clean_server_exit(output: &RunOutput) -> bool {
    output.stderr.trim() == "no server running on" || output.stderr.trim().ends_with("no server running")
}
