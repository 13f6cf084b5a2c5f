//! The executor (§5, §6): walks a `Compiled` command list, dispatching
//! sentinel tokens to internal handlers and forwarding everything else to a
//! `Runner`. Also owns dry-run rendering, which never touches a `Runner` at
//! all.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::shell::shell_quote;
use crate::spec::compiler::{Command, Compiled};
use crate::spec::runner::Runner;

const WAIT_FOR_PROMPT_SENTINEL: &str = "__wait_for_prompt__";
const SSH_MANAGER_CONNECT_SENTINEL: &str = "__ssh_manager_connect__";

const DEFAULT_TIMEOUT_MS: i64 = 15_000;
const DEFAULT_MIN_QUIET_MS: i64 = 500;
const DEFAULT_SETTLE_MS: i64 = 250;
const DEFAULT_MAX_LINES: i64 = 200;
const DEFAULT_POLL_EVERY_MS: u64 = 100;
const DEFAULT_SSH_CONNECT_TIMEOUT_MS: i64 = 15_000;

fn default_prompt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(^.*[#>$] ?$)").expect("static regex is valid"))
}

/// One executed (or dry-run-rendered) command's outcome.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub argv: Vec<String>,
    pub explanation: String,
    pub rendered: String,
    pub skipped: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub steps: Vec<StepOutcome>,
    pub unsafe_used: bool,
}

/// Quote an argv element for display only, matching the visual convention
/// of a literal shell invocation (backslash-escaping, not `shell_quote`'s
/// single-quote wrap — dry-run output reads as a command line, not a
/// program argument).
pub fn dry_run_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let needs_quoting = arg
        .chars()
        .any(|c| c.is_whitespace() || "\"'$`\\|&;<>()*?[]{}~!".contains(c));
    if !needs_quoting {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    for c in arg.chars() {
        if c.is_whitespace() || "\"'$`\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_argv(argv: &[String]) -> String {
    let mut parts = vec!["tmux".to_string()];
    parts.extend(argv.iter().map(|a| dry_run_quote(a)));
    parts.join(" ")
}

/// Render one compiled command as a §6.2 dry-run line: the mux binary name,
/// an `(unsafe)` marker when `Command.is_unsafe`, the shell-quoted argv, and
/// a trailing `# <explanation>` when the action carried a `comment`.
fn render_command_line(cmd: &Command) -> String {
    let mut parts = vec!["tmux".to_string()];
    if cmd.is_unsafe {
        parts.push("(unsafe)".to_string());
    }
    parts.extend(cmd.argv.iter().map(|a| dry_run_quote(a)));
    let mut line = parts.join(" ");
    if !cmd.explanation.is_empty() {
        line.push_str(" # ");
        line.push_str(&cmd.explanation);
    }
    line
}

/// Render a compiled program without running anything (§5 `dry_run`).
/// Sentinel commands render as the synthetic internal operation they
/// represent rather than a literal `tmux` invocation.
pub fn render_dry_run(compiled: &Compiled) -> Vec<String> {
    compiled
        .commands
        .iter()
        .map(|cmd| match cmd.argv.first().map(String::as_str) {
            Some(WAIT_FOR_PROMPT_SENTINEL) => {
                format!("# wait_for_prompt target={}", cmd.argv.get(1).cloned().unwrap_or_default())
            }
            Some(SSH_MANAGER_CONNECT_SENTINEL) => {
                format!(
                    "# ssh_manager_connect target={} host={}",
                    cmd.argv.get(1).cloned().unwrap_or_default(),
                    cmd.argv.get(2).cloned().unwrap_or_default()
                )
            }
            _ => render_command_line(cmd),
        })
        .collect()
}

/// Execute every command in `compiled` in order (§5, §6).
///
/// A failing step stops the walk unless its `ignore_error` flag is set, in
/// which case the failure is recorded in the report and the walk continues.
pub fn execute(compiled: &Compiled, runner: &dyn Runner) -> Result<ExecutionReport> {
    let mut report = ExecutionReport {
        unsafe_used: compiled.unsafe_used,
        ..Default::default()
    };

    for cmd in &compiled.commands {
        let rendered = render_argv(&cmd.argv);
        let outcome = run_one(cmd, runner);

        match outcome {
            Ok(()) => report.steps.push(StepOutcome {
                argv: cmd.argv.clone(),
                explanation: cmd.explanation.clone(),
                rendered,
                skipped: false,
                error: None,
            }),
            Err(e) if cmd.ignore_error => {
                warn!(command = %rendered, error = %e, "step failed, ignore_error set, continuing");
                report.steps.push(StepOutcome {
                    argv: cmd.argv.clone(),
                    explanation: cmd.explanation.clone(),
                    rendered,
                    skipped: true,
                    error: Some(e.to_string()),
                });
            }
            Err(e) => {
                report.steps.push(StepOutcome {
                    argv: cmd.argv.clone(),
                    explanation: cmd.explanation.clone(),
                    rendered,
                    skipped: false,
                    error: Some(e.to_string()),
                });
                return Err(PipelineError::runtime(format!("{rendered}: {e}")));
            }
        }
    }

    Ok(report)
}

fn run_one(cmd: &Command, runner: &dyn Runner) -> anyhow::Result<()> {
    match cmd.argv.first().map(String::as_str) {
        Some(WAIT_FOR_PROMPT_SENTINEL) => wait_for_prompt(&cmd.argv, runner),
        Some(SSH_MANAGER_CONNECT_SENTINEL) => ssh_manager_connect(&cmd.argv, runner),
        _ => runner.run(&cmd.argv, None),
    }
}

fn field_i64(argv: &[String], idx: usize) -> Option<i64> {
    argv.get(idx).filter(|s| !s.is_empty()).and_then(|s| s.parse().ok())
}

fn field_str(argv: &[String], idx: usize) -> Option<String> {
    argv.get(idx).filter(|s| !s.is_empty()).cloned()
}

/// `__wait_for_prompt__ target timeout_ms min_quiet_ms settle_ms max_lines
/// prompt_regex` — a readiness gate implemented via repeated `capture-pane`
/// snapshots (§4.5). Never forwarded to the `Runner` as a literal tmux
/// subcommand; `capture-pane` itself stays on the policy denylist.
fn wait_for_prompt(argv: &[String], runner: &dyn Runner) -> anyhow::Result<()> {
    let target = argv.get(1).cloned().unwrap_or_default();
    let timeout_ms = field_i64(argv, 2).unwrap_or(DEFAULT_TIMEOUT_MS);
    let min_quiet_ms = field_i64(argv, 3).unwrap_or(DEFAULT_MIN_QUIET_MS);
    let settle_ms = field_i64(argv, 4).unwrap_or(DEFAULT_SETTLE_MS);
    let max_lines = field_i64(argv, 5).unwrap_or(DEFAULT_MAX_LINES);
    let prompt_regex = field_str(argv, 6);

    let compiled_regex;
    let re: &Regex = match &prompt_regex {
        Some(pattern) => {
            compiled_regex = Regex::new(&format!("(?m){pattern}"))
                .map_err(|e| anyhow::anyhow!("invalid prompt_regex {pattern:?}: {e}"))?;
            &compiled_regex
        }
        None => default_prompt_regex(),
    };

    let deadline = Instant::now() + Duration::from_millis(timeout_ms.max(0) as u64);
    let mut last_snapshot: Option<String> = None;
    let mut quiet_since: Option<Instant> = None;

    loop {
        let lines_arg = format!("-{}", max_lines.max(1));
        let output = runner.run_output(
            &[
                "capture-pane".to_string(),
                "-p".to_string(),
                "-t".to_string(),
                target.clone(),
                "-S".to_string(),
                lines_arg,
            ],
            None,
        )?;
        let snapshot = output.stdout;

        let unchanged = last_snapshot.as_deref() == Some(snapshot.as_str());
        if unchanged {
            let quiet_start = *quiet_since.get_or_insert_with(Instant::now);
            let quiet_for = quiet_start.elapsed();
            if quiet_for >= Duration::from_millis(min_quiet_ms.max(0) as u64) {
                let last_non_blank = snapshot
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("");
                if re.is_match(last_non_blank) {
                    if settle_ms > 0 {
                        std::thread::sleep(Duration::from_millis(settle_ms as u64));
                    }
                    debug!(target = %target, "wait_for_prompt matched");
                    return Ok(());
                }
            }
        } else {
            quiet_since = None;
            last_snapshot = Some(snapshot);
        }

        if Instant::now() >= deadline {
            return Err(anyhow::anyhow!(
                "wait_for_prompt timed out after {timeout_ms}ms waiting for target {target}"
            ));
        }
        std::thread::sleep(Duration::from_millis(DEFAULT_POLL_EVERY_MS));
    }
}

/// `__ssh_manager_connect__ target host user port login_mode
/// connect_timeout_ms` — builds the structured-connect argv (§4.5) and types
/// it into the target pane via `send-keys`.
///
/// `login_mode = askpass` delegates to the external connector binary so
/// secrets never appear in this process or in mux send-keys;
/// `manual`/`key` type a plain `ssh` invocation. `connect_timeout_ms` is not
/// part of either argv shape — it becomes the per-invocation timeout handed
/// to `Runner::run` (§4.6 "both calls accept an optional per-invocation
/// timeout").
fn ssh_manager_connect(argv: &[String], runner: &dyn Runner) -> anyhow::Result<()> {
    let target = argv.get(1).cloned().unwrap_or_default();
    let host = argv.get(2).cloned().unwrap_or_default();
    let user = field_str(argv, 3);
    let port = field_i64(argv, 4);
    let login_mode = argv.get(5).cloned().unwrap_or_else(|| "askpass".to_string());
    let connect_timeout_ms = field_i64(argv, 6).unwrap_or(DEFAULT_SSH_CONNECT_TIMEOUT_MS);

    let parts: Vec<String> = match login_mode.as_str() {
        "manual" | "key" => {
            let mut parts = vec!["ssh".to_string()];
            if let Some(p) = port.filter(|p| *p > 0) {
                parts.push("-p".to_string());
                parts.push(p.to_string());
            }
            let host_arg = match &user {
                Some(u) => format!("{u}@{host}"),
                None => host.clone(),
            };
            parts.push(host_arg);
            parts
        }
        _ => {
            let mut parts = vec![
                "external-connector".to_string(),
                "__connect".to_string(),
                "--host".to_string(),
                host.clone(),
            ];
            if let Some(u) = &user {
                parts.push("--user".to_string());
                parts.push(u.clone());
            }
            parts
        }
    };

    let keys = parts.iter().map(|p| shell_quote(p)).collect::<Vec<_>>().join(" ");

    info!(target = %target, host = %host, login_mode = %login_mode, "ssh_manager_connect dispatching");

    let timeout = (connect_timeout_ms > 0).then(|| Duration::from_millis(connect_timeout_ms as u64));

    runner.run(
        &[
            "send-keys".to_string(),
            "-t".to_string(),
            target,
            keys,
            "C-m".to_string(),
        ],
        timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::runner::fake::FakeRunner;
    use crate::spec::runner::RunOutput;

    fn cmd(argv: &[&str]) -> Command {
        Command {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            explanation: String::new(),
            is_unsafe: false,
            ignore_error: false,
        }
    }

    #[test]
    fn dry_run_quote_passes_through_safe_tokens() {
        assert_eq!(dry_run_quote("demo:editor"), "demo:editor");
    }

    #[test]
    fn dry_run_quote_escapes_spaces_and_dollar() {
        assert_eq!(dry_run_quote("echo $HOME"), "echo\\ \\$HOME");
    }

    #[test]
    fn render_dry_run_renders_sentinels_as_comments() {
        let compiled = Compiled {
            commands: vec![cmd(&["__wait_for_prompt__", "demo:editor", "", "", "", "", ""])],
            unsafe_used: false,
            warnings: vec![],
        };
        let lines = render_dry_run(&compiled);
        assert_eq!(lines, vec!["# wait_for_prompt target=demo:editor".to_string()]);
    }

    #[test]
    fn execute_stops_on_first_failure() {
        let runner = FakeRunner::new();
        runner.push_response(RunOutput {
            stdout: String::new(),
            stderr: "boom".to_string(),
            status: 1,
        });
        let compiled = Compiled {
            commands: vec![
                cmd(&["new-session", "-d", "-s", "demo"]),
                cmd(&["select-window", "-t", "demo:editor"]),
            ],
            unsafe_used: false,
            warnings: vec![],
        };
        let result = execute(&compiled, &runner);
        assert!(result.is_err());
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn execute_continues_past_ignored_failure() {
        let runner = FakeRunner::new();
        runner.push_response(RunOutput {
            stdout: String::new(),
            stderr: "boom".to_string(),
            status: 1,
        });
        let mut first = cmd(&["set-option", "-g", "base-index", "1"]);
        first.ignore_error = true;
        let compiled = Compiled {
            commands: vec![first, cmd(&["select-window", "-t", "demo:editor"])],
            unsafe_used: false,
            warnings: vec![],
        };
        let report = execute(&compiled, &runner).unwrap();
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps[0].skipped);
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn wait_for_prompt_matches_on_stable_prompt_line() {
        let runner = FakeRunner::new();
        runner.push_response(RunOutput {
            stdout: "$ ".to_string(),
            stderr: String::new(),
            status: 0,
        });
        let argv = vec![
            "__wait_for_prompt__".to_string(),
            "demo:editor".to_string(),
            "2000".to_string(),
            "0".to_string(),
            "0".to_string(),
            "50".to_string(),
            String::new(),
        ];
        wait_for_prompt(&argv, &runner).unwrap();
    }

    #[test]
    fn wait_for_prompt_times_out_on_ever_growing_output() {
        let runner = FakeRunner::new();
        for i in 0..6 {
            runner.push_response(RunOutput {
                stdout: format!("line {i}\n$ "),
                stderr: String::new(),
                status: 0,
            });
        }
        let argv = vec![
            "__wait_for_prompt__".to_string(),
            "demo:editor".to_string(),
            "300".to_string(),
            "1000".to_string(), // min_quiet_ms longer than the whole timeout: never satisfied
            "0".to_string(),
            "50".to_string(),
            String::new(),
        ];
        let err = wait_for_prompt(&argv, &runner).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn wait_for_prompt_honors_custom_regex() {
        let runner = FakeRunner::new();
        runner.push_response(RunOutput {
            stdout: "booting...\nready>".to_string(),
            stderr: String::new(),
            status: 0,
        });
        let argv = vec![
            "__wait_for_prompt__".to_string(),
            "demo:editor".to_string(),
            "2000".to_string(),
            "0".to_string(),
            "0".to_string(),
            "50".to_string(),
            "ready>".to_string(),
        ];
        wait_for_prompt(&argv, &runner).unwrap();
    }

    #[test]
    fn wait_for_prompt_custom_regex_rejects_non_matching_output() {
        let runner = FakeRunner::new();
        for _ in 0..4 {
            runner.push_response(RunOutput {
                stdout: "not-ready".to_string(),
                stderr: String::new(),
                status: 0,
            });
        }
        let argv = vec![
            "__wait_for_prompt__".to_string(),
            "demo:editor".to_string(),
            "200".to_string(),
            "0".to_string(),
            "0".to_string(),
            "50".to_string(),
            "ready>".to_string(),
        ];
        assert!(wait_for_prompt(&argv, &runner).is_err());
    }

    #[test]
    fn ssh_manager_connect_builds_send_keys_with_user_and_port() {
        let runner = FakeRunner::new();
        let argv = vec![
            "__ssh_manager_connect__".to_string(),
            "demo:editor".to_string(),
            "example.com".to_string(),
            "deploy".to_string(),
            "2222".to_string(),
            "key".to_string(),
            "5000".to_string(),
        ];
        ssh_manager_connect(&argv, &runner).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "send-keys");
        assert!(calls[0][3].contains("deploy@example.com"));
        assert!(calls[0][3].contains("-p 2222"));
        assert!(!calls[0][3].contains("ConnectTimeout"));
    }

    #[test]
    fn ssh_manager_connect_manual_mode_omits_port_flag_when_zero() {
        let runner = FakeRunner::new();
        let argv = vec![
            "__ssh_manager_connect__".to_string(),
            "demo:editor".to_string(),
            "example.com".to_string(),
            String::new(),
            "0".to_string(),
            "manual".to_string(),
            String::new(),
        ];
        ssh_manager_connect(&argv, &runner).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls[0][3], "ssh example.com");
    }

    #[test]
    fn ssh_manager_connect_askpass_mode_delegates_to_external_connector() {
        let runner = FakeRunner::new();
        let argv = vec![
            "__ssh_manager_connect__".to_string(),
            "demo:editor".to_string(),
            "example.com".to_string(),
            "deploy".to_string(),
            String::new(),
            "askpass".to_string(),
            String::new(),
        ];
        ssh_manager_connect(&argv, &runner).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0][3],
            "external-connector __connect --host example.com --user deploy"
        );
    }

    #[test]
    fn ssh_manager_connect_askpass_mode_omits_user_flag_when_absent() {
        let runner = FakeRunner::new();
        let argv = vec![
            "__ssh_manager_connect__".to_string(),
            "demo:editor".to_string(),
            "example.com".to_string(),
            String::new(),
            String::new(),
            "askpass".to_string(),
            String::new(),
        ];
        ssh_manager_connect(&argv, &runner).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls[0][3], "external-connector __connect --host example.com");
    }

    #[test]
    fn render_dry_run_includes_explanation_and_unsafe_marker() {
        let mut unsafe_cmd = cmd(&["new-window", "-t", "demo", "-n", "shell"]);
        unsafe_cmd.is_unsafe = true;
        unsafe_cmd.explanation = "ad-hoc shell window".to_string();
        let compiled = Compiled {
            commands: vec![unsafe_cmd],
            unsafe_used: true,
            warnings: vec![],
        };
        let lines = render_dry_run(&compiled);
        assert_eq!(lines, vec!["tmux (unsafe) new-window -t demo -n shell # ad-hoc shell window".to_string()]);
    }

    #[test]
    fn render_dry_run_plain_command_has_no_marker_or_comment() {
        let compiled = Compiled {
            commands: vec![cmd(&["select-window", "-t", "demo:editor"])],
            unsafe_used: false,
            warnings: vec![],
        };
        let lines = render_dry_run(&compiled);
        assert_eq!(lines, vec!["tmux select-window -t demo:editor".to_string()]);
    }

    #[test]
    fn default_prompt_regex_matches_common_shell_prompts() {
        let re = default_prompt_regex();
        assert!(re.is_match("banner\n$ "));
        assert!(re.is_match("user@host:~#"));
        assert!(re.is_match("prompt> "));
        assert!(!re.is_match("not a prompt line"));
    }

    #[test]
    fn wait_for_prompt_default_timeout_matches_spec() {
        assert_eq!(DEFAULT_TIMEOUT_MS, 15_000);
        assert_eq!(DEFAULT_MIN_QUIET_MS, 500);
        assert_eq!(DEFAULT_POLL_EVERY_MS, 100);
    }
}
