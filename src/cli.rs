//! Argument parsing and dispatch for the `muxspec` driver binary (SPEC_FULL
//! §A). Four subcommands: `validate` (structural check only), `plan`
//! (dry-run rendering), `exec` (live execution against a running mux
//! server), and `completions` (shell completion scripts).
//!
//! This module owns nothing the library doesn't already expose — it parses
//! flags, assembles a `Context`/`Policy` from them plus `Config`, and calls
//! straight into `muxspec::spec`.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};

use crate::config::Config;
use crate::spec::{self, CompileOptions, Context, TmuxRunner};

#[derive(Parser)]
#[command(name = "muxspec", version, about = "Declarative session planner and executor for terminal multiplexers")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and structurally validate a spec file; print "ok" or the error path.
    Validate {
        /// Path to the spec file (YAML or JSON).
        spec: PathBuf,
    },
    /// Compile a spec file and print the deterministic dry-run rendering.
    Plan {
        #[command(flatten)]
        args: CompileArgs,
    },
    /// Compile a spec file and execute it against a running mux server.
    Exec {
        #[command(flatten)]
        args: CompileArgs,

        /// Print the dry-run rendering instead of executing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate shell completion scripts.
    Completions {
        shell: Shell,
    },
    /// Write an example `.muxspec.yaml` project config in the current directory.
    Init,
}

#[derive(Parser)]
struct CompileArgs {
    /// Path to the spec file (YAML or JSON).
    spec: PathBuf,

    /// Allow `shell`/`sleep` actions to lower into a real subprocess window.
    #[arg(long)]
    allow_shell: bool,

    /// Allow `mux` actions to pass a raw mux subcommand through the policy.
    #[arg(long)]
    allow_tmux_passthrough: bool,

    /// Prefer the spec's `actions` list over `windows` when both are present.
    #[arg(long, conflicts_with = "prefer_windows")]
    prefer_actions: bool,

    /// Prefer the spec's `windows` list over `actions` when both are present (default).
    #[arg(long)]
    prefer_windows: bool,

    /// Override the derived session name.
    #[arg(long)]
    session: Option<String>,

    /// Override the project path used for session-name derivation and as the
    /// default working directory. Defaults to the current directory.
    #[arg(long)]
    project: Option<PathBuf>,

    /// Emit warnings/errors as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { spec } => cmd_validate(&spec),
        Command::Plan { args } => cmd_plan(&args),
        Command::Exec { args, dry_run } => cmd_exec(&args, dry_run),
        Command::Completions { shell } => cmd_completions(shell),
        Command::Init => Config::init(),
    }
}

fn cmd_validate(spec_path: &Path) -> Result<()> {
    match spec::load_file(spec_path) {
        Ok(_) => {
            println!("ok");
            Ok(())
        }
        Err(e) => {
            println!("{e}");
            bail!("{e}");
        }
    }
}

/// Build the `Context`/`Policy`/`CompileOptions` triple shared by `plan` and
/// `exec`, and the fully-compiled program they both need.
fn build_compiled(args: &CompileArgs) -> Result<spec::Compiled> {
    let project_path = match &args.project {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("failed to determine current directory")?,
    };
    let project_path = project_path
        .canonicalize()
        .unwrap_or(project_path)
        .to_string_lossy()
        .into_owned();
    let project_name = Path::new(&project_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let config = Config::load().unwrap_or_default();
    let policy = config.to_policy(args.allow_shell, args.allow_tmux_passthrough);

    let mut parsed = spec::load_file(&args.spec)?;
    if parsed.session.prefix.is_none() {
        parsed.session.prefix = config.prefix.clone();
    }
    spec::validate_policy(&parsed, &policy)?;

    let ctx = Context {
        project_name,
        project_path,
        session_name: args.session.clone().unwrap_or_default(),
        working_dir: std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        tmux_socket: tmux_socket_hint(),
        env: std::env::vars().collect(),
        spec_env: parsed.env.clone(),
    };

    let opts = CompileOptions {
        allow_shell: args.allow_shell,
        allow_tmux_passthrough: args.allow_tmux_passthrough,
        include_ensure_session: true,
        prefer_windows: !args.prefer_actions,
    };

    let ir = spec::from_spec(&ctx, &parsed, opts)?;
    let compiled = spec::compile(&ctx, &ir, &policy)?;
    Ok(compiled)
}

/// Best-effort hint for `TMUX_SOCK`: the socket path component of the
/// inherited `TMUX` env var, or `"default"` when not running inside a mux
/// client.
fn tmux_socket_hint() -> String {
    std::env::var("TMUX")
        .ok()
        .and_then(|v| v.split(',').next().map(str::to_string))
        .unwrap_or_else(|| "default".to_string())
}

fn cmd_plan(args: &CompileArgs) -> Result<()> {
    let compiled = build_compiled(args)?;
    print_dry_run(&compiled, args.json)
}

fn cmd_exec(args: &CompileArgs, dry_run: bool) -> Result<()> {
    let compiled = build_compiled(args)?;
    if dry_run {
        return print_dry_run(&compiled, args.json);
    }

    let runner = TmuxRunner::default();
    match spec::execute(&compiled, &runner) {
        Ok(report) => {
            for step in &report.steps {
                if step.skipped {
                    eprintln!("skip (ignore_error): {}", step.rendered);
                } else {
                    println!("{}", step.rendered);
                }
            }
            Ok(())
        }
        Err(e) => {
            if let Some(msg) = clean_server_exit_message(&e.to_string()) {
                eprintln!("{msg}");
                Ok(())
            } else {
                Err(e.into())
            }
        }
    }
}

/// §7's server-death detection: treat known mux-server-exit phrasings as a
/// clean termination rather than a failure worth a non-zero exit.
fn clean_server_exit_message(err: &str) -> Option<&str> {
    const PHRASES: &[&str] = &["no server running", "server exited", "lost server"];
    if PHRASES.iter().any(|p| err.contains(p)) {
        Some(err)
    } else {
        None
    }
}

fn print_dry_run(compiled: &spec::Compiled, json: bool) -> Result<()> {
    if json {
        let lines = spec::render_dry_run(compiled);
        let payload = serde_json::json!({
            "unsafe_used": compiled.unsafe_used,
            "warnings": compiled.warnings,
            "lines": lines,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if compiled.unsafe_used {
        println!("WARNING: unsafe actions present (shell/mux passthrough) — review before running");
    }
    for w in &compiled.warnings {
        println!("WARN: {w}");
    }
    for line in spec::render_dry_run(compiled) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_server_exit_recognizes_known_phrases() {
        assert!(clean_server_exit_message("tmux: no server running on socket").is_some());
        assert!(clean_server_exit_message("the server exited unexpectedly").is_some());
        assert!(clean_server_exit_message("lost server during capture-pane").is_some());
    }

    #[test]
    fn clean_server_exit_rejects_other_errors() {
        assert!(clean_server_exit_message("unknown command: froboz").is_none());
    }

    #[test]
    fn tmux_socket_hint_parses_env_var() {
        // SAFETY: test-only, single-threaded access to this var name.
        unsafe { std::env::set_var("TMUX", "/tmp/tmux-1000/default,1234,0") };
        assert_eq!(tmux_socket_hint(), "/tmp/tmux-1000/default");
        unsafe { std::env::remove_var("TMUX") };
    }

    #[test]
    fn cli_parses_plan_with_flags() {
        let cli = Cli::try_parse_from([
            "muxspec",
            "plan",
            "spec.yaml",
            "--allow-shell",
            "--session",
            "demo",
        ])
        .unwrap();
        match cli.command {
            Command::Plan { args } => {
                assert!(args.allow_shell);
                assert_eq!(args.session.as_deref(), Some("demo"));
            }
            _ => panic!("expected Plan"),
        }
    }
}
