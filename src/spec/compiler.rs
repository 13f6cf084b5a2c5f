//! The two-stage compiler (§4.4, §4.4.b): `from_spec` lowers a validated
//! `Spec` into an `IrProgram`; `compile` lowers that `IrProgram` into a
//! `Compiled` command list ready for the executor.

use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::shell::shell_quote;
use crate::spec::ir::{IrAction, IrKind, IrProgram, SplitDirection, Target};
use crate::spec::model::{Action, ActionKind, PanePlanStep, Spec, Window};
use crate::spec::policy::Policy;
use crate::spec::substitution::{self, Context};

/// Toggles that shape Stage A beyond the boolean allowances named in §6.2's
/// public `FromSpec` signature. `prefer_windows` mirrors §4.4's "caller did
/// not PreferWindows" clause; the spec entity invariant defaults it to
/// Windows, so that is this struct's `Default`.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub allow_shell: bool,
    pub allow_tmux_passthrough: bool,
    pub include_ensure_session: bool,
    pub prefer_windows: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            allow_shell: false,
            allow_tmux_passthrough: false,
            include_ensure_session: true,
            prefer_windows: true,
        }
    }
}

/// Collapse a path/name into the conservative charset the mux tolerates for
/// targeting: lowercase, path separators and spaces become `-`, anything
/// else outside `[a-z0-9_-]` is dropped, runs of `-`/`_` collapse, and
/// leading/trailing `-`/`_` trim off.
pub fn sanitize(input: &str) -> String {
    let lower = input.to_lowercase();
    let mut mapped = String::with_capacity(lower.len());
    for c in lower.chars() {
        if c == ' ' || c == '/' || c == '\\' {
            mapped.push('-');
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            mapped.push(c);
        }
    }

    let mut collapsed = String::with_capacity(mapped.len());
    let mut last: Option<char> = None;
    for c in mapped.chars() {
        if (c == '-' || c == '_') && last == Some(c) {
            continue;
        }
        collapsed.push(c);
        last = Some(c);
    }

    collapsed.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// `DeriveSessionName(prefix, projectPath)` (§4.4).
pub fn derive_session_name(prefix: Option<&str>, project_path: &str) -> Option<String> {
    let base = Path::new(project_path).file_name()?.to_str()?;
    let sanitized = sanitize(base);
    let name = match prefix {
        Some(p) if !p.is_empty() => format!("{p}-{sanitized}"),
        _ => sanitized,
    };
    if name.is_empty() { None } else { Some(name) }
}

/// Join a program and its arguments into one shell-quoted string suitable
/// for typing into a pane via `send-keys` (used by `run`, `sleep`).
fn shell_join(parts: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    parts
        .into_iter()
        .map(|p| shell_quote(p.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

struct Builder {
    program: IrProgram,
    allow_shell: bool,
    allow_tmux_passthrough: bool,
    shell_window_counter: usize,
}

impl Builder {
    fn push(&mut self, action: IrAction) {
        self.program.actions.push(action);
    }

    fn target_for(action: &Action, session: &str, window: Option<&str>) -> Target {
        Target {
            session: action
                .target
                .session
                .clone()
                .unwrap_or_else(|| session.to_string()),
            window: action
                .target
                .window
                .clone()
                .or_else(|| window.map(str::to_string)),
            pane: action.target.pane.clone(),
        }
    }

    fn lower_action(&mut self, action: &Action, session: &str, window: Option<&str>, cwd: &str) -> Result<()> {
        let target = Self::target_for(action, session, window);
        let ignore_error = action.ignore_error;
        let comment = action.comment.clone();

        let kind = match &action.kind {
            ActionKind::Run(p) => {
                let mut parts = vec![p.program.clone()];
                parts.extend(p.args.iter().cloned());
                IrKind::SendKeys {
                    target,
                    keys: vec![shell_join(parts)],
                    enter: p.enter.unwrap_or(true),
                }
            }
            ActionKind::SendKeys(p) => IrKind::SendKeys {
                target,
                keys: p.keys.clone(),
                enter: p.enter,
            },
            ActionKind::Watch(p) => {
                let interval = if p.interval_s > 0 { p.interval_s } else { 2 };
                let cmd = format!("watch -n {interval} -t -- {}", p.command);
                IrKind::SendKeys {
                    target,
                    keys: vec![cmd],
                    enter: true,
                }
            }
            ActionKind::WaitForPrompt(p) => IrKind::WaitForPrompt {
                target,
                timeout_ms: p.timeout_ms,
                min_quiet_ms: p.min_quiet_ms,
                settle_ms: p.settle_ms,
                max_lines: p.max_lines,
                prompt_regex: p.prompt_regex.clone(),
            },
            ActionKind::SshManagerConnect(p) => IrKind::SshManagerConnect {
                target,
                host: p.host.clone(),
                user: p.user.clone(),
                port: p.port,
                login_mode: p.login_mode.clone().unwrap_or_else(|| "askpass".to_string()),
                connect_timeout_ms: p.connect_timeout_ms,
            },
            ActionKind::Sleep(p) => {
                if !self.allow_shell {
                    return Err(PipelineError::policy("sleep", "requires AllowShell"));
                }
                self.program.unsafe_required = true;
                let secs = p.ms as f64 / 1000.0;
                self.shell_window_counter += 1;
                IrKind::Shell {
                    session: target.session.clone(),
                    name: format!("shell-{}", self.shell_window_counter),
                    cwd: cwd.to_string(),
                    cmd: format!("sleep {secs}"),
                }
            }
            ActionKind::Shell(p) => {
                if !self.allow_shell {
                    return Err(PipelineError::policy("shell", "requires AllowShell"));
                }
                self.program.unsafe_required = true;
                self.shell_window_counter += 1;
                IrKind::Shell {
                    session: target.session.clone(),
                    name: format!("shell-{}", self.shell_window_counter),
                    cwd: cwd.to_string(),
                    cmd: p.cmd.clone(),
                }
            }
            ActionKind::Mux(p) => {
                if !self.allow_tmux_passthrough {
                    return Err(PipelineError::policy(
                        "mux",
                        "requires AllowTmuxPassthrough",
                    ));
                }
                self.program.unsafe_required = true;
                IrKind::Mux {
                    name: p.name.clone(),
                    args: p.args.clone(),
                }
            }
            ActionKind::Unknown(ty) => {
                return Err(PipelineError::schema("action", format!("unknown action type: {ty}")));
            }
        };

        self.push(IrAction::new(kind).with_ignore_error(ignore_error).with_comment(comment));
        Ok(())
    }

    fn lower_pane_plan(
        &mut self,
        session: &str,
        window_name: &str,
        win_root: &str,
        steps: &[PanePlanStep],
    ) -> Result<()> {
        let mut first = true;
        for step in steps {
            match step {
                PanePlanStep::Pane(p) => {
                    if first {
                        if let Some(root) = &p.root
                            && root != win_root
                        {
                            self.push(IrAction::new(IrKind::SendKeys {
                                target: Target::window(session, window_name),
                                keys: vec![format!("cd {}", shell_quote(root))],
                                enter: true,
                            }));
                        }
                        first = false;
                    }
                    let pane_root = p.root.as_deref().unwrap_or(win_root);
                    for action in &p.actions {
                        self.lower_action(action, session, Some(window_name), pane_root)?;
                    }
                    if p.focus {
                        self.push(IrAction::new(IrKind::SelectWindow {
                            target: Target::window(session, window_name),
                        }));
                    }
                }
                PanePlanStep::Split(s) => {
                    let direction = if s.direction == "h" {
                        SplitDirection::Horizontal
                    } else {
                        SplitDirection::Vertical
                    };
                    let (percent, size_abs) = match &s.size {
                        Some(size) => parse_size(size),
                        None => (None, None),
                    };
                    self.push(IrAction::new(IrKind::SplitWindow {
                        target: Target::window(session, window_name),
                        direction,
                        cwd: win_root.to_string(),
                        percent,
                        size_abs,
                    }));
                }
            }
        }
        Ok(())
    }

    fn lower_legacy_panes(
        &mut self,
        session: &str,
        window: &Window,
        win_root: &str,
    ) -> Result<()> {
        for (idx, pane) in window.panes.iter().enumerate() {
            if idx == 0 {
                if let Some(root) = &pane.root
                    && root != win_root
                {
                    self.push(IrAction::new(IrKind::SendKeys {
                        target: Target::window(session, &window.name),
                        keys: vec![format!("cd {}", shell_quote(root))],
                        enter: true,
                    }));
                }
            } else {
                self.push(IrAction::new(IrKind::SplitWindow {
                    target: Target::window(session, &window.name),
                    direction: SplitDirection::Horizontal,
                    cwd: pane.root.clone().unwrap_or_else(|| win_root.to_string()),
                    percent: None,
                    size_abs: None,
                }));
            }
            let pane_root = pane.root.as_deref().unwrap_or(win_root);
            for action in &pane.actions {
                self.lower_action(action, session, Some(&window.name), pane_root)?;
            }
            if pane.focus {
                self.push(IrAction::new(IrKind::SelectWindow {
                    target: Target::window(session, &window.name),
                }));
            }
        }
        Ok(())
    }
}

/// `"NN%"` → `(Some(NN), None)` when `0 < NN < 100`; any other shape (a bare
/// absolute size, or an out-of-range percent) is carried through opaquely as
/// `size_abs` (§4.4).
fn parse_size(size: &str) -> (Option<u32>, Option<String>) {
    if let Some(digits) = size.strip_suffix('%')
        && let Ok(n) = digits.parse::<u32>()
        && n > 0
        && n < 100
    {
        return (Some(n), None);
    }
    (None, Some(size.to_string()))
}

/// Stage A: `FromSpec(ctx, spec, allowShell, allowTmuxPassthrough,
/// includeEnsureSession)` (§4.4). Precondition: `spec` has already passed
/// `validate` and `validate_policy`.
pub fn from_spec(ctx: &Context, spec: &Spec, opts: CompileOptions) -> Result<IrProgram> {
    let session_name = if !ctx.session_name.is_empty() {
        Some(ctx.session_name.clone())
    } else if let Some(name) = &spec.session.name {
        Some(name.clone())
    } else {
        derive_session_name(spec.session.prefix.as_deref(), &ctx.project_path)
    }
    .ok_or_else(|| PipelineError::runtime("could not derive a non-empty session name"))?;

    let mut builder = Builder {
        program: IrProgram::default(),
        allow_shell: opts.allow_shell,
        allow_tmux_passthrough: opts.allow_tmux_passthrough,
        shell_window_counter: 0,
    };

    let project_root = spec
        .session
        .root
        .clone()
        .unwrap_or_else(|| ctx.project_path.clone());

    if opts.include_ensure_session {
        builder.push(IrAction::new(IrKind::EnsureSession {
            session: session_name.clone(),
            cwd: project_root.clone(),
        }));
        builder
            .program
            .warnings
            .push("ensure_session is non-atomic (no has-session test)".to_string());
    }

    if let Some(bi) = spec.session.base_index {
        builder.push(IrAction::new(IrKind::SetOption {
            global: true,
            session: session_name.clone(),
            option: "base-index",
            value: bi.to_string(),
        }));
    }
    if let Some(pbi) = spec.session.pane_base_index {
        builder.push(IrAction::new(IrKind::SetOption {
            global: true,
            session: session_name.clone(),
            option: "pane-base-index",
            value: pbi.to_string(),
        }));
    }

    let use_actions = !spec.actions.is_empty() && (spec.windows.is_empty() || !opts.prefer_windows);

    if use_actions {
        for action in &spec.actions {
            builder.lower_action(action, &session_name, None, &project_root)?;
        }
    } else {
        for window in &spec.windows {
            let win_root = window.root.clone().unwrap_or_else(|| project_root.clone());

            builder.push(IrAction::new(IrKind::NewWindow {
                session: session_name.clone(),
                name: window.name.clone(),
                cwd: win_root.clone(),
            }));
            builder.push(IrAction::new(IrKind::SelectWindow {
                target: Target::window(&session_name, &window.name),
            }));

            for action in &window.actions {
                builder.lower_action(action, &session_name, Some(&window.name), &win_root)?;
            }

            if !window.pane_plan.is_empty() {
                builder.lower_pane_plan(&session_name, &window.name, &win_root, &window.pane_plan)?;
            } else if !window.panes.is_empty() {
                builder.lower_legacy_panes(&session_name, window, &win_root)?;
            }

            if let Some(layout) = &window.layout {
                builder.push(IrAction::new(IrKind::SelectLayout {
                    target: Target::window(&session_name, &window.name),
                    layout: layout.clone(),
                }));
            }

            if window.focus {
                builder.push(IrAction::new(IrKind::SelectWindow {
                    target: Target::window(&session_name, &window.name),
                }));
            }

            if let Some(fp) = &window.focus_pane
                && fp != "active"
            {
                builder.push(IrAction::new(IrKind::SelectPane {
                    session: session_name.clone(),
                    pane: format!("{session_name}:{}.{fp}", window.name),
                }));
            }
        }
    }

    if let Some(fw) = &spec.session.focus_window
        && !fw.is_empty()
        && fw != "active"
    {
        builder.push(IrAction::new(IrKind::SelectWindow {
            target: Target {
                session: session_name.clone(),
                window: Some(fw.clone()),
                pane: None,
            },
        }));
    }

    Ok(builder.program)
}

#[derive(Debug, Clone)]
pub struct Command {
    pub argv: Vec<String>,
    pub explanation: String,
    pub is_unsafe: bool,
    pub ignore_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Compiled {
    pub commands: Vec<Command>,
    pub unsafe_used: bool,
    pub warnings: Vec<String>,
}

fn argv_len(argv: &[String]) -> usize {
    argv.iter().map(|a| a.len()).sum()
}

/// Stage B: `Compile(ctx, ir)` (§4.4.b). `policy` is consulted for the
/// `mux` re-check and the `MaxCommandLen` guardrail — not named in §6.2's
/// signature, but required by §4.4.b's own text ("after allowlist/denylist
/// re-check") and §4.2's guardrails.
pub fn compile(ctx: &Context, ir: &IrProgram, policy: &Policy) -> Result<Compiled> {
    if ctx.session_name.is_empty() || ctx.project_path.is_empty() {
        return Err(PipelineError::runtime(
            "ctx.session_name and ctx.project_path must be non-empty",
        ));
    }
    let expanded_root = substitution::expand_user(&ctx.project_path);
    if !Path::new(&expanded_root).is_absolute() {
        return Err(PipelineError::runtime(format!(
            "project path {expanded_root:?} is not absolute after expansion"
        )));
    }

    let subst = |s: &str| substitution::subst(ctx, s);
    let subst_path = |s: &str| substitution::expand_user(&substitution::subst(ctx, s));

    let mut commands = Vec::with_capacity(ir.actions.len());
    let mut unsafe_used = false;

    for action in &ir.actions {
        let explanation = action.comment.clone().unwrap_or_default();
        let ignore_error = action.ignore_error;

        let (argv, is_unsafe): (Vec<String>, bool) = match &action.kind {
            IrKind::EnsureSession { session, cwd } => (
                vec![
                    "new-session".into(),
                    "-d".into(),
                    "-s".into(),
                    session.clone(),
                    "-c".into(),
                    subst_path(cwd),
                ],
                false,
            ),
            IrKind::NewWindow { session, name, cwd } => (
                vec![
                    "new-window".into(),
                    "-t".into(),
                    session.clone(),
                    "-n".into(),
                    name.clone(),
                    "-c".into(),
                    subst_path(cwd),
                ],
                false,
            ),
            IrKind::SplitWindow {
                target,
                direction,
                cwd,
                percent,
                size_abs,
            } => {
                let mut argv = vec![
                    "split-window".into(),
                    direction.flag().to_string(),
                    "-t".into(),
                    target.resolve(),
                    "-c".into(),
                    subst_path(cwd),
                ];
                if let Some(p) = percent {
                    argv.push("-p".into());
                    argv.push(p.to_string());
                } else if let Some(abs) = size_abs {
                    argv.push("-l".into());
                    argv.push(abs.clone());
                }
                (argv, false)
            }
            IrKind::SelectWindow { target } => {
                (vec!["select-window".into(), "-t".into(), target.resolve()], false)
            }
            IrKind::SelectPane { session, pane } => {
                let qualified = if pane.starts_with('%') || pane.contains(':') {
                    pane.clone()
                } else {
                    format!("{session}:.{pane}")
                };
                (vec!["select-pane".into(), "-t".into(), qualified], false)
            }
            IrKind::SelectLayout { target, layout } => (
                vec![
                    "select-layout".into(),
                    "-t".into(),
                    target.resolve(),
                    subst(layout),
                ],
                false,
            ),
            IrKind::SendKeys { target, keys, enter } => {
                let mut argv = vec!["send-keys".into(), "-t".into(), target.resolve()];
                argv.extend(keys.iter().map(|k| subst(k)));
                if *enter {
                    argv.push("C-m".into());
                }
                (argv, false)
            }
            IrKind::SetOption {
                global,
                session,
                option,
                value,
            } => {
                let argv = if *global {
                    vec!["set-option".into(), "-g".into(), option.to_string(), subst(value)]
                } else {
                    vec![
                        "set-option".into(),
                        "-t".into(),
                        session.clone(),
                        option.to_string(),
                        subst(value),
                    ]
                };
                (argv, false)
            }
            IrKind::DisplayMessage { duration_ms, message } => (
                vec![
                    "display-message".into(),
                    "-d".into(),
                    duration_ms.to_string(),
                    subst(message),
                ],
                false,
            ),
            IrKind::RenameWindow {
                session,
                from,
                window,
                new_name,
            } => {
                let target = match (from, window) {
                    (Some(f), _) => format!("{session}:{f}"),
                    (None, Some(w)) => format!("{session}:{w}"),
                    (None, None) => format!("{session}:0"),
                };
                (
                    vec!["rename-window".into(), "-t".into(), target, subst(new_name)],
                    false,
                )
            }
            IrKind::WaitForPrompt {
                target,
                timeout_ms,
                min_quiet_ms,
                settle_ms,
                max_lines,
                prompt_regex,
            } => (
                vec![
                    "__wait_for_prompt__".into(),
                    target.resolve(),
                    timeout_ms.map(|v| v.to_string()).unwrap_or_default(),
                    min_quiet_ms.map(|v| v.to_string()).unwrap_or_default(),
                    settle_ms.map(|v| v.to_string()).unwrap_or_default(),
                    max_lines.map(|v| v.to_string()).unwrap_or_default(),
                    prompt_regex.as_deref().map(subst).unwrap_or_default(),
                ],
                false,
            ),
            IrKind::SshManagerConnect {
                target,
                host,
                user,
                port,
                login_mode,
                connect_timeout_ms,
            } => (
                vec![
                    "__ssh_manager_connect__".into(),
                    target.resolve(),
                    subst(host),
                    user.as_deref().map(subst).unwrap_or_default(),
                    port.map(|p| p.to_string()).unwrap_or_default(),
                    login_mode.clone(),
                    connect_timeout_ms.map(|v| v.to_string()).unwrap_or_default(),
                ],
                false,
            ),
            IrKind::Shell { session, name, cwd, cmd } => (
                vec![
                    "new-window".into(),
                    "-t".into(),
                    session.clone(),
                    "-n".into(),
                    name.clone(),
                    "-c".into(),
                    subst_path(cwd),
                    "--".into(),
                    "bash".into(),
                    "-lc".into(),
                    subst(cmd),
                ],
                true,
            ),
            IrKind::Mux { name, args } => {
                if !policy.mux_command_allowed(name) {
                    return Err(PipelineError::policy(
                        "mux",
                        format!("mux subcommand {name:?} is not allowed"),
                    ));
                }
                let mut argv = vec![name.clone()];
                argv.extend(args.iter().map(|a| subst(a)));
                (argv, true)
            }
        };

        if argv_len(&argv) > policy.max_command_len {
            return Err(PipelineError::size(
                "MaxCommandLen",
                format!(
                    "compiled command for {:?} exceeds MaxCommandLen={}",
                    argv.first().cloned().unwrap_or_default(),
                    policy.max_command_len
                ),
            ));
        }

        unsafe_used = unsafe_used || is_unsafe;
        commands.push(Command {
            argv,
            explanation,
            is_unsafe,
            ignore_error,
        });
    }

    Ok(Compiled {
        commands,
        unsafe_used,
        warnings: ir.warnings.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::validate;

    fn ctx() -> Context {
        Context {
            project_name: "demo".to_string(),
            project_path: "/tmp/demo".to_string(),
            session_name: "demo".to_string(),
            working_dir: "/tmp/demo".to_string(),
            tmux_socket: "default".to_string(),
            env: Default::default(),
            spec_env: Default::default(),
        }
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize("My Project//v2"), "my-project-v2");
        assert_eq!(sanitize("--weird__name--"), "weird__name");
    }

    #[test]
    fn derive_session_name_applies_prefix() {
        assert_eq!(
            derive_session_name(Some("wm"), "/tmp/My Project"),
            Some("wm-my-project".to_string())
        );
        assert_eq!(
            derive_session_name(None, "/tmp/My Project"),
            Some("my-project".to_string())
        );
    }

    #[test]
    fn watch_lowers_to_single_send_keys() {
        let yaml = "windows:\n  - name: editor\n    actions:\n      - type: watch\n        watch: {interval_s: 5, command: \"show clock\"}\n";
        let mut spec: Spec = serde_yaml::from_str(yaml).unwrap();
        validate::validate(&mut spec).unwrap();
        let ir = from_spec(
            &ctx(),
            &spec,
            CompileOptions {
                include_ensure_session: false,
                ..Default::default()
            },
        )
        .unwrap();
        let send_keys = ir
            .actions
            .iter()
            .find_map(|a| match &a.kind {
                IrKind::SendKeys { keys, enter, .. } => Some((keys.clone(), *enter)),
                _ => None,
            })
            .unwrap();
        assert_eq!(send_keys.0, vec!["watch -n 5 -t -- show clock".to_string()]);
        assert!(send_keys.1);
    }

    #[test]
    fn pane_plan_geometry_matches_spec_example() {
        let yaml = r#"
version: 1
windows:
  - name: editor
    root: /tmp/demo
    pane_plan:
      - pane:  { name: nvim, focus: true, actions: [{type: run, run: {program: nvim, args: ["."]}}] }
      - split: { direction: h, size: "50%" }
      - pane:  { name: shell, actions: [{type: run, run: {program: bash, args: ["-l"]}}] }
"#;
        let mut spec: Spec = serde_yaml::from_str(yaml).unwrap();
        validate::validate(&mut spec).unwrap();

        let opts = CompileOptions {
            include_ensure_session: false,
            ..Default::default()
        };
        let ir = from_spec(&ctx(), &spec, opts).unwrap();
        let policy = Policy::default();
        let compiled = compile(&ctx(), &ir, &policy).unwrap();

        let rendered: Vec<String> = compiled.commands.iter().map(|c| c.argv.join(" ")).collect();
        assert_eq!(
            rendered,
            vec![
                "new-window -t demo -n editor -c /tmp/demo",
                "select-window -t demo:editor",
                "send-keys -t demo:editor nvim . C-m",
                "select-window -t demo:editor",
                "split-window -h -t demo:editor -c /tmp/demo -p 50",
                "send-keys -t demo:editor bash -l C-m",
            ]
        );
    }

    #[test]
    fn shell_action_requires_allow_shell() {
        let yaml = "windows:\n  - name: editor\n    actions:\n      - type: shell\n        shell: {cmd: \"echo hi\"}\n";
        let mut spec: Spec = serde_yaml::from_str(yaml).unwrap();
        validate::validate(&mut spec).unwrap();
        let opts = CompileOptions {
            allow_shell: false,
            include_ensure_session: false,
            ..Default::default()
        };
        assert!(from_spec(&ctx(), &spec, opts).is_err());
    }

    #[test]
    fn determinism_same_inputs_same_commands() {
        let yaml = "windows:\n  - name: editor\n";
        let mut spec: Spec = serde_yaml::from_str(yaml).unwrap();
        validate::validate(&mut spec).unwrap();
        let opts = CompileOptions::default();
        let policy = Policy::default();
        let ir1 = from_spec(&ctx(), &spec, opts).unwrap();
        let compiled1 = compile(&ctx(), &ir1, &policy).unwrap();
        let ir2 = from_spec(&ctx(), &spec, opts).unwrap();
        let compiled2 = compile(&ctx(), &ir2, &policy).unwrap();
        let a: Vec<_> = compiled1.commands.iter().map(|c| c.argv.clone()).collect();
        let b: Vec<_> = compiled2.commands.iter().map(|c| c.argv.clone()).collect();
        assert_eq!(a, b);
    }
}
