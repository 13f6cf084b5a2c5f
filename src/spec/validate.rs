//! `Validate` and `ValidatePolicy` (§4.3): structural and policy checks that
//! run before any other consumer sees the spec. `Validate` also normalizes
//! in place (version defaulting, charset lower-casing, pane shorthand
//! expansion) so downstream error messages and the compiler see the
//! canonical shape.

use crate::error::{PipelineError, Result};
use crate::spec::model::{
    Action, ActionKind, Pane, PanePlanStep, ShellPayload, Spec, Window,
};
use crate::spec::policy::Policy;

fn is_name_charset(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Structurally validate and normalize `spec` in place (§4.3).
pub fn validate(spec: &mut Spec) -> Result<()> {
    if spec.version == 0 {
        spec.version = 1;
    } else if spec.version != 1 {
        return Err(PipelineError::schema(
            "version",
            format!("unsupported-version: {}", spec.version),
        ));
    }

    if spec.windows.is_empty() && spec.actions.is_empty() {
        return Err(PipelineError::schema(
            "<root>",
            "empty-spec: at least one of windows or actions must be non-empty",
        ));
    }

    if let Some(name) = &spec.session.name
        && !is_name_charset(name)
    {
        return Err(PipelineError::schema(
            "session.name",
            format!("{name:?} does not match [A-Za-z0-9_-]+"),
        ));
    }

    if let Some(fw) = &mut spec.session.focus_window {
        *fw = fw.to_lowercase();
        if !fw.is_empty() && fw != "active" && !is_all_digits(fw) && !is_name_charset(fw) {
            return Err(PipelineError::schema(
                "session.focus_window",
                format!("{fw:?} must be \"active\", numeric, or a valid window name"),
            ));
        }
    }

    for (i, action) in spec.actions.iter_mut().enumerate() {
        validate_action(action, &format!("actions[{i}]"))?;
    }

    for (i, window) in spec.windows.iter_mut().enumerate() {
        validate_window(window, i)?;
    }

    Ok(())
}

fn validate_window(window: &mut Window, index: usize) -> Result<()> {
    let path = format!("windows[{index}]({})", window.name);

    if window.name.trim().is_empty() {
        return Err(PipelineError::schema(path, "window name is required"));
    }

    if let Some(fp) = &mut window.focus_pane {
        *fp = fp.to_lowercase();
        if !fp.is_empty() && fp != "active" && !is_all_digits(fp) {
            return Err(PipelineError::schema(
                format!("{path}.focus_pane"),
                format!("{fp:?} must be \"active\" or numeric"),
            ));
        }
    }

    if !window.pane_plan.is_empty() {
        validate_pane_plan(&window.pane_plan, &path)?;
        for (i, step) in window.pane_plan.iter_mut().enumerate() {
            if let PanePlanStep::Pane(p) = step {
                for (j, action) in p.actions.iter_mut().enumerate() {
                    validate_action(action, &format!("{path}.pane_plan[{i}].actions[{j}]"))?;
                }
            }
        }
    }

    for (i, pane) in window.panes.iter_mut().enumerate() {
        normalize_pane_shorthand(pane);
        for (j, action) in pane.actions.iter_mut().enumerate() {
            validate_action(action, &format!("{path}.panes[{i}].actions[{j}]"))?;
        }
    }

    for (i, action) in window.actions.iter_mut().enumerate() {
        validate_action(action, &format!("{path}.actions[{i}]"))?;
    }

    Ok(())
}

/// Pane-plan grammar (§3): first step is `pane`, last step is `pane`, every
/// `split` carries `direction ∈ {h, v}`.
fn validate_pane_plan(steps: &[PanePlanStep], path: &str) -> Result<()> {
    match steps.first() {
        Some(PanePlanStep::Pane(_)) => {}
        _ => {
            return Err(PipelineError::schema(
                format!("{path}.pane_plan[0]"),
                "first pane_plan step must be a pane",
            ));
        }
    }
    match steps.last() {
        Some(PanePlanStep::Pane(_)) => {}
        _ => {
            return Err(PipelineError::schema(
                format!("{path}.pane_plan[{}]", steps.len().saturating_sub(1)),
                "last pane_plan step must be a pane (trailing split forbidden)",
            ));
        }
    }
    for (i, step) in steps.iter().enumerate() {
        if let PanePlanStep::Split(s) = step
            && s.direction != "h"
            && s.direction != "v"
        {
            return Err(PipelineError::schema(
                format!("{path}.pane_plan[{i}]"),
                format!("split.direction {:?} must be \"h\" or \"v\"", s.direction),
            ));
        }
    }
    Ok(())
}

/// A non-empty `command` shorthand with no explicit `actions` becomes a
/// single `shell` action. Runs before policy validation so policy rejection
/// messages name the resulting `shell` type, not the shorthand.
fn normalize_pane_shorthand(pane: &mut Pane) {
    if pane.actions.is_empty()
        && let Some(cmd) = pane.command.clone()
        && !cmd.is_empty()
    {
        pane.actions.push(Action {
            kind: ActionKind::Shell(ShellPayload { cmd, shell: None }),
            target: Default::default(),
            ignore_error: false,
            comment: None,
        });
    }
}

fn validate_action(action: &mut Action, path: &str) -> Result<()> {
    match &mut action.kind {
        ActionKind::Run(p) => {
            if p.program.trim().is_empty() {
                return Err(PipelineError::schema(path, "run.program must be non-empty"));
            }
        }
        ActionKind::SendKeys(p) => {
            if p.keys.is_empty() {
                return Err(PipelineError::schema(path, "send_keys.keys must be non-empty"));
            }
        }
        ActionKind::Watch(p) => {
            if p.interval_s < 0 {
                return Err(PipelineError::schema(path, "watch.interval_s must be >= 0"));
            }
            if p.command.trim().is_empty() {
                return Err(PipelineError::schema(path, "watch.command must be non-empty"));
            }
        }
        ActionKind::WaitForPrompt(p) => {
            for (field, value) in [
                ("timeout_ms", p.timeout_ms),
                ("min_quiet_ms", p.min_quiet_ms),
                ("settle_ms", p.settle_ms),
                ("max_lines", p.max_lines),
            ] {
                if let Some(v) = value
                    && v < 0
                {
                    return Err(PipelineError::schema(
                        path,
                        format!("wait_for_prompt.{field} must be >= 0"),
                    ));
                }
            }
        }
        ActionKind::SshManagerConnect(p) => {
            if p.host.trim().is_empty() {
                return Err(PipelineError::schema(
                    path,
                    "ssh_manager_connect.host must be non-empty",
                ));
            }
            let mode = p.login_mode.get_or_insert_with(|| "askpass".to_string());
            *mode = mode.to_lowercase();
            if !["askpass", "manual", "key"].contains(&mode.as_str()) {
                return Err(PipelineError::schema(
                    path,
                    format!("ssh_manager_connect.login_mode {mode:?} must be askpass, manual, or key"),
                ));
            }
            if let Some(ms) = p.connect_timeout_ms
                && ms < 0
            {
                return Err(PipelineError::schema(
                    path,
                    "ssh_manager_connect.connect_timeout_ms must be >= 0",
                ));
            }
        }
        ActionKind::Sleep(p) => {
            if p.ms < 0 {
                return Err(PipelineError::schema(path, "sleep.ms must be >= 0"));
            }
        }
        ActionKind::Shell(p) => {
            if p.cmd.trim().is_empty() {
                return Err(PipelineError::schema(path, "shell.cmd must be non-empty"));
            }
        }
        ActionKind::Mux(p) => {
            if p.name.trim().is_empty() {
                return Err(PipelineError::schema(path, "mux.name must be non-empty"));
            }
        }
        ActionKind::Unknown(ty) => {
            return Err(PipelineError::schema(path, format!("unknown action type: {ty}")));
        }
    }
    Ok(())
}

/// Count every action reachable from `spec` (top-level, window-scoped,
/// pane-scoped, pane-plan-scoped) for the `MaxActions` guardrail.
fn count_actions(spec: &Spec) -> usize {
    let mut n = spec.actions.len();
    for w in &spec.windows {
        n += w.actions.len();
        for p in &w.panes {
            n += p.actions.len();
        }
        for step in &w.pane_plan {
            if let PanePlanStep::Pane(p) = step {
                n += p.actions.len();
            }
        }
    }
    n
}

fn walk_actions<'a>(spec: &'a Spec, mut f: impl FnMut(&'a Action, &str)) {
    for (i, a) in spec.actions.iter().enumerate() {
        f(a, &format!("actions[{i}]"));
    }
    for (wi, w) in spec.windows.iter().enumerate() {
        let wpath = format!("windows[{wi}]({})", w.name);
        for (i, a) in w.actions.iter().enumerate() {
            f(a, &format!("{wpath}.actions[{i}]"));
        }
        for (pi, p) in w.panes.iter().enumerate() {
            for (i, a) in p.actions.iter().enumerate() {
                f(a, &format!("{wpath}.panes[{pi}].actions[{i}]"));
            }
        }
        for (si, step) in w.pane_plan.iter().enumerate() {
            if let PanePlanStep::Pane(p) = step {
                for (i, a) in p.actions.iter().enumerate() {
                    f(a, &format!("{wpath}.pane_plan[{si}].actions[{i}]"));
                }
            }
        }
    }
}

/// Walk every action in the (already structurally-validated) spec and reject
/// anything the policy disallows (§4.3, §4.2). Denylist checks happen here
/// via `Policy::mux_command_allowed`.
pub fn validate_policy(spec: &Spec, policy: &Policy) -> Result<()> {
    let total = count_actions(spec);
    if total > policy.max_actions {
        return Err(PipelineError::size(
            "MaxActions",
            format!("spec has {total} actions, exceeds MaxActions={}", policy.max_actions),
        ));
    }

    let mut err = None;
    walk_actions(spec, |action, path| {
        if err.is_some() {
            return;
        }
        match &action.kind {
            ActionKind::Shell(_) if !policy.allow_shell => {
                err = Some(PipelineError::policy(
                    path.to_string(),
                    "shell actions require AllowShell",
                ));
            }
            ActionKind::Sleep(_) if !policy.allow_shell => {
                err = Some(PipelineError::policy(
                    path.to_string(),
                    "sleep actions require AllowShell (lowers to shell)",
                ));
            }
            ActionKind::Mux(p) if !policy.mux_command_allowed(&p.name) => {
                err = Some(PipelineError::policy(
                    path.to_string(),
                    format!("mux subcommand {:?} is not allowed", p.name),
                ));
            }
            _ => {}
        }
    });

    if let Some(e) = err { Err(e) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Spec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn empty_spec_rejected() {
        let mut spec = parse("version: 1\n");
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn zero_version_normalizes_to_one() {
        let mut spec = parse("version: 0\nwindows:\n  - name: editor\n");
        validate(&mut spec).unwrap();
        assert_eq!(spec.version, 1);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut spec = parse("version: 2\nwindows:\n  - name: editor\n");
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn bad_session_name_charset_rejected() {
        let mut spec = parse("windows:\n  - name: editor\nsession:\n  name: \"bad name!\"\n");
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn trailing_split_rejected() {
        let yaml = "windows:\n  - name: editor\n    pane_plan:\n      - pane: {}\n      - split: {direction: h}\n";
        let mut spec = parse(yaml);
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn bad_split_direction_rejected() {
        let yaml = "windows:\n  - name: editor\n    pane_plan:\n      - pane: {}\n      - split: {direction: x}\n      - pane: {}\n";
        let mut spec = parse(yaml);
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn unknown_action_type_rejected() {
        let yaml = "windows:\n  - name: editor\n    actions:\n      - type: frobnicate\n        frobnicate: {}\n";
        let mut spec = parse(yaml);
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn bad_focus_pane_rejected() {
        let yaml = "windows:\n  - name: editor\n    focus_pane: banana\n";
        let mut spec = parse(yaml);
        assert!(validate(&mut spec).is_err());
    }

    #[test]
    fn valid_pane_plan_accepted() {
        let yaml = "windows:\n  - name: editor\n    pane_plan:\n      - pane: {}\n      - split: {direction: h}\n      - pane: {}\n";
        let mut spec = parse(yaml);
        assert!(validate(&mut spec).is_ok());
    }

    #[test]
    fn command_shorthand_normalizes_to_shell_action() {
        let yaml = "windows:\n  - name: editor\n    panes:\n      - command: \"npm test\"\n";
        let mut spec = parse(yaml);
        validate(&mut spec).unwrap();
        let pane = &spec.windows[0].panes[0];
        assert_eq!(pane.actions.len(), 1);
        match &pane.actions[0].kind {
            ActionKind::Shell(p) => assert_eq!(p.cmd, "npm test"),
            other => panic!("expected Shell, got {other:?}"),
        }
    }

    #[test]
    fn policy_rejects_shell_without_allow_shell() {
        let yaml = "windows:\n  - name: editor\n    actions:\n      - type: shell\n        shell: {cmd: \"echo hi\"}\n";
        let mut spec = parse(yaml);
        validate(&mut spec).unwrap();
        let policy = Policy::default();
        assert!(validate_policy(&spec, &policy).is_err());
    }

    #[test]
    fn policy_allows_shell_with_allow_shell() {
        let yaml = "windows:\n  - name: editor\n    actions:\n      - type: shell\n        shell: {cmd: \"echo hi\"}\n";
        let mut spec = parse(yaml);
        validate(&mut spec).unwrap();
        let mut policy = Policy::default();
        policy.allow_shell = true;
        assert!(validate_policy(&spec, &policy).is_ok());
    }

    #[test]
    fn policy_rejects_mux_not_in_allowlist() {
        let yaml = "windows:\n  - name: editor\n    actions:\n      - type: mux\n        mux: {name: kill-server}\n";
        let mut spec = parse(yaml);
        validate(&mut spec).unwrap();
        let mut policy = Policy::default();
        policy.allow_tmux_passthrough = true;
        assert!(validate_policy(&spec, &policy).is_err());
    }

    #[test]
    fn max_actions_guardrail_enforced() {
        let mut actions = String::new();
        for _ in 0..201 {
            actions.push_str("      - type: sleep\n        sleep: {ms: 1}\n");
        }
        let yaml = format!("windows:\n  - name: editor\n    actions:\n{actions}");
        let mut spec = parse(&yaml);
        validate(&mut spec).unwrap();
        let mut policy = Policy::default();
        policy.allow_shell = true;
        assert!(validate_policy(&spec, &policy).is_err());
    }
}
