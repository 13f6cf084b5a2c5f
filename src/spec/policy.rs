//! Safety policy (§4.2): the caller-supplied allowances the compiler and
//! executor consult before emitting or running anything that leaves the
//! conservative layout-building subset.

use std::collections::HashSet;

/// Runtime execution allowances. Never persisted, never read from disk by
/// this crate — the CLI driver assembles one of these from its own config
/// layer and hands it in.
#[derive(Debug, Clone)]
pub struct Policy {
    pub allow_shell: bool,
    pub allow_tmux_passthrough: bool,
    pub allowed_mux_commands: HashSet<String>,
    pub disallowed_mux_commands: HashSet<String>,
    pub allowed_shell_prefixes: Vec<String>,
    pub max_actions: usize,
    pub max_command_len: usize,
}

const DEFAULT_ALLOWED_MUX_COMMANDS: &[&str] = &[
    "new-session",
    "kill-session",
    "rename-session",
    "switch-client",
    "select-session",
    "attach-session",
    "new-window",
    "kill-window",
    "rename-window",
    "select-window",
    "move-window",
    "swap-window",
    "split-window",
    "kill-pane",
    "select-pane",
    "swap-pane",
    "resize-pane",
    "break-pane",
    "join-pane",
    "select-layout",
    "send-keys",
    "set-buffer",
    "display-message",
    "set-option",
    "set-window-option",
    "list-windows",
    "list-panes",
    "list-sessions",
    "set-hook",
];

const DEFAULT_DISALLOWED_MUX_COMMANDS: &[&str] = &[
    "run-shell",
    "if-shell",
    "pipe-pane",
    "respawn-pane",
    "respawn-window",
    "source-file",
    "source",
    "display-popup",
    "load-buffer",
    "save-buffer",
    "capture-pane",
];

impl Default for Policy {
    fn default() -> Self {
        Policy {
            allow_shell: false,
            allow_tmux_passthrough: false,
            allowed_mux_commands: DEFAULT_ALLOWED_MUX_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            disallowed_mux_commands: DEFAULT_DISALLOWED_MUX_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_shell_prefixes: Vec::new(),
            max_actions: 200,
            max_command_len: 4096,
        }
    }
}

impl Policy {
    /// *mux subcommand allowed?* — only meaningful when passthrough is
    /// enabled; then: not denied, and present in the allowlist (compared
    /// case-insensitively after trimming). An empty allowlist always denies.
    pub fn mux_command_allowed(&self, name: &str) -> bool {
        if !self.allow_tmux_passthrough {
            return false;
        }
        if self.allowed_mux_commands.is_empty() {
            return false;
        }
        let needle = name.trim().to_ascii_lowercase();
        let denied = self
            .disallowed_mux_commands
            .iter()
            .any(|d| d.trim().to_ascii_lowercase() == needle);
        if denied {
            return false;
        }
        self.allowed_mux_commands
            .iter()
            .any(|a| a.trim().to_ascii_lowercase() == needle)
    }

    /// *shell command allowed?* — only meaningful when shell is enabled;
    /// then: either no prefix restriction, or the command (after stripping
    /// leading whitespace) starts with one of the configured prefixes.
    pub fn shell_command_allowed(&self, cmd: &str) -> bool {
        if !self.allow_shell {
            return false;
        }
        if self.allowed_shell_prefixes.is_empty() {
            return true;
        }
        let trimmed = cmd.trim_start();
        self.allowed_shell_prefixes
            .iter()
            .any(|p| trimmed.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mux_command_denied_without_passthrough() {
        let pol = Policy::default();
        assert!(!pol.mux_command_allowed("new-window"));
    }

    #[test]
    fn mux_command_allowed_with_passthrough_and_in_allowlist() {
        let mut pol = Policy::default();
        pol.allow_tmux_passthrough = true;
        assert!(pol.mux_command_allowed("new-window"));
        assert!(pol.mux_command_allowed("  New-Window  "));
    }

    #[test]
    fn mux_command_in_denylist_wins_over_allowlist() {
        let mut pol = Policy::default();
        pol.allow_tmux_passthrough = true;
        pol.allowed_mux_commands.insert("run-shell".to_string());
        assert!(!pol.mux_command_allowed("run-shell"));
    }

    #[test]
    fn empty_allowlist_always_denies() {
        let mut pol = Policy::default();
        pol.allow_tmux_passthrough = true;
        pol.allowed_mux_commands.clear();
        assert!(!pol.mux_command_allowed("new-window"));
    }

    #[test]
    fn shell_denied_without_allow_shell() {
        let pol = Policy::default();
        assert!(!pol.shell_command_allowed("echo hi"));
    }

    #[test]
    fn shell_allowed_with_no_prefix_restriction() {
        let mut pol = Policy::default();
        pol.allow_shell = true;
        assert!(pol.shell_command_allowed("anything at all"));
    }

    #[test]
    fn shell_prefix_restriction_enforced() {
        let mut pol = Policy::default();
        pol.allow_shell = true;
        pol.allowed_shell_prefixes = vec!["npm ".to_string(), "make".to_string()];
        assert!(pol.shell_command_allowed("npm test"));
        assert!(pol.shell_command_allowed("  npm test"));
        assert!(pol.shell_command_allowed("make build"));
        assert!(!pol.shell_command_allowed("rm -rf /"));
    }
}
