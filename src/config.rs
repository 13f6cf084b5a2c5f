use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::spec::policy::Policy;

/// Configuration for muxspec, read from `.muxspec.yaml`.
///
/// Every field mirrors one [`Policy`] allowance or an execution default;
/// nothing here is mux-specific beyond that. Layout and actions live
/// entirely in the spec file itself.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Prefix prepended to a derived session name (see `compiler::derive_session_name`).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Allow `shell`/`sleep` actions to lower to a real subprocess window.
    #[serde(default)]
    pub allow_shell: Option<bool>,

    /// Allow `mux` actions to pass a raw mux subcommand through the policy.
    #[serde(default)]
    pub allow_tmux_passthrough: Option<bool>,

    /// Mux subcommands allowed when passthrough is enabled. `None` keeps the
    /// built-in default allowlist.
    #[serde(default)]
    pub allowed_mux_commands: Option<Vec<String>>,

    /// Shell command prefixes allowed when `allow_shell` is set. An empty or
    /// absent list means "no prefix restriction".
    #[serde(default)]
    pub allowed_shell_prefixes: Option<Vec<String>>,

    /// Guardrail: total action count across the whole spec.
    #[serde(default)]
    pub max_actions: Option<usize>,

    /// Guardrail: byte length of any single compiled command's argv.
    #[serde(default)]
    pub max_command_len: Option<usize>,
}

impl Config {
    /// Load and merge global and project configurations.
    pub fn load() -> anyhow::Result<Self> {
        let global_config = Self::load_global()?.unwrap_or_default();
        let project_config = Self::load_project()?.unwrap_or_default();
        Ok(global_config.merge(project_config))
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config at {}: {}", path.display(), e))?;
        Ok(Some(config))
    }

    /// Load the global configuration file from the XDG config directory.
    fn load_global() -> anyhow::Result<Option<Self>> {
        if let Some(home_dir) = home::home_dir() {
            let xdg_config_path = home_dir.join(".config/muxspec/config.yaml");
            if xdg_config_path.exists() {
                return Self::load_from_path(&xdg_config_path);
            }
            let xdg_config_path_yml = home_dir.join(".config/muxspec/config.yml");
            if xdg_config_path_yml.exists() {
                return Self::load_from_path(&xdg_config_path_yml);
            }
        }
        Ok(None)
    }

    /// Load the project-specific configuration file from the current directory.
    fn load_project() -> anyhow::Result<Option<Self>> {
        let config_path_yaml = Path::new(".muxspec.yaml");
        if config_path_yaml.exists() {
            return Self::load_from_path(config_path_yaml);
        }
        let config_path_yml = Path::new(".muxspec.yml");
        if config_path_yml.exists() {
            return Self::load_from_path(config_path_yml);
        }
        Ok(None)
    }

    /// Merge a project config into a global config. Project config wins on
    /// every scalar and replaces (rather than appends to) every list.
    fn merge(self, project: Self) -> Self {
        Self {
            prefix: project.prefix.or(self.prefix),
            allow_shell: project.allow_shell.or(self.allow_shell),
            allow_tmux_passthrough: project.allow_tmux_passthrough.or(self.allow_tmux_passthrough),
            allowed_mux_commands: project.allowed_mux_commands.or(self.allowed_mux_commands),
            allowed_shell_prefixes: project.allowed_shell_prefixes.or(self.allowed_shell_prefixes),
            max_actions: project.max_actions.or(self.max_actions),
            max_command_len: project.max_command_len.or(self.max_command_len),
        }
    }

    /// Build a [`Policy`] from this config layered over [`Policy::default`],
    /// with any CLI-level overrides (`--allow-shell`,
    /// `--allow-tmux-passthrough`) applied last.
    pub fn to_policy(&self, cli_allow_shell: bool, cli_allow_tmux_passthrough: bool) -> Policy {
        let mut policy = Policy::default();

        if self.allow_shell.unwrap_or(false) || cli_allow_shell {
            policy.allow_shell = true;
        }
        if self.allow_tmux_passthrough.unwrap_or(false) || cli_allow_tmux_passthrough {
            policy.allow_tmux_passthrough = true;
        }
        if let Some(allowed) = &self.allowed_mux_commands {
            policy.allowed_mux_commands = allowed.iter().cloned().collect();
        }
        if let Some(prefixes) = &self.allowed_shell_prefixes {
            policy.allowed_shell_prefixes = prefixes.clone();
        }
        if let Some(max_actions) = self.max_actions {
            policy.max_actions = max_actions;
        }
        if let Some(max_command_len) = self.max_command_len {
            policy.max_command_len = max_command_len;
        }

        policy
    }

    /// Create an example `.muxspec.yaml` configuration file.
    pub fn init() -> anyhow::Result<()> {
        use std::path::PathBuf;

        let config_path = PathBuf::from(".muxspec.yaml");

        if config_path.exists() {
            return Err(anyhow::anyhow!(
                ".muxspec.yaml already exists. Remove it first if you want to regenerate it."
            ));
        }

        let example_config = r#"# muxspec project configuration
# For global settings, edit ~/.config/muxspec/config.yaml

# Prefix prepended to a session name derived from the project directory.
# prefix: wm

# Allow `shell`/`sleep` actions to open a real subprocess window.
# Off by default: a spec cannot run arbitrary commands unless you opt in.
# allow_shell: false

# Allow `mux` actions to pass a raw mux subcommand through, subject to
# allowed_mux_commands below.
# allow_tmux_passthrough: false

# Mux subcommands allowed when allow_tmux_passthrough is set.
# Default: a conservative allowlist covering session/window/pane lifecycle.
# allowed_mux_commands:
#   - new-window
#   - split-window

# Shell command prefixes allowed when allow_shell is set.
# Default: no restriction (any command is allowed once allow_shell is set).
# allowed_shell_prefixes:
#   - npm
#   - make

# Guardrails against runaway specs.
# max_actions: 200
# max_command_len: 4096
"#;

        fs::write(&config_path, example_config)?;

        println!("Created .muxspec.yaml");
        println!("\nThis file provides project-specific overrides.");
        println!("For global settings, edit ~/.config/muxspec/config.yaml");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_project_scalar_wins() {
        let global = Config {
            prefix: Some("global-prefix".to_string()),
            allow_shell: Some(true),
            ..Default::default()
        };
        let project = Config {
            prefix: Some("project-prefix".to_string()),
            ..Default::default()
        };
        let merged = global.merge(project);
        assert_eq!(merged.prefix.as_deref(), Some("project-prefix"));
        assert_eq!(merged.allow_shell, Some(true));
    }

    #[test]
    fn merge_falls_back_to_global_when_project_unset() {
        let global = Config {
            max_actions: Some(50),
            ..Default::default()
        };
        let merged = global.merge(Config::default());
        assert_eq!(merged.max_actions, Some(50));
    }

    #[test]
    fn to_policy_applies_cli_override_even_when_config_unset() {
        let config = Config::default();
        let policy = config.to_policy(true, false);
        assert!(policy.allow_shell);
        assert!(!policy.allow_tmux_passthrough);
    }

    #[test]
    fn to_policy_keeps_default_guardrails_when_unset() {
        let config = Config::default();
        let policy = config.to_policy(false, false);
        assert_eq!(policy.max_actions, Policy::default().max_actions);
        assert_eq!(policy.max_command_len, Policy::default().max_command_len);
    }
}
