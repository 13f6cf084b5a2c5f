//! `${VAR}` / `${VAR:-default}` expansion (§4.1).
//!
//! Pure functions: no IO, no policy, no mux knowledge. `subst` and
//! `expand_user` are the only two entry points external modules should use.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Runtime substitution environment (§3 Context).
///
/// Built-in variables take precedence over spec `env`, which takes
/// precedence over the process environment, which takes precedence over
/// an inline `:-default`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub project_name: String,
    pub project_path: String,
    pub session_name: String,
    pub working_dir: String,
    pub tmux_socket: String,
    pub env: HashMap<String, String>,
    /// Spec-level `env:` mapping, merged in ahead of the process environment.
    pub spec_env: HashMap<String, String>,
}

impl Context {
    fn builtin(&self, name: &str) -> Option<&str> {
        match name {
            "PROJECT_NAME" => Some(self.project_name.as_str()),
            "PROJECT_PATH" => Some(self.project_path.as_str()),
            "SESSION_NAME" => Some(self.session_name.as_str()),
            "TMUX_SOCK" => Some(self.tmux_socket.as_str()),
            _ => None,
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(v) = self.builtin(name) {
            return Some(v.to_string());
        }
        if let Some(v) = self.spec_env.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.env.get(name) {
            return Some(v.clone());
        }
        std::env::var(name).ok()
    }
}

fn var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-(.*?))?\}").expect("static regex is valid")
    })
}

/// Expand every maximal `${VAR}` / `${VAR:-default}` substring in `s`.
///
/// An unresolved variable with no default resolves to the empty string.
/// Strings without any `${` literal are returned unchanged (byte-for-byte).
pub fn subst(ctx: &Context, s: &str) -> String {
    if !s.contains("${") {
        return s.to_string();
    }

    var_regex()
        .replace_all(s, |caps: &regex::Captures| {
            let name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            ctx.lookup(name).unwrap_or_else(|| default.to_string())
        })
        .into_owned()
}

/// Expand a leading `~` or `~/` to the user's home directory. Other `~`
/// occurrences (e.g. mid-path) are left untouched.
pub fn expand_user(p: &str) -> String {
    if p == "~" {
        return home::home_dir()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.to_string());
    }
    if let Some(rest) = p.strip_prefix("~/") {
        if let Some(home) = home::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    p.to_string()
}
