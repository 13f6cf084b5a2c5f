//! Intermediate representation (§3 IR Action, §4.4.b): the lowered form Stage
//! A (`FromSpec`) produces and Stage B (`Compile`) consumes.
//!
//! Targets carried here are the *unresolved* session/window/pane components;
//! resolution into a single `session:window.pane`-shaped string happens in
//! Stage B, alongside substitution.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

impl SplitDirection {
    pub fn flag(self) -> &'static str {
        match self {
            SplitDirection::Horizontal => "-h",
            SplitDirection::Vertical => "-v",
        }
    }
}

/// An unresolved mux target: `session[:window[.pane]]`.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub session: String,
    pub window: Option<String>,
    pub pane: Option<String>,
}

impl Target {
    pub fn session(session: impl Into<String>) -> Self {
        Target {
            session: session.into(),
            window: None,
            pane: None,
        }
    }

    pub fn window(session: impl Into<String>, window: impl Into<String>) -> Self {
        Target {
            session: session.into(),
            window: Some(window.into()),
            pane: None,
        }
    }

    /// Resolve to the `session[:window][.pane]` string per §4.4.b. A pane
    /// beginning with `%` replaces the target outright (it already names a
    /// pane id). No substitution happens here — target components are not
    /// in the substitution list of §4.4.b.
    pub fn resolve(&self) -> String {
        let mut resolved = self.session.clone();
        if let Some(w) = &self.window {
            resolved = format!("{}:{}", self.session, w);
        }
        if let Some(p) = &self.pane {
            if let Some(id) = p.strip_prefix('%') {
                resolved = format!("%{id}");
            } else {
                resolved.push('.');
                resolved.push_str(p);
            }
        }
        resolved
    }
}

#[derive(Debug, Clone)]
pub enum IrKind {
    EnsureSession {
        session: String,
        cwd: String,
    },
    NewWindow {
        session: String,
        name: String,
        cwd: String,
    },
    SplitWindow {
        target: Target,
        direction: SplitDirection,
        cwd: String,
        percent: Option<u32>,
        size_abs: Option<String>,
    },
    SelectWindow {
        target: Target,
    },
    /// `pane` is frequently already a fully-qualified `session:window.N`
    /// string built in Stage A (e.g. for an explicit `focus_pane` index);
    /// Stage B only qualifies it when it looks like a bare pane reference.
    SelectPane {
        session: String,
        pane: String,
    },
    SelectLayout {
        target: Target,
        layout: String,
    },
    SendKeys {
        target: Target,
        keys: Vec<String>,
        enter: bool,
    },
    SetOption {
        global: bool,
        session: String,
        option: &'static str,
        value: String,
    },
    DisplayMessage {
        duration_ms: i64,
        message: String,
    },
    RenameWindow {
        session: String,
        from: Option<String>,
        window: Option<String>,
        new_name: String,
    },
    WaitForPrompt {
        target: Target,
        timeout_ms: Option<i64>,
        min_quiet_ms: Option<i64>,
        settle_ms: Option<i64>,
        max_lines: Option<i64>,
        prompt_regex: Option<String>,
    },
    SshManagerConnect {
        target: Target,
        host: String,
        user: Option<String>,
        port: Option<u16>,
        login_mode: String,
        connect_timeout_ms: Option<i64>,
    },
    /// Lowering target for both the `shell` action and `sleep` (§4.4):
    /// always materializes as a new, named window running the command
    /// under `bash -lc`.
    Shell {
        session: String,
        name: String,
        cwd: String,
        cmd: String,
    },
    Mux {
        name: String,
        args: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct IrAction {
    pub kind: IrKind,
    pub ignore_error: bool,
    pub comment: Option<String>,
}

impl IrAction {
    pub fn new(kind: IrKind) -> Self {
        IrAction {
            kind,
            ignore_error: false,
            comment: None,
        }
    }

    pub fn with_ignore_error(mut self, ignore_error: bool) -> Self {
        self.ignore_error = ignore_error;
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }
}

/// Stage A's output: an ordered action stream plus anything it already knows
/// will need to surface as a warning (e.g. the non-atomic `ensure_session`).
#[derive(Debug, Clone, Default)]
pub struct IrProgram {
    pub actions: Vec<IrAction>,
    pub warnings: Vec<String>,
    pub unsafe_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_session_only() {
        assert_eq!(Target::session("demo").resolve(), "demo");
    }

    #[test]
    fn target_session_and_window() {
        assert_eq!(Target::window("demo", "editor").resolve(), "demo:editor");
    }

    #[test]
    fn target_with_numeric_pane() {
        let mut t = Target::window("demo", "editor");
        t.pane = Some("1".to_string());
        assert_eq!(t.resolve(), "demo:editor.1");
    }

    #[test]
    fn target_with_pane_id_replaces_target() {
        let mut t = Target::window("demo", "editor");
        t.pane = Some("%7".to_string());
        assert_eq!(t.resolve(), "%7");
    }
}
