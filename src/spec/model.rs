//! The spec data model (§3): the typed shape a YAML/JSON document deserializes
//! into before `validate` gets a chance to run.
//!
//! Deserialize-only: nothing here is ever written back out as YAML/JSON (the
//! surrounding repository owns any snapshot-to-file feature; out of scope
//! here), so these types skip `Serialize` entirely.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

fn default_true() -> bool {
    true
}

fn default_version() -> i64 {
    1
}

/// The root document (§3 Spec).
#[derive(Debug, Clone, Deserialize)]
pub struct Spec {
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub windows: Vec<Window>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub meta: HashMap<String, JsonValue>,
}

/// §3 Session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_true")]
    pub attach: bool,
    #[serde(default = "default_true")]
    pub switch_client: bool,
    #[serde(default)]
    pub base_index: Option<i64>,
    #[serde(default)]
    pub pane_base_index: Option<i64>,
    #[serde(default)]
    pub focus_window: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            name: None,
            prefix: None,
            root: None,
            attach: true,
            switch_client: true,
            base_index: None,
            pane_base_index: None,
            focus_window: None,
        }
    }
}

/// §3 Window.
#[derive(Debug, Clone, Deserialize)]
pub struct Window {
    pub name: String,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub focus: bool,
    #[serde(default)]
    pub focus_pane: Option<String>,
    #[serde(default)]
    pub panes: Vec<Pane>,
    #[serde(default)]
    pub pane_plan: Vec<PanePlanStep>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// §3 Pane (legacy representation).
#[derive(Debug, Clone, Deserialize)]
pub struct Pane {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub focus: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub command: Option<String>,
}

/// One step of a §3 PanePlan: exactly one of `pane` or `split`.
///
/// Deserializes from the externally-tagged map shape `{pane: {...}}` /
/// `{split: {...}}` — the default serde enum representation.
#[derive(Debug, Clone, Deserialize)]
pub enum PanePlanStep {
    #[serde(rename = "pane")]
    Pane(PanePlanPane),
    #[serde(rename = "split")]
    Split(SplitStep),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanePlanPane {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub focus: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitStep {
    pub direction: String,
    #[serde(default)]
    pub size: Option<String>,
}

/// §3 Target, carried by every action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub pane: Option<String>,
}

/// §3 Action — a tagged union over eight kinds, each named by `type` with its
/// payload carried under a field of that same name (e.g.
/// `{type: run, run: {program: nvim, args: [.]}}`).
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub target: Target,
    pub ignore_error: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    Run(RunPayload),
    SendKeys(SendKeysPayload),
    Watch(WatchPayload),
    WaitForPrompt(WaitForPromptPayload),
    SshManagerConnect(SshManagerConnectPayload),
    Sleep(SleepPayload),
    Shell(ShellPayload),
    Mux(MuxPayload),
    /// An action whose `type` this build does not recognize. Carried through
    /// so the validator can reject it by name rather than failing parse.
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunPayload {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub enter: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendKeysPayload {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default = "default_true")]
    pub enter: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchPayload {
    #[serde(default)]
    pub interval_s: i64,
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForPromptPayload {
    #[serde(default)]
    pub timeout_ms: Option<i64>,
    #[serde(default)]
    pub min_quiet_ms: Option<i64>,
    #[serde(default)]
    pub settle_ms: Option<i64>,
    #[serde(default)]
    pub prompt_regex: Option<String>,
    #[serde(default)]
    pub max_lines: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshManagerConnectPayload {
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub login_mode: Option<String>,
    #[serde(default)]
    pub connect_timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleepPayload {
    #[serde(default)]
    pub ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellPayload {
    pub cmd: String,
    #[serde(default)]
    pub shell: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MuxPayload {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Bridges the `{type, target, ignore_error, comment, <type>: {...}}` shape
/// into [`Action`]. `serde_json::Value` is format-agnostic: it implements
/// `Deserialize` against any self-describing `Deserializer`, so this works
/// whether the document came in as YAML or JSON.
#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    target: Target,
    #[serde(default)]
    ignore_error: bool,
    #[serde(default)]
    comment: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, JsonValue>,
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawAction::deserialize(deserializer)?;
        let payload = raw.rest.get(&raw.ty).cloned().unwrap_or(JsonValue::Null);

        let kind = match raw.ty.as_str() {
            "run" => ActionKind::Run(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "send_keys" => ActionKind::SendKeys(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "watch" => ActionKind::Watch(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "wait_for_prompt" => ActionKind::WaitForPrompt(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "ssh_manager_connect" => ActionKind::SshManagerConnect(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "sleep" => ActionKind::Sleep(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "shell" => ActionKind::Shell(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            "mux" => ActionKind::Mux(
                serde_json::from_value(payload).map_err(serde::de::Error::custom)?,
            ),
            other => ActionKind::Unknown(other.to_string()),
        };

        Ok(Action {
            kind,
            target: raw.target,
            ignore_error: raw.ignore_error,
            comment: raw.comment,
        })
    }
}
