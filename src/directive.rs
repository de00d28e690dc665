//! Command Directive Parser
//!
//! Turns the raw text of one embedded code block into a fully-resolved
//! [`ResolvedCommand`]. A code block looks like
//!
//! ```text
//! ### {"terminalId": "myTermId", "maxInvocations": 2}
//! ls -la
//! ```
//!
//! or `### myTermId` followed by the command, or just the command.
//!
//! ## Rules
//!
//! - Lines starting with `"### "` are metadata lines; only the last one counts.
//! - Metadata that is not valid JSON is a bare terminal id. Valid JSON that is
//!   not an object contributes nothing.
//! - Object fields are taken one by one; a field of the wrong type is ignored
//!   and the rest still apply. Parsing never fails.
//! - Defaults are applied field by field: defaults → metadata → computed `codeBlockId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Reserved prefix marking a metadata line inside a code block
pub const EXECUTION_INFO_PREFIX: &str = "### ";

/// Separator between the parts of a [`CodeBlockId`]
pub const CODE_BLOCK_ID_SEPARATOR: &str = "_";

/// Control character sent by the `ctrl_c` macro (end-of-text)
pub const CTRL_C: &str = "\x03";

// ---------------------------------------------------------------------------
// MaxInvocations
// ---------------------------------------------------------------------------

/// How many times a code block may be dispatched in one session.
///
/// On the wire this is either a non-negative integer or the string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum MaxInvocations {
    #[default]
    Unlimited,
    Limited(u32),
}

impl MaxInvocations {
    const UNLIMITED_KEYWORD: &'static str = "unlimited";

    /// Whether another dispatch is allowed after `invocations_so_far` attempts
    pub fn permits(&self, invocations_so_far: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => invocations_so_far < *max,
        }
    }
}

impl TryFrom<Value> for MaxInvocations {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::String(s) if s == Self::UNLIMITED_KEYWORD => Ok(Self::Unlimited),
            Value::Number(n) => n
                .as_u64()
                .or_else(|| {
                    // JSON has no integer type; 2.0 means 2
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                        .map(|f| f as u64)
                })
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::Limited)
                .ok_or_else(|| format!("maxInvocations out of range: {}", n)),
            other => Err(format!(
                "maxInvocations must be a non-negative integer or \"unlimited\", got {}",
                other
            )),
        }
    }
}

impl From<MaxInvocations> for Value {
    fn from(max: MaxInvocations) -> Self {
        match max {
            MaxInvocations::Unlimited => Value::String(MaxInvocations::UNLIMITED_KEYWORD.into()),
            MaxInvocations::Limited(n) => Value::from(n),
        }
    }
}

impl fmt::Display for MaxInvocations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(Self::UNLIMITED_KEYWORD),
            Self::Limited(n) => write!(f, "{}", n),
        }
    }
}

// ---------------------------------------------------------------------------
// Macro
// ---------------------------------------------------------------------------

/// Small pre-command action run on the target terminal before the command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Macro {
    /// Send the cancel control character without a trailing newline
    CtrlC,
    NoOp,
    /// Any tag this runtime does not know; runs as a no-op
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// CodeBlockId
// ---------------------------------------------------------------------------

/// Stable identity of one command occurrence, keyed for invocation counting.
///
/// Depends only on where the command comes from, never on how often the
/// step was visited, so counters accumulate across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeBlockId(String);

impl CodeBlockId {
    /// Id of the `block_index`-th inline command block of `step`
    pub fn in_page(step: &str, block_index: usize) -> Self {
        Self(format!(
            "inPage{sep}{step}{sep}{block_index}",
            sep = CODE_BLOCK_ID_SEPARATOR
        ))
    }

    /// Id of the onLoad commands bound to `terminal_id` on entry to `step`
    pub fn on_load(step: &str, terminal_id: &str) -> Self {
        Self(format!(
            "onLoad{sep}{step}{sep}{terminal_id}",
            sep = CODE_BLOCK_ID_SEPARATOR
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ResolvedCommand
// ---------------------------------------------------------------------------

fn default_execute() -> bool {
    true
}

/// A directive after parsing and defaulting, ready for the dispatcher.
///
/// This is also the payload of `katapod.sendText` trigger links, hence the
/// camelCase wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCommand {
    pub command: String,
    #[serde(default = "default_execute")]
    pub execute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    pub code_block_id: CodeBlockId,
    #[serde(default)]
    pub max_invocations: MaxInvocations,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macros_before: Vec<Macro>,
}

impl ResolvedCommand {
    /// Start building a command with all defaults applied
    pub fn builder(command: impl Into<String>, code_block_id: CodeBlockId) -> ResolvedCommandBuilder {
        ResolvedCommandBuilder {
            command: command.into(),
            execute: true,
            terminal_id: None,
            code_block_id,
            max_invocations: MaxInvocations::Unlimited,
            macros_before: Vec::new(),
        }
    }

    /// JSON rendering used in log lines
    pub fn to_log_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Explicit field-by-field construction of a [`ResolvedCommand`]
#[derive(Debug, Clone)]
pub struct ResolvedCommandBuilder {
    command: String,
    execute: bool,
    terminal_id: Option<String>,
    code_block_id: CodeBlockId,
    max_invocations: MaxInvocations,
    macros_before: Vec<Macro>,
}

impl ResolvedCommandBuilder {
    pub fn execute(mut self, execute: bool) -> Self {
        self.execute = execute;
        self
    }

    pub fn terminal_id(mut self, terminal_id: impl Into<String>) -> Self {
        self.terminal_id = Some(terminal_id.into());
        self
    }

    pub fn max_invocations(mut self, max: MaxInvocations) -> Self {
        self.max_invocations = max;
        self
    }

    pub fn macros_before(mut self, macros: Vec<Macro>) -> Self {
        self.macros_before = macros;
        self
    }

    /// Overlay the fields present in a metadata line; absent fields keep
    /// whatever the builder already holds.
    pub fn apply(mut self, info: ExecutionInfo) -> Self {
        if let Some(terminal_id) = info.terminal_id {
            self.terminal_id = Some(terminal_id);
        }
        if let Some(execute) = info.execute {
            self.execute = execute;
        }
        if let Some(max) = info.max_invocations {
            self.max_invocations = max;
        }
        if let Some(macros) = info.macros_before {
            self.macros_before = macros;
        }
        self
    }

    pub fn build(self) -> ResolvedCommand {
        ResolvedCommand {
            command: self.command,
            execute: self.execute,
            terminal_id: self.terminal_id,
            code_block_id: self.code_block_id,
            max_invocations: self.max_invocations,
            macros_before: self.macros_before,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionInfo: the metadata line
// ---------------------------------------------------------------------------

/// Partial execution settings carried by a metadata line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionInfo {
    pub terminal_id: Option<String>,
    pub execute: Option<bool>,
    pub max_invocations: Option<MaxInvocations>,
    pub macros_before: Option<Vec<Macro>>,
}

impl ExecutionInfo {
    /// Interpret a metadata line: JSON merged field by field, or else a bare
    /// terminal id
    pub fn parse(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(fields)) => Self::from_fields(&fields),
            Ok(_) => {
                debug!(line, "Metadata line is JSON but not an object, nothing to merge");
                Self::default()
            }
            Err(e) => {
                debug!(line, error = %e, "Metadata line is not JSON, using it as terminal id");
                Self {
                    terminal_id: Some(line.to_string()),
                    ..Self::default()
                }
            }
        }
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        let info = Self {
            terminal_id: fields
                .get("terminalId")
                .and_then(Value::as_str)
                .map(str::to_string),
            execute: fields.get("execute").and_then(Value::as_bool),
            max_invocations: fields
                .get("maxInvocations")
                .and_then(|v| MaxInvocations::try_from(v.clone()).ok()),
            macros_before: fields
                .get("macrosBefore")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(known_macro).collect()),
        };
        if fields.contains_key("maxInvocations") && info.max_invocations.is_none() {
            debug!(value = %fields["maxInvocations"], "Ignoring unusable maxInvocations");
        }
        info
    }
}

fn known_macro(tag: &Value) -> Option<Macro> {
    match serde_json::from_value::<Macro>(tag.clone()) {
        Ok(Macro::Unknown) | Err(_) => {
            debug!(%tag, "Skipping unknown macro");
            None
        }
        Ok(known) => Some(known),
    }
}

// ---------------------------------------------------------------------------
// OnLoadCommand: step-entry commands from the configuration
// ---------------------------------------------------------------------------

/// A command the configuration binds to entering a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnLoadCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_invocations: Option<MaxInvocations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macros_before: Option<Vec<Macro>>,
}

impl OnLoadCommand {
    /// onLoad commands run at most once per session unless overridden
    pub const DEFAULT_MAX_INVOCATIONS: MaxInvocations = MaxInvocations::Limited(1);

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            execute: None,
            max_invocations: None,
            macros_before: None,
        }
    }

    /// Resolve against the step and terminal it is bound to
    pub fn resolve(&self, step: &str, terminal_id: &str) -> ResolvedCommand {
        ResolvedCommand::builder(self.command.clone(), CodeBlockId::on_load(step, terminal_id))
            .terminal_id(terminal_id)
            .max_invocations(Self::DEFAULT_MAX_INVOCATIONS)
            .apply(ExecutionInfo {
                terminal_id: None,
                execute: self.execute,
                max_invocations: self.max_invocations,
                macros_before: self.macros_before.clone(),
            })
            .build()
    }
}

// ---------------------------------------------------------------------------
// parse_code_block
// ---------------------------------------------------------------------------

/// Parse the content of one inline code block of `step`.
///
/// `block_index` is the zero-based position of the block among the command
/// blocks of the page. Pure: touches neither terminals nor counters.
pub fn parse_code_block(step: &str, block_index: usize, content: &str) -> ResolvedCommand {
    let mut command_lines: Vec<&str> = Vec::new();
    let mut info_line: Option<&str> = None;

    for line in content.split('\n') {
        match line.strip_prefix(EXECUTION_INFO_PREFIX) {
            Some(rest) => info_line = Some(rest.trim()),
            None => command_lines.push(line),
        }
    }

    let builder = ResolvedCommand::builder(
        command_lines.join("\n"),
        CodeBlockId::in_page(step, block_index),
    );

    match info_line.filter(|line| !line.is_empty()) {
        Some(line) => builder.apply(ExecutionInfo::parse(line)).build(),
        None => builder.build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_metadata_line() {
        let cmd = parse_code_block("intro", 0, "ls\ncd /tmp");
        assert_eq!(cmd.command, "ls\ncd /tmp");
        assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
        assert_eq!(cmd.terminal_id, None);
        assert!(cmd.execute);
        assert!(cmd.macros_before.is_empty());
        assert_eq!(cmd.code_block_id.as_str(), "inPage_intro_0");
    }

    #[test]
    fn test_json_metadata_merges_over_defaults() {
        let cmd = parse_code_block(
            "step2",
            3,
            "### {\"terminalId\":\"t1\",\"maxInvocations\":2}\necho hi",
        );
        assert_eq!(cmd.command, "echo hi");
        assert_eq!(cmd.terminal_id.as_deref(), Some("t1"));
        assert_eq!(cmd.max_invocations, MaxInvocations::Limited(2));
        assert!(cmd.execute);
        assert_eq!(cmd.code_block_id.as_str(), "inPage_step2_3");
    }

    #[test]
    fn test_bare_terminal_id_metadata() {
        let cmd = parse_code_block("intro", 1, "### myterm\nnodetool status");
        assert_eq!(cmd.terminal_id.as_deref(), Some("myterm"));
        assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
        assert_eq!(cmd.command, "nodetool status");
    }

    #[test]
    fn test_malformed_json_degrades_to_terminal_id() {
        let cmd = parse_code_block("intro", 0, "### {\"terminalId\": \"t1\"\nls");
        assert_eq!(cmd.terminal_id.as_deref(), Some("{\"terminalId\": \"t1\""));
        assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
    }

    #[test]
    fn test_non_object_json_merges_nothing() {
        for line in ["42", "\"t2\"", "true", "null", "[1, 2]"] {
            let cmd = parse_code_block("intro", 0, &format!("### {}\nls", line));
            assert_eq!(cmd.terminal_id, None, "metadata {}", line);
            assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
            assert!(cmd.execute);
        }
    }

    #[test]
    fn test_unknown_macro_keeps_rest_of_metadata() {
        let cmd = parse_code_block(
            "s",
            0,
            "### {\"terminalId\":\"t2\",\"maxInvocations\":1,\"macrosBefore\":[\"ctrl_z\",\"ctrl_c\",7]}\nrm -rf build",
        );
        assert_eq!(cmd.terminal_id.as_deref(), Some("t2"));
        assert_eq!(cmd.max_invocations, MaxInvocations::Limited(1));
        assert_eq!(cmd.macros_before, vec![Macro::CtrlC]);
        assert_eq!(cmd.command, "rm -rf build");
    }

    #[test]
    fn test_integral_float_max_invocations() {
        let cmd = parse_code_block("s", 0, "### {\"terminalId\":\"t2\",\"maxInvocations\":2.0}\nls");
        assert_eq!(cmd.terminal_id.as_deref(), Some("t2"));
        assert_eq!(cmd.max_invocations, MaxInvocations::Limited(2));
    }

    #[test]
    fn test_ill_typed_fields_are_ignored_individually() {
        let cmd = parse_code_block(
            "s",
            0,
            "### {\"terminalId\":5,\"execute\":\"no\",\"maxInvocations\":1.5,\"macrosBefore\":\"ctrl_c\",\"extra\":{}}\nls",
        );
        assert_eq!(cmd.terminal_id, None);
        assert!(cmd.execute);
        assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
        assert!(cmd.macros_before.is_empty());

        let cmd = parse_code_block("s", 0, "### {\"maxInvocations\":-1,\"execute\":false}\nls");
        assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
        assert!(!cmd.execute);
    }

    #[test]
    fn test_unknown_macro_tolerated_in_config() {
        let on_load: OnLoadCommand =
            serde_json::from_str(r#"{"command": "ls", "macrosBefore": ["ctrl_z", "ctrl_c"]}"#).unwrap();
        assert_eq!(
            on_load.macros_before,
            Some(vec![Macro::Unknown, Macro::CtrlC])
        );
    }

    #[test]
    fn test_last_metadata_line_wins() {
        let cmd = parse_code_block("intro", 0, "### first\nls\n### {\"terminalId\":\"second\"}");
        assert_eq!(cmd.terminal_id.as_deref(), Some("second"));
        assert_eq!(cmd.command, "ls");
    }

    #[test]
    fn test_empty_last_metadata_line_discards_earlier() {
        let cmd = parse_code_block("intro", 0, "### first\nls\n###   ");
        assert_eq!(cmd.terminal_id, None);
        assert_eq!(cmd.command, "ls");
    }

    #[test]
    fn test_execute_false_and_macros() {
        let cmd = parse_code_block(
            "s",
            0,
            "### {\"execute\": false, \"macrosBefore\": [\"ctrl_c\", \"no_op\"]}\ntop",
        );
        assert!(!cmd.execute);
        assert_eq!(cmd.macros_before, vec![Macro::CtrlC, Macro::NoOp]);
    }

    #[test]
    fn test_metadata_cannot_override_code_block_id() {
        let cmd = parse_code_block("s", 4, "### {\"codeBlockId\": \"forged\"}\nls");
        assert_eq!(cmd.code_block_id.as_str(), "inPage_s_4");
    }

    #[test]
    fn test_code_block_id_stable_across_reparse() {
        let content = "### t2\nls";
        let first = parse_code_block("setup", 2, content);
        let second = parse_code_block("setup", 2, content);
        assert_eq!(first.code_block_id, second.code_block_id);
    }

    #[test]
    fn test_trailing_newline_preserved() {
        let cmd = parse_code_block("s", 0, "ls\n");
        assert_eq!(cmd.command, "ls\n");
    }

    #[test]
    fn test_on_load_defaults_to_single_invocation() {
        let cmd = OnLoadCommand::new("./wait.sh").resolve("s1", "t1");
        assert_eq!(cmd.code_block_id.as_str(), "onLoad_s1_t1");
        assert_eq!(cmd.terminal_id.as_deref(), Some("t1"));
        assert_eq!(cmd.max_invocations, MaxInvocations::Limited(1));
    }

    #[test]
    fn test_on_load_overrides_max_invocations() {
        let on_load: OnLoadCommand =
            serde_json::from_str(r#"{"command": "clear", "maxInvocations": "unlimited"}"#).unwrap();
        let cmd = on_load.resolve("s1", "t1");
        assert_eq!(cmd.max_invocations, MaxInvocations::Unlimited);
    }

    #[test]
    fn test_max_invocations_wire_format() {
        assert_eq!(serde_json::to_string(&MaxInvocations::Unlimited).unwrap(), "\"unlimited\"");
        assert_eq!(serde_json::to_string(&MaxInvocations::Limited(3)).unwrap(), "3");
        assert!(serde_json::from_str::<MaxInvocations>("\"often\"").is_err());
        assert!(serde_json::from_str::<MaxInvocations>("-1").is_err());
        assert!(serde_json::from_str::<MaxInvocations>("2.5").is_err());
        assert_eq!(
            serde_json::from_str::<MaxInvocations>("3.0").unwrap(),
            MaxInvocations::Limited(3)
        );
    }

    #[test]
    fn test_permits() {
        assert!(MaxInvocations::Unlimited.permits(1_000));
        assert!(MaxInvocations::Limited(2).permits(1));
        assert!(!MaxInvocations::Limited(2).permits(2));
        assert!(!MaxInvocations::Limited(0).permits(0));
    }

    #[test]
    fn test_resolved_command_wire_names() {
        let cmd = ResolvedCommand::builder("ls", CodeBlockId::in_page("intro", 0))
            .terminal_id("t1")
            .build();
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["terminalId"], "t1");
        assert_eq!(json["codeBlockId"], "inPage_intro_0");
        assert_eq!(json["maxInvocations"], "unlimited");
    }
}
