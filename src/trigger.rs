//! Command-trigger protocol
//!
//! Rendered step pages talk back to the engine only through clickable
//! command URIs:
//!
//! ```text
//! command:katapod.sendText?<percent-encoded [ResolvedCommand]>
//! command:katapod.loadPage?<percent-encoded [{"step": "..."}]>
//! command:katapod.reloadPage
//! command:katapod.start
//! ```
//!
//! The payload is always a JSON array holding exactly one object.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::directive::ResolvedCommand;
use crate::error::TriggerError;

pub const COMMAND_URI_SCHEME: &str = "command";

pub const SEND_TEXT_COMMAND: &str = "katapod.sendText";
pub const LOAD_PAGE_COMMAND: &str = "katapod.loadPage";
pub const RELOAD_PAGE_COMMAND: &str = "katapod.reloadPage";
pub const START_COMMAND: &str = "katapod.start";

/// Navigation target carried by `katapod.loadPage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStep {
    pub step: String,
}

impl TargetStep {
    pub fn new(step: impl Into<String>) -> Self {
        Self { step: step.into() }
    }
}

/// A decoded UI trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    SendText(ResolvedCommand),
    LoadPage(TargetStep),
    ReloadPage,
    Start,
}

impl Trigger {
    /// Registered command id
    pub fn command_id(&self) -> &'static str {
        match self {
            Self::SendText(_) => SEND_TEXT_COMMAND,
            Self::LoadPage(_) => LOAD_PAGE_COMMAND,
            Self::ReloadPage => RELOAD_PAGE_COMMAND,
            Self::Start => START_COMMAND,
        }
    }

    /// Full `command:` URI for this trigger
    pub fn to_uri(&self) -> Result<String, TriggerError> {
        let payload = match self {
            Self::SendText(command) => Some(encode_command_uri(command)?),
            Self::LoadPage(target) => Some(encode_step_uri(&target.step)?),
            Self::ReloadPage | Self::Start => None,
        };
        Ok(match payload {
            Some(payload) => format!("{}:{}?{}", COMMAND_URI_SCHEME, self.command_id(), payload),
            None => format!("{}:{}", COMMAND_URI_SCHEME, self.command_id()),
        })
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode_single<T: Serialize>(value: &T) -> Result<String, TriggerError> {
    let json = serde_json::to_string(&[value])?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Payload for a `katapod.loadPage` link: `[{"step": step}]`, percent-encoded
pub fn encode_step_uri(step: &str) -> Result<String, TriggerError> {
    encode_single(&TargetStep::new(step))
}

/// Payload for a `katapod.sendText` link: `[command]`, percent-encoded
pub fn encode_command_uri(command: &ResolvedCommand) -> Result<String, TriggerError> {
    encode_single(command)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a percent-encoded single-element JSON array
pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> Result<T, TriggerError> {
    let json = urlencoding::decode(payload).map_err(|e| TriggerError::Decode(e.to_string()))?;
    let items: Vec<T> = serde_json::from_str(&json)?;
    items.into_iter().next().ok_or(TriggerError::EmptyPayload)
}

/// Parse a `command:katapod.<name>[?payload]` URI
pub fn parse_trigger_uri(uri: &str) -> Result<Trigger, TriggerError> {
    let parsed = Url::parse(uri).map_err(|e| TriggerError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != COMMAND_URI_SCHEME {
        return Err(TriggerError::InvalidUri {
            uri: uri.to_string(),
            reason: format!("expected scheme '{}', got '{}'", COMMAND_URI_SCHEME, parsed.scheme()),
        });
    }

    let payload = || {
        parsed.query().ok_or_else(|| TriggerError::InvalidUri {
            uri: uri.to_string(),
            reason: "missing payload".to_string(),
        })
    };

    match parsed.path() {
        SEND_TEXT_COMMAND => Ok(Trigger::SendText(decode_payload(payload()?)?)),
        LOAD_PAGE_COMMAND => Ok(Trigger::LoadPage(decode_payload(payload()?)?)),
        RELOAD_PAGE_COMMAND => Ok(Trigger::ReloadPage),
        START_COMMAND => Ok(Trigger::Start),
        other => Err(TriggerError::UnknownCommand(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{parse_code_block, Macro, MaxInvocations};

    #[test]
    fn test_step_uri_payload() {
        let payload = encode_step_uri("step2").unwrap();
        assert_eq!(payload, "%5B%7B%22step%22%3A%22step2%22%7D%5D");

        let target: TargetStep = decode_payload(&payload).unwrap();
        assert_eq!(target, TargetStep::new("step2"));
    }

    #[test]
    fn test_send_text_uri_keeps_policy_fields() {
        let command = parse_code_block("intro", 1, "### {\"terminalId\":\"t1\",\"maxInvocations\":2}\nls -la");
        let uri = Trigger::SendText(command.clone()).to_uri().unwrap();
        assert!(uri.starts_with("command:katapod.sendText?%5B"));

        match parse_trigger_uri(&uri).unwrap() {
            Trigger::SendText(decoded) => {
                assert_eq!(decoded, command);
                assert_eq!(decoded.max_invocations, MaxInvocations::Limited(2));
                assert_eq!(decoded.code_block_id.as_str(), "inPage_intro_1");
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_send_text_tolerates_unknown_macro() {
        let payload = urlencoding::encode(
            r#"[{"command":"ls","codeBlockId":"inPage_s_0","macrosBefore":["ctrl_z","ctrl_c"]}]"#,
        );
        let uri = format!("command:katapod.sendText?{}", payload);

        match parse_trigger_uri(&uri).unwrap() {
            Trigger::SendText(decoded) => {
                assert_eq!(decoded.macros_before, vec![Macro::Unknown, Macro::CtrlC]);
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_payloadless_commands() {
        assert_eq!(parse_trigger_uri("command:katapod.reloadPage").unwrap(), Trigger::ReloadPage);
        assert_eq!(parse_trigger_uri("command:katapod.start").unwrap(), Trigger::Start);
        assert_eq!(Trigger::ReloadPage.to_uri().unwrap(), "command:katapod.reloadPage");
    }

    #[test]
    fn test_rejects_foreign_uris() {
        assert!(matches!(
            parse_trigger_uri("https://example.org/katapod.start"),
            Err(TriggerError::InvalidUri { .. })
        ));
        assert!(matches!(
            parse_trigger_uri("command:katapod.explode"),
            Err(TriggerError::UnknownCommand(ref name)) if name == "katapod.explode"
        ));
        assert!(matches!(
            parse_trigger_uri("command:katapod.loadPage"),
            Err(TriggerError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_empty_and_malformed_payloads() {
        assert!(matches!(
            parse_trigger_uri("command:katapod.loadPage?%5B%5D"),
            Err(TriggerError::EmptyPayload)
        ));
        assert!(matches!(
            parse_trigger_uri("command:katapod.loadPage?not-json"),
            Err(TriggerError::Json(_))
        ));
    }
}
