use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::SUPPORTED_URL_SCHEMES;
use crate::error::BridgeError;

const EMBED_CHANNEL: &str = "embed";

/// Messages exchanged with embedded UI content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum EmbedMessage {
    Ready,
    RequestActiveProject,
    Navigate {
        path: String,
    },
    OpenExternal {
        url: String,
    },
    ActiveProject {
        #[serde(rename = "projectId")]
        project_id: Option<String>,
    },
}

fn invalid(message: impl Into<String>) -> BridgeError {
    BridgeError::InvalidPayload {
        channel: EMBED_CHANNEL.to_string(),
        message: message.into(),
    }
}

/// Parses and validates a message received from embedded content.
pub fn decode_embed_message(raw: &str) -> Result<EmbedMessage, BridgeError> {
    let message =
        serde_json::from_str::<EmbedMessage>(raw).map_err(|error| invalid(error.to_string()))?;

    match &message {
        EmbedMessage::Navigate { path } => {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(invalid(format!("navigate path must be app-relative: {path}")));
            }
        }
        EmbedMessage::OpenExternal { url } => {
            validate_external_url(url)?;
        }
        EmbedMessage::ActiveProject { .. } => {
            return Err(invalid("active-project is an outbound message"));
        }
        EmbedMessage::Ready | EmbedMessage::RequestActiveProject => {}
    }

    Ok(message)
}

pub fn validate_external_url(raw: &str) -> Result<Url, BridgeError> {
    let parsed = Url::parse(raw.trim()).map_err(|error| invalid(error.to_string()))?;
    if !SUPPORTED_URL_SCHEMES.contains(&parsed.scheme()) {
        return Err(invalid(format!("unsupported url scheme \"{}\"", parsed.scheme())));
    }
    Ok(parsed)
}
