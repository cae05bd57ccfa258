//! Defines the control envelopes relayed between the client and the speech
//! backend, and the forward-or-drop policy applied to text frames.
//!
//! Both directions use the same shape: `{"type": <tag>, ...fields}`. Binary
//! frames never pass through here; they are forwarded untouched by the
//! relay. A text frame whose tag is unknown, or which fails to parse, is
//! dropped silently; that is deliberate policy, not an error path.

use serde::{Deserialize, Serialize};

/// Structured frames accepted from the client and forwarded upstream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    /// The caller has finished speaking/typing this utterance.
    EndOfInput,
    /// A text utterance in lieu of audio.
    TextMessage { content: String },
    /// Any tag we do not recognize. Never forwarded.
    #[serde(other)]
    Unrecognized,
}

/// Structured frames accepted from the backend and forwarded to the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamEnvelope {
    PartialTranscript { text: String },
    FinalTranscript { text: String },
    AiText { text: String },
    /// The backend finished responding. Forwarded; does not end the session.
    EndOfResponse,
    #[serde(other)]
    Unrecognized,
}

/// Classifies a client text frame. Returns the JSON to forward upstream, or
/// `None` to drop the frame.
pub fn forward_client_text(raw: &str) -> Option<String> {
    match serde_json::from_str::<ClientEnvelope>(raw) {
        Ok(ClientEnvelope::Unrecognized) | Err(_) => None,
        Ok(envelope) => serde_json::to_string(&envelope).ok(),
    }
}

/// Classifies an upstream text frame. Returns the JSON to forward to the
/// client, or `None` to drop the frame.
pub fn forward_upstream_text(raw: &str) -> Option<String> {
    match serde_json::from_str::<UpstreamEnvelope>(raw) {
        Ok(UpstreamEnvelope::Unrecognized) | Err(_) => None,
        Ok(envelope) => serde_json::to_string(&envelope).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_forwards_content() {
        let out = forward_client_text(r#"{"type":"text_message","content":"hello"}"#)
            .expect("recognized frame should forward");
        let parsed: ClientEnvelope = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed,
            ClientEnvelope::TextMessage {
                content: "hello".into()
            }
        );
    }

    #[test]
    fn end_of_input_forwards_verbatim() {
        let out = forward_client_text(r#"{"type":"end_of_input"}"#).unwrap();
        assert_eq!(out, r#"{"type":"end_of_input"}"#);
    }

    #[test]
    fn unknown_client_type_is_dropped() {
        assert_eq!(
            forward_client_text(r#"{"type":"set_volume","level":3}"#),
            None
        );
    }

    #[test]
    fn malformed_text_is_dropped() {
        assert_eq!(forward_client_text("not json at all"), None);
        assert_eq!(forward_client_text(r#"{"no_type_field":true}"#), None);
        // A recognized tag missing its payload field fails to parse, which
        // falls under the same drop policy.
        assert_eq!(forward_client_text(r#"{"type":"text_message"}"#), None);
    }

    #[test]
    fn transcripts_forward_the_real_payload() {
        for (raw, expected) in [
            (
                r#"{"type":"partial_transcript","text":"hel"}"#,
                UpstreamEnvelope::PartialTranscript { text: "hel".into() },
            ),
            (
                r#"{"type":"final_transcript","text":"hello"}"#,
                UpstreamEnvelope::FinalTranscript {
                    text: "hello".into(),
                },
            ),
            (
                r#"{"type":"ai_text","text":"hi there"}"#,
                UpstreamEnvelope::AiText {
                    text: "hi there".into(),
                },
            ),
        ] {
            let out = forward_upstream_text(raw).expect("recognized frame should forward");
            let parsed: UpstreamEnvelope = serde_json::from_str(&out).unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn end_of_response_forwards_without_closing_semantics() {
        let out = forward_upstream_text(r#"{"type":"end_of_response"}"#).unwrap();
        assert_eq!(out, r#"{"type":"end_of_response"}"#);
    }

    #[test]
    fn unknown_upstream_type_is_dropped() {
        assert_eq!(
            forward_upstream_text(r#"{"type":"usage_report","tokens":42}"#),
            None
        );
    }
}
