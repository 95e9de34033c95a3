//! Downstream responder hand-off.
//!
//! A flushed batch leaves the relay through [`BatchConsumer`]. The production implementation
//! posts the batch to the conversation/AI service as a single versioned JSON event; tests
//! substitute recording or failing consumers.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::message::MessageRecord;

#[async_trait]
/// Receives one completed turn per quiet window.
pub trait BatchConsumer: Send + Sync {
    /// Process the turn accumulated for `key`. Called with at least one message, in arrival
    /// order.
    async fn process_batch(&self, key: &str, messages: Vec<MessageRecord>) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct TurnEvent<'a> {
    v: u8,
    meta: TurnMeta<'a>,
    batch: &'a [MessageRecord],
}

#[derive(Debug, Serialize)]
struct TurnMeta<'a> {
    relay: &'static str,
    key: &'a str,
    #[serde(rename = "flushedAtMs")]
    flushed_at_ms: u64,
}

/// Posts flushed turns to the AI responder endpoint.
pub struct HttpResponder {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpResponder {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl BatchConsumer for HttpResponder {
    async fn process_batch(&self, key: &str, messages: Vec<MessageRecord>) -> anyhow::Result<()> {
        let flushed_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let event = TurnEvent {
            v: 1,
            meta: TurnMeta {
                relay: "turn-relay",
                key,
                flushed_at_ms,
            },
            batch: &messages,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn turn_event_wire_shape() {
        let batch = vec![MessageRecord {
            kind: MessageKind::Text,
            text: Some("hi".to_string()),
            media_url: None,
            timestamp: 1_700_000_000_000,
        }];
        let event = TurnEvent {
            v: 1,
            meta: TurnMeta {
                relay: "turn-relay",
                key: "15551234567",
                flushed_at_ms: 1_700_000_000_123,
            },
            batch: &batch,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["meta"]["relay"], "turn-relay");
        assert_eq!(value["meta"]["key"], "15551234567");
        assert_eq!(value["meta"]["flushedAtMs"], 1_700_000_000_123u64);
        assert_eq!(value["batch"][0]["kind"], "text");
        assert_eq!(value["batch"][0]["text"], "hi");
        assert!(value["batch"][0].get("media_url").is_none());
    }
}
