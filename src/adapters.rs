use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::config::EvaConfig;
use crate::ports;
use crate::types::chat::{ChatMessage, Persona};
use crate::types::push::{PushPayload, Subscription, VapidConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

impl ports::SendFailure for web_push::WebPushError {
    fn endpoint_gone(&self) -> bool {
        // 410 Gone and 404 Not Found from the push service respectively.
        matches!(
            self,
            web_push::WebPushError::EndpointNotValid | web_push::WebPushError::EndpointNotFound
        )
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }
}

impl ports::PushSender for WebPushSender {
    type Error = web_push::WebPushError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a PushPayload,
    ) -> Self::Fut<'a> {
        Box::pin(async move {
            let subscription_info = web_push::SubscriptionInfo::new(
                subscription.endpoint.clone(),
                subscription.p256dh.clone(),
                subscription.auth.clone(),
            );
            let body = serde_json::to_vec(payload)
                .map_err(|_| web_push::WebPushError::Unspecified)?;
            let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
            builder.set_payload(web_push::ContentEncoding::Aes128Gcm, &body);
            let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
                &self.vapid.private_key,
                web_push::URL_SAFE_NO_PAD,
                &subscription_info,
            )?;
            signature_builder.add_claim("sub", self.vapid.subject.as_str());
            builder.set_vapid_signature(signature_builder.build()?);
            self.client.send(builder.build()?).await?;
            Ok(())
        })
    }
}

#[derive(Debug)]
pub enum ChatError {
    Http(reqwest::Error),
    Status(u16),
    MalformedResponse,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Http(err) => write!(f, "chat request failed: {err}"),
            ChatError::Status(status) => write!(f, "chat provider returned status {status}"),
            ChatError::MalformedResponse => f.write_str("chat provider returned no text"),
        }
    }
}

/// Forwards persona-prefixed conversations to an OpenAI-style chat
/// completion endpoint and hands back the first choice's text.
#[derive(Clone)]
pub struct HttpChatProvider {
    config: EvaConfig,
    client: reqwest::Client,
}

impl HttpChatProvider {
    pub fn new(config: EvaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

impl ports::ChatProvider for HttpChatProvider {
    type Error = ChatError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<String, Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn complete<'a>(&'a self, persona: Persona, messages: &'a [ChatMessage]) -> Self::Fut<'a> {
        Box::pin(async move {
            let request = build_completion_request(&self.config.model, persona, messages);
            let response = self
                .client
                .post(&self.config.api_url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await
                .map_err(ChatError::Http)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ChatError::Status(status.as_u16()));
            }
            let payload: serde_json::Value = response.json().await.map_err(ChatError::Http)?;
            extract_completion_text(&payload).ok_or(ChatError::MalformedResponse)
        })
    }
}

fn build_completion_request(
    model: &str,
    persona: Persona,
    messages: &[ChatMessage],
) -> serde_json::Value {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(serde_json::json!({
        "role": "system",
        "content": persona.system_prompt(),
    }));
    for message in messages {
        all.push(serde_json::json!({
            "role": message.role,
            "content": message.content,
        }));
    }
    serde_json::json!({ "model": model, "messages": all })
}

fn extract_completion_text(payload: &serde_json::Value) -> Option<String> {
    let text = payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    Some(text.trim().to_string())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn build_completion_request__should_prepend_persona_system_message() {
        // Given
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: "How was my week?".to_string(),
        }];

        // When
        let request = build_completion_request("test-model", Persona::Alfred, &messages);

        // Then
        assert_eq!(request["model"], "test-model");
        let sent = request["messages"].as_array().expect("messages array");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["role"], "system");
        assert!(
            sent[0]["content"]
                .as_str()
                .expect("system content")
                .contains("Alfred")
        );
        assert_eq!(sent[1]["content"], "How was my week?");
    }

    #[test]
    fn extract_completion_text__should_take_first_choice() {
        // Given
        let payload = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  Take a walk.  " } },
                { "message": { "role": "assistant", "content": "Second choice" } }
            ]
        });

        // Then
        assert_eq!(
            extract_completion_text(&payload),
            Some("Take a walk.".to_string())
        );
    }

    #[test]
    fn extract_completion_text__should_reject_missing_content() {
        // Then
        assert_eq!(extract_completion_text(&serde_json::json!({})), None);
        assert_eq!(
            extract_completion_text(&serde_json::json!({ "choices": [] })),
            None
        );
    }
}
