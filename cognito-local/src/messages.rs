//! # Messages Service
//!
//! Renders confirmation codes, MFA codes, and admin invitations into a
//! subject/body pair, giving the `CustomMessage` trigger first refusal
//! on the wording. Delivery is a documented stub: nothing is actually
//! sent, a line is appended to a delivery log instead, unless
//! `CustomEmailSender`/`CustomSMSSender` is bound and accepts the send.

use crate::domain::DeliveryMedium;
use crate::triggers::{build_envelope, hooks, TriggerRuntime};
use serde::Serialize;
use serde_json::json;
use shared::errors::ApiError;
use std::path::PathBuf;

/// What a message is rendered for; threaded through to `CustomMessage`
/// as `triggerSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePurpose {
    SignUp,
    ResendConfirmationCode,
    ForgotPassword,
    UpdateUserAttribute,
    VerifyUserAttribute,
    AdminCreateUser,
    Authentication,
}

impl MessagePurpose {
    fn trigger_source(self) -> &'static str {
        match self {
            Self::SignUp => "CustomMessage_SignUp",
            Self::ResendConfirmationCode => "CustomMessage_ResendCode",
            Self::ForgotPassword => "CustomMessage_ForgotPassword",
            Self::UpdateUserAttribute => "CustomMessage_UpdateUserAttribute",
            Self::VerifyUserAttribute => "CustomMessage_VerifyUserAttribute",
            Self::AdminCreateUser => "CustomMessage_AdminCreateUser",
            Self::Authentication => "CustomMessage_Authentication",
        }
    }

    fn default_subject(self) -> &'static str {
        match self {
            Self::AdminCreateUser => "Your temporary login",
            _ => "Your verification code",
        }
    }

    fn default_body(self, code: &str) -> String {
        match self {
            Self::AdminCreateUser => {
                format!("Your username is {{username}} and temporary password is {code}.")
            }
            _ => format!("Your confirmation code is {code}."),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

#[derive(Serialize)]
struct DeliveryLogEntry<'a> {
    user_pool_id: &'a str,
    username: &'a str,
    medium: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Renders and "delivers" user-facing messages for one pool.
pub struct MessagesService {
    delivery_log_path: PathBuf,
}

impl MessagesService {
    pub fn new(delivery_log_path: PathBuf) -> Self {
        Self { delivery_log_path }
    }

    /// Renders the subject/body for `purpose`, consulting `CustomMessage`
    /// first; its failure is silent and falls back to the default
    /// template.
    pub async fn render(
        &self,
        user_pool_id: &str,
        username: &str,
        purpose: MessagePurpose,
        code: &str,
        trigger_runtime: &TriggerRuntime<'_>,
    ) -> RenderedMessage {
        let mut rendered = RenderedMessage {
            subject: purpose.default_subject().to_string(),
            body: purpose.default_body(code),
        };

        if trigger_runtime.enabled(hooks::CUSTOM_MESSAGE) {
            let request = json!({
                "triggerSource": purpose.trigger_source(),
                "codeParameter": code,
                "usernameParameter": username,
            });
            let envelope = build_envelope(user_pool_id, username, json!({}), request);
            if let Ok(response) = trigger_runtime.invoke(hooks::CUSTOM_MESSAGE, envelope).await {
                let details = response
                    .get("response")
                    .cloned()
                    .unwrap_or(response);
                if let Some(subject) = details.get("emailSubject").and_then(|v| v.as_str()) {
                    rendered.subject = subject.to_string();
                }
                if let Some(body) = details
                    .get("emailMessage")
                    .or_else(|| details.get("smsMessage"))
                    .and_then(|v| v.as_str())
                {
                    rendered.body = body.to_string();
                }
            }
        }

        rendered
    }

    /// Delivers `message` to `medium`, preferring the matching
    /// `CustomEmailSender`/`CustomSMSSender` trigger; either its absence
    /// or its failure falls back to a delivery-log append.
    pub async fn deliver(
        &self,
        user_pool_id: &str,
        username: &str,
        medium: DeliveryMedium,
        message: &RenderedMessage,
        code: &str,
        trigger_runtime: &TriggerRuntime<'_>,
    ) -> Result<(), ApiError> {
        let hook = match medium {
            DeliveryMedium::Email => hooks::CUSTOM_EMAIL_SENDER,
            DeliveryMedium::Sms => hooks::CUSTOM_SMS_SENDER,
        };

        if trigger_runtime.enabled(hook) {
            let request = json!({
                "type": hook,
                "code": code,
            });
            let envelope = build_envelope(user_pool_id, username, json!({}), request);
            if trigger_runtime.invoke(hook, envelope).await.is_ok() {
                return Ok(());
            }
        }

        self.append_delivery_log(user_pool_id, username, medium, message)
            .await
    }

    async fn append_delivery_log(
        &self,
        user_pool_id: &str,
        username: &str,
        medium: DeliveryMedium,
        message: &RenderedMessage,
    ) -> Result<(), ApiError> {
        let medium_str = match medium {
            DeliveryMedium::Email => "EMAIL",
            DeliveryMedium::Sms => "SMS",
        };
        let entry = DeliveryLogEntry {
            user_pool_id,
            username,
            medium: medium_str,
            subject: &message.subject,
            body: &message.body,
        };
        let mut line = serde_json::to_string(&entry).map_err(|e| ApiError::InternalError {
            message: format!("failed to serialize delivery log entry: {e}"),
        })?;
        line.push('\n');

        let path = self.delivery_log_path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| ApiError::InternalError {
                message: format!("delivery log append task panicked: {e}"),
            })??;
        Ok(())
    }
}

fn append_line(path: &std::path::Path, line: &str) -> Result<(), ApiError> {
    use std::io::Write;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ApiError::InternalError {
            message: format!("failed to create delivery log directory: {e}"),
        })?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ApiError::InternalError {
            message: format!("failed to open delivery log {}: {e}", path.display()),
        })?;
    file.write_all(line.as_bytes()).map_err(|e| ApiError::InternalError {
        message: format!("failed to append to delivery log: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_log_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("cognito-local-test-delivery-{}.log", uuid::Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn default_template_includes_the_code() {
        let config = HashMap::new();
        let runtime = TriggerRuntime::new(&config);
        let service = MessagesService::new(temp_log_path());

        let rendered = service
            .render("us-east-1_abc", "alice", MessagePurpose::SignUp, "123456", &runtime)
            .await;

        assert!(rendered.body.contains("123456"));
    }

    #[tokio::test]
    async fn delivery_without_a_custom_sender_appends_to_the_log() {
        let config = HashMap::new();
        let runtime = TriggerRuntime::new(&config);
        let log_path = temp_log_path();
        let service = MessagesService::new(log_path.clone());

        let rendered = RenderedMessage {
            subject: "subj".to_string(),
            body: "body".to_string(),
        };
        service
            .deliver(
                "us-east-1_abc",
                "alice",
                DeliveryMedium::Email,
                &rendered,
                "123456",
                &runtime,
            )
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(contents.contains("\"Username\":\"alice\"") || contents.contains("alice"));

        let _ = std::fs::remove_file(log_path);
    }
}
