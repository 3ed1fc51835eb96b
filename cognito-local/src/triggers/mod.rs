//! # Trigger Runtime
//!
//! Resolves lifecycle hooks (`PreSignUp`, `PostAuthentication`, ...) to
//! user-supplied handlers, invokes them with a per-hook timeout, and
//! returns their response (or error) to the caller.
//!
//! ## Hook Table
//!
//! | Hook | When fired | Allowed to | On error |
//! |---|---|---|---|
//! | `UserMigration` | User absent during password auth or forgot-password | Return a synthetic user record | Treat as user-not-found |
//! | `PreSignUp` | Before sign-up accepted | Autoconfirm, auto-verify email/phone | Abort sign-up |
//! | `PostConfirmation` | After confirm-sign-up or admin-confirm | none (observational) | Log; do not fail the call |
//! | `PreAuthentication` | Before password check | Reject with message | Abort login |
//! | `PostAuthentication` | After successful login | none | Abort login |
//! | `PreTokenGeneration` | Before JWT is signed | Add/suppress/override claims | Abort token issuance |
//! | `CustomMessage` | When any message is about to be rendered | Override subject/body | Fall back to default |
//! | `CustomEmailSender`, `CustomSMSSender` | At dispatch time | Replace delivery | Fall back to default |
//!
//! ## Handler Resolution
//!
//! A pool's bindings are a map `hookName -> invocable-spec`, loaded from
//! the trigger configuration document named at the CLI boundary. Both
//! invocable kinds are modelled behind one [`TriggerHandler`] trait so the
//! runtime never branches on kind outside [`build_handler`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Canonical hook names, as they appear in a pool's `LambdaConfig` map.
pub mod hooks {
    pub const USER_MIGRATION: &str = "UserMigration";
    pub const PRE_SIGN_UP: &str = "PreSignUp";
    pub const POST_CONFIRMATION: &str = "PostConfirmation";
    pub const PRE_AUTHENTICATION: &str = "PreAuthentication";
    pub const POST_AUTHENTICATION: &str = "PostAuthentication";
    pub const PRE_TOKEN_GENERATION: &str = "PreTokenGeneration";
    pub const CUSTOM_MESSAGE: &str = "CustomMessage";
    pub const CUSTOM_EMAIL_SENDER: &str = "CustomEmailSender";
    pub const CUSTOM_SMS_SENDER: &str = "CustomSMSSender";
}

/// How a hook's handler is invoked, as declared in the trigger
/// configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InvocableSpec {
    /// Spawn `path` per invocation; the event envelope is written to its
    /// stdin as JSON, and one JSON value is read back from stdout. A
    /// non-zero exit code is treated as failure.
    Script { path: String },
    /// POST the event envelope to `url` and parse the JSON response body.
    Http { url: String },
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("trigger timed out after {0:?}")]
    Timeout(Duration),
    #[error("trigger process exited with failure: {0}")]
    ProcessFailed(String),
    #[error("trigger returned invalid JSON: {0}")]
    InvalidResponse(String),
    #[error("trigger transport error: {0}")]
    Transport(String),
    /// The trigger explicitly rejected the operation (e.g. `PreSignUp`
    /// refusing a signup). Its message is surfaced to the caller.
    #[error("{0}")]
    Rejected(String),
}

/// A single invocable lifecycle hook handler.
///
/// Both [`InvocableSpec`] variants implement this so the runtime can treat
/// them uniformly; see [`build_handler`] for the only place that branches
/// on `kind`.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn invoke(&self, event: Value) -> Result<Value, TriggerError>;
}

struct ScriptHandler {
    path: String,
}

#[async_trait]
impl TriggerHandler for ScriptHandler {
    async fn invoke(&self, event: Value) -> Result<Value, TriggerError> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        let payload = serde_json::to_vec(&event)
            .map_err(|e| TriggerError::InvalidResponse(e.to_string()))?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| TriggerError::Transport(e.to_string()))?;
        }
        // Drop stdin so the child sees EOF.
        child.stdin.take();

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        if !output.status.success() {
            return Err(TriggerError::ProcessFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| TriggerError::InvalidResponse(e.to_string()))
    }
}

struct HttpHandler {
    url: String,
    client: reqwest::Client,
}

#[async_trait]
impl TriggerHandler for HttpHandler {
    async fn invoke(&self, event: Value) -> Result<Value, TriggerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&event)
            .send()
            .await
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TriggerError::ProcessFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TriggerError::InvalidResponse(e.to_string()))
    }
}

fn build_handler(spec: &InvocableSpec) -> Box<dyn TriggerHandler> {
    match spec {
        InvocableSpec::Script { path } => Box::new(ScriptHandler { path: path.clone() }),
        InvocableSpec::Http { url } => Box::new(HttpHandler {
            url: url.clone(),
            client: reqwest::Client::new(),
        }),
    }
}

/// Default per-hook timeout when the configuration doesn't override it.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a pool's bound lifecycle hooks.
///
/// Owns nothing but the bindings and a timeout; it is cheap to construct
/// per request from `UserPool::lambda_config`.
pub struct TriggerRuntime<'a> {
    lambda_config: &'a HashMap<String, InvocableSpec>,
    timeout: Duration,
}

impl<'a> TriggerRuntime<'a> {
    pub fn new(lambda_config: &'a HashMap<String, InvocableSpec>) -> Self {
        Self {
            lambda_config,
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `true` iff `hook` has a bound invocable.
    pub fn enabled(&self, hook: &str) -> bool {
        self.lambda_config.contains_key(hook)
    }

    /// Invokes `hook` with `event`, applying the configured timeout.
    ///
    /// Callers MUST check [`Self::enabled`] first where they need to
    /// distinguish "no trigger bound" from "trigger bound and failed".
    pub async fn invoke(&self, hook: &str, event: Value) -> Result<Value, TriggerError> {
        let spec = self
            .lambda_config
            .get(hook)
            .ok_or_else(|| TriggerError::Transport(format!("no handler bound for {hook}")))?;
        let handler = build_handler(spec);

        match tokio::time::timeout(self.timeout, handler.invoke(event)).await {
            Ok(result) => result,
            Err(_) => Err(TriggerError::Timeout(self.timeout)),
        }
    }
}

/// Builds the uniform event envelope every hook invocation receives.
pub fn build_envelope(
    user_pool_id: &str,
    user_name: &str,
    caller_context: Value,
    request: Value,
) -> Value {
    serde_json::json!({
        "userPoolId": user_pool_id,
        "userName": user_name,
        "callerContext": caller_context,
        "request": request,
        "response": {},
    })
}
