//! # Token Generator
//!
//! Issues access and ID tokens (RS256 JWTs) and opaque refresh tokens,
//! applying any `PreTokenGeneration` claim overrides before signing.
//!
//! Matches the standard identity-provider access-token claim set:
//! `client_id`, `exp`, `iat`, `iss`, `sub`, `jti`, `origin_jti`, `scope`,
//! `token_use`, `username`, plus `cognito:groups` and `event_id` for the
//! emulator's broader surface.

pub mod keystore;

use crate::clock::{Clock, IdSource};
use crate::domain::{AppClient, User, UserPool};
use crate::triggers::{build_envelope, hooks, TriggerRuntime};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand::RngCore;
use serde_json::{json, Map, Value};
use shared::errors::ApiError;

/// Why tokens are being issued; threaded through to `PreTokenGeneration`
/// as `triggerSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueReason {
    Authentication,
    RefreshTokens,
}

impl IssueReason {
    fn trigger_source(self) -> &'static str {
        match self {
            Self::Authentication => "TokenGeneration_Authentication",
            Self::RefreshTokens => "TokenGeneration_RefreshTokens",
        }
    }
}

pub struct IssuedAccessAndIdTokens {
    pub access_token: String,
    pub id_token: String,
    pub expires_in: i64,
}

/// Produces signed tokens for a resolved user within a pool/client pair.
pub struct TokenGenerator<'a> {
    encoding_key: &'a EncodingKey,
    kid: &'a str,
    issuer_base_url: &'a str,
    clock: &'a dyn Clock,
    ids: &'a dyn IdSource,
}

impl<'a> TokenGenerator<'a> {
    pub fn new(
        encoding_key: &'a EncodingKey,
        kid: &'a str,
        issuer_base_url: &'a str,
        clock: &'a dyn Clock,
        ids: &'a dyn IdSource,
    ) -> Self {
        Self {
            encoding_key,
            kid,
            issuer_base_url,
            clock,
            ids,
        }
    }

    fn issuer(&self, pool: &UserPool) -> String {
        format!("{}/{}", self.issuer_base_url.trim_end_matches('/'), pool.id)
    }

    /// Issues a fresh access/ID token pair for `user`, running
    /// `PreTokenGeneration` first if the pool binds it.
    pub async fn issue_access_and_id_tokens(
        &self,
        pool: &UserPool,
        client: &AppClient,
        user: &User,
        groups: &[String],
        reason: IssueReason,
        trigger_runtime: &TriggerRuntime<'_>,
    ) -> Result<IssuedAccessAndIdTokens, ApiError> {
        let now = self.clock.now().timestamp();
        let auth_time = now;
        let issuer = self.issuer(pool);
        let origin_jti = self.ids.new_uuid().to_string();

        let mut access_claims = Map::new();
        access_claims.insert("sub".into(), json!(user.sub.to_string()));
        access_claims.insert("cognito:groups".into(), json!(groups));
        access_claims.insert("iss".into(), json!(issuer));
        access_claims.insert("client_id".into(), json!(client.client_id));
        access_claims.insert("origin_jti".into(), json!(origin_jti));
        access_claims.insert("event_id".into(), json!(self.ids.new_uuid().to_string()));
        access_claims.insert("token_use".into(), json!("access"));
        access_claims.insert("scope".into(), json!("aws.cognito.signin.user.admin"));
        access_claims.insert("auth_time".into(), json!(auth_time));
        access_claims.insert(
            "exp".into(),
            json!(now + client.access_token_seconds(pool)),
        );
        access_claims.insert("iat".into(), json!(now));
        access_claims.insert("jti".into(), json!(self.ids.new_uuid().to_string()));
        access_claims.insert("username".into(), json!(user.username));

        let mut id_claims = Map::new();
        for attr in &user.attributes {
            let value: Value = match attr.name.as_str() {
                "email_verified" | "phone_number_verified" => json!(attr.value == "true"),
                _ => json!(attr.value),
            };
            id_claims.insert(attr.name.clone(), value);
        }
        id_claims.insert("sub".into(), json!(user.sub.to_string()));
        id_claims.insert("cognito:username".into(), json!(user.username));
        id_claims.insert("cognito:groups".into(), json!(groups));
        id_claims.insert("iss".into(), json!(issuer));
        id_claims.insert("aud".into(), json!(client.client_id));
        id_claims.insert("token_use".into(), json!("id"));
        id_claims.insert("auth_time".into(), json!(auth_time));
        id_claims.insert("exp".into(), json!(now + client.id_token_seconds(pool)));
        id_claims.insert("iat".into(), json!(now));

        if trigger_runtime.enabled(hooks::PRE_TOKEN_GENERATION) {
            let request = json!({
                "triggerSource": reason.trigger_source(),
                "userAttributes": user.attributes_map(),
                "groupConfiguration": { "groupsToOverride": groups },
            });
            let envelope = build_envelope(&pool.id, &user.username, json!({}), request);
            let response = trigger_runtime
                .invoke(hooks::PRE_TOKEN_GENERATION, envelope)
                .await
                .map_err(|e| ApiError::TriggerAborted {
                    message: e.to_string(),
                })?;
            apply_claim_overrides(&mut access_claims, &response);
            apply_claim_overrides(&mut id_claims, &response);
        }

        let access_token = self.sign(&access_claims)?;
        let id_token = self.sign(&id_claims)?;

        Ok(IssuedAccessAndIdTokens {
            access_token,
            id_token,
            expires_in: client.access_token_seconds(pool),
        })
    }

    fn sign(&self, claims: &Map<String, Value>) -> Result<String, ApiError> {
        let header = Header {
            kid: Some(self.kid.to_string()),
            ..Header::new(Algorithm::RS256)
        };
        jsonwebtoken::encode(&header, claims, self.encoding_key).map_err(|e| {
            ApiError::InternalError {
                message: format!("failed to sign token: {e}"),
            }
        })
    }

    /// Generates an opaque refresh token with at least 256 bits of
    /// entropy, base64url-encoded. Not a JWT.
    pub fn generate_refresh_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Merges a `PreTokenGeneration`-shaped response's
/// `claimsOverrideDetails` into `claims`. `claimsToAddOrOverride` entries
/// are inserted/overwritten; `claimsToSuppress` entries are removed;
/// `groupOverrideDetails.groupsToOverride`, when present, replaces
/// `cognito:groups`.
fn apply_claim_overrides(claims: &mut Map<String, Value>, response: &Value) {
    let Some(details) = response
        .get("response")
        .and_then(|r| r.get("claimsOverrideDetails"))
        .or_else(|| response.get("claimsOverrideDetails"))
    else {
        return;
    };

    if let Some(add) = details.get("claimsToAddOrOverride").and_then(|v| v.as_object()) {
        for (k, v) in add {
            claims.insert(k.clone(), v.clone());
        }
    }
    if let Some(suppress) = details.get("claimsToSuppress").and_then(|v| v.as_array()) {
        for key in suppress {
            if let Some(key) = key.as_str() {
                claims.remove(key);
            }
        }
    }
    if let Some(groups) = details
        .get("groupOverrideDetails")
        .and_then(|g| g.get("groupsToOverride"))
    {
        claims.insert("cognito:groups".into(), groups.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_or_override_inserts_new_claims() {
        let mut claims = Map::new();
        claims.insert("token_use".into(), json!("access"));
        let response = json!({
            "response": {
                "claimsOverrideDetails": {
                    "claimsToAddOrOverride": { "custom:tier": "gold" }
                }
            }
        });
        apply_claim_overrides(&mut claims, &response);
        assert_eq!(claims.get("custom:tier").unwrap(), "gold");
        assert_eq!(claims.get("token_use").unwrap(), "access");
    }

    #[test]
    fn suppress_removes_claim() {
        let mut claims = Map::new();
        claims.insert("email".into(), json!("a@example.com"));
        let response = json!({
            "claimsOverrideDetails": {
                "claimsToSuppress": ["email"]
            }
        });
        apply_claim_overrides(&mut claims, &response);
        assert!(!claims.contains_key("email"));
    }

    #[test]
    fn group_override_replaces_cognito_groups() {
        let mut claims = Map::new();
        claims.insert("cognito:groups".into(), json!(["old"]));
        let response = json!({
            "claimsOverrideDetails": {
                "groupOverrideDetails": { "groupsToOverride": ["new-group"] }
            }
        });
        apply_claim_overrides(&mut claims, &response);
        assert_eq!(claims.get("cognito:groups").unwrap(), &json!(["new-group"]));
    }

    #[test]
    fn missing_override_details_is_a_no_op() {
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("abc"));
        apply_claim_overrides(&mut claims, &json!({}));
        assert_eq!(claims.len(), 1);
    }
}
