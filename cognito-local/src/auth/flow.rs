//! `InitiateAuth` / `RespondToAuthChallenge` flow resolution.
//!
//! Resolves the principal, branches on stored user/challenge state, and
//! issues tokens, generalized to Cognito's multi-flow, multi-challenge
//! surface.

use crate::auth::challenges::{ChallengeName, PendingChallenge};
use crate::auth::context::AuthContext;
use crate::domain::{AppClient, MfaConfiguration, User, UserPool, UserStatus};
use crate::triggers::{build_envelope, hooks, TriggerRuntime};
use crate::tokens::{IssueReason, TokenGenerator};
use serde_json::json;
use shared::errors::ApiError;
use std::collections::HashMap;
use uuid::Uuid;

pub struct AuthenticationResult {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

pub struct ChallengeOutcome {
    pub challenge_name: String,
    pub challenge_parameters: HashMap<String, String>,
    pub session: String,
}

pub enum InitiateAuthOutcome {
    Tokens(AuthenticationResult),
    Challenge(ChallengeOutcome),
}

/// Entry point: `InitiateAuth(ClientId, AuthFlow, AuthParameters)`.
pub async fn initiate_auth(
    ctx: &AuthContext<'_>,
    client_id: &str,
    auth_flow: &str,
    auth_parameters: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let client = ctx
        .facade
        .get_app_client(client_id)
        .await
        .map_err(|_| ApiError::NotAuthorized)?;
    let pool = ctx.facade.get_user_pool(&client.user_pool_id).await?;

    match auth_flow {
        "USER_PASSWORD_AUTH" | "ADMIN_USER_PASSWORD_AUTH" => {
            password_auth(ctx, &pool, &client, auth_parameters).await
        }
        "REFRESH_TOKEN" | "REFRESH_TOKEN_AUTH" => refresh_auth(ctx, &pool, &client, auth_parameters).await,
        "USER_SRP_AUTH" => srp_challenge(ctx, &pool, &client, auth_parameters).await,
        other => Err(ApiError::Unsupported {
            detail: other.to_string(),
        }),
    }
}

async fn password_auth(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    auth_parameters: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let username = auth_parameters
        .get("USERNAME")
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "USERNAME is required".to_string(),
        })?;
    let password = auth_parameters
        .get("PASSWORD")
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "PASSWORD is required".to_string(),
        })?;

    let store = ctx.facade.pool(&pool.id).await?;
    let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);

    let mut user = match store.get_user_by_username(username).await {
        Some(user) => user,
        None => migrate_user(ctx, pool, &trigger_runtime, username, password).await?,
    };

    if user.user_status == UserStatus::ResetRequired {
        return Err(ApiError::PasswordResetRequired);
    }
    if user.user_status == UserStatus::ForceChangePassword {
        return Ok(force_change_password_challenge(ctx, pool, client, &user));
    }

    if trigger_runtime.enabled(hooks::PRE_AUTHENTICATION) {
        let request = json!({
            "triggerSource": "PreAuthentication_Authentication",
            "userAttributes": user.attributes_map(),
            "validationData": {},
        });
        let envelope = build_envelope(&pool.id, &user.username, json!({}), request);
        trigger_runtime
            .invoke(hooks::PRE_AUTHENTICATION, envelope)
            .await
            .map_err(|e| ApiError::TriggerAborted {
                message: e.to_string(),
            })?;
    }

    if user.password != *password {
        return Err(ApiError::NotAuthorized);
    }
    if user.user_status == UserStatus::Unconfirmed {
        return Err(ApiError::UserNotConfirmed);
    }

    complete_login(ctx, pool, client, &mut user).await
}

async fn migrate_user(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    trigger_runtime: &TriggerRuntime<'_>,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    if !trigger_runtime.enabled(hooks::USER_MIGRATION) {
        return Err(ApiError::NotAuthorized);
    }
    let request = json!({
        "triggerSource": "UserMigration_Authentication",
        "password": password,
        "validationData": {},
    });
    let envelope = build_envelope(&pool.id, username, json!({}), request);
    let response = trigger_runtime
        .invoke(hooks::USER_MIGRATION, envelope)
        .await
        .map_err(|_| ApiError::NotAuthorized)?;

    let user = user_from_migration_response(username, &response, ctx.ids.new_uuid(), ctx.clock.now())?;
    let store = ctx.facade.pool(&pool.id).await?;
    store.save_user(user.clone(), ctx.clock.now()).await?;
    Ok(user)
}

fn user_from_migration_response(
    username: &str,
    response: &serde_json::Value,
    sub: Uuid,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<User, ApiError> {
    use crate::domain::UserAttribute;

    let details = response.get("response").unwrap_or(response);
    let attributes = details
        .get("userAttributes")
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .map(|(k, v)| UserAttribute {
                    name: k.clone(),
                    value: v.as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(User {
        username: username.to_string(),
        sub,
        attributes,
        password: String::new(),
        user_status: UserStatus::Confirmed,
        enabled: true,
        confirmation_code: None,
        mfa_code: None,
        mfa_options: vec![],
        user_mfa_setting_list: vec![],
        preferred_mfa_setting: None,
        refresh_tokens: Default::default(),
        creation_date: now,
        last_modified_date: now,
    })
}

fn force_change_password_challenge(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    user: &User,
) -> InitiateAuthOutcome {
    let attrs = serde_json::to_string(&user.attributes_map()).unwrap_or_else(|_| "{}".to_string());
    let mut params = HashMap::new();
    params.insert("USER_ID_FOR_SRP".to_string(), user.username.clone());
    params.insert("requiredAttributes".to_string(), "[]".to_string());
    params.insert("userAttributes".to_string(), attrs);

    let session = ctx.ids.new_uuid();
    ctx.challenges.insert(
        session,
        PendingChallenge {
            user_pool_id: pool.id.clone(),
            client_id: client.client_id.clone(),
            username: Some(user.username.clone()),
            challenge_name: ChallengeName::NewPasswordRequired,
            created_at: ctx.clock.now(),
        },
    );

    InitiateAuthOutcome::Challenge(ChallengeOutcome {
        challenge_name: ChallengeName::NewPasswordRequired.wire_name().to_string(),
        challenge_parameters: params,
        session: session.to_string(),
    })
}

async fn refresh_auth(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    auth_parameters: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let refresh_token = auth_parameters
        .get("REFRESH_TOKEN")
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "REFRESH_TOKEN is required".to_string(),
        })?;

    let store = ctx.facade.pool(&pool.id).await?;
    let user = store
        .get_user_by_refresh_token(refresh_token)
        .await
        .ok_or(ApiError::NotAuthorized)?;

    let groups = group_names(ctx, pool, &user.username).await?;
    let issued = sign_tokens(ctx, pool, client, &user, &groups, IssueReason::RefreshTokens).await?;

    Ok(InitiateAuthOutcome::Tokens(AuthenticationResult {
        access_token: issued.access_token,
        id_token: issued.id_token,
        refresh_token: Some(refresh_token.clone()),
        expires_in: issued.expires_in,
        token_type: "Bearer",
    }))
}

async fn srp_challenge(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    auth_parameters: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let session = ctx.ids.new_uuid();
    ctx.challenges.insert(
        session,
        PendingChallenge {
            user_pool_id: pool.id.clone(),
            client_id: client.client_id.clone(),
            username: auth_parameters.get("USERNAME").cloned(),
            challenge_name: ChallengeName::PasswordVerifier,
            created_at: ctx.clock.now(),
        },
    );

    Ok(InitiateAuthOutcome::Challenge(ChallengeOutcome {
        challenge_name: ChallengeName::PasswordVerifier.wire_name().to_string(),
        challenge_parameters: HashMap::new(),
        session: session.to_string(),
    }))
}

/// `RespondToAuthChallenge(ClientId, ChallengeName, Session, ChallengeResponses)`.
pub async fn respond_to_auth_challenge(
    ctx: &AuthContext<'_>,
    client_id: &str,
    challenge_name: &str,
    session: &str,
    challenge_responses: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let session_id = Uuid::parse_str(session).map_err(|_| ApiError::NotAuthorized)?;
    let pending = ctx.challenges.take(session_id).ok_or(ApiError::NotAuthorized)?;

    let expected = ChallengeName::from_wire_name(challenge_name).ok_or_else(|| ApiError::InvalidParameter {
        message: format!("unrecognized challenge name {challenge_name}"),
    })?;
    if expected != pending.challenge_name || pending.client_id != client_id {
        return Err(ApiError::NotAuthorized);
    }

    let client = ctx.facade.get_app_client(client_id).await.map_err(|_| ApiError::NotAuthorized)?;
    let pool = ctx.facade.get_user_pool(&client.user_pool_id).await?;

    match expected {
        ChallengeName::NewPasswordRequired => {
            complete_new_password(ctx, &pool, &client, &pending, challenge_responses).await
        }
        ChallengeName::SmsMfa | ChallengeName::SoftwareTokenMfa => {
            complete_mfa(ctx, &pool, &client, &pending, challenge_responses).await
        }
        ChallengeName::PasswordVerifier => {
            complete_password_verifier(ctx, &pool, &client, &pending, challenge_responses).await
        }
    }
}

async fn complete_new_password(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    pending: &PendingChallenge,
    challenge_responses: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let username = pending
        .username
        .clone()
        .or_else(|| challenge_responses.get("USERNAME").cloned())
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "USERNAME is required".to_string(),
        })?;
    let new_password = challenge_responses
        .get("NEW_PASSWORD")
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "NEW_PASSWORD is required".to_string(),
        })?;

    pool.password_policy
        .check(new_password)
        .map_err(|message| ApiError::InvalidPassword { message })?;

    let store = ctx.facade.pool(&pool.id).await?;
    let mut user = store.get_user_by_username(&username).await.ok_or(ApiError::NotAuthorized)?;
    user.password = new_password.clone();
    user.user_status = UserStatus::Confirmed;
    for (key, value) in challenge_responses {
        if let Some(attr_name) = key.strip_prefix("userAttributes.") {
            user.set_attribute(attr_name, value.clone());
        }
    }
    let user = store.save_user(user, ctx.clock.now()).await?;

    let groups = group_names(ctx, pool, &user.username).await?;
    let issued = sign_tokens(ctx, pool, client, &user, &groups, IssueReason::Authentication).await?;
    store.store_refresh_token(&user.username, issued.refresh_token.clone()).await?;

    Ok(InitiateAuthOutcome::Tokens(AuthenticationResult {
        access_token: issued.access_token,
        id_token: issued.id_token,
        refresh_token: Some(issued.refresh_token),
        expires_in: issued.expires_in,
        token_type: "Bearer",
    }))
}

async fn complete_mfa(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    pending: &PendingChallenge,
    challenge_responses: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let username = pending
        .username
        .clone()
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "no username bound to this challenge".to_string(),
        })?;
    let submitted_code = challenge_responses
        .get("SOFTWARE_TOKEN_MFA_CODE")
        .or_else(|| challenge_responses.get("SMS_MFA_CODE"))
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "MFA code is required".to_string(),
        })?;

    let store = ctx.facade.pool(&pool.id).await?;
    let mut user = store.get_user_by_username(&username).await.ok_or(ApiError::NotAuthorized)?;
    if user.mfa_code.as_deref() != Some(submitted_code.as_str()) {
        return Err(ApiError::CodeMismatch);
    }
    user.mfa_code = None;
    let user = store.save_user(user, ctx.clock.now()).await?;

    let groups = group_names(ctx, pool, &user.username).await?;
    let issued = sign_tokens(ctx, pool, client, &user, &groups, IssueReason::Authentication).await?;
    store.store_refresh_token(&user.username, issued.refresh_token.clone()).await?;

    Ok(InitiateAuthOutcome::Tokens(AuthenticationResult {
        access_token: issued.access_token,
        id_token: issued.id_token,
        refresh_token: Some(issued.refresh_token),
        expires_in: issued.expires_in,
        token_type: "Bearer",
    }))
}

async fn complete_password_verifier(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    pending: &PendingChallenge,
    challenge_responses: &HashMap<String, String>,
) -> Result<InitiateAuthOutcome, ApiError> {
    let username = challenge_responses
        .get("USERNAME")
        .cloned()
        .or_else(|| pending.username.clone())
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "USERNAME is required".to_string(),
        })?;
    let password = challenge_responses
        .get("PASSWORD")
        .ok_or_else(|| ApiError::InvalidParameter {
            message: "PASSWORD is required".to_string(),
        })?;

    let store = ctx.facade.pool(&pool.id).await?;
    let mut user = store.get_user_by_username(&username).await.ok_or(ApiError::NotAuthorized)?;
    if user.password != *password {
        return Err(ApiError::NotAuthorized);
    }

    complete_login(ctx, pool, client, &mut user).await
}

/// Shared tail of the happy path: MFA gate, then `PostAuthentication`
/// trigger, then token issuance.
async fn complete_login(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    user: &mut User,
) -> Result<InitiateAuthOutcome, ApiError> {
    if mfa_required(pool, user) {
        return enter_mfa_challenge(ctx, pool, client, user).await;
    }

    let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);
    if trigger_runtime.enabled(hooks::POST_AUTHENTICATION) {
        let request = json!({
            "triggerSource": "PostAuthentication_Authentication",
            "userAttributes": user.attributes_map(),
        });
        let envelope = build_envelope(&pool.id, &user.username, json!({}), request);
        trigger_runtime
            .invoke(hooks::POST_AUTHENTICATION, envelope)
            .await
            .map_err(|e| ApiError::TriggerAborted {
                message: e.to_string(),
            })?;
    }

    let groups = group_names(ctx, pool, &user.username).await?;
    let issued = sign_tokens(ctx, pool, client, user, &groups, IssueReason::Authentication).await?;
    let store = ctx.facade.pool(&pool.id).await?;
    store.store_refresh_token(&user.username, issued.refresh_token.clone()).await?;

    Ok(InitiateAuthOutcome::Tokens(AuthenticationResult {
        access_token: issued.access_token,
        id_token: issued.id_token,
        refresh_token: Some(issued.refresh_token),
        expires_in: issued.expires_in,
        token_type: "Bearer",
    }))
}

fn mfa_required(pool: &UserPool, user: &User) -> bool {
    match pool.mfa_configuration {
        MfaConfiguration::On => true,
        MfaConfiguration::Optional => !user.mfa_options.is_empty(),
        MfaConfiguration::Off => false,
    }
}

async fn enter_mfa_challenge(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    user: &mut User,
) -> Result<InitiateAuthOutcome, ApiError> {
    if user.user_mfa_setting_list.is_empty() {
        return Err(ApiError::NotAuthorized);
    }
    if !user.user_mfa_setting_list.iter().any(|s| s == "SOFTWARE_TOKEN_MFA") {
        return Err(ApiError::Unsupported {
            detail: "MFA challenge without SOFTWARE_TOKEN".to_string(),
        });
    }

    user.mfa_code = Some("999999".to_string());
    let store = ctx.facade.pool(&pool.id).await?;
    let saved = store.save_user(user.clone(), ctx.clock.now()).await?;
    *user = saved;

    let session = ctx.ids.new_uuid();
    ctx.challenges.insert(
        session,
        PendingChallenge {
            user_pool_id: pool.id.clone(),
            client_id: client.client_id.clone(),
            username: Some(user.username.clone()),
            challenge_name: ChallengeName::SoftwareTokenMfa,
            created_at: ctx.clock.now(),
        },
    );

    let mut params = HashMap::new();
    params.insert("USER_ID_FOR_SRP".to_string(), user.username.clone());

    Ok(InitiateAuthOutcome::Challenge(ChallengeOutcome {
        challenge_name: ChallengeName::SoftwareTokenMfa.wire_name().to_string(),
        challenge_parameters: params,
        session: session.to_string(),
    }))
}

async fn group_names(ctx: &AuthContext<'_>, pool: &UserPool, username: &str) -> Result<Vec<String>, ApiError> {
    let store = ctx.facade.pool(&pool.id).await?;
    Ok(store
        .list_user_group_membership(username)
        .await
        .into_iter()
        .map(|g| g.group_name)
        .collect())
}

struct SignedTokens {
    access_token: String,
    id_token: String,
    refresh_token: String,
    expires_in: i64,
}

async fn sign_tokens(
    ctx: &AuthContext<'_>,
    pool: &UserPool,
    client: &AppClient,
    user: &User,
    groups: &[String],
    reason: IssueReason,
) -> Result<SignedTokens, ApiError> {
    let encoding_key = ctx.keystore.encoding_key().map_err(|e| ApiError::InternalError {
        message: format!("failed to load signing key: {e}"),
    })?;
    let generator = TokenGenerator::new(&encoding_key, ctx.keystore.kid(), ctx.issuer_base_url, ctx.clock, ctx.ids);
    let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);

    let issued = generator
        .issue_access_and_id_tokens(pool, client, user, groups, reason, &trigger_runtime)
        .await?;

    Ok(SignedTokens {
        access_token: issued.access_token,
        id_token: issued.id_token,
        refresh_token: generator.generate_refresh_token(),
        expires_in: issued.expires_in,
    })
}
