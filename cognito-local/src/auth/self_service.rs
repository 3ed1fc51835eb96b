//! Public self-service operations layered on top of the challenge-based
//! state machine in [`crate::auth::flow`]: `SignUp`, `ConfirmSignUp`,
//! `ForgotPassword`, `ConfirmForgotPassword`, `ChangePassword`, and the
//! two global-sign-out variants.

use crate::auth::context::AuthContext;
use crate::domain::{AppClient, DeliveryMedium, User, UserAttribute, UserPool, UserStatus};
use crate::messages::MessagePurpose;
use crate::triggers::{build_envelope, hooks, TriggerRuntime};
use jsonwebtoken::{Algorithm, Validation};
use serde_json::{json, Map, Value};
use shared::errors::ApiError;
use std::collections::HashMap;
use uuid::Uuid;

pub struct SignUpOutcome {
    pub user_sub: Uuid,
    pub user_confirmed: bool,
}

/// `SignUp(ClientId, Username, Password, UserAttributes[])`.
pub async fn sign_up(
    ctx: &AuthContext<'_>,
    client_id: &str,
    username: &str,
    password: &str,
    attributes: Vec<UserAttribute>,
) -> Result<SignUpOutcome, ApiError> {
    let client = ctx.facade.get_app_client(client_id).await?;
    let pool = ctx.facade.get_user_pool(&client.user_pool_id).await?;
    let store = ctx.facade.pool(&pool.id).await?;

    if store.get_user_by_username(username).await.is_some() {
        return Err(ApiError::UsernameExists);
    }
    pool.password_policy
        .check(password)
        .map_err(|message| ApiError::InvalidPassword { message })?;

    let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);
    let mut autoconfirm = false;
    let mut auto_verify: Vec<String> = Vec::new();

    if trigger_runtime.enabled(hooks::PRE_SIGN_UP) {
        let request = json!({
            "triggerSource": "PreSignUp_SignUp",
            "userAttributes": attribute_map(&attributes),
            "validationData": {},
        });
        let envelope = build_envelope(&pool.id, username, json!({}), request);
        let response = trigger_runtime
            .invoke(hooks::PRE_SIGN_UP, envelope)
            .await
            .map_err(|e| ApiError::TriggerAborted {
                message: e.to_string(),
            })?;
        let details = response.get("response").unwrap_or(&response);
        autoconfirm = details
            .get("autoConfirmUser")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if details
            .get("autoVerifyEmail")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            auto_verify.push("email".to_string());
        }
        if details
            .get("autoVerifyPhone")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            auto_verify.push("phone_number".to_string());
        }
    }

    let sub = ctx.ids.new_uuid();
    let now = ctx.clock.now();
    let mut user = User {
        username: username.to_string(),
        sub,
        attributes,
        password: password.to_string(),
        user_status: if autoconfirm {
            UserStatus::Confirmed
        } else {
            UserStatus::Unconfirmed
        },
        enabled: true,
        confirmation_code: if autoconfirm {
            None
        } else {
            Some(ctx.otp.generate_code())
        },
        mfa_code: None,
        mfa_options: vec![],
        user_mfa_setting_list: vec![],
        preferred_mfa_setting: None,
        refresh_tokens: Default::default(),
        creation_date: now,
        last_modified_date: now,
    };
    for attr in &auto_verify {
        user.set_attribute(&format!("{attr}_verified"), "true".to_string());
    }

    let user = store.save_user(user, now).await?;

    if !autoconfirm {
        let code = user.confirmation_code.clone().unwrap_or_default();
        let rendered = ctx
            .messages
            .render(&pool.id, username, MessagePurpose::SignUp, &code, &trigger_runtime)
            .await;
        ctx.messages
            .deliver(&pool.id, username, DeliveryMedium::Email, &rendered, &code, &trigger_runtime)
            .await?;
    } else if trigger_runtime.enabled(hooks::POST_CONFIRMATION) {
        invoke_post_confirmation(&trigger_runtime, &pool, &user, "PostConfirmation_ConfirmSignUp").await;
    }

    Ok(SignUpOutcome {
        user_sub: sub,
        user_confirmed: autoconfirm,
    })
}

/// `ConfirmSignUp(ClientId, Username, ConfirmationCode)`.
pub async fn confirm_sign_up(
    ctx: &AuthContext<'_>,
    client_id: &str,
    username: &str,
    confirmation_code: &str,
) -> Result<(), ApiError> {
    let client = ctx.facade.get_app_client(client_id).await?;
    let pool = ctx.facade.get_user_pool(&client.user_pool_id).await?;
    let store = ctx.facade.pool(&pool.id).await?;

    let mut user = store.get_user_by_username(username).await.ok_or(ApiError::UserNotFound)?;
    if user.user_status != UserStatus::Unconfirmed {
        return Ok(());
    }
    if user.confirmation_code.as_deref() != Some(confirmation_code) {
        return Err(ApiError::CodeMismatch);
    }

    user.user_status = UserStatus::Confirmed;
    user.confirmation_code = None;
    let user = store.save_user(user, ctx.clock.now()).await?;

    let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);
    if trigger_runtime.enabled(hooks::POST_CONFIRMATION) {
        invoke_post_confirmation(&trigger_runtime, &pool, &user, "PostConfirmation_ConfirmSignUp").await;
    }

    Ok(())
}

async fn invoke_post_confirmation(trigger_runtime: &TriggerRuntime<'_>, pool: &UserPool, user: &User, source: &str) {
    let request = json!({
        "triggerSource": source,
        "userAttributes": user.attributes_map(),
    });
    let envelope = build_envelope(&pool.id, &user.username, json!({}), request);
    // Observational: failure is logged, never surfaced to the caller.
    if let Err(err) = trigger_runtime.invoke(hooks::POST_CONFIRMATION, envelope).await {
        tracing::warn!(pool_id = %pool.id, username = %user.username, error = %err, "PostConfirmation trigger failed");
    }
}

/// `ForgotPassword(ClientId, Username)`. Returns the user the code was
/// issued to, so the handler can report where it was actually delivered.
pub async fn forgot_password(ctx: &AuthContext<'_>, client_id: &str, username: &str) -> Result<User, ApiError> {
    let client = ctx.facade.get_app_client(client_id).await?;
    let pool = ctx.facade.get_user_pool(&client.user_pool_id).await?;
    let store = ctx.facade.pool(&pool.id).await?;
    let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);

    let mut user = match store.get_user_by_username(username).await {
        Some(user) => user,
        None if trigger_runtime.enabled(hooks::USER_MIGRATION) => {
            let request = json!({
                "triggerSource": "UserMigration_ForgotPassword",
                "validationData": {},
            });
            let envelope = build_envelope(&pool.id, username, json!({}), request);
            let response = trigger_runtime
                .invoke(hooks::USER_MIGRATION, envelope)
                .await
                .map_err(|_| ApiError::UserNotFound)?;
            migrated_user(username, &response, ctx.ids.new_uuid(), ctx.clock.now())?
        }
        None => return Err(ApiError::UserNotFound),
    };

    let code = ctx.otp.generate_code();
    user.confirmation_code = Some(code.clone());
    let user = store.save_user(user, ctx.clock.now()).await?;

    let rendered = ctx
        .messages
        .render(&pool.id, username, MessagePurpose::ForgotPassword, &code, &trigger_runtime)
        .await;
    ctx.messages
        .deliver(&pool.id, &user.username, DeliveryMedium::Email, &rendered, &code, &trigger_runtime)
        .await?;
    Ok(user)
}

fn migrated_user(
    username: &str,
    response: &Value,
    sub: Uuid,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<User, ApiError> {
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

/// `ConfirmForgotPassword(ClientId, Username, ConfirmationCode, Password)`.
pub async fn confirm_forgot_password(
    ctx: &AuthContext<'_>,
    client_id: &str,
    username: &str,
    confirmation_code: &str,
    password: &str,
) -> Result<(), ApiError> {
    let client = ctx.facade.get_app_client(client_id).await?;
    let pool = ctx.facade.get_user_pool(&client.user_pool_id).await?;
    let store = ctx.facade.pool(&pool.id).await?;

    let mut user = store.get_user_by_username(username).await.ok_or(ApiError::UserNotFound)?;
    if user.confirmation_code.as_deref() != Some(confirmation_code) {
        return Err(ApiError::CodeMismatch);
    }
    pool.password_policy
        .check(password)
        .map_err(|message| ApiError::InvalidPassword { message })?;

    user.password = password.to_string();
    user.confirmation_code = None;
    store.save_user(user, ctx.clock.now()).await?;
    Ok(())
}

/// `ChangePassword(AccessToken, PreviousPassword, ProposedPassword)`.
pub async fn change_password(
    ctx: &AuthContext<'_>,
    access_token: &str,
    previous_password: &str,
    proposed_password: &str,
) -> Result<(), ApiError> {
    let (pool, mut user) = resolve_principal(ctx, access_token).await?;
    if user.password != *previous_password {
        return Err(ApiError::NotAuthorized);
    }
    pool.password_policy
        .check(proposed_password)
        .map_err(|message| ApiError::InvalidPassword { message })?;
    user.password = proposed_password.to_string();
    let store = ctx.facade.pool(&pool.id).await?;
    store.save_user(user, ctx.clock.now()).await?;
    Ok(())
}

/// `GlobalSignOut(AccessToken)`.
pub async fn global_sign_out(ctx: &AuthContext<'_>, access_token: &str) -> Result<(), ApiError> {
    let (pool, user) = resolve_principal(ctx, access_token).await?;
    let store = ctx.facade.pool(&pool.id).await?;
    store.clear_refresh_tokens(&user.username).await
}

/// `AdminUserGlobalSignOut(PoolId, Username)`.
pub async fn admin_user_global_sign_out(
    ctx: &AuthContext<'_>,
    user_pool_id: &str,
    username: &str,
) -> Result<(), ApiError> {
    let store = ctx.facade.pool(user_pool_id).await?;
    store.clear_refresh_tokens(username).await
}

async fn resolve_principal(ctx: &AuthContext<'_>, access_token: &str) -> Result<(UserPool, User), ApiError> {
    let decoding_key = ctx.keystore.decoding_key().map_err(|e| ApiError::InternalError {
        message: format!("failed to load verification key: {e}"),
    })?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let decoded = jsonwebtoken::decode::<Map<String, Value>>(access_token, &decoding_key, &validation)
        .map_err(|_| ApiError::NotAuthorized)?;
    let claims = decoded.claims;

    let issuer = claims.get("iss").and_then(|v| v.as_str()).ok_or(ApiError::NotAuthorized)?;
    let user_pool_id = issuer.rsplit('/').next().ok_or(ApiError::NotAuthorized)?;
    let sub = claims
        .get("sub")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(ApiError::NotAuthorized)?;

    let pool = ctx.facade.get_user_pool(user_pool_id).await?;
    let store = ctx.facade.pool(user_pool_id).await?;
    let user = store.get_user_by_sub(sub).await.ok_or(ApiError::NotAuthorized)?;
    Ok((pool, user))
}

fn attribute_map(attributes: &[UserAttribute]) -> HashMap<&str, &str> {
    attributes.iter().map(|a| (a.name.as_str(), a.value.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ChallengeStore;
    use crate::clock::testing::{CountingIdSource, FixedClock};
    use crate::domain::{AttributeDataType, MfaConfiguration, SchemaAttribute, TokenValidity};
    use crate::facade::CognitoFacade;
    use crate::messages::MessagesService;
    use crate::otp::DeterministicOtpService;
    use crate::tokens::{IssueReason, TokenGenerator};
    use chrono::Utc;
    use shared::validation::PasswordPolicy;
    use std::collections::HashMap;

    struct Harness {
        facade: CognitoFacade,
        keystore: crate::tokens::keystore::KeyStore,
        clock: FixedClock,
        ids: CountingIdSource,
        otp: DeterministicOtpService,
        messages: MessagesService,
        challenges: ChallengeStore,
        data_dir: std::path::PathBuf,
    }

    impl Harness {
        async fn new() -> Self {
            let mut data_dir = std::env::temp_dir();
            data_dir.push(format!("cognito-local-self-service-test-{}", Uuid::new_v4()));
            let facade = CognitoFacade::load(data_dir.clone(), "us-east-1".to_string()).await.unwrap();

            let mut key_path = data_dir.clone();
            key_path.push("signing-key.pem");
            let keystore = crate::tokens::keystore::KeyStore::load_or_generate(&key_path).unwrap();

            let mut log_path = data_dir.clone();
            log_path.push("delivery.log");
            let clock = FixedClock::new(Utc::now());

            Self {
                otp: DeterministicOtpService::new(&clock),
                facade,
                keystore,
                clock,
                ids: CountingIdSource::new(),
                messages: MessagesService::new(log_path),
                challenges: ChallengeStore::new(),
                data_dir,
            }
        }

        fn ctx(&self) -> AuthContext<'_> {
            AuthContext {
                facade: &self.facade,
                keystore: &self.keystore,
                issuer_base_url: "http://localhost:9229",
                clock: &self.clock,
                ids: &self.ids,
                otp: &self.otp,
                messages: &self.messages,
                challenges: &self.challenges,
            }
        }
    }

    async fn setup_pool_and_client(harness: &Harness) -> (UserPool, AppClient) {
        setup_pool_and_client_with_policy(harness, PasswordPolicy::default()).await
    }

    async fn setup_pool_and_client_with_policy(harness: &Harness, password_policy: PasswordPolicy) -> (UserPool, AppClient) {
        let pool = harness
            .facade
            .create_user_pool(UserPool {
                id: String::new(),
                name: "test".to_string(),
                mfa_configuration: MfaConfiguration::Off,
                password_policy,
                auto_verified_attributes: vec![],
                schema: vec![SchemaAttribute {
                    name: "email".to_string(),
                    attribute_data_type: AttributeDataType::String,
                    mutable: true,
                    required: false,
                }],
                lambda_config: HashMap::new(),
                token_validity: TokenValidity::default(),
                creation_date: Utc::now(),
                last_modified_date: Utc::now(),
            })
            .await
            .unwrap();

        let client = harness
            .facade
            .create_app_client(AppClient {
                client_id: String::new(),
                user_pool_id: pool.id.clone(),
                client_name: "client".to_string(),
                client_secret: None,
                explicit_auth_flows: vec![],
                access_token_validity_seconds: None,
                id_token_validity_seconds: None,
                refresh_token_validity_seconds: None,
                read_attributes: vec![],
                write_attributes: vec![],
            })
            .await
            .unwrap();

        (pool, client)
    }

    #[tokio::test]
    async fn sign_up_then_confirm_transitions_unconfirmed_to_confirmed() {
        let harness = Harness::new().await;
        let (_pool, client) = setup_pool_and_client(&harness).await;

        let outcome = sign_up(
            &harness.ctx(),
            &client.client_id,
            "carol",
            "p@ss",
            vec![UserAttribute {
                name: "email".to_string(),
                value: "carol@example.com".to_string(),
            }],
        )
        .await
        .unwrap();
        assert!(!outcome.user_confirmed);

        let store = harness.facade.pool(&client.user_pool_id).await.unwrap();
        let user = store.get_user_by_username("carol").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Unconfirmed);
        let code = user.confirmation_code.clone().unwrap();

        confirm_sign_up(&harness.ctx(), &client.client_id, "carol", &code).await.unwrap();
        let confirmed = store.get_user_by_username("carol").await.unwrap();
        assert_eq!(confirmed.user_status, UserStatus::Confirmed);
        assert!(confirmed.confirmation_code.is_none());

        // idempotent: re-confirming an already-confirmed user is a no-op.
        confirm_sign_up(&harness.ctx(), &client.client_id, "carol", &code).await.unwrap();

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn duplicate_username_sign_up_fails() {
        let harness = Harness::new().await;
        let (_pool, client) = setup_pool_and_client(&harness).await;
        sign_up(&harness.ctx(), &client.client_id, "dave", "p@ss", vec![]).await.unwrap();
        let result = sign_up(&harness.ctx(), &client.client_id, "dave", "other", vec![]).await;
        assert!(matches!(result, Err(ApiError::UsernameExists)));

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn sign_up_rejects_a_password_that_violates_the_pool_policy() {
        let harness = Harness::new().await;
        let policy = PasswordPolicy {
            minimum_length: 20,
            ..PasswordPolicy::default()
        };
        let (_pool, client) = setup_pool_and_client_with_policy(&harness, policy).await;

        let result = sign_up(&harness.ctx(), &client.client_id, "ivy", "p@ss", vec![]).await;
        assert!(matches!(result, Err(ApiError::InvalidPassword { .. })));

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn forgot_password_then_confirm_replaces_password_without_confirming_account() {
        let harness = Harness::new().await;
        let (_pool, client) = setup_pool_and_client(&harness).await;
        sign_up(&harness.ctx(), &client.client_id, "erin", "p@ss", vec![]).await.unwrap();

        forgot_password(&harness.ctx(), &client.client_id, "erin").await.unwrap();
        let store = harness.facade.pool(&client.user_pool_id).await.unwrap();
        let code = store.get_user_by_username("erin").await.unwrap().confirmation_code.unwrap();

        confirm_forgot_password(&harness.ctx(), &client.client_id, "erin", &code, "newpass")
            .await
            .unwrap();

        let user = store.get_user_by_username("erin").await.unwrap();
        assert_eq!(user.password, "newpass");
        assert!(user.confirmation_code.is_none());
        assert_eq!(user.user_status, UserStatus::Unconfirmed);

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn confirm_forgot_password_rejects_a_password_that_violates_the_pool_policy() {
        let harness = Harness::new().await;
        let policy = PasswordPolicy {
            minimum_length: 20,
            ..PasswordPolicy::default()
        };
        let (_pool, client) = setup_pool_and_client_with_policy(&harness, policy).await;
        sign_up(&harness.ctx(), &client.client_id, "jill", "an-already-long-enough-pass1", vec![])
            .await
            .unwrap();

        forgot_password(&harness.ctx(), &client.client_id, "jill").await.unwrap();
        let store = harness.facade.pool(&client.user_pool_id).await.unwrap();
        let code = store.get_user_by_username("jill").await.unwrap().confirmation_code.unwrap();

        let result = confirm_forgot_password(&harness.ctx(), &client.client_id, "jill", &code, "short").await;
        assert!(matches!(result, Err(ApiError::InvalidPassword { .. })));

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    async fn issue_access_token(harness: &Harness, pool: &UserPool, client: &AppClient, user: &User) -> String {
        let encoding_key = harness.keystore.encoding_key().unwrap();
        let generator = TokenGenerator::new(
            &encoding_key,
            harness.keystore.kid(),
            "http://localhost:9229",
            &harness.clock,
            &harness.ids,
        );
        let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);
        generator
            .issue_access_and_id_tokens(pool, client, user, &[], IssueReason::Authentication, &trigger_runtime)
            .await
            .unwrap()
            .access_token
    }

    #[tokio::test]
    async fn change_password_requires_the_previous_password_to_match() {
        let harness = Harness::new().await;
        let (pool, client) = setup_pool_and_client(&harness).await;
        sign_up(&harness.ctx(), &client.client_id, "frank", "p@ss", vec![]).await.unwrap();
        let store = harness.facade.pool(&pool.id).await.unwrap();
        let mut user = store.get_user_by_username("frank").await.unwrap();
        user.user_status = UserStatus::Confirmed;
        let user = store.save_user(user, Utc::now()).await.unwrap();

        let access_token = issue_access_token(&harness, &pool, &client, &user).await;

        let wrong = change_password(&harness.ctx(), &access_token, "wrong", "newpass").await;
        assert!(matches!(wrong, Err(ApiError::NotAuthorized)));

        change_password(&harness.ctx(), &access_token, "p@ss", "newpass").await.unwrap();
        let updated = store.get_user_by_username("frank").await.unwrap();
        assert_eq!(updated.password, "newpass");

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn change_password_rejects_a_proposed_password_that_violates_the_pool_policy() {
        let harness = Harness::new().await;
        let policy = PasswordPolicy {
            minimum_length: 20,
            ..PasswordPolicy::default()
        };
        let (pool, client) = setup_pool_and_client_with_policy(&harness, policy).await;
        sign_up(&harness.ctx(), &client.client_id, "kim", "an-already-long-enough-pass1", vec![])
            .await
            .unwrap();
        let store = harness.facade.pool(&pool.id).await.unwrap();
        let mut user = store.get_user_by_username("kim").await.unwrap();
        user.user_status = UserStatus::Confirmed;
        let user = store.save_user(user, Utc::now()).await.unwrap();

        let access_token = issue_access_token(&harness, &pool, &client, &user).await;
        let result = change_password(&harness.ctx(), &access_token, "an-already-long-enough-pass1", "short").await;
        assert!(matches!(result, Err(ApiError::InvalidPassword { .. })));

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn global_sign_out_clears_refresh_tokens() {
        let harness = Harness::new().await;
        let (pool, client) = setup_pool_and_client(&harness).await;
        sign_up(&harness.ctx(), &client.client_id, "gina", "p@ss", vec![]).await.unwrap();
        let store = harness.facade.pool(&pool.id).await.unwrap();
        let mut user = store.get_user_by_username("gina").await.unwrap();
        user.user_status = UserStatus::Confirmed;
        let user = store.save_user(user, Utc::now()).await.unwrap();
        store.store_refresh_token("gina", "some-refresh-token".to_string()).await.unwrap();

        let access_token = issue_access_token(&harness, &pool, &client, &user).await;
        global_sign_out(&harness.ctx(), &access_token).await.unwrap();

        let signed_out = store.get_user_by_username("gina").await.unwrap();
        assert!(signed_out.refresh_tokens.is_empty());

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }

    #[tokio::test]
    async fn admin_user_global_sign_out_purges_tokens_by_pool_and_username() {
        let harness = Harness::new().await;
        let (pool, client) = setup_pool_and_client(&harness).await;
        sign_up(&harness.ctx(), &client.client_id, "hank", "p@ss", vec![]).await.unwrap();
        let store = harness.facade.pool(&pool.id).await.unwrap();
        store.store_refresh_token("hank", "rt".to_string()).await.unwrap();

        admin_user_global_sign_out(&harness.ctx(), &pool.id, "hank").await.unwrap();
        let user = store.get_user_by_username("hank").await.unwrap();
        assert!(user.refresh_tokens.is_empty());

        let _ = std::fs::remove_dir_all(&harness.data_dir);
    }
}
