//! # Request Handlers
//!
//! One handler per operation, registered by [`super::routes::configure`].
//! Each follows the same shape — extract, validate, call the domain
//! layer, convert to a DTO — except the route
//! is resolved by `X-Amz-Target` rather than a path, so every handler here
//! takes an already-parsed [`web::Json`] body rather than path/query
//! extractors.
//!
//! ## Authentication
//!
//! Operations that require a caller identity (`ChangePassword`,
//! `GlobalSignOut`) read a bearer access token from the `Authorization`
//! header via [`extract_bearer_token`]; the domain layer resolves it to a
//! user through [`crate::auth::self_service`]'s JWT verification, so the
//! header is handed through as a plain string rather than pre-validated
//! here.

use actix_web::{web, HttpRequest, HttpResponse};
use shared::{errors::ApiError, validation};

use crate::admin::{self, AdminCreateUserOptions};
use crate::auth::context::AuthContext;
use crate::auth::{self, SignUpOutcome};
use crate::domain::{AppClient, DeliveryMedium, Group, User, UserPool};
use crate::messages::MessagePurpose;
use crate::pool_store::{FilterOp, UserFilter};
use crate::triggers::TriggerRuntime;
use crate::AppState;

use super::dto::*;

fn extract_bearer_token(req: &HttpRequest) -> Result<String, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(ApiError::NotAuthorized)?
        .to_str()
        .map_err(|_| ApiError::NotAuthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(ApiError::NotAuthorized)?;
    if token.is_empty() {
        return Err(ApiError::NotAuthorized);
    }
    Ok(token.to_string())
}

/// Parses a restricted Cognito `ListUsers` filter: `attribute = "value"`
/// or `attribute ^= "value"`. Anything else is an `InvalidParameter`.
fn parse_filter(filter: &str) -> Result<UserFilter, ApiError> {
    let invalid = || ApiError::InvalidParameter {
        message: format!("unsupported filter expression: {filter}"),
    };

    let (attribute, rest, op) = if let Some(idx) = filter.find("^=") {
        (filter[..idx].trim(), filter[idx + 2..].trim(), FilterOp::StartsWith)
    } else if let Some(idx) = filter.find('=') {
        (filter[..idx].trim(), filter[idx + 1..].trim(), FilterOp::Equals)
    } else {
        return Err(invalid());
    };

    let value = rest.trim_matches('"');
    if attribute.is_empty() || value.len() != rest.len() - 2 {
        return Err(invalid());
    }

    Ok(UserFilter {
        attribute: attribute.to_string(),
        op,
        value: value.to_string(),
    })
}

// =============================================================================
// InitiateAuth / RespondToAuthChallenge
// =============================================================================

pub async fn initiate_auth(
    state: web::Data<AppState>,
    body: web::Json<InitiateAuthRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    let outcome = auth::flow::initiate_auth(&ctx, &body.client_id, &body.auth_flow, &body.auth_parameters).await?;
    Ok(HttpResponse::Ok().json(InitiateAuthResponse::from(outcome)))
}

pub async fn respond_to_auth_challenge(
    state: web::Data<AppState>,
    body: web::Json<RespondToAuthChallengeRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    let outcome = auth::flow::respond_to_auth_challenge(
        &ctx,
        &body.client_id,
        &body.challenge_name,
        &body.session,
        &body.challenge_responses,
    )
    .await?;
    Ok(HttpResponse::Ok().json(InitiateAuthResponse::from(outcome)))
}

// =============================================================================
// SignUp / ConfirmSignUp
// =============================================================================

pub async fn sign_up(
    state: web::Data<AppState>,
    body: web::Json<SignUpRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    let attributes = body.user_attributes.into_iter().map(Into::into).collect();
    let outcome: SignUpOutcome = auth::sign_up(&ctx, &body.client_id, &body.username, &body.password, attributes).await?;
    Ok(HttpResponse::Ok().json(SignUpResponse::from(outcome)))
}

pub async fn confirm_sign_up(
    state: web::Data<AppState>,
    body: web::Json<ConfirmSignUpRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    auth::confirm_sign_up(&ctx, &body.client_id, &body.username, &body.confirmation_code).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

// =============================================================================
// ForgotPassword / ConfirmForgotPassword / ChangePassword
// =============================================================================

pub async fn forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    let user = auth::forgot_password(&ctx, &body.client_id, &body.username).await?;

    let client = state.facade.get_app_client(&body.client_id).await?;
    let pool = state.facade.get_user_pool(&client.user_pool_id).await?;

    Ok(HttpResponse::Ok().json(ForgotPasswordResponse {
        code_delivery_details: code_delivery_details(&pool, &user),
    }))
}

/// Picks the attribute a confirmation code was actually delivered to:
/// `phone_number` when the pool auto-verifies phone first, `email`
/// otherwise, falling back to whichever of the two the user has set.
/// Users with neither attribute (test fixtures, migrated users) get a
/// synthetic `<username>@example.com` destination as a last resort.
fn code_delivery_details(pool: &UserPool, user: &User) -> CodeDeliveryDetailsType {
    let phone_first = pool.auto_verified_attributes.first().map(String::as_str) == Some("phone_number");

    let (delivery_medium, attribute_name, destination) = if phone_first {
        user.attribute("phone_number")
            .map(|phone| ("SMS", "phone_number", phone.to_string()))
            .or_else(|| user.attribute("email").map(|email| ("EMAIL", "email", email.to_string())))
    } else {
        user.attribute("email")
            .map(|email| ("EMAIL", "email", email.to_string()))
            .or_else(|| user.attribute("phone_number").map(|phone| ("SMS", "phone_number", phone.to_string())))
    }
    .unwrap_or(("EMAIL", "email", format!("{}@example.com", user.username)));

    CodeDeliveryDetailsType {
        delivery_medium,
        destination,
        attribute_name,
    }
}

pub async fn confirm_forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ConfirmForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    auth::confirm_forgot_password(&ctx, &body.client_id, &body.username, &body.confirmation_code, &body.password)
        .await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

pub async fn change_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let access_token = extract_bearer_token(&req)?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    auth::change_password(&ctx, &access_token, &body.previous_password, &body.proposed_password).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

// =============================================================================
// Sign-out
// =============================================================================

pub async fn global_sign_out(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let access_token = extract_bearer_token(&req)?;
    let ctx = state.auth_context();
    auth::global_sign_out(&ctx, &access_token).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

pub async fn admin_user_global_sign_out(
    state: web::Data<AppState>,
    body: web::Json<AdminUserGlobalSignOutRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let ctx = state.auth_context();
    auth::admin_user_global_sign_out(&ctx, &body.user_pool_id, &body.username).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

// =============================================================================
// Pool / client administration
// =============================================================================

pub async fn create_user_pool(
    state: web::Data<AppState>,
    body: web::Json<CreateUserPoolRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let pool = state
        .facade
        .create_user_pool(UserPool {
            name: body.pool_name,
            ..Default::default()
        })
        .await?;
    Ok(HttpResponse::Ok().json(CreateUserPoolResponse {
        user_pool: pool.into(),
    }))
}

pub async fn create_user_pool_client(
    state: web::Data<AppState>,
    body: web::Json<CreateUserPoolClientRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let client = state
        .facade
        .create_app_client(AppClient {
            client_id: String::new(),
            user_pool_id: body.user_pool_id,
            client_name: body.client_name,
            client_secret: None,
            explicit_auth_flows: body.explicit_auth_flows,
            access_token_validity_seconds: None,
            id_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            read_attributes: vec![],
            write_attributes: vec![],
        })
        .await?;
    Ok(HttpResponse::Ok().json(CreateUserPoolClientResponse {
        user_pool_client: client.into(),
    }))
}

pub async fn create_group(
    state: web::Data<AppState>,
    body: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let group = admin::create_group(
        &state.facade,
        &body.user_pool_id,
        Group {
            group_name: body.group_name,
            description: body.description,
            role_arn: body.role_arn,
            precedence: body.precedence,
            usernames: vec![],
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(GetGroupResponse { group: group.into() }))
}

pub async fn delete_group(
    state: web::Data<AppState>,
    body: web::Json<DeleteGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    admin::delete_group(&state.facade, &body.user_pool_id, &body.group_name).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

pub async fn get_group(
    state: web::Data<AppState>,
    body: web::Json<GetGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let group = admin::get_group(&state.facade, &body.user_pool_id, &body.group_name).await?;
    Ok(HttpResponse::Ok().json(GetGroupResponse { group: group.into() }))
}

pub async fn admin_add_user_to_group(
    state: web::Data<AppState>,
    body: web::Json<AdminAddUserToGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    admin::admin_add_user_to_group(&state.facade, &body.user_pool_id, &body.username, &body.group_name).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

pub async fn admin_remove_user_from_group(
    state: web::Data<AppState>,
    body: web::Json<AdminRemoveUserFromGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    admin::admin_remove_user_from_group(&state.facade, &body.user_pool_id, &body.username, &body.group_name).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

// =============================================================================
// Admin user management
// =============================================================================

pub async fn admin_create_user(
    state: web::Data<AppState>,
    body: web::Json<AdminCreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let suppress_message = body.message_action.as_deref() == Some("SUPPRESS");
    let attributes = body.user_attributes.into_iter().map(Into::into).collect();

    let user = admin::admin_create_user(
        &state.facade,
        state.ids.as_ref(),
        state.clock.as_ref(),
        &body.user_pool_id,
        &body.username,
        attributes,
        AdminCreateUserOptions {
            temporary_password: body.temporary_password,
            suppress_message,
        },
    )
    .await?;

    if !suppress_message {
        let pool = state.facade.get_user_pool(&body.user_pool_id).await?;
        let trigger_runtime = TriggerRuntime::new(&pool.lambda_config);
        let rendered = state
            .messages
            .render(&pool.id, &user.username, MessagePurpose::AdminCreateUser, &user.password, &trigger_runtime)
            .await;
        state
            .messages
            .deliver(&pool.id, &user.username, DeliveryMedium::Email, &rendered, &user.password, &trigger_runtime)
            .await?;
    }

    Ok(HttpResponse::Ok().json(AdminCreateUserResponse { user: user.into() }))
}

pub async fn admin_delete_user(
    state: web::Data<AppState>,
    body: web::Json<AdminDeleteUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    admin::admin_delete_user(&state.facade, &body.user_pool_id, &body.username).await?;
    Ok(HttpResponse::Ok().json(EmptyResponse {}))
}

pub async fn admin_update_user_attributes(
    state: web::Data<AppState>,
    body: web::Json<AdminUpdateUserAttributesRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let updates = body.user_attributes.into_iter().map(Into::into).collect();
    let user = admin::admin_update_user_attributes(
        &state.facade,
        &body.user_pool_id,
        &body.username,
        updates,
        state.clock.now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(AdminCreateUserResponse { user: user.into() }))
}

pub async fn list_users(
    state: web::Data<AppState>,
    body: web::Json<ListUsersRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let filter = body.filter.as_deref().map(parse_filter).transpose()?;
    let limit = body.limit.unwrap_or(60).clamp(1, 60) as usize;

    let store = state.facade.pool(&body.user_pool_id).await?;
    let page = store
        .list_users(filter.as_ref(), body.pagination_token.as_deref(), limit)
        .await?;

    Ok(HttpResponse::Ok().json(ListUsersResponse {
        users: page.users.into_iter().map(Into::into).collect(),
        pagination_token: page.pagination_token,
    }))
}

// =============================================================================
// JWKS / OIDC discovery
// =============================================================================

pub async fn jwks(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let user_pool_id = path.into_inner();
    if !state.facade.has_pool(&user_pool_id).await {
        return Err(ApiError::ResourceNotFound {
            resource: format!("pool:{user_pool_id}"),
        });
    }
    Ok(HttpResponse::Ok().json(state.keystore.jwks()))
}

pub async fn openid_configuration(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_pool_id = path.into_inner();
    if !state.facade.has_pool(&user_pool_id).await {
        return Err(ApiError::ResourceNotFound {
            resource: format!("pool:{user_pool_id}"),
        });
    }

    let base = state.issuer_base_url.trim_end_matches('/');
    let issuer = format!("{base}/{user_pool_id}");
    Ok(HttpResponse::Ok().json(crate::tokens::keystore::OidcDiscoveryDocument {
        jwks_uri: format!("{issuer}/.well-known/jwks.json"),
        issuer,
        id_token_signing_alg_values_supported: vec!["RS256"],
    }))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(EmptyResponse {})
}

/// Catch-all for any `X-Amz-Target` that didn't match a registered
/// operation route.
pub async fn unsupported_operation(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let target = req
        .headers()
        .get("X-Amz-Target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("<missing>")
        .to_string();
    Err(ApiError::Unsupported { detail: target })
}

impl AppState {
    fn auth_context(&self) -> AuthContext<'_> {
        AuthContext {
            facade: &self.facade,
            keystore: &self.keystore,
            issuer_base_url: &self.issuer_base_url,
            clock: self.clock.as_ref(),
            ids: self.ids.as_ref(),
            otp: self.otp.as_ref(),
            messages: &self.messages,
            challenges: &self.challenges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filter_accepts_equality_expression() {
        let filter = parse_filter(r#"email = "carol@example.com""#).unwrap();
        assert_eq!(filter.attribute, "email");
        assert!(matches!(filter.op, FilterOp::Equals));
        assert_eq!(filter.value, "carol@example.com");
    }

    #[test]
    fn parse_filter_accepts_prefix_expression() {
        let filter = parse_filter(r#"username ^= "car""#).unwrap();
        assert_eq!(filter.attribute, "username");
        assert!(matches!(filter.op, FilterOp::StartsWith));
        assert_eq!(filter.value, "car");
    }

    #[test]
    fn parse_filter_rejects_unrecognized_syntax() {
        assert!(parse_filter("email !=~ foo").is_err());
    }

    fn test_user(attributes: Vec<(&str, &str)>) -> User {
        use crate::domain::{UserAttribute, UserStatus};
        let now = chrono::Utc::now();
        User {
            username: "pat".to_string(),
            sub: uuid::Uuid::new_v4(),
            attributes: attributes
                .into_iter()
                .map(|(name, value)| UserAttribute {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            password: "whatever1".to_string(),
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
        }
    }

    #[test]
    fn code_delivery_prefers_email_for_an_email_verified_pool() {
        let pool = UserPool {
            auto_verified_attributes: vec!["email".to_string()],
            ..Default::default()
        };
        let user = test_user(vec![("email", "pat@example.org"), ("phone_number", "+15550100")]);

        let details = code_delivery_details(&pool, &user);
        assert_eq!(details.delivery_medium, "EMAIL");
        assert_eq!(details.attribute_name, "email");
        assert_eq!(details.destination, "pat@example.org");
    }

    #[test]
    fn code_delivery_prefers_phone_for_a_phone_verified_pool() {
        let pool = UserPool {
            auto_verified_attributes: vec!["phone_number".to_string()],
            ..Default::default()
        };
        let user = test_user(vec![("email", "pat@example.org"), ("phone_number", "+15550100")]);

        let details = code_delivery_details(&pool, &user);
        assert_eq!(details.delivery_medium, "SMS");
        assert_eq!(details.attribute_name, "phone_number");
        assert_eq!(details.destination, "+15550100");
    }

    #[test]
    fn code_delivery_falls_back_to_whichever_attribute_the_user_has() {
        let pool = UserPool {
            auto_verified_attributes: vec!["email".to_string()],
            ..Default::default()
        };
        let user = test_user(vec![("phone_number", "+15550100")]);

        let details = code_delivery_details(&pool, &user);
        assert_eq!(details.delivery_medium, "SMS");
        assert_eq!(details.attribute_name, "phone_number");
        assert_eq!(details.destination, "+15550100");
    }

    #[test]
    fn code_delivery_synthesizes_a_destination_for_an_attribute_less_user() {
        let pool = UserPool::default();
        let user = test_user(vec![]);

        let details = code_delivery_details(&pool, &user);
        assert_eq!(details.delivery_medium, "EMAIL");
        assert_eq!(details.destination, "pat@example.com");
    }
}
