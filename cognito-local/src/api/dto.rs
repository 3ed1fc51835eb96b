//! # Wire DTOs
//!
//! Request/response shapes for the JSON-1.1 operations dispatched by
//! [`super::routes`]. Unlike a conventional REST API, the wire protocol
//! here is fixed by an external service contract: every field uses the
//! `PascalCase` naming the real identity provider uses, not this
//! codebase's usual `camelCase` convention. DTOs are intentionally a
//! loose subset of each operation's real shape — only the fields this
//! emulator honors are modeled.
//!
//! ## Naming
//!
//! Operation names match `X-Amz-Target`'s suffix after stripping the
//! `AWSCognitoIdentityProviderService.` prefix (see [`super::routes`]).

use crate::auth::flow::{AuthenticationResult, InitiateAuthOutcome};
use crate::auth::self_service::SignUpOutcome;
use crate::domain::{AppClient, Group, User, UserAttribute, UserPool, UserStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Renders a `UserStatus` the way the wire protocol spells it
/// (`SCREAMING_SNAKE_CASE`), by going through the same `Serialize` impl
/// the domain type already carries rather than re-deriving the mapping.
fn wire_status(status: &UserStatus) -> String {
    match serde_json::to_value(status) {
        Ok(serde_json::Value::String(s)) => s,
        _ => format!("{status:?}"),
    }
}
use validator::Validate;

// =============================================================================
// InitiateAuth / RespondToAuthChallenge
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthRequest {
    #[validate(length(min = 1, message = "ClientId is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "AuthFlow is required"))]
    pub auth_flow: String,
    #[serde(default)]
    pub auth_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_parameters: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_result: Option<AuthenticationResultType>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct RespondToAuthChallengeRequest {
    #[validate(length(min = 1, message = "ClientId is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "ChallengeName is required"))]
    pub challenge_name: String,
    #[validate(length(min = 1, message = "Session is required"))]
    pub session: String,
    #[serde(default)]
    pub challenge_responses: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResultType {
    pub access_token: String,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

impl From<AuthenticationResult> for AuthenticationResultType {
    fn from(result: AuthenticationResult) -> Self {
        Self {
            access_token: result.access_token,
            id_token: result.id_token,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
            token_type: result.token_type,
        }
    }
}

impl From<InitiateAuthOutcome> for InitiateAuthResponse {
    fn from(outcome: InitiateAuthOutcome) -> Self {
        match outcome {
            InitiateAuthOutcome::Tokens(result) => Self {
                authentication_result: Some(result.into()),
                ..Default::default()
            },
            InitiateAuthOutcome::Challenge(challenge) => Self {
                challenge_name: Some(challenge.challenge_name),
                session: Some(challenge.session),
                challenge_parameters: Some(challenge.challenge_parameters),
                authentication_result: None,
            },
        }
    }
}

// =============================================================================
// SignUp / ConfirmSignUp
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeTypeDto {
    pub name: String,
    pub value: String,
}

impl From<AttributeTypeDto> for UserAttribute {
    fn from(dto: AttributeTypeDto) -> Self {
        UserAttribute {
            name: dto.name,
            value: dto.value,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpRequest {
    #[validate(length(min = 1, message = "ClientId is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeTypeDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpResponse {
    pub user_sub: String,
    pub user_confirmed: bool,
}

impl From<SignUpOutcome> for SignUpResponse {
    fn from(outcome: SignUpOutcome) -> Self {
        Self {
            user_sub: outcome.user_sub.to_string(),
            user_confirmed: outcome.user_confirmed,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmSignUpRequest {
    #[validate(length(min = 1, message = "ClientId is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "ConfirmationCode is required"))]
    pub confirmation_code: String,
}

// =============================================================================
// ForgotPassword / ConfirmForgotPassword / ChangePassword
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "ClientId is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForgotPasswordResponse {
    pub code_delivery_details: CodeDeliveryDetailsType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDeliveryDetailsType {
    pub delivery_medium: &'static str,
    pub destination: String,
    pub attribute_name: &'static str,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmForgotPasswordRequest {
    #[validate(length(min = 1, message = "ClientId is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "ConfirmationCode is required"))]
    pub confirmation_code: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "PreviousPassword is required"))]
    pub previous_password: String,
    #[validate(length(min = 1, message = "ProposedPassword is required"))]
    pub proposed_password: String,
}

// =============================================================================
// Sign-out
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AdminUserGlobalSignOutRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

// =============================================================================
// Pool / client administration
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserPoolRequest {
    #[validate(length(min = 1, message = "PoolName is required"))]
    pub pool_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserPoolResponse {
    pub user_pool: UserPoolType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolType {
    pub id: String,
    pub name: String,
}

impl From<UserPool> for UserPoolType {
    fn from(pool: UserPool) -> Self {
        Self {
            id: pool.id,
            name: pool.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserPoolClientRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "ClientName is required"))]
    pub client_name: String,
    #[serde(default)]
    pub explicit_auth_flows: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserPoolClientResponse {
    pub user_pool_client: UserPoolClientType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolClientType {
    pub user_pool_id: String,
    pub client_id: String,
    pub client_name: String,
}

impl From<AppClient> for UserPoolClientType {
    fn from(client: AppClient) -> Self {
        Self {
            user_pool_id: client.user_pool_id,
            client_id: client.client_id,
            client_name: client.client_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "GroupName is required"))]
    pub group_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub role_arn: Option<String>,
    #[serde(default)]
    pub precedence: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteGroupRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "GroupName is required"))]
    pub group_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct GetGroupRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "GroupName is required"))]
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetGroupResponse {
    pub group: GroupType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AdminAddUserToGroupRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "GroupName is required"))]
    pub group_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AdminRemoveUserFromGroupRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "GroupName is required"))]
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupType {
    pub group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precedence: Option<i32>,
}

impl From<Group> for GroupType {
    fn from(group: Group) -> Self {
        Self {
            group_name: group.group_name,
            description: group.description,
            role_arn: group.role_arn,
            precedence: group.precedence,
        }
    }
}

// =============================================================================
// Admin user management
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeTypeDto>,
    #[serde(default)]
    pub temporary_password: Option<String>,
    #[serde(default)]
    pub message_action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminCreateUserResponse {
    pub user: UserType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AdminDeleteUserRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct AdminUpdateUserAttributesRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeTypeDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserType {
    pub username: String,
    pub sub: String,
    pub user_status: String,
    pub enabled: bool,
    pub attributes: Vec<AttributeTypeDto>,
}

impl From<User> for UserType {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            sub: user.sub.to_string(),
            user_status: wire_status(&user.user_status),
            enabled: user.enabled,
            attributes: user
                .attributes
                .into_iter()
                .map(|a| AttributeTypeDto {
                    name: a.name,
                    value: a.value,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersRequest {
    #[validate(length(min = 1, message = "UserPoolId is required"))]
    pub user_pool_id: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<u16>,
    #[serde(default)]
    pub pagination_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersResponse {
    pub users: Vec<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_token: Option<String>,
}

// =============================================================================
// Discovery documents (not dispatched via X-Amz-Target; served as plain GET)
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct EmptyResponse {}
