//! Administrative operations: group management and the admin-create/
//! admin-update counterparts to the public self-service surface in
//! [`crate::auth::self_service`]. Pool and app-client creation already
//! live on [`crate::facade::CognitoFacade`] directly; this module covers
//! the rest of the `[ADDED]` administration contract.

use crate::domain::{Group, User, UserAttribute, UserPool, UserStatus};
use crate::facade::CognitoFacade;
use rand::Rng;
use shared::errors::ApiError;
use uuid::Uuid;

const TEMP_PASSWORD_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789!@#$%";
const TEMP_PASSWORD_LEN: usize = 12;

pub async fn create_group(facade: &CognitoFacade, user_pool_id: &str, group: Group) -> Result<Group, ApiError> {
    let store = facade.pool(user_pool_id).await?;
    store.save_group(group.clone()).await?;
    Ok(group)
}

pub async fn delete_group(facade: &CognitoFacade, user_pool_id: &str, group_name: &str) -> Result<(), ApiError> {
    let store = facade.pool(user_pool_id).await?;
    store.delete_group(group_name).await
}

pub async fn get_group(facade: &CognitoFacade, user_pool_id: &str, group_name: &str) -> Result<Group, ApiError> {
    let store = facade.pool(user_pool_id).await?;
    store.get_group(group_name).await.ok_or_else(|| ApiError::ResourceNotFound {
        resource: format!("group:{group_name}"),
    })
}

pub async fn admin_add_user_to_group(
    facade: &CognitoFacade,
    user_pool_id: &str,
    username: &str,
    group_name: &str,
) -> Result<(), ApiError> {
    let store = facade.pool(user_pool_id).await?;
    store.get_user_by_username(username).await.ok_or(ApiError::UserNotFound)?;
    store.add_user_to_group(group_name, username).await
}

pub async fn admin_remove_user_from_group(
    facade: &CognitoFacade,
    user_pool_id: &str,
    username: &str,
    group_name: &str,
) -> Result<(), ApiError> {
    let store = facade.pool(user_pool_id).await?;
    store.get_user_by_username(username).await.ok_or(ApiError::UserNotFound)?;
    store.remove_user_from_group(group_name, username).await
}

/// Options controlling [`admin_create_user`], mirroring the subset of
/// `AdminCreateUserRequest` this emulator honors.
pub struct AdminCreateUserOptions {
    pub temporary_password: Option<String>,
    pub suppress_message: bool,
}

/// `adminCreateUser(poolId, username, attrs, options)`.
pub async fn admin_create_user(
    facade: &CognitoFacade,
    ids: &dyn crate::clock::IdSource,
    clock: &dyn crate::clock::Clock,
    user_pool_id: &str,
    username: &str,
    attributes: Vec<UserAttribute>,
    options: AdminCreateUserOptions,
) -> Result<User, ApiError> {
    let store = facade.pool(user_pool_id).await?;
    if store.get_user_by_username(username).await.is_some() {
        return Err(ApiError::UsernameExists);
    }

    let password = options.temporary_password.unwrap_or_else(generate_temporary_password);
    let now = clock.now();
    let user = User {
        username: username.to_string(),
        sub: ids.new_uuid(),
        attributes,
        password,
        user_status: UserStatus::ForceChangePassword,
        enabled: true,
        confirmation_code: None,
        mfa_code: None,
        mfa_options: vec![],
        user_mfa_setting_list: vec![],
        preferred_mfa_setting: None,
        refresh_tokens: Default::default(),
        creation_date: now,
        last_modified_date: now,
    };
    let user = store.save_user(user, now).await?;

    // Delivery of the temporary password invitation is left to the
    // handler layer, which has the messages service and trigger runtime
    // in scope; `options.suppress_message` is threaded through there.
    let _ = options.suppress_message;
    Ok(user)
}

pub async fn admin_delete_user(facade: &CognitoFacade, user_pool_id: &str, username: &str) -> Result<(), ApiError> {
    let store = facade.pool(user_pool_id).await?;
    store.delete_user(username).await
}

/// `adminUpdateUserAttributes(poolId, username, attrs)`: merges into the
/// user's attribute list, skipping any attribute the pool schema marks
/// immutable once it already has a value.
pub async fn admin_update_user_attributes(
    facade: &CognitoFacade,
    user_pool_id: &str,
    username: &str,
    updates: Vec<UserAttribute>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<User, ApiError> {
    let store = facade.pool(user_pool_id).await?;
    let pool: UserPool = store.options().await;
    let mut user = store.get_user_by_username(username).await.ok_or(ApiError::UserNotFound)?;

    for update in updates {
        if !attribute_is_mutable(&pool, &update.name, user.attribute(&update.name).is_some()) {
            continue;
        }
        user.set_attribute(&update.name, update.value);
    }

    store.save_user(user, now).await
}

fn attribute_is_mutable(pool: &UserPool, name: &str, already_set: bool) -> bool {
    match pool.schema.iter().find(|s| s.name == name) {
        Some(schema) => schema.mutable || !already_set,
        None => true,
    }
}

fn generate_temporary_password() -> String {
    let mut rng = rand::thread_rng();
    (0..TEMP_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..TEMP_PASSWORD_CHARSET.len());
            TEMP_PASSWORD_CHARSET[idx] as char
        })
        .collect()
}
