//! # User Pool Store
//!
//! Per-pool persistent state: users, groups, app clients (via the sibling
//! [`ClientStore`]), and the refresh-token reverse index. Each pool is
//! guarded by its own `tokio::sync::Mutex`; independent pools never
//! contend with each other (§5 of the design: no global lock).
//!
//! ## Persistence Discipline
//!
//! Each mutating operation serializes the whole pool document and fsyncs
//! it before returning. The write happens on a blocking thread so the
//! async executor is never stalled by disk I/O.

mod client_store;
mod document;

pub use client_store::ClientStore;
pub use document::PoolDocument;

use crate::domain::{Group, User, UserPool};
use rand::Rng;
use shared::errors::ApiError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory state for one pool: the canonical tables plus derived
/// secondary indexes, rebuilt from the tables whenever the pool is
/// loaded.
#[derive(Debug)]
struct PoolState {
    options: UserPool,
    /// Keyed by lowercased username; `User::username` preserves the
    /// original case.
    users: HashMap<String, User>,
    groups: HashMap<String, Group>,
    index_by_sub: HashMap<Uuid, String>,
    index_by_email: HashMap<String, String>,
    index_by_refresh_token: HashMap<String, String>,
}

impl PoolState {
    fn from_document(doc: PoolDocument) -> Self {
        let mut state = Self {
            options: doc.options,
            users: HashMap::new(),
            groups: doc.groups,
            index_by_sub: HashMap::new(),
            index_by_email: HashMap::new(),
            index_by_refresh_token: HashMap::new(),
        };
        for (_, user) in doc.users {
            state.index_user(&user);
            state.users.insert(user.username.to_lowercase(), user);
        }
        state
    }

    fn to_document(&self) -> PoolDocument {
        PoolDocument {
            options: self.options.clone(),
            users: self
                .users
                .values()
                .map(|u| (u.username.clone(), u.clone()))
                .collect(),
            groups: self.groups.clone(),
        }
    }

    fn index_user(&mut self, user: &User) {
        let key = user.username.to_lowercase();
        self.index_by_sub.insert(user.sub, key.clone());
        if let Some(email) = user.attribute("email") {
            self.index_by_email.insert(email.to_lowercase(), key.clone());
        }
        for token in &user.refresh_tokens {
            self.index_by_refresh_token.insert(token.clone(), key.clone());
        }
    }

    fn deindex_user(&mut self, user: &User) {
        self.index_by_sub.remove(&user.sub);
        if let Some(email) = user.attribute("email") {
            self.index_by_email.remove(&email.to_lowercase());
        }
        for token in &user.refresh_tokens {
            self.index_by_refresh_token.remove(token);
        }
    }
}

/// A restricted AWS-style attribute filter: `attr = "value"` or
/// `attr ^= "prefix"`.
pub struct UserFilter {
    pub attribute: String,
    pub op: FilterOp,
    pub value: String,
}

pub enum FilterOp {
    Equals,
    StartsWith,
}

impl UserFilter {
    fn matches(&self, user: &User) -> bool {
        let actual = if self.attribute == "username" {
            Some(user.username.as_str())
        } else {
            user.attribute(&self.attribute)
        };
        match actual {
            None => false,
            Some(actual) => match self.op {
                FilterOp::Equals => actual == self.value,
                FilterOp::StartsWith => actual.starts_with(&self.value),
            },
        }
    }
}

/// A page of [`listUsers`](UserPoolStore::list_users) results.
pub struct UserPage {
    pub users: Vec<User>,
    pub pagination_token: Option<String>,
}

/// Owns one pool's state behind a mutex, and the file it persists to.
pub struct UserPoolStore {
    path: PathBuf,
    state: Mutex<PoolState>,
}

impl UserPoolStore {
    /// Loads the pool document at `path`, rebuilding secondary indexes.
    pub async fn load(path: PathBuf) -> Result<Self, ApiError> {
        let contents = tokio::fs::read(&path).await.map_err(|e| ApiError::InternalError {
            message: format!("failed to read pool document {}: {e}", path.display()),
        })?;
        let doc: PoolDocument = serde_json::from_slice(&contents).map_err(|e| ApiError::InternalError {
            message: format!("corrupt pool document {}: {e}", path.display()),
        })?;
        Ok(Self {
            path,
            state: Mutex::new(PoolState::from_document(doc)),
        })
    }

    /// Creates a brand-new pool store and persists it immediately.
    pub async fn create(path: PathBuf, options: UserPool) -> Result<Self, ApiError> {
        let store = Self {
            path,
            state: Mutex::new(PoolState {
                options,
                users: HashMap::new(),
                groups: HashMap::new(),
                index_by_sub: HashMap::new(),
                index_by_email: HashMap::new(),
                index_by_refresh_token: HashMap::new(),
            }),
        };
        let state = store.state.lock().await;
        store.persist(&state).await?;
        drop(state);
        Ok(store)
    }

    async fn persist(&self, state: &PoolState) -> Result<(), ApiError> {
        let document = state.to_document();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_document(&path, &document))
            .await
            .map_err(|e| ApiError::InternalError {
                message: format!("persistence task panicked: {e}"),
            })??;
        Ok(())
    }

    pub async fn options(&self) -> UserPool {
        self.state.lock().await.options.clone()
    }

    pub async fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.state.lock().await.users.get(&username.to_lowercase()).cloned()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Option<User> {
        let state = self.state.lock().await;
        let key = state.index_by_email.get(&email.to_lowercase())?;
        state.users.get(key).cloned()
    }

    pub async fn get_user_by_sub(&self, sub: Uuid) -> Option<User> {
        let state = self.state.lock().await;
        let key = state.index_by_sub.get(&sub)?;
        state.users.get(key).cloned()
    }

    pub async fn get_user_by_refresh_token(&self, token: &str) -> Option<User> {
        let state = self.state.lock().await;
        let key = state.index_by_refresh_token.get(token)?;
        state.users.get(key).cloned()
    }

    /// Returns a page of users, ordered by `Sub` for a stable cursor.
    pub async fn list_users(
        &self,
        filter: Option<&UserFilter>,
        pagination_token: Option<&str>,
        limit: usize,
    ) -> Result<UserPage, ApiError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&User> = state
            .users
            .values()
            .filter(|u| filter.map(|f| f.matches(u)).unwrap_or(true))
            .collect();
        matching.sort_by_key(|u| u.sub);

        let start = match pagination_token {
            None => 0,
            Some(token) => {
                let after: Uuid = decode_cursor(token)?;
                matching.iter().position(|u| u.sub > after).unwrap_or(matching.len())
            }
        };

        let page: Vec<User> = matching
            .iter()
            .skip(start)
            .take(limit)
            .map(|u| (*u).clone())
            .collect();
        let next_token = if start + page.len() < matching.len() {
            page.last().map(|u| encode_cursor(u.sub))
        } else {
            None
        };

        Ok(UserPage {
            users: page,
            pagination_token: next_token,
        })
    }

    /// Upserts `user`, refreshing `LastModifiedDate` and secondary
    /// indexes, then persists before returning.
    pub async fn save_user(&self, mut user: User, now: chrono::DateTime<chrono::Utc>) -> Result<User, ApiError> {
        let mut state = self.state.lock().await;
        user.last_modified_date = now;
        let key = user.username.to_lowercase();
        if let Some(existing) = state.users.get(&key).cloned() {
            state.deindex_user(&existing);
        }
        state.index_user(&user);
        state.users.insert(key, user.clone());
        self.persist(&state).await?;
        Ok(user)
    }

    /// Removes `username` and purges it from every secondary index,
    /// including the refresh-token index.
    pub async fn delete_user(&self, username: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let key = username.to_lowercase();
        if let Some(user) = state.users.remove(&key) {
            state.deindex_user(&user);
        }
        self.persist(&state).await
    }

    /// Appends `token` to the user's refresh-token set and the reverse
    /// index. Idempotent: storing the same token twice leaves the set
    /// unchanged.
    pub async fn store_refresh_token(&self, username: &str, token: String) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let key = username.to_lowercase();
        if let Some(user) = state.users.get_mut(&key) {
            user.refresh_tokens.insert(token.clone());
            state.index_by_refresh_token.insert(token, key);
        }
        self.persist(&state).await
    }

    /// Clears all refresh tokens for `username` (global sign-out).
    pub async fn clear_refresh_tokens(&self, username: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let key = username.to_lowercase();
        if let Some(user) = state.users.get_mut(&key) {
            let drained: Vec<String> = user.refresh_tokens.drain().collect();
            for token in drained {
                state.index_by_refresh_token.remove(&token);
            }
        }
        self.persist(&state).await
    }

    /// Updates `MFAOptions`, `UserMFASettingList`, and
    /// `PreferredMfaSetting` atomically. Idempotent.
    pub async fn set_user_mfa_preference(
        &self,
        username: &str,
        mfa_options: Vec<crate::domain::MfaOption>,
        user_mfa_setting_list: Vec<String>,
        preferred_mfa_setting: Option<String>,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let key = username.to_lowercase();
        if let Some(user) = state.users.get_mut(&key) {
            user.mfa_options = mfa_options;
            user.user_mfa_setting_list = user_mfa_setting_list;
            user.preferred_mfa_setting = preferred_mfa_setting;
        }
        self.persist(&state).await
    }

    pub async fn list_groups(&self) -> Vec<Group> {
        self.state.lock().await.groups.values().cloned().collect()
    }

    pub async fn get_group(&self, name: &str) -> Option<Group> {
        self.state.lock().await.groups.get(name).cloned()
    }

    pub async fn save_group(&self, group: Group) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.groups.insert(group.group_name.clone(), group);
        self.persist(&state).await
    }

    pub async fn delete_group(&self, name: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.groups.remove(name);
        self.persist(&state).await
    }

    pub async fn add_user_to_group(&self, group_name: &str, username: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let group = state
            .groups
            .entry(group_name.to_string())
            .or_insert_with(|| Group {
                group_name: group_name.to_string(),
                description: None,
                role_arn: None,
                precedence: None,
                usernames: vec![],
            });
        if !group.usernames.iter().any(|u| u == username) {
            group.usernames.push(username.to_string());
        }
        self.persist(&state).await
    }

    pub async fn remove_user_from_group(&self, group_name: &str, username: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        if let Some(group) = state.groups.get_mut(group_name) {
            group.usernames.retain(|u| u != username);
        }
        self.persist(&state).await
    }

    pub async fn list_user_group_membership(&self, username: &str) -> Vec<Group> {
        let state = self.state.lock().await;
        state
            .groups
            .values()
            .filter(|g| g.usernames.iter().any(|u| u == username))
            .cloned()
            .collect()
    }

    pub async fn list_group_membership(&self, group_name: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .groups
            .get(group_name)
            .map(|g| g.usernames.clone())
            .unwrap_or_default()
    }
}

fn write_document(path: &Path, document: &PoolDocument) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ApiError::InternalError {
            message: format!("failed to create persistence directory: {e}"),
        })?;
    }
    let bytes = serde_json::to_vec_pretty(document).map_err(|e| ApiError::InternalError {
        message: format!("failed to serialize pool document: {e}"),
    })?;
    let file = std::fs::File::create(path).map_err(|e| ApiError::InternalError {
        message: format!("failed to open {}: {e}", path.display()),
    })?;
    use std::io::Write;
    let mut file = file;
    file.write_all(&bytes).map_err(|e| ApiError::InternalError {
        message: format!("failed to write {}: {e}", path.display()),
    })?;
    file.sync_all().map_err(|e| ApiError::InternalError {
        message: format!("failed to fsync {}: {e}", path.display()),
    })?;
    Ok(())
}

fn encode_cursor(sub: Uuid) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(sub.as_bytes())
}

fn decode_cursor(token: &str) -> Result<Uuid, ApiError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| ApiError::InvalidParameter {
        message: "invalid pagination token".to_string(),
    })?;
    Uuid::from_slice(&bytes).map_err(|_| ApiError::InvalidParameter {
        message: "invalid pagination token".to_string(),
    })
}

/// Allocates a pool id in the conventional `<region>_<8 alphanumeric>`
/// shape.
pub fn generate_pool_id(region: &str) -> String {
    format!("{region}_{}", random_alphanumeric(8))
}

/// Allocates a 26-character alphanumeric client id.
pub fn generate_client_id() -> String {
    random_alphanumeric(26)
}

fn random_alphanumeric(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MfaConfiguration, TokenValidity, UserAttribute, UserStatus};
    use chrono::Utc;
    use shared::validation::PasswordPolicy;
    use std::collections::HashSet;

    fn sample_pool(id: &str) -> UserPool {
        UserPool {
            id: id.to_string(),
            name: "test pool".to_string(),
            mfa_configuration: MfaConfiguration::Off,
            password_policy: PasswordPolicy::default(),
            auto_verified_attributes: vec![],
            schema: vec![],
            lambda_config: HashMap::new(),
            token_validity: TokenValidity::default(),
            creation_date: Utc::now(),
            last_modified_date: Utc::now(),
        }
    }

    fn sample_user(username: &str) -> User {
        User {
            username: username.to_string(),
            sub: Uuid::new_v4(),
            attributes: vec![UserAttribute {
                name: "email".to_string(),
                value: format!("{username}@example.com"),
            }],
            password: "p@ss".to_string(),
            user_status: UserStatus::Confirmed,
            enabled: true,
            confirmation_code: None,
            mfa_code: None,
            mfa_options: vec![],
            user_mfa_setting_list: vec![],
            preferred_mfa_setting: None,
            refresh_tokens: HashSet::new(),
            creation_date: Utc::now(),
            last_modified_date: Utc::now(),
        }
    }

    async fn temp_store() -> (UserPoolStore, PathBuf) {
        let mut path = std::env::temp_dir();
        path.push(format!("cognito-local-test-pool-{}.json", Uuid::new_v4()));
        let store = UserPoolStore::create(path.clone(), sample_pool("us-east-1_test"))
            .await
            .unwrap();
        (store, path)
    }

    #[tokio::test]
    async fn save_and_lookup_by_username_and_email() {
        let (store, path) = temp_store().await;
        let user = sample_user("alice");
        store.save_user(user.clone(), Utc::now()).await.unwrap();

        assert!(store.get_user_by_username("ALICE").await.is_some());
        assert!(store.get_user_by_email("ALICE@EXAMPLE.COM").await.is_some());
        assert_eq!(store.get_user_by_sub(user.sub).await.unwrap().username, "alice");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn storing_the_same_refresh_token_twice_is_idempotent() {
        let (store, path) = temp_store().await;
        store.save_user(sample_user("bob"), Utc::now()).await.unwrap();
        store.store_refresh_token("bob", "rt-1".to_string()).await.unwrap();
        store.store_refresh_token("bob", "rt-1".to_string()).await.unwrap();

        let user = store.get_user_by_username("bob").await.unwrap();
        assert_eq!(user.refresh_tokens.len(), 1);
        assert!(store.get_user_by_refresh_token("rt-1").await.is_some());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn deleting_a_user_purges_refresh_token_index() {
        let (store, path) = temp_store().await;
        store.save_user(sample_user("carol"), Utc::now()).await.unwrap();
        store.store_refresh_token("carol", "rt-2".to_string()).await.unwrap();
        store.delete_user("carol").await.unwrap();

        assert!(store.get_user_by_refresh_token("rt-2").await.is_none());
        assert!(store.get_user_by_username("carol").await.is_none());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn list_users_paginates_in_sub_order() {
        let (store, path) = temp_store().await;
        for name in ["dave", "erin", "frank"] {
            store.save_user(sample_user(name), Utc::now()).await.unwrap();
        }

        let first_page = store.list_users(None, None, 2).await.unwrap();
        assert_eq!(first_page.users.len(), 2);
        assert!(first_page.pagination_token.is_some());

        let second_page = store
            .list_users(None, first_page.pagination_token.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second_page.users.len(), 1);
        assert!(second_page.pagination_token.is_none());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn persisted_document_reloads_with_same_users() {
        let (store, path) = temp_store().await;
        store.save_user(sample_user("gina"), Utc::now()).await.unwrap();
        drop(store);

        let reloaded = UserPoolStore::load(path.clone()).await.unwrap();
        assert!(reloaded.get_user_by_username("gina").await.is_some());

        let _ = std::fs::remove_file(path);
    }
}
