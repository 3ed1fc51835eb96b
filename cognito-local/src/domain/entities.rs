//! # User Pool Domain Entities
//!
//! Core persistent state for the emulated identity service. These types
//! are the canonical in-memory representation; [`crate::pool_store`]
//! serializes them to disk verbatim (plus a thin document envelope) and
//! rebuilds secondary indexes from them on load.
//!
//! ## Entity Overview
//!
//! | Entity | Keyed by | Owned by |
//! |--------|----------|----------|
//! | [`UserPool`] | `Id` (opaque, e.g. `us-east-1_AbCd1234`) | the facade's pool map |
//! | [`User`] | `Username` within a pool | the owning [`UserPool`]'s store |
//! | [`Group`] | `GroupName` within a pool | the owning [`UserPool`]'s store |
//! | [`AppClient`] | `ClientId` (globally unique) | a top-level client document |
//!
//! Attributes are modelled as an ordered `Vec<UserAttribute>` rather than a
//! map: the wire protocol round-trips a list of `{Name, Value}` pairs and
//! callers may rely on insertion order. A derived map is built on demand
//! for lookups; it is never the attribute's canonical storage.

use crate::triggers::InvocableSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::PasswordPolicy;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A namespace of users, groups, clients, and configuration.
///
/// Identified by an opaque `Id`; the conventional shape minted by
/// [`crate::pool_store::generate_pool_id`] is `<region>_<8 alphanumeric>`
/// to match what SDK-shaped clients expect to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mfa_configuration: MfaConfiguration,
    #[serde(default, with = "password_policy_serde")]
    pub password_policy: PasswordPolicy,
    /// Subset of `{"email", "phone_number"}`.
    #[serde(default)]
    pub auto_verified_attributes: Vec<String>,
    #[serde(default)]
    pub schema: Vec<SchemaAttribute>,
    /// Hook name (`"PreSignUp"`, `"PreTokenGeneration"`, ...) to invocable.
    #[serde(default)]
    pub lambda_config: HashMap<String, InvocableSpec>,
    #[serde(default)]
    pub token_validity: TokenValidity,
    pub creation_date: DateTime<Utc>,
    pub last_modified_date: DateTime<Utc>,
}

impl Default for UserPool {
    /// An empty, unnamed pool with every collection/config field at its
    /// zero value. Callers that mint a real pool (`CreateUserPool`, the
    /// bootstrap step) fill in `id`/`name`/`lambda_config` via struct
    /// update syntax rather than listing every field themselves.
    fn default() -> Self {
        UserPool {
            id: String::new(),
            name: String::new(),
            mfa_configuration: Default::default(),
            password_policy: Default::default(),
            auto_verified_attributes: vec![],
            schema: vec![],
            lambda_config: Default::default(),
            token_validity: Default::default(),
            creation_date: Utc::now(),
            last_modified_date: Utc::now(),
        }
    }
}

impl UserPool {
    /// `true` iff `hook` has a bound invocable for this pool.
    pub fn enabled(&self, hook: &str) -> bool {
        self.lambda_config.contains_key(hook)
    }
}

/// Token lifetimes, in seconds, applied unless an [`AppClient`] overrides
/// them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenValidity {
    pub access_token_seconds: i64,
    pub id_token_seconds: i64,
    pub refresh_token_seconds: i64,
}

impl Default for TokenValidity {
    fn default() -> Self {
        Self {
            access_token_seconds: 3600,
            id_token_seconds: 3600,
            refresh_token_seconds: 30 * 24 * 3600,
        }
    }
}

/// Pool-level multi-factor authentication requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MfaConfiguration {
    Off,
    Optional,
    On,
}

impl Default for MfaConfiguration {
    fn default() -> Self {
        Self::Off
    }
}

/// One entry of a pool's attribute schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaAttribute {
    pub name: String,
    #[serde(default)]
    pub attribute_data_type: AttributeDataType,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AttributeDataType {
    String,
    Number,
    Boolean,
    DateTime,
}

impl Default for AttributeDataType {
    fn default() -> Self {
        Self::String
    }
}

/// A user within a pool.
///
/// `Password` is stored in plaintext: the emulator does not hash
/// passwords (documented deviation, see `DESIGN.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub username: String,
    pub sub: Uuid,
    #[serde(default)]
    pub attributes: Vec<UserAttribute>,
    pub password: String,
    pub user_status: UserStatus,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub confirmation_code: Option<String>,
    #[serde(default, rename = "MFACode")]
    pub mfa_code: Option<String>,
    #[serde(default, rename = "MFAOptions")]
    pub mfa_options: Vec<MfaOption>,
    #[serde(default, rename = "UserMFASettingList")]
    pub user_mfa_setting_list: Vec<String>,
    #[serde(default)]
    pub preferred_mfa_setting: Option<String>,
    #[serde(default)]
    pub refresh_tokens: HashSet<String>,
    pub creation_date: DateTime<Utc>,
    pub last_modified_date: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl User {
    /// Looks up an attribute value by name (`"email"`, `"phone_number"`, a
    /// custom attribute, ...).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Inserts or overwrites an attribute, preserving the position of an
    /// existing entry.
    pub fn set_attribute(&mut self, name: &str, value: String) {
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) {
            existing.value = value;
        } else {
            self.attributes.push(UserAttribute {
                name: name.to_string(),
                value,
            });
        }
    }

    /// Builds a derived `name -> value` map. Not the canonical
    /// representation; recomputed on demand.
    pub fn attributes_map(&self) -> HashMap<&str, &str> {
        self.attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()))
            .collect()
    }

    pub fn email_verified(&self) -> bool {
        self.attribute("email_verified") == Some("true")
    }

    pub fn phone_number_verified(&self) -> bool {
        self.attribute("phone_number_verified") == Some("true")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

/// Lifecycle state of a [`User`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Unconfirmed,
    Confirmed,
    Archived,
    Compromised,
    Unknown,
    ResetRequired,
    ForceChangePassword,
    ExternalProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfaOption {
    pub delivery_medium: DeliveryMedium,
    pub attribute_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMedium {
    Sms,
    Email,
}

/// A named collection of usernames within a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    pub group_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub role_arn: Option<String>,
    #[serde(default)]
    pub precedence: Option<i32>,
    #[serde(default)]
    pub usernames: Vec<String>,
}

/// A registered consumer of a pool.
///
/// `ClientId` is unique across the whole facade, not just its owning pool
/// — enforced by the facade's reverse index at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppClient {
    pub client_id: String,
    pub user_pool_id: String,
    pub client_name: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub explicit_auth_flows: Vec<String>,
    #[serde(default)]
    pub access_token_validity_seconds: Option<i64>,
    #[serde(default)]
    pub id_token_validity_seconds: Option<i64>,
    #[serde(default)]
    pub refresh_token_validity_seconds: Option<i64>,
    #[serde(default)]
    pub read_attributes: Vec<String>,
    #[serde(default)]
    pub write_attributes: Vec<String>,
}

impl AppClient {
    pub fn access_token_seconds(&self, pool: &UserPool) -> i64 {
        self.access_token_validity_seconds
            .unwrap_or(pool.token_validity.access_token_seconds)
    }

    pub fn id_token_seconds(&self, pool: &UserPool) -> i64 {
        self.id_token_validity_seconds
            .unwrap_or(pool.token_validity.id_token_seconds)
    }

    pub fn refresh_token_seconds(&self, pool: &UserPool) -> i64 {
        self.refresh_token_validity_seconds
            .unwrap_or(pool.token_validity.refresh_token_seconds)
    }

    /// Whether this client is allowed to start the given `AuthFlow`.
    ///
    /// An empty `explicit_auth_flows` list means "all flows allowed",
    /// matching the emulator's permissive default for locally created
    /// clients.
    pub fn allows_flow(&self, flow: &str) -> bool {
        self.explicit_auth_flows.is_empty() || self.explicit_auth_flows.iter().any(|f| f == flow)
    }
}

/// `(de)serialize` a [`PasswordPolicy`] under the `PascalCase` field names
/// the persisted document uses, since the type itself lives in `shared`
/// and doesn't carry `serde` derives.
mod password_policy_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use shared::validation::PasswordPolicy;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Wire {
        minimum_length: usize,
        require_uppercase: bool,
        require_lowercase: bool,
        require_numbers: bool,
        require_symbols: bool,
    }

    pub fn serialize<S: Serializer>(policy: &PasswordPolicy, s: S) -> Result<S::Ok, S::Error> {
        Wire {
            minimum_length: policy.minimum_length,
            require_uppercase: policy.require_uppercase,
            require_lowercase: policy.require_lowercase,
            require_numbers: policy.require_numbers,
            require_symbols: policy.require_symbols,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PasswordPolicy, D::Error> {
        let w = Wire::deserialize(d)?;
        Ok(PasswordPolicy {
            minimum_length: w.minimum_length,
            require_uppercase: w.require_uppercase,
            require_lowercase: w.require_lowercase,
            require_numbers: w.require_numbers,
            require_symbols: w.require_symbols,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            username: "alice".to_string(),
            sub: Uuid::new_v4(),
            attributes: vec![UserAttribute {
                name: "email".to_string(),
                value: "alice@example.com".to_string(),
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

    #[test]
    fn set_attribute_overwrites_in_place() {
        let mut user = sample_user();
        assert_eq!(user.attribute("email"), Some("alice@example.com"));
        user.set_attribute("email", "new@example.com".to_string());
        assert_eq!(user.attributes.len(), 1);
        assert_eq!(user.attribute("email"), Some("new@example.com"));
    }

    #[test]
    fn set_attribute_appends_when_absent() {
        let mut user = sample_user();
        user.set_attribute("given_name", "Alice".to_string());
        assert_eq!(user.attributes.len(), 2);
        assert_eq!(user.attribute("given_name"), Some("Alice"));
    }

    #[test]
    fn verified_flags_read_from_string_attributes() {
        let mut user = sample_user();
        assert!(!user.email_verified());
        user.set_attribute("email_verified", "true".to_string());
        assert!(user.email_verified());
    }

    #[test]
    fn app_client_falls_back_to_pool_token_validity() {
        let pool = UserPool {
            id: "us-east-1_abc".to_string(),
            name: "test".to_string(),
            mfa_configuration: MfaConfiguration::Off,
            password_policy: PasswordPolicy::default(),
            auto_verified_attributes: vec![],
            schema: vec![],
            lambda_config: HashMap::new(),
            token_validity: TokenValidity::default(),
            creation_date: Utc::now(),
            last_modified_date: Utc::now(),
        };
        let client = AppClient {
            client_id: "c1".to_string(),
            user_pool_id: pool.id.clone(),
            client_name: "client".to_string(),
            client_secret: None,
            explicit_auth_flows: vec![],
            access_token_validity_seconds: None,
            id_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            read_attributes: vec![],
            write_attributes: vec![],
        };
        assert_eq!(
            client.access_token_seconds(&pool),
            pool.token_validity.access_token_seconds
        );
        assert!(client.allows_flow("USER_PASSWORD_AUTH"));
    }
}
