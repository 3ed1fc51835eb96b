//! The on-disk shape of one pool: its options, users, and groups in a
//! single JSON document, keyed the way the wire API keys them.

use crate::domain::{Group, User, UserPool};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoolDocument {
    pub options: UserPool,
    #[serde(default)]
    pub users: HashMap<String, User>,
    #[serde(default)]
    pub groups: HashMap<String, Group>,
}
