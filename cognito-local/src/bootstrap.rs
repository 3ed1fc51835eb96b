//! Startup-only helpers: loading the trigger configuration document and
//! creating the optional pre-provisioned pool/client named in the CLI
//! surface. Neither concern belongs in [`crate::facade`] itself — they
//! run once, before the server starts accepting requests.

use crate::domain::UserPool;
use crate::facade::CognitoFacade;
use crate::triggers::InvocableSpec;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// `{ "<UserPoolId>": { "<HookName>": InvocableSpec } }`, applied to a
/// pool's `lambda_config` at creation time. Pools reloaded from an
/// existing persistence directory keep whatever `lambda_config` they
/// were last saved with; this file only seeds newly created pools.
pub type TriggerConfigDocument = HashMap<String, HashMap<String, InvocableSpec>>;

pub fn load_trigger_config(path: &str) -> TriggerConfigDocument {
    let path = Path::new(path);
    if !path.exists() {
        return TriggerConfigDocument::new();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(%err, path = %path.display(), "ignoring unparseable trigger configuration file");
            TriggerConfigDocument::new()
        }),
        Err(err) => {
            warn!(%err, path = %path.display(), "could not read trigger configuration file");
            TriggerConfigDocument::new()
        }
    }
}

/// Creates the pool/client named by `BOOTSTRAP_POOL_NAME`/
/// `BOOTSTRAP_CLIENT_NAME`, if set, wiring in any lambda config the
/// trigger document declares for a pool of that name. A no-op when
/// neither variable is set, which is the common case for tests driving
/// the wire protocol against pools they create themselves.
pub async fn create_bootstrap_pool(
    facade: &CognitoFacade,
    trigger_config: &TriggerConfigDocument,
) -> Result<(), shared::errors::ApiError> {
    let Ok(pool_name) = std::env::var("BOOTSTRAP_POOL_NAME") else {
        return Ok(());
    };

    let lambda_config = trigger_config.get(&pool_name).cloned().unwrap_or_default();
    let pool = facade
        .create_user_pool(UserPool {
            name: pool_name.clone(),
            lambda_config,
            ..Default::default()
        })
        .await?;
    info!(user_pool_id = %pool.id, name = %pool.name, "created bootstrap user pool");

    if let Ok(client_name) = std::env::var("BOOTSTRAP_CLIENT_NAME") {
        let client = facade
            .create_app_client(crate::domain::AppClient {
                client_id: String::new(),
                user_pool_id: pool.id.clone(),
                client_name,
                client_secret: None,
                explicit_auth_flows: vec![],
                access_token_validity_seconds: None,
                id_token_validity_seconds: None,
                refresh_token_validity_seconds: None,
                read_attributes: vec![],
                write_attributes: vec![],
            })
            .await?;
        info!(client_id = %client.client_id, user_pool_id = %pool.id, "created bootstrap app client");
    }

    Ok(())
}
