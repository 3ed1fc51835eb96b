//! # Cognito Facade
//!
//! Owns every user pool and the flat app-client index, and is the one
//! entry point handlers go through to reach a pool's store: one struct
//! handed to every handler as `web::Data`, fanning out to per-resource
//! stores that each guard their own state.

use crate::domain::{AppClient, UserPool};
use crate::pool_store::{generate_client_id, generate_pool_id, ClientStore, UserPoolStore};
use shared::errors::ApiError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of all pools and clients known to this process.
///
/// Adding a pool or client takes the registry's own write lock only long
/// enough to insert the new entry. Looking up a pool clones an `Arc`
/// and releases that lock immediately, so in-flight operations on one
/// pool never contend with another.
pub struct CognitoFacade {
    data_dir: PathBuf,
    pools: RwLock<HashMap<String, Arc<UserPoolStore>>>,
    clients: ClientStore,
    region: String,
}

impl CognitoFacade {
    /// Loads every `<data_dir>/<pool_id>.json` pool document and the
    /// shared `<data_dir>/clients.json` client document.
    pub async fn load(data_dir: PathBuf, region: String) -> Result<Self, ApiError> {
        let mut pools = HashMap::new();
        let mut entries = tokio::fs::read_dir(&data_dir).await.ok();
        if let Some(dir) = entries.as_mut() {
            while let Ok(Some(entry)) = dir.next_entry().await {
                let path = entry.path();
                let is_pool_document = path.extension().map(|e| e == "json").unwrap_or(false)
                    && path.file_stem().map(|s| s != "clients").unwrap_or(false);
                if is_pool_document {
                    let store = UserPoolStore::load(path).await?;
                    let id = store.options().await.id;
                    pools.insert(id, Arc::new(store));
                }
            }
        }

        let clients = ClientStore::load_or_empty(data_dir.join("clients.json")).await?;

        Ok(Self {
            data_dir,
            pools: RwLock::new(pools),
            clients,
            region,
        })
    }

    /// Creates a pool, persists it, and registers it in the facade.
    pub async fn create_user_pool(&self, mut options: UserPool) -> Result<UserPool, ApiError> {
        if options.id.is_empty() {
            options.id = generate_pool_id(&self.region);
        }
        let path = self.data_dir.join(format!("{}.json", options.id));
        let id = options.id.clone();
        let store = UserPoolStore::create(path, options.clone()).await?;

        let mut pools = self.pools.write().await;
        pools.insert(id, Arc::new(store));
        Ok(options)
    }

    /// Registers a new app client under `client.user_pool_id`, minting a
    /// `ClientId` if one wasn't supplied.
    pub async fn create_app_client(&self, mut client: AppClient) -> Result<AppClient, ApiError> {
        if !self.has_pool(&client.user_pool_id).await {
            return Err(ApiError::ResourceNotFound {
                resource: client.user_pool_id.clone(),
            });
        }
        if client.client_id.is_empty() {
            client.client_id = generate_client_id();
        }
        self.clients.save(client.clone()).await?;
        Ok(client)
    }

    pub async fn has_pool(&self, user_pool_id: &str) -> bool {
        self.pools.read().await.contains_key(user_pool_id)
    }

    /// Clones out the pool's store handle, releasing the registry lock
    /// before the caller does any per-pool work.
    pub async fn pool(&self, user_pool_id: &str) -> Result<Arc<UserPoolStore>, ApiError> {
        self.pools
            .read()
            .await
            .get(user_pool_id)
            .cloned()
            .ok_or_else(|| ApiError::ResourceNotFound {
                resource: user_pool_id.to_string(),
            })
    }

    pub async fn get_user_pool(&self, user_pool_id: &str) -> Result<UserPool, ApiError> {
        Ok(self.pool(user_pool_id).await?.options().await)
    }

    pub async fn get_app_client(&self, client_id: &str) -> Result<AppClient, ApiError> {
        self.clients
            .get(client_id)
            .await
            .ok_or_else(|| ApiError::ResourceNotFound {
                resource: client_id.to_string(),
            })
    }

    /// Resolves the pool that owns `client_id`.
    pub async fn get_user_pool_for_client_id(&self, client_id: &str) -> Result<UserPool, ApiError> {
        let client = self.get_app_client(client_id).await?;
        self.get_user_pool(&client.user_pool_id).await
    }

    pub async fn list_app_clients(&self, user_pool_id: &str) -> Vec<AppClient> {
        self.clients.list_for_pool(user_pool_id).await
    }
}
