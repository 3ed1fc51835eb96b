//! # App Client Store
//!
//! App clients live in one flat document (`clients.json`) instead of
//! being nested under their owning pool's document: `ClientId` is unique
//! across the whole facade, and handlers resolve a client before they
//! know which pool to load.

use crate::domain::AppClient;
use shared::errors::ApiError;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct ClientDocument {
    #[serde(default)]
    clients: HashMap<String, AppClient>,
}

/// Persists every [`AppClient`] across all pools in one file, guarded by
/// its own mutex.
pub struct ClientStore {
    path: PathBuf,
    clients: Mutex<HashMap<String, AppClient>>,
}

impl ClientStore {
    /// Loads `path` if present, otherwise starts empty; the file is
    /// created on first write.
    pub async fn load_or_empty(path: PathBuf) -> Result<Self, ApiError> {
        let clients = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let bytes = tokio::fs::read(&path).await.map_err(|e| ApiError::InternalError {
                message: format!("failed to read client document {}: {e}", path.display()),
            })?;
            let document: ClientDocument =
                serde_json::from_slice(&bytes).map_err(|e| ApiError::InternalError {
                    message: format!("corrupt client document {}: {e}", path.display()),
                })?;
            document.clients
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            clients: Mutex::new(clients),
        })
    }

    pub async fn get(&self, client_id: &str) -> Option<AppClient> {
        self.clients.lock().await.get(client_id).cloned()
    }

    pub async fn list_for_pool(&self, user_pool_id: &str) -> Vec<AppClient> {
        self.clients
            .lock()
            .await
            .values()
            .filter(|c| c.user_pool_id == user_pool_id)
            .cloned()
            .collect()
    }

    pub async fn save(&self, client: AppClient) -> Result<(), ApiError> {
        let mut clients = self.clients.lock().await;
        clients.insert(client.client_id.clone(), client);
        self.persist(&clients).await
    }

    async fn persist(&self, clients: &HashMap<String, AppClient>) -> Result<(), ApiError> {
        let document = ClientDocument {
            clients: clients.clone(),
        };
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_client_document(&path, &document))
            .await
            .map_err(|e| ApiError::InternalError {
                message: format!("persistence task panicked: {e}"),
            })??;
        Ok(())
    }
}

fn write_client_document(path: &std::path::Path, document: &ClientDocument) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ApiError::InternalError {
            message: format!("failed to create persistence directory: {e}"),
        })?;
    }
    let bytes = serde_json::to_vec_pretty(document).map_err(|e| ApiError::InternalError {
        message: format!("failed to serialize client document: {e}"),
    })?;
    use std::io::Write;
    let mut file = std::fs::File::create(path).map_err(|e| ApiError::InternalError {
        message: format!("failed to open {}: {e}", path.display()),
    })?;
    file.write_all(&bytes).map_err(|e| ApiError::InternalError {
        message: format!("failed to write {}: {e}", path.display()),
    })?;
    file.sync_all().map_err(|e| ApiError::InternalError {
        message: format!("failed to fsync {}: {e}", path.display()),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client(id: &str, pool_id: &str) -> AppClient {
        AppClient {
            client_id: id.to_string(),
            user_pool_id: pool_id.to_string(),
            client_name: "test-client".to_string(),
            client_secret: None,
            explicit_auth_flows: vec![],
            access_token_validity_seconds: None,
            id_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            read_attributes: vec![],
            write_attributes: vec![],
        }
    }

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("cognito-local-test-clients-{}.json", uuid::Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let path = temp_path();
        let store = ClientStore::load_or_empty(path.clone()).await.unwrap();
        store.save(sample_client("c1", "us-east-1_abc")).await.unwrap();

        let reloaded = ClientStore::load_or_empty(path.clone()).await.unwrap();
        assert!(reloaded.get("c1").await.is_some());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn list_for_pool_filters_by_owner() {
        let path = temp_path();
        let store = ClientStore::load_or_empty(path.clone()).await.unwrap();
        store.save(sample_client("c1", "pool-a")).await.unwrap();
        store.save(sample_client("c2", "pool-b")).await.unwrap();

        let pool_a_clients = store.list_for_pool("pool-a").await;
        assert_eq!(pool_a_clients.len(), 1);
        assert_eq!(pool_a_clients[0].client_id, "c1");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let path = temp_path();
        let store = ClientStore::load_or_empty(path).await.unwrap();
        assert!(store.get("anything").await.is_none());
    }
}
