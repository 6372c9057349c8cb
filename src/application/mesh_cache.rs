// Per-path cache of mesh fragments referenced by simulation samples
use crate::application::dashboard_api::{ApiError, DashboardApi};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct MeshCache {
    api: Arc<dyn DashboardApi>,
    meshes: Mutex<HashMap<String, Bytes>>,
}

impl MeshCache {
    pub fn new(api: Arc<dyn DashboardApi>) -> Self {
        Self {
            api,
            meshes: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
        self.meshes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mesh bytes for `path`, fetched once and served from memory afterwards.
    /// Failed fetches are not cached.
    pub async fn get(&self, path: &str) -> Result<Bytes, ApiError> {
        if let Some(mesh) = self.lock().get(path) {
            return Ok(mesh.clone());
        }

        let mesh = self.api.fetch_mesh(path).await?;
        tracing::debug!("Cached mesh {} ({} bytes)", path, mesh.len());
        self.lock().insert(path.to_string(), mesh.clone());
        Ok(mesh)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_api::fake::FakeApi;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_fetches_each_path_once() {
        let api = Arc::new(FakeApi::default());
        api.meshes
            .lock()
            .unwrap()
            .insert("media/a.stl".to_string(), Bytes::from_static(b"solid a"));
        let cache = MeshCache::new(api.clone());

        assert_eq!(cache.get("media/a.stl").await.unwrap(), Bytes::from_static(b"solid a"));
        assert_eq!(cache.get("media/a.stl").await.unwrap(), Bytes::from_static(b"solid a"));
        assert_eq!(api.mesh_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let api = Arc::new(FakeApi::default());
        let cache = MeshCache::new(api.clone());

        assert!(cache.get("media/missing.stl").await.is_err());
        assert!(cache.is_empty());
    }
}
