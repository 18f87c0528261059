//! The orchestration API surface couchgrid consumes.

use async_trait::async_trait;
use couchgrid_core::LabelSet;

use crate::error::{PlatformError, PlatformResult};
use crate::object::{PlatformObject, ResourceKind};

/// Namespaced create/list/replace/delete over [`PlatformObject`]s.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create an object. Objects with only `generateName` get a fresh name.
    async fn create(&self, namespace: &str, object: PlatformObject) -> PlatformResult<PlatformObject>;

    /// List objects of `kind` whose labels include every label of `selector`.
    async fn list(
        &self,
        namespace: &str,
        kind: ResourceKind,
        selector: &LabelSet,
    ) -> PlatformResult<Vec<PlatformObject>>;

    /// Replace an existing object by name.
    async fn replace(&self, namespace: &str, object: PlatformObject)
    -> PlatformResult<PlatformObject>;

    /// Delete an object by name. Dependents are not removed with it.
    async fn delete(&self, namespace: &str, kind: ResourceKind, name: &str) -> PlatformResult<()>;

    /// Find one object by exact name among those matching `selector`.
    async fn find(
        &self,
        namespace: &str,
        kind: ResourceKind,
        selector: &LabelSet,
        name: &str,
    ) -> PlatformResult<Option<PlatformObject>> {
        let objects = self.list(namespace, kind, selector).await?;
        Ok(objects.into_iter().find(|o| o.name() == name))
    }

    /// Delete an object, treating "already gone" as success.
    ///
    /// Returns whether the object existed.
    async fn delete_if_present(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> PlatformResult<bool> {
        match self.delete(namespace, kind, name).await {
            Ok(()) => Ok(true),
            Err(PlatformError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
