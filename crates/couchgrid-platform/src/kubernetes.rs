//! Kubernetes-backed [`Platform`] using `kube` typed APIs.

use std::fmt::Debug;

use async_trait::async_trait;
use couchgrid_core::LabelSet;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, ReplicationController, Service};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{PlatformError, PlatformResult};
use crate::object::{PlatformObject, ResourceKind};
use crate::platform::Platform;

/// Talks to a real orchestration API server.
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
}

impl KubePlatform {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect to `api_url`, or to the in-cluster / kubeconfig default when `None`.
    pub async fn connect(api_url: Option<&str>) -> PlatformResult<Self> {
        let client = match api_url {
            Some(url) => {
                let uri: http::Uri = url
                    .parse()
                    .map_err(|e| PlatformError::Connect(format!("invalid API URL {url:?}: {e}")))?;
                Client::try_from(kube::Config::new(uri))
                    .map_err(|e| PlatformError::Connect(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| PlatformError::Connect(e.to_string()))?,
        };
        info!(api_url = api_url.unwrap_or("<default>"), "orchestration client ready");
        Ok(Self::new(client))
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn create_typed<K>(&self, namespace: &str, kind: ResourceKind, object: K) -> PlatformResult<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + Serialize + DeserializeOwned,
        K::DynamicType: Default,
    {
        let meta = object.meta();
        let name = meta
            .name
            .clone()
            .or_else(|| meta.generate_name.clone())
            .unwrap_or_default();
        let created = self
            .api::<K>(namespace)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| map_kube_error(kind, &name, e, true))?;
        debug!(%namespace, %kind, name = ?created.meta().name, "created");
        Ok(created)
    }

    async fn list_typed<K>(
        &self,
        namespace: &str,
        kind: ResourceKind,
        selector: &LabelSet,
    ) -> PlatformResult<Vec<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        K::DynamicType: Default,
    {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.selector());
        }
        let list = self
            .api::<K>(namespace)
            .list(&params)
            .await
            .map_err(|e| map_kube_error(kind, "", e, true))?;
        Ok(list.items)
    }

    async fn replace_typed<K>(&self, namespace: &str, kind: ResourceKind, mut object: K) -> PlatformResult<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + Serialize + DeserializeOwned,
        K::DynamicType: Default,
    {
        let name = object.meta().name.clone().ok_or_else(|| PlatformError::Invalid {
            kind,
            reason: "replace requires a name".to_string(),
        })?;
        let api = self.api::<K>(namespace);

        // The API server rejects updates without the current resource version.
        if object.meta().resource_version.is_none() {
            let current = api
                .get(&name)
                .await
                .map_err(|e| map_kube_error(kind, &name, e, false))?;
            object.meta_mut().resource_version = current.meta().resource_version.clone();
        }

        let replaced = api
            .replace(&name, &PostParams::default(), &object)
            .await
            .map_err(|e| map_kube_error(kind, &name, e, false))?;
        debug!(%namespace, %kind, %name, "replaced");
        Ok(replaced)
    }

    async fn delete_typed<K>(&self, namespace: &str, kind: ResourceKind, name: &str) -> PlatformResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        K::DynamicType: Default,
    {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::orphan())
            .await
            .map_err(|e| map_kube_error(kind, name, e, false))?;
        debug!(%namespace, %kind, %name, "deleted");
        Ok(())
    }
}

#[async_trait]
impl Platform for KubePlatform {
    async fn create(&self, namespace: &str, object: PlatformObject) -> PlatformResult<PlatformObject> {
        let kind = object.kind();
        let created: PlatformObject = match object {
            PlatformObject::Deployment(o) => self.create_typed(namespace, kind, o).await?.into(),
            PlatformObject::ReplicaSet(o) => self.create_typed(namespace, kind, o).await?.into(),
            PlatformObject::ReplicationController(o) => {
                self.create_typed(namespace, kind, o).await?.into()
            }
            PlatformObject::StatefulSet(o) => self.create_typed(namespace, kind, o).await?.into(),
            PlatformObject::Service(o) => self.create_typed(namespace, kind, o).await?.into(),
            PlatformObject::PersistentVolumeClaim(o) => {
                self.create_typed(namespace, kind, o).await?.into()
            }
            PlatformObject::Pod(o) => self.create_typed(namespace, kind, o).await?.into(),
        };
        Ok(created)
    }

    async fn list(
        &self,
        namespace: &str,
        kind: ResourceKind,
        selector: &LabelSet,
    ) -> PlatformResult<Vec<PlatformObject>> {
        fn wrap<K: Into<PlatformObject>>(items: Vec<K>) -> Vec<PlatformObject> {
            items.into_iter().map(Into::into).collect()
        }

        let objects = match kind {
            ResourceKind::Deployment => wrap(self.list_typed::<Deployment>(namespace, kind, selector).await?),
            ResourceKind::ReplicaSet => wrap(self.list_typed::<ReplicaSet>(namespace, kind, selector).await?),
            ResourceKind::ReplicationController => wrap(
                self.list_typed::<ReplicationController>(namespace, kind, selector)
                    .await?,
            ),
            ResourceKind::StatefulSet => wrap(self.list_typed::<StatefulSet>(namespace, kind, selector).await?),
            ResourceKind::Service => wrap(self.list_typed::<Service>(namespace, kind, selector).await?),
            ResourceKind::PersistentVolumeClaim => wrap(
                self.list_typed::<PersistentVolumeClaim>(namespace, kind, selector)
                    .await?,
            ),
            ResourceKind::Pod => wrap(self.list_typed::<Pod>(namespace, kind, selector).await?),
        };
        Ok(objects)
    }

    async fn replace(&self, namespace: &str, object: PlatformObject) -> PlatformResult<PlatformObject> {
        let kind = object.kind();
        let replaced: PlatformObject = match object {
            PlatformObject::Deployment(o) => self.replace_typed(namespace, kind, o).await?.into(),
            PlatformObject::ReplicaSet(o) => self.replace_typed(namespace, kind, o).await?.into(),
            PlatformObject::ReplicationController(o) => {
                self.replace_typed(namespace, kind, o).await?.into()
            }
            PlatformObject::StatefulSet(o) => self.replace_typed(namespace, kind, o).await?.into(),
            PlatformObject::Service(o) => self.replace_typed(namespace, kind, o).await?.into(),
            PlatformObject::PersistentVolumeClaim(o) => {
                self.replace_typed(namespace, kind, o).await?.into()
            }
            PlatformObject::Pod(o) => self.replace_typed(namespace, kind, o).await?.into(),
        };
        Ok(replaced)
    }

    async fn delete(&self, namespace: &str, kind: ResourceKind, name: &str) -> PlatformResult<()> {
        match kind {
            ResourceKind::Deployment => self.delete_typed::<Deployment>(namespace, kind, name).await,
            ResourceKind::ReplicaSet => self.delete_typed::<ReplicaSet>(namespace, kind, name).await,
            ResourceKind::ReplicationController => {
                self.delete_typed::<ReplicationController>(namespace, kind, name)
                    .await
            }
            ResourceKind::StatefulSet => self.delete_typed::<StatefulSet>(namespace, kind, name).await,
            ResourceKind::Service => self.delete_typed::<Service>(namespace, kind, name).await,
            ResourceKind::PersistentVolumeClaim => {
                self.delete_typed::<PersistentVolumeClaim>(namespace, kind, name)
                    .await
            }
            ResourceKind::Pod => self.delete_typed::<Pod>(namespace, kind, name).await,
        }
    }
}

/// Map a `kube` error onto the platform taxonomy.
///
/// For collection calls (create, list) a 404 means the API server does not
/// serve the resource at all, which surfaces as `Unsupported`.
fn map_kube_error(kind: ResourceKind, name: &str, err: kube::Error, collection: bool) -> PlatformError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 && collection => PlatformError::Unsupported {
            kind,
            detail: resp.message,
        },
        kube::Error::Api(resp) if resp.code == 404 => PlatformError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) if resp.code == 409 => PlatformError::Conflict {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) => PlatformError::Api {
            kind,
            name: name.to_string(),
            code: resp.code,
            message: resp.message,
        },
        other => PlatformError::Connect(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("code {code}"),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn missing_collection_is_unsupported() {
        let err = map_kube_error(ResourceKind::StatefulSet, "cdb-cluster-abcd", api_error(404), true);
        assert!(matches!(err, PlatformError::Unsupported { kind: ResourceKind::StatefulSet, .. }));
    }

    #[test]
    fn missing_object_is_not_found() {
        let err = map_kube_error(ResourceKind::Pod, "cdb-cluster-abcd-0", api_error(404), false);
        assert!(err.is_not_found());
    }

    #[test]
    fn conflict_and_other_codes() {
        let err = map_kube_error(ResourceKind::Service, "cdb-cluster-abcd", api_error(409), true);
        assert_eq!(
            err,
            PlatformError::Conflict {
                kind: ResourceKind::Service,
                name: "cdb-cluster-abcd".to_string(),
            }
        );

        let err = map_kube_error(ResourceKind::Service, "x", api_error(500), false);
        assert!(matches!(err, PlatformError::Api { code: 500, .. }));
    }
}
