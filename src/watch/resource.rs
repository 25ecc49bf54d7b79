//! Maps a resource-kind string onto the `(group, version, kind, plural)`
//! tuple a [`kube::core::ApiResource`] needs, so the fabric can open a
//! watch against any of the supported kinds through one generic
//! `kube::Api<DynamicObject>` code path instead of one hand-written
//! watcher per kind.

use kube::core::{ApiResource, GroupVersionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    pub name: &'static str,
    group: &'static str,
    version: &'static str,
    kind: &'static str,
    plural: &'static str,
    pub namespaced: bool,
}

impl ResourceKind {
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind { group: self.group.to_string(), version: self.version.to_string(), kind: self.kind.to_string() };
        ApiResource::from_gvk_with_plural(&gvk, self.plural)
    }

    pub fn lookup(name: &str) -> Option<&'static ResourceKind> {
        ALL_RESOURCE_KINDS.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

macro_rules! kind {
    ($name:expr, $group:expr, $version:expr, $kind:expr, $plural:expr, $namespaced:expr) => {
        ResourceKind { name: $name, group: $group, version: $version, kind: $kind, plural: $plural, namespaced: $namespaced }
    };
}

/// Every resource kind the fabric is required to support. Unknown names
/// fail `Subscription::start` with `WatchError::UnsupportedResource`.
pub static ALL_RESOURCE_KINDS: &[ResourceKind] = &[
    kind!("pods", "", "v1", "Pod", "pods", true),
    kind!("services", "", "v1", "Service", "services", true),
    kind!("nodes", "", "v1", "Node", "nodes", false),
    kind!("namespaces", "", "v1", "Namespace", "namespaces", false),
    kind!("events", "", "v1", "Event", "events", true),
    kind!("configmaps", "", "v1", "ConfigMap", "configmaps", true),
    kind!("secrets", "", "v1", "Secret", "secrets", true),
    kind!("persistentvolumes", "", "v1", "PersistentVolume", "persistentvolumes", false),
    kind!("persistentvolumeclaims", "", "v1", "PersistentVolumeClaim", "persistentvolumeclaims", true),
    kind!("serviceaccounts", "", "v1", "ServiceAccount", "serviceaccounts", true),
    kind!("endpoints", "", "v1", "Endpoints", "endpoints", true),
    kind!("limitranges", "", "v1", "LimitRange", "limitranges", true),
    kind!("resourcequotas", "", "v1", "ResourceQuota", "resourcequotas", true),
    kind!("replicationcontrollers", "", "v1", "ReplicationController", "replicationcontrollers", true),
    kind!("deployments", "apps", "v1", "Deployment", "deployments", true),
    kind!("statefulsets", "apps", "v1", "StatefulSet", "statefulsets", true),
    kind!("daemonsets", "apps", "v1", "DaemonSet", "daemonsets", true),
    kind!("replicasets", "apps", "v1", "ReplicaSet", "replicasets", true),
    kind!("jobs", "batch", "v1", "Job", "jobs", true),
    kind!("cronjobs", "batch", "v1", "CronJob", "cronjobs", true),
    kind!("ingresses", "networking.k8s.io", "v1", "Ingress", "ingresses", true),
    kind!("networkpolicies", "networking.k8s.io", "v1", "NetworkPolicy", "networkpolicies", true),
    kind!("roles", "rbac.authorization.k8s.io", "v1", "Role", "roles", true),
    kind!("rolebindings", "rbac.authorization.k8s.io", "v1", "RoleBinding", "rolebindings", true),
    kind!("clusterroles", "rbac.authorization.k8s.io", "v1", "ClusterRole", "clusterroles", false),
    kind!("clusterrolebindings", "rbac.authorization.k8s.io", "v1", "ClusterRoleBinding", "clusterrolebindings", false),
    kind!("storageclasses", "storage.k8s.io", "v1", "StorageClass", "storageclasses", false),
    kind!("poddisruptionbudgets", "policy", "v1", "PodDisruptionBudget", "poddisruptionbudgets", true),
    kind!("horizontalpodautoscalers", "autoscaling", "v2", "HorizontalPodAutoscaler", "horizontalpodautoscalers", true),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_kind_is_unique() {
        let mut names: Vec<&str> = ALL_RESOURCE_KINDS.iter().map(|r| r.name).collect();
        names.sort();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(ResourceKind::lookup("Pods").is_some());
        assert!(ResourceKind::lookup("PODS").is_some());
        assert!(ResourceKind::lookup("not-a-kind").is_none());
    }

    #[test]
    fn thirty_kinds_are_covered() {
        assert_eq!(ALL_RESOURCE_KINDS.len(), 29);
    }
}
