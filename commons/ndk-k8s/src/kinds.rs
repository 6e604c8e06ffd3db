use std::fmt;

pub const NDK_GROUP: &str = "dataservices.nutanix.com";
pub const NDK_VERSION: &str = "v1alpha1";
pub const SCHEDULER_GROUP: &str = "scheduler.nutanix.com";
pub const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";

/// Every resource kind the dashboard reads or mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Application,
    ApplicationSnapshot,
    ApplicationSnapshotRestore,
    ProtectionPlan,
    AppProtectionPlan,
    StorageCluster,
    JobScheduler,
    ReferenceGrant,
    Namespace,
    Secret,
    ConfigMap,
    Service,
    PersistentVolumeClaim,
    PersistentVolume,
    Pod,
    Node,
    StatefulSet,
    Deployment,
}

impl ResourceKind {
    pub fn group(self) -> &'static str {
        use ResourceKind::*;
        match self {
            Application | ApplicationSnapshot | ApplicationSnapshotRestore
            | ProtectionPlan | AppProtectionPlan | StorageCluster => NDK_GROUP,
            JobScheduler => SCHEDULER_GROUP,
            ReferenceGrant => GATEWAY_GROUP,
            StatefulSet | Deployment => "apps",
            _ => "",
        }
    }

    pub fn version(self) -> &'static str {
        use ResourceKind::*;
        match self {
            Application | ApplicationSnapshot | ApplicationSnapshotRestore
            | ProtectionPlan | AppProtectionPlan | StorageCluster
            | JobScheduler => NDK_VERSION,
            ReferenceGrant => "v1beta1",
            _ => "v1",
        }
    }

    pub fn plural(self) -> &'static str {
        use ResourceKind::*;
        match self {
            Application => "applications",
            ApplicationSnapshot => "applicationsnapshots",
            ApplicationSnapshotRestore => "applicationsnapshotrestores",
            ProtectionPlan => "protectionplans",
            AppProtectionPlan => "appprotectionplans",
            StorageCluster => "storageclusters",
            JobScheduler => "jobschedulers",
            ReferenceGrant => "referencegrants",
            Namespace => "namespaces",
            Secret => "secrets",
            ConfigMap => "configmaps",
            Service => "services",
            PersistentVolumeClaim => "persistentvolumeclaims",
            PersistentVolume => "persistentvolumes",
            Pod => "pods",
            Node => "nodes",
            StatefulSet => "statefulsets",
            Deployment => "deployments",
        }
    }

    pub fn kind(self) -> &'static str {
        use ResourceKind::*;
        match self {
            Application => "Application",
            ApplicationSnapshot => "ApplicationSnapshot",
            ApplicationSnapshotRestore => "ApplicationSnapshotRestore",
            ProtectionPlan => "ProtectionPlan",
            AppProtectionPlan => "AppProtectionPlan",
            StorageCluster => "StorageCluster",
            JobScheduler => "JobScheduler",
            ReferenceGrant => "ReferenceGrant",
            Namespace => "Namespace",
            Secret => "Secret",
            ConfigMap => "ConfigMap",
            Service => "Service",
            PersistentVolumeClaim => "PersistentVolumeClaim",
            PersistentVolume => "PersistentVolume",
            Pod => "Pod",
            Node => "Node",
            StatefulSet => "StatefulSet",
            Deployment => "Deployment",
        }
    }

    pub fn api_version(self) -> String {
        if self.group().is_empty() {
            self.version().to_string()
        } else {
            format!("{}/{}", self.group(), self.version())
        }
    }

    /// Cluster-scoped kinds ignore the namespace argument.
    pub fn namespaced(self) -> bool {
        use ResourceKind::*;
        !matches!(
            self,
            StorageCluster | Namespace | PersistentVolume | Node
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}
