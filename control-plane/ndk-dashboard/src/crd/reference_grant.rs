use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use ndk_k8s::NDK_GROUP;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "ReferenceGrant",
    plural = "referencegrants",
    namespaced
)]
pub struct ReferenceGrantSpec {
    pub from: Vec<GrantFrom>,
    pub to: Vec<GrantTo>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct GrantFrom {
    pub group: String,
    pub kind: String,
    pub namespace: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct GrantTo {
    pub group: String,
    pub kind: String,
}

impl ReferenceGrant {
    pub fn name_for(target_ns: &str) -> String {
        format!("allow-restore-from-{}", target_ns)
    }

    /// Lets restores in `target_ns` read snapshots in `source_ns`. Lives in
    /// the source namespace.
    pub fn for_restore(source_ns: &str, target_ns: &str) -> Self {
        let mut grant = ReferenceGrant::new(
            &Self::name_for(target_ns),
            ReferenceGrantSpec {
                from: vec![GrantFrom {
                    group: NDK_GROUP.to_string(),
                    kind: "ApplicationSnapshotRestore".to_string(),
                    namespace: target_ns.to_string(),
                }],
                to: vec![GrantTo {
                    group: NDK_GROUP.to_string(),
                    kind: "ApplicationSnapshot".to_string(),
                }],
            },
        );
        grant.metadata.namespace = Some(source_ns.to_string());
        grant
    }
}
