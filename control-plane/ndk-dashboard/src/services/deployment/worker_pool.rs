use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Node label keys that name a worker pool, highest priority first.
pub const POOL_LABEL_KEYS: [&str; 5] = [
    "karbon.nutanix.com/workerpool",
    "nodepool",
    "node-role.kubernetes.io/worker-pool",
    "worker-pool",
    "pool",
];

// nkp-{cluster}-{id}-{pool}-worker-{n}
static NODE_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"nkp-[^-]+-[^-]+-(.+?)-worker-\d+$").ok());

/// Name and labels of one cluster node.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

pub fn pool_from_node_name(name: &str) -> Option<&str> {
    NODE_NAME_RE
        .as_ref()?
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Resolve a pool name to a node-selector pair.
///
/// Nodes are scanned in order; a node matches when one of the known label
/// keys carries the pool name, or when its name encodes the pool and it has a
/// `nodepool` or karbon label to select on.
pub fn resolve_node_selector(
    nodes: &[NodeInfo],
    pool: &str,
) -> Option<(String, String)> {
    for node in nodes {
        if let Some(key) = POOL_LABEL_KEYS
            .iter()
            .find(|k| node.labels.get(**k).is_some_and(|v| v == pool))
        {
            return Some((key.to_string(), pool.to_string()));
        }
        if pool_from_node_name(&node.name) == Some(pool) {
            for key in ["nodepool", "karbon.nutanix.com/workerpool"] {
                if let Some(v) = node.labels.get(key) {
                    return Some((key.to_string(), v.clone()));
                }
            }
        }
    }
    None
}

/// Pools present in the cluster: the node-name pattern first, otherwise the
/// first non-empty known label.
pub fn list_pools(nodes: &[NodeInfo]) -> Vec<String> {
    let mut pools = BTreeSet::new();
    for node in nodes {
        if let Some(p) = pool_from_node_name(&node.name) {
            pools.insert(p.to_string());
            continue;
        }
        if let Some(v) = POOL_LABEL_KEYS
            .iter()
            .find_map(|k| node.labels.get(*k))
            .filter(|v| !v.is_empty())
        {
            pools.insert(v.clone());
        }
    }
    pools.into_iter().collect()
}
