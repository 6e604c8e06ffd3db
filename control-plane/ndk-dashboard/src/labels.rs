//! Label helpers shared by every workload lookup.

use crate::crd::{ApplicationSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

/// Label keys under these prefixes belong to the platform, not the operator.
pub const PROTECTED_PREFIXES: &[&str] = &[
    "app.kubernetes.io/",
    "kubernetes.io/",
    "k8s.io/",
    "helm.sh/",
    "kubectl.kubernetes.io/",
];

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "ndk-dashboard";
pub const RESTORED_FROM_LABEL: &str = "restored-from";

pub fn is_system_label(key: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Labels an operator may see and edit.
pub fn user_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(k, _)| !is_system_label(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Render an Application selector as a list selector string.
///
/// The first `resourceLabelSelectors` entry wins over the legacy top-level
/// fields. `matchLabels` wins over `matchExpressions`. With nothing usable the
/// result is `app=<app_name>`.
pub fn build_label_selector(
    selector: Option<&ApplicationSelector>,
    app_name: &str,
) -> String {
    let rendered = selector.and_then(|sel| {
        let (labels, exprs) = match sel.resource_label_selectors.first() {
            Some(first) => (
                &first.label_selector.match_labels,
                &first.label_selector.match_expressions,
            ),
            None => (&sel.match_labels, &sel.match_expressions),
        };
        if !labels.is_empty() {
            Some(
                labels
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(","),
            )
        } else {
            let parts: Vec<String> =
                exprs.iter().filter_map(render_expression).collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
    });
    rendered.unwrap_or_else(|| format!("app={}", app_name))
}

fn render_expression(expr: &LabelSelectorRequirement) -> Option<String> {
    let key = &expr.key;
    match expr.operator.as_str() {
        "In" if !expr.values.is_empty() => {
            Some(format!("{} in ({})", key, expr.values.join(",")))
        }
        "NotIn" if !expr.values.is_empty() => {
            Some(format!("{} notin ({})", key, expr.values.join(",")))
        }
        "Exists" => Some(key.clone()),
        "DoesNotExist" => Some(format!("!{}", key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{LabelSelectorTerms, ResourceLabelSelector};

    fn req(key: &str, op: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.into(),
            operator: op.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn falls_back_to_app_name() {
        assert_eq!(build_label_selector(None, "web"), "app=web");
        let empty = ApplicationSelector::default();
        assert_eq!(build_label_selector(Some(&empty), "web"), "app=web");
    }

    #[test]
    fn resource_selectors_take_precedence() {
        let sel = ApplicationSelector {
            resource_label_selectors: vec![
                ResourceLabelSelector {
                    label_selector: LabelSelectorTerms {
                        match_labels: BTreeMap::from([
                            ("app".into(), "db".into()),
                            ("tier".into(), "gold".into()),
                        ]),
                        ..Default::default()
                    },
                },
                ResourceLabelSelector::default(),
            ],
            match_labels: BTreeMap::from([("legacy".into(), "yes".into())]),
            ..Default::default()
        };
        assert_eq!(build_label_selector(Some(&sel), "x"), "app=db,tier=gold");
    }

    #[test]
    fn legacy_expressions() {
        let sel = ApplicationSelector {
            match_expressions: vec![
                req("env", "In", &["prod", "stage"]),
                req("zone", "NotIn", &["a"]),
                req("team", "Exists", &[]),
                req("tmp", "DoesNotExist", &[]),
                req("empty", "In", &[]),
            ],
            ..Default::default()
        };
        assert_eq!(
            build_label_selector(Some(&sel), "x"),
            "env in (prod,stage),zone notin (a),team,!tmp"
        );
    }

    #[test]
    fn expressions_that_render_nothing_fall_back() {
        let sel = ApplicationSelector {
            match_expressions: vec![req("k", "Gt", &["1"])],
            ..Default::default()
        };
        assert_eq!(build_label_selector(Some(&sel), "x"), "app=x");
    }

    #[test]
    fn protected_prefixes() {
        assert!(is_system_label("app.kubernetes.io/name"));
        assert!(is_system_label("helm.sh/chart"));
        assert!(is_system_label("kubectl.kubernetes.io/last-applied"));
        assert!(!is_system_label("tier"));
        let labels = BTreeMap::from([
            ("tier".to_string(), "gold".to_string()),
            ("k8s.io/x".to_string(), "y".to_string()),
        ]);
        assert_eq!(user_labels(&labels).len(), 1);
    }
}
