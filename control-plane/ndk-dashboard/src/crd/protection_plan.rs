use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{DashboardError, DashboardResult};

pub const SELECTION_MODE_ANNOTATION: &str = "ndk-dashboard/selection-mode";
pub const LABEL_KEY_ANNOTATION: &str = "ndk-dashboard/label-selector-key";
pub const LABEL_VALUE_ANNOTATION: &str = "ndk-dashboard/label-selector-value";

/// Count-based retention bounds accepted from operators.
pub const MIN_RETENTION: u8 = 1;
pub const MAX_RETENTION: u8 = 15;

/// `expiresAfter` used for count-based retention.
pub const DEFAULT_EXPIRES_AFTER: &str = "720h";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "dataservices.nutanix.com",
    version = "v1alpha1",
    kind = "ProtectionPlan",
    plural = "protectionplans",
    namespaced,
    status = "ProtectionPlanStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionPlanSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection_type: Option<String>,
    #[serde(default)]
    pub retention_policy: RetentionPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<String>,
    #[serde(default)]
    pub suspend: bool,
}

/// Wire form of retention; exactly one field is expected to be set.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct ProtectionPlanStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "dataservices.nutanix.com",
    version = "v1alpha1",
    kind = "AppProtectionPlan",
    plural = "appprotectionplans",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AppProtectionPlanSpec {
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub protection_plan_names: Vec<String>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "scheduler.nutanix.com",
    version = "v1alpha1",
    kind = "JobScheduler",
    plural = "jobschedulers",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct JobSchedulerSpec {
    pub cron_schedule: String,
}

/// Retention of a plan's snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retention {
    Count(u8),
    MaxAge(String),
}

impl Retention {
    /// All digits means a count (range checked); anything else is a duration.
    pub fn parse(raw: &str) -> DashboardResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DashboardError::validation("Retention is required"));
        }
        if raw.chars().all(|c| c.is_ascii_digit()) {
            return Self::count_from_str(raw);
        }
        Ok(Retention::MaxAge(raw.to_string()))
    }

    /// Deploy-time form: a plain integer count, no unit suffix.
    pub fn parse_count(raw: &str) -> DashboardResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(DashboardError::validation(format!(
                "Retention count must be a valid number between {} and {}",
                MIN_RETENTION, MAX_RETENTION
            )));
        }
        Self::count_from_str(raw)
    }

    fn count_from_str(raw: &str) -> DashboardResult<Self> {
        let invalid = || {
            DashboardError::validation(format!(
                "Retention count must be a valid number between {} and {}",
                MIN_RETENTION, MAX_RETENTION
            ))
        };
        let n: u32 = raw.parse().map_err(|_| invalid())?;
        if !(MIN_RETENTION as u32..=MAX_RETENTION as u32).contains(&n) {
            return Err(DashboardError::validation(format!(
                "Retention count must be between {} and {}",
                MIN_RETENTION, MAX_RETENTION
            )));
        }
        Ok(Retention::Count(n as u8))
    }

    pub fn expires_after(&self) -> String {
        match self {
            Retention::Count(_) => DEFAULT_EXPIRES_AFTER.to_string(),
            Retention::MaxAge(age) => age.clone(),
        }
    }

    pub fn to_policy(&self) -> RetentionPolicy {
        match self {
            Retention::Count(n) => RetentionPolicy {
                retention_count: Some(*n as u32),
                max_age: None,
            },
            Retention::MaxAge(age) => RetentionPolicy {
                retention_count: None,
                max_age: Some(age.clone()),
            },
        }
    }

    /// `maxAge` wins when both are present.
    pub fn from_policy(p: &RetentionPolicy) -> Option<Self> {
        match (&p.max_age, p.retention_count) {
            (Some(age), _) => Some(Retention::MaxAge(age.clone())),
            (None, Some(n)) => Some(Retention::Count(n.min(u8::MAX as u32) as u8)),
            (None, None) => None,
        }
    }
}

impl std::fmt::Display for Retention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retention::Count(n) => write!(f, "{}", n),
            Retention::MaxAge(age) => f.write_str(age),
        }
    }
}

/// How a plan resolves the Applications it protects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    ByName,
    ByLabel { key: String, value: String },
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::ByName => "by-name",
            SelectionMode::ByLabel { .. } => "by-label",
        }
    }

    pub fn to_annotations(&self) -> BTreeMap<String, String> {
        let mut a = BTreeMap::from([(
            SELECTION_MODE_ANNOTATION.to_string(),
            self.as_str().to_string(),
        )]);
        if let SelectionMode::ByLabel { key, value } = self {
            a.insert(LABEL_KEY_ANNOTATION.into(), key.clone());
            a.insert(LABEL_VALUE_ANNOTATION.into(), value.clone());
        }
        a
    }

    /// Defaults to by-name. A by-label plan missing its key or value is an error.
    pub fn from_annotations(
        annotations: Option<&BTreeMap<String, String>>,
    ) -> DashboardResult<Self> {
        let get = |k: &str| {
            annotations
                .and_then(|a| a.get(k))
                .filter(|v| !v.is_empty())
                .cloned()
        };
        match get(SELECTION_MODE_ANNOTATION).as_deref() {
            Some("by-label") => match (get(LABEL_KEY_ANNOTATION), get(LABEL_VALUE_ANNOTATION)) {
                (Some(key), Some(value)) => Ok(SelectionMode::ByLabel { key, value }),
                _ => Err(DashboardError::validation(
                    "Protection plan is configured for label-based selection but label selector is missing",
                )),
            },
            _ => Ok(SelectionMode::ByName),
        }
    }
}

impl ProtectionPlan {
    pub fn retention(&self) -> Option<Retention> {
        Retention::from_policy(&self.spec.retention_policy)
    }

    /// `maxAge` verbatim, otherwise the count-based default.
    pub fn expires_after(&self) -> String {
        self.retention()
            .map(|r| r.expires_after())
            .unwrap_or_else(|| DEFAULT_EXPIRES_AFTER.to_string())
    }

    pub fn selection_mode(&self) -> DashboardResult<SelectionMode> {
        SelectionMode::from_annotations(self.metadata.annotations.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_parsing() {
        assert_eq!(Retention::parse("7").unwrap(), Retention::Count(7));
        assert_eq!(
            Retention::parse("168h").unwrap(),
            Retention::MaxAge("168h".into())
        );
        assert!(Retention::parse("0").is_err());
        assert!(Retention::parse("16").is_err());
        assert!(Retention::parse("").is_err());
    }

    #[test]
    fn deploy_retention_strips_units() {
        assert!(Retention::parse_count("5d").is_err());
        assert_eq!(Retention::parse_count("15").unwrap(), Retention::Count(15));
        assert_eq!(Retention::parse_count("1").unwrap(), Retention::Count(1));
        assert!(Retention::parse_count("0").is_err());
        assert!(Retention::parse_count("16").is_err());
        assert!(Retention::parse_count("abc").is_err());
        assert!(Retention::parse_count("-3").is_err());
    }

    #[test]
    fn expires_after_by_variant() {
        assert_eq!(Retention::Count(3).expires_after(), "720h");
        assert_eq!(Retention::MaxAge("48h".into()).expires_after(), "48h");
        let p = RetentionPolicy {
            retention_count: Some(3),
            max_age: Some("24h".into()),
        };
        assert_eq!(
            Retention::from_policy(&p),
            Some(Retention::MaxAge("24h".into()))
        );
    }

    #[test]
    fn selection_mode_annotations() {
        let m = SelectionMode::ByLabel {
            key: "tier".into(),
            value: "gold".into(),
        };
        let a = m.to_annotations();
        assert_eq!(SelectionMode::from_annotations(Some(&a)).unwrap(), m);
        assert_eq!(
            SelectionMode::from_annotations(None).unwrap(),
            SelectionMode::ByName
        );

        let broken = BTreeMap::from([(
            SELECTION_MODE_ANNOTATION.to_string(),
            "by-label".to_string(),
        )]);
        assert!(SelectionMode::from_annotations(Some(&broken)).is_err());
    }
}
