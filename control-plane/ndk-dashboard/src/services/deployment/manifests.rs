use k8s_openapi::ByteString;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, Namespace,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec,
    Secret, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

use super::engines::AppType;
use crate::crd::{
    AppProtectionPlan, AppProtectionPlanSpec, Application, ApplicationSelector,
    ApplicationSpec, JobScheduler, JobSchedulerSpec, ProtectionPlan,
    ProtectionPlanSpec, Retention,
};
use crate::labels::{MANAGED_BY, MANAGED_BY_LABEL};

const DATA_VOLUME: &str = "data";
const REPLICATION_VOLUME: &str = "replication";
const REPLICATION_MOUNT: &str = "/etc/ndk-replication";

fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

fn meta(name: &str, ns: &str, labels: Option<BTreeMap<String, String>>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(ns.to_string()),
        labels,
        ..Default::default()
    }
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn secret_name(app: &str) -> String {
    format!("{}-credentials", app)
}

pub fn replication_config_name(app: &str) -> String {
    format!("{}-replication", app)
}

/// Credentials Secret; `ByteString` serialises as base64.
pub fn credentials_secret(
    app: &str,
    ns: &str,
    password: &str,
    database: Option<&str>,
) -> Secret {
    let mut data = BTreeMap::from([(
        "password".to_string(),
        ByteString(password.as_bytes().to_vec()),
    )]);
    if let Some(db) = database.filter(|d| !d.is_empty()) {
        data.insert("database".to_string(), ByteString(db.as_bytes().to_vec()));
    }
    Secret {
        metadata: meta(&secret_name(app), ns, Some(app_labels(app))),
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// Primary/replica fragments for multi-replica relational engines. Pod
/// ordinal 0 is the primary; the scripts pick their fragment from the
/// hostname.
pub fn replication_config(app: &str, ns: &str, app_type: AppType) -> Option<ConfigMap> {
    let data: BTreeMap<String, String> = match app_type {
        AppType::Mysql => BTreeMap::from([
            (
                "primary.cnf".into(),
                "[mysqld]\nlog-bin=mysql-bin\nbinlog_format=ROW\ngtid_mode=ON\nenforce_gtid_consistency=ON\n".into(),
            ),
            (
                "replica.cnf".into(),
                "[mysqld]\nsuper-read-only=ON\ngtid_mode=ON\nenforce_gtid_consistency=ON\n".into(),
            ),
            (
                "init.sh".into(),
                format!(
                    "#!/bin/bash\nset -e\n[[ $(hostname) =~ -([0-9]+)$ ]] || exit 1\nord=${{BASH_REMATCH[1]}}\necho \"[mysqld]\\nserver-id=$((100 + ord))\" > /etc/mysql/conf.d/server-id.cnf\nif [[ $ord -eq 0 ]]; then cp {dir}/primary.cnf /etc/mysql/conf.d/; else cp {dir}/replica.cnf /etc/mysql/conf.d/; fi\n",
                    dir = REPLICATION_MOUNT
                ),
            ),
            (
                "post-start.sh".into(),
                format!(
                    "#!/bin/bash\n[[ $(hostname) =~ -([0-9]+)$ ]] || exit 0\n[[ ${{BASH_REMATCH[1]}} -eq 0 ]] && exit 0\nuntil mysqladmin ping -h {app}-0.{app} --silent; do sleep 2; done\nmysql -uroot -p\"$MYSQL_ROOT_PASSWORD\" -e \"CHANGE REPLICATION SOURCE TO SOURCE_HOST='{app}-0.{app}', SOURCE_USER='root', SOURCE_PASSWORD='$MYSQL_ROOT_PASSWORD', SOURCE_AUTO_POSITION=1; START REPLICA;\"\n",
                    app = app
                ),
            ),
        ]),
        AppType::Postgresql => BTreeMap::from([
            (
                "primary.conf".into(),
                "wal_level = replica\nmax_wal_senders = 10\nhot_standby = on\n".into(),
            ),
            ("replica.conf".into(), "hot_standby = on\n".into()),
            (
                "init.sh".into(),
                format!(
                    "#!/bin/bash\nset -e\n[[ $(hostname) =~ -([0-9]+)$ ]] || exit 1\nif [[ ${{BASH_REMATCH[1]}} -ne 0 && ! -s \"$PGDATA/PG_VERSION\" ]]; then\n  PGPASSWORD=\"$POSTGRES_PASSWORD\" pg_basebackup -h {app}-0.{app} -U postgres -D \"$PGDATA\" -R -X stream\nfi\n",
                    app = app
                ),
            ),
        ]),
        _ => return None,
    };
    Some(ConfigMap {
        metadata: meta(&replication_config_name(app), ns, Some(app_labels(app))),
        data: Some(data),
        ..Default::default()
    })
}

/// Inputs for the StatefulSet.
pub struct WorkloadSpec<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub app_type: AppType,
    pub replicas: i32,
    pub image: &'a str,
    pub port: i32,
    pub storage_class: Option<&'a str>,
    pub storage_size: &'a str,
    pub database: Option<&'a str>,
    pub node_selector: Option<(String, String)>,
    pub replication: bool,
}

pub fn stateful_set(w: &WorkloadSpec<'_>) -> StatefulSet {
    let ty = w.app_type.as_str();
    let mut labels = app_labels(w.name);
    labels.insert("app.kubernetes.io/name".into(), ty.into());
    let mut set_labels = labels.clone();
    set_labels.insert(MANAGED_BY_LABEL.into(), MANAGED_BY.into());

    let mut mounts = vec![VolumeMount {
        name: DATA_VOLUME.into(),
        mount_path: w.app_type.mount_path().into(),
        ..Default::default()
    }];
    let mut volumes = None;
    if w.replication {
        mounts.push(VolumeMount {
            name: REPLICATION_VOLUME.into(),
            mount_path: REPLICATION_MOUNT.into(),
            read_only: Some(true),
            ..Default::default()
        });
        volumes = Some(vec![Volume {
            name: REPLICATION_VOLUME.into(),
            config_map: Some(ConfigMapVolumeSource {
                name: replication_config_name(w.name),
                default_mode: Some(0o755),
                ..Default::default()
            }),
            ..Default::default()
        }]);
    }

    let container = Container {
        name: ty.into(),
        image: Some(w.image.into()),
        ports: Some(vec![ContainerPort {
            container_port: w.port,
            name: Some(ty.into()),
            ..Default::default()
        }]),
        env: Some(w.app_type.env_vars(&secret_name(w.name), w.database)),
        volume_mounts: Some(mounts),
        ..Default::default()
    };

    let claim = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME.into()),
            labels: Some(app_labels(w.name)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".into()]),
            storage_class_name: w.storage_class.map(str::to_string),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(w.storage_size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    StatefulSet {
        metadata: meta(w.name, w.namespace, Some(set_labels)),
        spec: Some(StatefulSetSpec {
            service_name: w.name.into(),
            replicas: Some(w.replicas),
            selector: LabelSelector {
                match_labels: Some(app_labels(w.name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    node_selector: w
                        .node_selector
                        .clone()
                        .map(|(k, v)| BTreeMap::from([(k, v)])),
                    volumes,
                    ..Default::default()
                }),
            },
            volume_claim_templates: Some(vec![claim]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn headless_service(name: &str, ns: &str, app_type: AppType, port: i32) -> Service {
    Service {
        metadata: meta(name, ns, Some(app_labels(name))),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port,
                name: Some(app_type.as_str().into()),
                ..Default::default()
            }]),
            cluster_ip: Some("None".into()),
            selector: Some(app_labels(name)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn application(name: &str, ns: &str, labels: &BTreeMap<String, String>) -> Application {
    let mut app = Application::new(
        name,
        ApplicationSpec {
            application_selector: Some(ApplicationSelector::for_app(name)),
        },
    );
    app.metadata.namespace = Some(ns.to_string());
    if !labels.is_empty() {
        app.metadata.labels = Some(labels.clone());
    }
    app
}

pub fn job_scheduler(name: &str, ns: &str, cron: &str) -> JobScheduler {
    let mut s = JobScheduler::new(
        name,
        JobSchedulerSpec {
            cron_schedule: cron.to_string(),
        },
    );
    s.metadata.namespace = Some(ns.to_string());
    s
}

pub fn protection_plan(
    name: &str,
    ns: &str,
    schedule_name: &str,
    retention: &Retention,
    protection_type: Option<&str>,
) -> ProtectionPlan {
    let mut p = ProtectionPlan::new(
        name,
        ProtectionPlanSpec {
            schedule_name: Some(schedule_name.to_string()),
            protection_type: protection_type.map(str::to_string),
            retention_policy: retention.to_policy(),
            ..Default::default()
        },
    );
    p.metadata.namespace = Some(ns.to_string());
    p
}

pub fn app_protection_plan(name: &str, ns: &str, app: &str, plan: &str) -> AppProtectionPlan {
    let mut link = AppProtectionPlan::new(
        name,
        AppProtectionPlanSpec {
            application_name: app.to_string(),
            protection_plan_names: vec![plan.to_string()],
        },
    );
    link.metadata.namespace = Some(ns.to_string());
    link
}
