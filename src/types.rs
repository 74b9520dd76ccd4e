use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Source files of a task, keyed by relative path with `/` separators.
pub type FileTree = BTreeMap<String, String>;

/// Dependency name to version constraint, in the order the input listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dependencies(Vec<(String, String)>);

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a dependency. Returns `false` (and keeps the original) if the
    /// name is already present.
    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push((name, version.into()));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object with the same key order, as written into the manifest.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(n, v)| (n.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Dependencies {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut deps = Dependencies::new();
        for (n, v) in iter {
            deps.insert(n, v);
        }
        deps
    }
}

impl Serialize for Dependencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, version) in &self.0 {
            map.serialize_entry(name, version)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Dependencies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DependenciesVisitor;

        impl<'de> Visitor<'de> for DependenciesVisitor {
            type Value = Dependencies;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of dependency names to version constraints")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut deps = Dependencies::new();
                while let Some((name, version)) = access.next_entry::<String, String>()? {
                    if !deps.insert(name.clone(), version) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate dependency '{name}'"
                        )));
                    }
                }
                Ok(deps)
            }
        }

        deserializer.deserialize_map(DependenciesVisitor)
    }
}

/// What to benchmark: one task, many memory configurations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkInput {
    pub iterations: u32,
    pub memory: Vec<String>,
    #[serde(default)]
    pub bundle: bool,
    /// Dependencies imported after the startup marker, in this order.
    #[serde(default)]
    pub lazy: Vec<String>,
    pub dependencies: Dependencies,
}

impl BenchmarkInput {
    pub fn is_lazy(&self, name: &str) -> bool {
        self.lazy.iter().any(|l| l == name)
    }

    pub fn has_lazy(&self) -> bool {
        !self.lazy.is_empty()
    }
}

/// One memory limit under which a batch of iterations runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// The value as written in the input, echoed in emitted records.
    pub label: String,
    pub mb: u32,
}

/// Checkpoints of the provisioning steps. Each field is set once, the first
/// time its step succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Unprovisioned,
    TaskCreated,
    VersionPublished,
    BuildComplete,
}

impl ProvisioningState {
    pub fn stage(&self) -> ProvisionStage {
        match (&self.task_id, &self.version_id, &self.build_id) {
            (None, _, _) => ProvisionStage::Unprovisioned,
            (Some(_), None, _) => ProvisionStage::TaskCreated,
            (Some(_), Some(_), None) => ProvisionStage::VersionPublished,
            (Some(_), Some(_), Some(_)) => ProvisionStage::BuildComplete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.task_id.is_none() && self.version_id.is_none() && self.build_id.is_none()
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionStage::Unprovisioned => "unprovisioned",
            ProvisionStage::TaskCreated => "task created",
            ProvisionStage::VersionPublished => "version published",
            ProvisionStage::BuildComplete => "build complete",
        };
        f.write_str(s)
    }
}

/// Identifiers of a fully provisioned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedTask {
    pub task_id: String,
    pub version_id: String,
    pub build_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub name: String,
    pub input: serde_json::Value,
    pub memory_limit_mb: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub run_id: String,
    pub log: String,
}

/// Timings reported by one run, in milliseconds since process start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunTimings {
    pub startup: f64,
    pub dynamic_imports: Option<f64>,
}

/// Summary of one configuration. Field names are read by downstream tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub memory_mbs: String,
    pub iterations: u32,
    pub all_startup_times: Vec<f64>,
    pub dependencies_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyn_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyn_median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyn_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyn_max: Option<f64>,
    pub bundled: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_keep_document_order() {
        let input: BenchmarkInput = toml::from_str(
            r#"
            iterations = 3
            memory = ["128"]

            [dependencies]
            zod = "^3.22.0"
            axios = "*"
            lodash = "4.17.21"
            "#,
        )
        .unwrap();
        let names: Vec<&str> = input.dependencies.names().collect();
        assert_eq!(names, vec!["zod", "axios", "lodash"]);
    }

    #[test]
    fn dependencies_to_json_preserves_order() {
        let deps: Dependencies = [("b", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(deps.to_json().to_string(), r#"{"b":"1","a":"2"}"#);
    }

    #[test]
    fn dependencies_insert_rejects_duplicates() {
        let mut deps = Dependencies::new();
        assert!(deps.insert("a", "1"));
        assert!(!deps.insert("a", "2"));
        assert_eq!(deps.iter().collect::<Vec<_>>(), vec![("a", "1")]);
    }

    #[test]
    fn unknown_input_keys_rejected() {
        let result: Result<BenchmarkInput, _> = toml::from_str(
            r#"
            iterations = 1
            memory = ["128"]
            bundling = true
            [dependencies]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn stage_follows_checkpoints() {
        let mut state = ProvisioningState::default();
        assert_eq!(state.stage(), ProvisionStage::Unprovisioned);
        state.task_id = Some("t".into());
        assert_eq!(state.stage(), ProvisionStage::TaskCreated);
        state.version_id = Some("v".into());
        assert_eq!(state.stage(), ProvisionStage::VersionPublished);
        state.build_id = Some("b".into());
        assert_eq!(state.stage(), ProvisionStage::BuildComplete);
    }

    #[test]
    fn state_serializes_camel_case_and_omits_unset() {
        let state = ProvisioningState {
            task_id: Some("task_1".into()),
            version_id: None,
            build_id: None,
        };
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"taskId":"task_1"}"#
        );
    }

    #[test]
    fn record_omits_dynamic_fields_when_absent() {
        let record = AggregateRecord {
            mean: 15.0,
            median: 15.0,
            min: 10.0,
            max: 20.0,
            memory_mbs: "128".into(),
            iterations: 2,
            all_startup_times: vec![10.0, 20.0],
            dependencies_json: "{}".into(),
            dyn_mean: None,
            dyn_median: None,
            dyn_min: None,
            dyn_max: None,
            bundled: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["memoryMbs"], "128");
        assert_eq!(value["allStartupTimes"], serde_json::json!([10.0, 20.0]));
        assert!(value.get("dynMean").is_none());
        assert!(value.get("dependenciesJson").is_some());
    }
}
