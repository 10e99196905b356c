//! Optional cluster config file given with `--conf-file`.
//!
//! The file is either a mapping with kebab-case keys:
//!
//! ```yaml
//! name: nightly-etl
//! num-nodes: 4
//! market: SPOT
//! bid-price: "0.25"
//! tags:
//!   team: data
//! configurations:
//!   - Classification: spark-defaults
//!     Properties:
//!       spark.dynamicAllocation.enabled: "false"
//! bootstrap-actions:
//!   - Name: install deps
//!     ScriptBootstrapAction:
//!       Path: s3://mybucket/bootstrap.sh
//! ```
//!
//! or a bare list of EMR configuration objects, which is read as
//! `configurations`. YAML is used for `.yaml`/`.yml` files, JSON otherwise.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{BootstrapAction, Configuration, Market};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub master: Option<String>,
    pub slave: Option<String>,
    pub num_nodes: Option<i32>,
    pub ec2_key: Option<String>,
    pub ec2_subnet_id: Option<String>,
    pub keep_alive: Option<bool>,
    pub market: Option<Market>,
    pub bid_price: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub applications: Option<Vec<String>>,
    #[serde(default)]
    pub bootstrap_actions: Vec<BootstrapAction>,
    #[serde(default)]
    pub configurations: Vec<Configuration>,
    pub job_flow_role: Option<String>,
    pub service_role: Option<String>,
    pub log_uri: Option<String>,
    pub visible_to_all_users: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        debug!(path = %path.display(), yaml = is_yaml, "loading cluster config file");
        let parsed = if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        };
        parsed.map_err(|message| ConfigError::ParseFile {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let file = if value.is_array() {
            serde_json::from_value(value).map(Self::with_configurations)
        } else {
            serde_json::from_value(value)
        };
        file.map_err(|e| e.to_string())
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let file = if value.is_sequence() {
            serde_yaml::from_value(value).map(Self::with_configurations)
        } else {
            serde_yaml::from_value(value)
        };
        file.map_err(|e| e.to_string())
    }

    fn with_configurations(configurations: Vec<Configuration>) -> Self {
        ConfigFile {
            configurations,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bare_configuration_list() {
        let file = ConfigFile::from_json(
            r#"[{"Classification": "spark-env",
                 "Configurations": [{"Classification": "export",
                                     "Properties": {"PYSPARK_PYTHON": "python3"}}]}]"#,
        )
        .unwrap();
        assert_eq!(file.configurations.len(), 1);
        let nested = &file.configurations[0].configurations[0];
        assert_eq!(nested.classification.as_deref(), Some("export"));
        assert_eq!(nested.properties["PYSPARK_PYTHON"], "python3");
        assert!(file.master.is_none());
    }

    #[test]
    fn settings_mapping() {
        let file = ConfigFile::from_json(
            r#"{"num-nodes": 4, "market": "SPOT", "bid-price": "0.25",
                "tags": {"team": "data"}, "keep-alive": true}"#,
        )
        .unwrap();
        assert_eq!(file.num_nodes, Some(4));
        assert_eq!(file.market, Some(Market::Spot));
        assert_eq!(file.bid_price.as_deref(), Some("0.25"));
        assert_eq!(file.tags["team"], "data");
        assert_eq!(file.keep_alive, Some(true));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConfigFile::from_json(r#"{"num-node": 4}"#).unwrap_err();
        assert!(err.contains("unknown field"), "{err}");
        assert!(err.contains("num-node"), "{err}");

        let err = ConfigFile::from_yaml("master: m5.large\nslaves: r5.xlarge\n").unwrap_err();
        assert!(err.contains("unknown field"), "{err}");
        assert!(err.contains("slaves"), "{err}");
    }

    #[test]
    fn bad_configuration_entry_names_the_field() {
        let err = ConfigFile::from_json(r#"[{"Classification": "spark", "Properties": 3}]"#)
            .unwrap_err();
        assert!(!err.contains("did not match any variant"), "{err}");
        assert!(err.contains("invalid type"), "{err}");
    }

    #[test]
    fn load_yaml_by_extension() {
        let mut tmp = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            tmp,
            "master: m5.xlarge\nbootstrap-actions:\n  - Name: deps\n    ScriptBootstrapAction:\n\
             \x20     Path: s3://b/boot.sh\n      Args: [\"-x\"]"
        )
        .unwrap();
        let file = ConfigFile::load(tmp.path()).unwrap();
        assert_eq!(file.master.as_deref(), Some("m5.xlarge"));
        assert_eq!(file.bootstrap_actions[0].script_bootstrap_action.path, "s3://b/boot.sh");
        assert_eq!(file.bootstrap_actions[0].script_bootstrap_action.args, ["-x"]);
    }

    #[test]
    fn load_errors() {
        let missing = ConfigFile::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadFile { .. }));

        let mut tmp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(tmp, "{{ not json").unwrap();
        let invalid = ConfigFile::load(tmp.path()).unwrap_err();
        assert!(matches!(invalid, ConfigError::ParseFile { .. }));
    }
}
