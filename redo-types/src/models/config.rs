use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ingestion_types::OracleConfig;
use crate::errors::types::ConfigError;

#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
/// The configuration for the app
pub struct Config {
    /// name of the app
    pub app_name: String,
    /// connection to the source database
    pub connection: OracleConfig,
    /// log filter directive, overrides `RUST_LOG` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir::TempDir;

    use super::*;
    use crate::models::ingestion_types::{LogMinerConfig, ReadPosition};

    const YAML: &str = r#"
app_name: orders
connection:
  user: C##REDO
  password: secret
  host: localhost
  port: 1521
  sid: ORCLCDB
  log_miner:
    read_position: Scn
    start_scn: 1234
    range_quiescence_ms: 0
"#;

    #[test]
    fn test_parse_config_with_defaults() {
        let config = Config::from_yaml_str(YAML).unwrap();
        assert_eq!(config.app_name, "orders");
        assert_eq!(config.connection.connect_string(), "localhost:1521/ORCLCDB");
        let log_miner = &config.connection.log_miner;
        assert_eq!(log_miner.read_position, ReadPosition::Scn);
        assert_eq!(log_miner.start_scn, Some(1234));
        assert_eq!(log_miner.range_quiescence_ms, 0);
        assert_eq!(log_miner.fetch_size, LogMinerConfig::default().fetch_size);
        assert_eq!(log_miner.rollback_search_base_step, 5000);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = YAML.replace("range_quiescence_ms", "range_quiesence_ms");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));

        // The engine always mines from the root container.
        let yaml = YAML.replace("  sid: ORCLCDB\n", "  sid: ORCLCDB\n  pdb: ORCLPDB1\n");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new("redo-config").unwrap();
        let path = dir.path().join("redo.yaml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(YAML.as_bytes())
            .unwrap();
        assert_eq!(Config::load(&path).unwrap().app_name, "orders");
        assert!(matches!(
            Config::load(dir.path().join("missing.yaml")),
            Err(ConfigError::Read(..))
        ));
    }
}
