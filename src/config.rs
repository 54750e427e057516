use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::log::SEGMENT_SIZE_LIMIT;

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    /// directory holding every partition's segment files
    pub data_dir: String,
}

/// Represents the configuration for the partition logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// The size of each log segment, in bytes.
    #[serde(default = "default_segment_size")]
    pub segment_size: u64,
}

fn default_segment_size() -> u64 {
    SEGMENT_SIZE_LIMIT
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            segment_size: SEGMENT_SIZE_LIMIT,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl StoreConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> StoreResult<StoreConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(StoreError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;

        let store_config: StoreConfig = config.try_deserialize()?;

        Ok(store_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_log_section_falls_back_to_default() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[general]\ndata_dir = \"/tmp/granite\"").unwrap();

        let config = StoreConfig::set_up_config(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/tmp/granite");
        assert_eq!(config.log.segment_size, SEGMENT_SIZE_LIMIT);
    }

    #[test]
    fn test_explicit_segment_size() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[general]\ndata_dir = \"/tmp/granite\"\n\n[log]\nsegment_size = 4096"
        )
        .unwrap();

        let config = StoreConfig::set_up_config(file.path()).unwrap();
        assert_eq!(config.log.segment_size, 4096);
    }
}
