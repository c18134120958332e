//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn sections(&self) -> Vec<String> {
        self.config.sections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_strategy_file() {
        let content = r#"
[strategy]
name = Dip Exit
ticker = SPY
buy_threshold = -2.5

[rule.1]
larger_field = Close
larger_offset = -12
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("Dip Exit".to_string())
        );
        assert_eq!(adapter.get_string("strategy", "buy_threshold"), Some("-2.5".to_string()));
        assert_eq!(adapter.get_string("rule.1", "larger_offset"), Some("-12".to_string()));
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nlookback_days = 365\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn values_are_returned_raw() {
        let adapter = FileConfigAdapter::from_string("[optimize]\nn_calls = abc\n").unwrap();
        assert_eq!(adapter.get_string("optimize", "n_calls"), Some("abc".to_string()));
    }

    #[test]
    fn sections_are_lowercased() {
        let adapter =
            FileConfigAdapter::from_string("[Strategy]\nname = x\n[Rule.2]\nweight = 1\n").unwrap();
        let mut sections = adapter.sections();
        sections.sort();
        assert_eq!(sections, vec!["rule.2".to_string(), "strategy".to_string()]);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\ndata_dir = /data/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "data_dir"),
            Some("/data/prices".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/path/config.ini").is_err());
    }
}
