use crate::config::RunConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

/// Default location of the run configuration.
pub const DEFAULT_CONFIG_PATH: &str = "config/Backtest.toml";

/// Prefix for environment overrides, e.g. `BETLAB_MIN_EDGE=0.03` or
/// `BETLAB_RISK__STOP_LOSS_FRACTION=0.4`.
pub const ENV_PREFIX: &str = "BETLAB_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a run configuration by merging the TOML file, environment
    /// variables, and a JSON file with the same stem (if present).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read, parsed, or fail validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        let config: RunConfig = Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load run configuration from {}", path.display()))?;

        config.validate()?;
        tracing::debug!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    /// Loads a run configuration with a profile overlay
    /// (`<stem>.<profile>.toml` next to the base file).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read, parsed, or fail validation.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<RunConfig> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Backtest");
        let overlay = path.with_file_name(format!("{stem}.{profile}.toml"));

        let config: RunConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Toml::file(&overlay))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
            .extract()
            .with_context(|| {
                format!(
                    "Failed to load run configuration from {} with profile '{profile}'",
                    path.display()
                )
            })?;

        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StakeMode;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const BASE: &str = r#"
start_date = "2024-03-01"
end_date = "2024-03-31"
models = ["xgb", "lstm"]
prop_types = ["points", "rebounds"]
min_confidence = 0.55
min_edge = 0.03
max_risk_score = 0.7
initial_bankroll = 10000

[stake]
mode = "kelly"

[risk]
max_position_fraction = 0.05
stop_loss_fraction = 0.5
max_drawdown_fraction = 0.25
"#;

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "Backtest.toml", BASE);

        let config = ConfigLoader::load_from(&path).unwrap();

        assert_eq!(config.models, vec!["xgb", "lstm"]);
        assert_eq!(config.initial_bankroll, dec!(10000));
        assert_eq!(config.stake, StakeMode::Kelly);
        assert_eq!(config.risk.max_drawdown_fraction, dec!(0.25));
        assert!((config.min_edge - 0.03).abs() < f64::EPSILON);
        assert_eq!(config.worker_count, 4);
    }

    #[test]
    fn profile_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "Backtest.toml", BASE);
        write_file(
            dir.path(),
            "Backtest.aggressive.toml",
            "min_edge = 0.01\n[stake]\nmode = \"fixed\"\namount = 250\n",
        );

        let config = ConfigLoader::load_with_profile(&path, "aggressive").unwrap();

        assert!((config.min_edge - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.stake, StakeMode::Fixed { amount: dec!(250) });
        assert_eq!(config.models, vec!["xgb", "lstm"]);
    }

    #[test]
    fn invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let contents = BASE.replace("max_position_fraction = 0.05", "max_position_fraction = 1.5");
        let path = write_file(dir.path(), "Backtest.toml", &contents);

        let err = ConfigLoader::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_position_fraction"), "{err}");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "Backtest.toml", "models = [\"xgb\"]\n");

        assert!(ConfigLoader::load_from(&path).is_err());
    }
}
