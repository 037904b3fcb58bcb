/// CLI configuration
use crate::error::{CliError, Result};
use mastering_audio::EXPORT_FILE_NAME;
use mastering_core::{BitcrusherSettings, EffectsEnabled, EqSettings, MasteringSettings, VolumeLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "mastering.toml";

/// Prefix of environment overrides, e.g. `MASTERING_EQ__BASS=3`
pub const ENV_PREFIX: &str = "MASTERING";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub eq: EqSettings,

    #[serde(default)]
    pub effects: EffectsEnabled,

    #[serde(default)]
    pub bitcrusher: BitcrusherSettings,

    #[serde(default)]
    pub volume: VolumeLevel,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_name() -> String {
    EXPORT_FILE_NAME.to_string()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            file_name: default_file_name(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default `mastering.toml` is only read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!("{} does not exist", path.display())));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (prefixed with MASTERING_)
        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = settings.build()?.try_deserialize()?;
        config.validate();
        Ok(config)
    }

    /// Clamp every mastering value to its supported range
    pub fn validate(&mut self) {
        let settings = self.mastering().validated();
        self.set_mastering(settings);
    }

    /// Mastering settings snapshot
    pub fn mastering(&self) -> MasteringSettings {
        MasteringSettings {
            eq: self.eq,
            effects: self.effects,
            bitcrusher: self.bitcrusher,
            volume: self.volume,
        }
    }

    /// Replace the mastering part of the configuration
    pub fn set_mastering(&mut self, settings: MasteringSettings) {
        self.eq = settings.eq;
        self.effects = settings.effects;
        self.bitcrusher = settings.bitcrusher;
        self.volume = settings.volume;
    }

    /// Where an export goes when no output path is given
    pub fn default_output_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_neutral() {
        let config = CliConfig::default();
        assert_eq!(config.mastering(), MasteringSettings::default());
        assert_eq!(config.default_output_path(), PathBuf::from("./mastered-audio.wav"));
    }

    #[test]
    fn loads_and_clamps_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
volume = 3.5

[eq]
bass = 4.0
treble = -45.0

[effects]
reverb = true

[bitcrusher]
bit_depth = 4
frequency_reduction = 40

[output]
directory = "/tmp/renders"
"#
        )
        .unwrap();

        let config = CliConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.volume.gain(), 2.0);
        assert_eq!(config.eq.bass, 4.0);
        assert_eq!(config.eq.treble, -30.0);
        assert!(config.effects.reverb);
        assert!(!config.effects.compressor);
        assert_eq!(config.bitcrusher.bit_depth, 4);
        assert_eq!(config.bitcrusher.frequency_reduction, 20);
        assert_eq!(config.default_output_path(), PathBuf::from("/tmp/renders/mastered-audio.wav"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = CliConfig::load(Some(Path::new("/nonexistent/mastering.toml")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
