//! Sound settings and asset paths (`audio.toml`)
//!
//! [`SoundConfig`] holds the user-facing switches and volumes the mixer reads
//! every tick. [`AudioPaths`] locates the sound bank and music tracks. Both
//! are stored together as [`AudioSettings`] in the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the settings document inside [`config_dir`]
pub const CONFIG_FILE: &str = "audio.toml";

/// Errors from reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// All persisted audio settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AudioSettings {
    /// Switches and volumes
    #[serde(default)]
    pub sound: SoundConfig,
    /// Asset locations
    #[serde(default)]
    pub paths: AudioPaths,
}

/// User sound settings.
///
/// Volumes are percentages (0-100). The mixer keeps its own copy and only
/// recomputes volume curves when a category volume changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Master switch (default: true)
    #[serde(default = "default_true")]
    pub master_enabled: bool,
    /// Master volume (default: 100)
    #[serde(default = "default_volume")]
    pub master_volume: u8,
    /// Sound effects switch (default: true)
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    /// Sound effects volume (default: 100)
    #[serde(default = "default_volume")]
    pub sound_volume: u8,
    /// Ride music volume (default: 100)
    #[serde(default = "default_volume")]
    pub ride_music_volume: u8,
    /// Output device name; the system default when unset
    #[serde(default)]
    pub device: Option<String>,
    /// Title sequence is showing; caps effect volume so music stays audible
    #[serde(skip)]
    pub title_sequence: bool,
}

/// Locations of sound assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPaths {
    /// Sound effect bank (default: `data/css1.dat`)
    #[serde(default = "default_sound_bank")]
    pub sound_bank: PathBuf,
    /// Music tracks, indexed by music id
    #[serde(default)]
    pub music: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}
fn default_volume() -> u8 {
    100
}
fn default_sound_bank() -> PathBuf {
    PathBuf::from("data").join("css1.dat")
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            master_enabled: default_true(),
            master_volume: default_volume(),
            sound_enabled: default_true(),
            sound_volume: default_volume(),
            ride_music_volume: default_volume(),
            device: None,
            title_sequence: false,
        }
    }
}

impl Default for AudioPaths {
    fn default() -> Self {
        Self {
            sound_bank: default_sound_bank(),
            music: Vec::new(),
        }
    }
}

impl SoundConfig {
    /// Whether the master gate lets any channel through
    pub fn master_audible(&self) -> bool {
        self.master_enabled && self.master_volume != 0
    }

    /// Master multiplier in 0.0-1.0; zero when the master switch is off
    pub fn master_gain(&self) -> f32 {
        if self.master_enabled {
            self.master_volume.min(100) as f32 / 100.0
        } else {
            0.0
        }
    }
}

/// Perceptual curve for a category volume percentage: `(v / 100) ^ (10 / 6)`.
pub fn volume_curve(percent: u8) -> f32 {
    (percent.min(100) as f32 / 100.0).powf(10.0 / 6.0)
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.parkaudio", "", "ParkAudio")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Read settings from `path`
pub fn load_from(path: &Path) -> Result<AudioSettings, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Write settings to `path`, creating parent directories
pub fn save_to(path: &Path, settings: &AudioSettings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Loads settings from the config directory, falling back to defaults.
pub fn load() -> AudioSettings {
    config_dir()
        .and_then(|dir| load_from(&dir.join(CONFIG_FILE)).ok())
        .unwrap_or_default()
}

/// Saves settings to the config directory.
pub fn save(settings: &AudioSettings) -> Result<(), ConfigError> {
    match config_dir() {
        Some(dir) => save_to(&dir.join(CONFIG_FILE), settings),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_sound_config_default() {
        let config = SoundConfig::default();
        assert!(config.master_enabled);
        assert!(config.sound_enabled);
        assert_eq!(config.master_volume, 100);
        assert_eq!(config.sound_volume, 100);
        assert_eq!(config.ride_music_volume, 100);
        assert!(config.device.is_none());
        assert!(!config.title_sequence);
    }

    #[test]
    fn test_paths_default() {
        let paths = AudioPaths::default();
        assert!(paths.sound_bank.ends_with("css1.dat"));
        assert!(paths.music.is_empty());
    }

    // =============================================================
    // TOML tests
    // =============================================================

    #[test]
    fn test_empty_toml_uses_defaults() {
        let settings: AudioSettings = toml::from_str("").unwrap();
        assert_eq!(settings, AudioSettings::default());
    }

    #[test]
    fn test_partial_toml() {
        let settings: AudioSettings = toml::from_str(
            r#"
            [sound]
            master_volume = 40
            sound_enabled = false

            [paths]
            music = ["music/fairground.wav", "music/waltz.wav"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.sound.master_volume, 40);
        assert!(!settings.sound.sound_enabled);
        assert_eq!(settings.sound.ride_music_volume, 100);
        assert_eq!(settings.paths.music.len(), 2);
        assert_eq!(settings.paths.sound_bank, default_sound_bank());
    }

    #[test]
    fn test_title_sequence_not_persisted() {
        let mut settings = AudioSettings::default();
        settings.sound.title_sequence = true;
        let text = toml::to_string_pretty(&settings).unwrap();
        assert!(!text.contains("title_sequence"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut settings = AudioSettings::default();
        settings.sound.sound_volume = 55;
        settings.sound.device = Some("Speakers".to_string());
        save_to(&path, &settings).unwrap();

        assert_eq!(load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[sound\nmaster_volume = ").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    // =============================================================
    // Gain tests
    // =============================================================

    #[test]
    fn test_volume_curve() {
        assert_eq!(volume_curve(0), 0.0);
        assert_eq!(volume_curve(100), 1.0);
        assert_eq!(volume_curve(250), 1.0);
        let half = volume_curve(50);
        assert!((half - 0.5f32.powf(10.0 / 6.0)).abs() < 1e-6);
        assert!(half < 0.5);
    }

    #[test]
    fn test_master_gain() {
        let mut config = SoundConfig::default();
        config.master_volume = 50;
        assert_eq!(config.master_gain(), 0.5);
        config.master_enabled = false;
        assert_eq!(config.master_gain(), 0.0);
        assert!(!config.master_audible());
    }
}
