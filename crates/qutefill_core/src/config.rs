use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PICKER: &str = "rofi -dmenu -i -p credentials";
pub const DEFAULT_TERMINAL: &str = "xterm";
pub const DEFAULT_STORE: &str = "rbw";
pub const DEFAULT_IO_ENCODING: &str = "utf-8";

pub const CONFIG_FILENAME: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "QUTEFILL_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FillConfig {
    #[serde(default)]
    pub fill: FillSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FillSection {
    pub picker: Option<String>,
    pub terminal: Option<String>,
    pub store: Option<String>,
    pub folder: Option<String>,
    pub insert_mode: Option<bool>,
    pub io_encoding: Option<String>,
}

/// Load and parse a FillConfig from a TOML file. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<FillConfig> {
    if !config_path.exists() {
        return Ok(FillConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: FillConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Resolve the config file location: --config flag > $QUTEFILL_CONFIG > user config dir.
pub fn resolve_config_path(flag: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    ProjectDirs::from("", "", "qutefill").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    #[default]
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillTarget {
    #[default]
    Both,
    UsernameOnly,
    PasswordOnly,
}

impl FillTarget {
    pub fn from_flags(username_only: bool, password_only: bool) -> Result<Self> {
        match (username_only, password_only) {
            (true, true) => bail!("--username-only and --password-only are mutually exclusive"),
            (true, false) => Ok(Self::UsernameOnly),
            (false, true) => Ok(Self::PasswordOnly),
            (false, false) => Ok(Self::Both),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "username+password",
            Self::UsernameOnly => "username",
            Self::PasswordOnly => "password",
        }
    }
}

/// Everything the components need for one invocation. Built once at
/// startup, read-only afterwards, passed by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    pub url: String,
    pub folder: Option<String>,
    pub picker: String,
    pub terminal: String,
    pub store: String,
    pub io_encoding: String,
    pub insert_mode: bool,
    pub fill: FillTarget,
    pub sources: SettingsSources,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsSources {
    pub folder: ValueSource,
    pub picker: ValueSource,
    pub terminal: ValueSource,
    pub store: ValueSource,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub url: Option<String>,
    pub folder: Option<String>,
    pub picker: Option<String>,
    pub terminal: Option<String>,
    pub store: Option<String>,
    pub io_encoding: Option<String>,
    pub no_insert_mode: bool,
    pub username_only: bool,
    pub password_only: bool,
}

impl Settings {
    /// Resolve each value as flag > env > config file > built-in default.
    pub fn resolve(overrides: &SettingsOverrides, config: &FillConfig) -> Result<Self> {
        let url = normalize(overrides.url.clone())
            .ok_or_else(|| anyhow!("no target URL: pass one as an argument or set QUTE_URL"))?;
        let (folder, folder_source) = resolve_optional(
            overrides.folder.clone(),
            "QUTEFILL_FOLDER",
            config.fill.folder.as_deref(),
        );
        let (picker, picker_source) = resolve_required(
            overrides.picker.clone(),
            "QUTEFILL_PICKER",
            config.fill.picker.as_deref(),
            DEFAULT_PICKER,
        );
        let (terminal, terminal_source) = resolve_required(
            overrides.terminal.clone(),
            "QUTEFILL_TERMINAL",
            config.fill.terminal.as_deref(),
            DEFAULT_TERMINAL,
        );
        let (store, store_source) = resolve_required(
            overrides.store.clone(),
            "QUTEFILL_STORE",
            config.fill.store.as_deref(),
            DEFAULT_STORE,
        );
        let io_encoding = validate_io_encoding(
            normalize(overrides.io_encoding.clone())
                .as_deref()
                .or(config.fill.io_encoding.as_deref())
                .unwrap_or(DEFAULT_IO_ENCODING),
        )?;
        let insert_mode = if overrides.no_insert_mode {
            false
        } else {
            config.fill.insert_mode.unwrap_or(true)
        };
        let fill = FillTarget::from_flags(overrides.username_only, overrides.password_only)?;

        Ok(Self {
            url,
            folder,
            picker,
            terminal,
            store,
            io_encoding,
            insert_mode,
            fill,
            sources: SettingsSources {
                folder: folder_source,
                picker: picker_source,
                terminal: terminal_source,
                store: store_source,
            },
        })
    }

    /// Resolved values and their provenance. Never includes credentials
    /// or store output.
    pub fn diagnostics(&self) -> String {
        [
            format!("url: {}", self.url),
            format!(
                "folder: {} ({})",
                self.folder.as_deref().unwrap_or("<none>"),
                self.sources.folder.as_str()
            ),
            format!("picker: {} ({})", self.picker, self.sources.picker.as_str()),
            format!(
                "terminal: {} ({})",
                self.terminal,
                self.sources.terminal.as_str()
            ),
            format!("store: {} ({})", self.store, self.sources.store.as_str()),
            format!("io_encoding: {}", self.io_encoding),
            format!("insert_mode: {}", self.insert_mode),
            format!("fill: {}", self.fill.as_str()),
        ]
        .join("\n")
    }
}

/// Only UTF-8 labels are accepted; the flag pins the subprocess I/O contract.
pub fn validate_io_encoding(label: &str) -> Result<String> {
    if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
        return Ok(DEFAULT_IO_ENCODING.to_string());
    }
    bail!("unsupported io encoding: {label} (expected utf-8)")
}

pub fn env_value(key: &str) -> Option<String> {
    normalize(env::var(key).ok())
}

fn normalize(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn resolve_required(
    flag: Option<String>,
    env_key: &str,
    config: Option<&str>,
    default: &str,
) -> (String, ValueSource) {
    if let Some(value) = normalize(flag) {
        return (value, ValueSource::Flag);
    }
    if let Some(value) = env_value(env_key) {
        return (value, ValueSource::Env);
    }
    if let Some(value) = normalize(config.map(str::to_string)) {
        return (value, ValueSource::Config);
    }
    (default.to_string(), ValueSource::Default)
}

fn resolve_optional(
    flag: Option<String>,
    env_key: &str,
    config: Option<&str>,
) -> (Option<String>, ValueSource) {
    if let Some(value) = normalize(flag) {
        return (Some(value), ValueSource::Flag);
    }
    if let Some(value) = env_value(env_key) {
        return (Some(value), ValueSource::Env);
    }
    if let Some(value) = normalize(config.map(str::to_string)) {
        return (Some(value), ValueSource::Config);
    }
    (None, ValueSource::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn overrides_with_url() -> SettingsOverrides {
        SettingsOverrides {
            url: Some("https://example.com".to_string()),
            ..SettingsOverrides::default()
        }
    }

    #[test]
    fn default_config_is_empty() {
        let config = FillConfig::default();
        assert!(config.fill.picker.is_none());
        assert!(config.fill.folder.is_none());
        assert!(config.fill.insert_mode.is_none());
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, FillConfig::default());
    }

    #[test]
    fn load_config_parses_fill_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[fill]
picker = "fzf"
terminal = "alacritty"
store = "rbw"
folder = "work"
insert_mode = false
io_encoding = "utf-8"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.fill.picker.as_deref(), Some("fzf"));
        assert_eq!(config.fill.terminal.as_deref(), Some("alacritty"));
        assert_eq!(config.fill.folder.as_deref(), Some("work"));
        assert_eq!(config.fill.insert_mode, Some(false));
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[other]\nkey = \"value\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.fill.picker.is_none());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[fill\npicker = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn resolve_requires_a_url() {
        let error = Settings::resolve(&SettingsOverrides::default(), &FillConfig::default())
            .expect_err("must fail");
        assert!(error.to_string().contains("no target URL"));
    }

    #[test]
    fn resolve_falls_back_to_defaults() {
        let settings =
            Settings::resolve(&overrides_with_url(), &FillConfig::default()).expect("resolve");
        assert_eq!(settings.picker, DEFAULT_PICKER);
        assert_eq!(settings.terminal, DEFAULT_TERMINAL);
        assert_eq!(settings.store, DEFAULT_STORE);
        assert_eq!(settings.folder, None);
        assert!(settings.insert_mode);
        assert_eq!(settings.fill, FillTarget::Both);
        assert_eq!(settings.sources.picker, ValueSource::Default);
    }

    #[test]
    fn flag_beats_config() {
        let mut overrides = overrides_with_url();
        overrides.picker = Some("fzf".to_string());
        let config = FillConfig {
            fill: FillSection {
                picker: Some("dmenu".to_string()),
                ..FillSection::default()
            },
        };
        let settings = Settings::resolve(&overrides, &config).expect("resolve");
        assert_eq!(settings.picker, "fzf");
        assert_eq!(settings.sources.picker, ValueSource::Flag);
    }

    #[test]
    fn config_beats_default() {
        let config = FillConfig {
            fill: FillSection {
                terminal: Some("alacritty".to_string()),
                folder: Some("work".to_string()),
                insert_mode: Some(false),
                ..FillSection::default()
            },
        };
        let settings = Settings::resolve(&overrides_with_url(), &config).expect("resolve");
        assert_eq!(settings.terminal, "alacritty");
        assert_eq!(settings.sources.terminal, ValueSource::Config);
        assert_eq!(settings.folder.as_deref(), Some("work"));
        assert!(!settings.insert_mode);
    }

    #[test]
    fn no_insert_mode_flag_wins_over_config() {
        let mut overrides = overrides_with_url();
        overrides.no_insert_mode = true;
        let config = FillConfig {
            fill: FillSection {
                insert_mode: Some(true),
                ..FillSection::default()
            },
        };
        let settings = Settings::resolve(&overrides, &config).expect("resolve");
        assert!(!settings.insert_mode);
    }

    #[test]
    fn fill_target_flags_are_exclusive() {
        assert_eq!(
            FillTarget::from_flags(true, false).expect("username"),
            FillTarget::UsernameOnly
        );
        assert_eq!(
            FillTarget::from_flags(false, true).expect("password"),
            FillTarget::PasswordOnly
        );
        assert!(FillTarget::from_flags(true, true).is_err());
    }

    #[test]
    fn io_encoding_accepts_utf8_labels_only() {
        assert_eq!(validate_io_encoding("utf-8").expect("utf-8"), "utf-8");
        assert_eq!(validate_io_encoding("UTF8").expect("utf8"), "utf-8");
        let error = validate_io_encoding("latin-1").expect_err("must fail");
        assert!(error.to_string().contains("unsupported io encoding"));
    }

    #[test]
    fn diagnostics_lists_values_and_sources() {
        let settings =
            Settings::resolve(&overrides_with_url(), &FillConfig::default()).expect("resolve");
        let report = settings.diagnostics();
        assert!(report.contains("url: https://example.com"));
        assert!(report.contains("picker: "));
        assert!(report.contains("(default)"));
        assert!(report.contains("fill: username+password"));
    }
}
