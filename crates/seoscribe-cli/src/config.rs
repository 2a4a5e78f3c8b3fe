//! Configuration file management for seoscribe.
//!
//! Provides a TOML-based config file at `~/.config/seoscribe/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use seoscribe_core::generation::AnthropicConfig;
use seoscribe_core::prompt::PromptSettings;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const MODEL_ENV: &str = "SEOSCRIBE_MODEL";
pub const OUTPUT_DIR_ENV: &str = "SEOSCRIBE_OUTPUT_DIR";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub generation: GenerationSection,
    pub export: ExportSection,
    pub server: ServerSection,
    pub prompts: PromptSettings,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Longest silence tolerated between streamed chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the seoscribe config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/seoscribe` or
/// `~/.config/seoscribe`, including on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("seoscribe");
    }
    home().join(".config").join("seoscribe")
}

/// Return the path to the seoscribe config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/Desktop/SEO Articles`
pub fn default_output_dir() -> PathBuf {
    home().join("Desktop").join("SEO Articles")
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home().join(rest),
        Err(_) => path,
    }
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file if there is one. A missing file is not an error,
/// a malformed one is.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    load_config_from(&path)
}

/// Serialize and write the config file to `path`, creating parent dirs as
/// needed. Sets file permissions to 0600 on Unix since the file may hold
/// an API key.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ScribeConfig {
    pub anthropic: AnthropicConfig,
    pub output_dir: PathBuf,
    pub bind: String,
    pub port: u16,
    pub prompts: PromptSettings,
}

impl ScribeConfig {
    /// Resolve configuration from the process environment and the config
    /// file.
    pub fn resolve(overrides: &CliOverrides) -> Result<Self> {
        let file = load_config()?;
        Self::resolve_with(file, overrides, |key| std::env::var(key).ok())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - API key: `ANTHROPIC_API_KEY` > `generation.api_key` > error
    /// - Model: `--model` > `SEOSCRIBE_MODEL` > `generation.model` > default
    /// - Output dir: `--output-dir` > `SEOSCRIBE_OUTPUT_DIR` > `export.output_dir`
    ///   > `~/Desktop/SEO Articles`
    /// - Bind/port: flags > `server.*` > `127.0.0.1:5000`
    pub fn resolve_with(
        file: ConfigFile,
        overrides: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let Some(api_key) = non_empty(API_KEY_ENV).or(file.generation.api_key) else {
            bail!(
                "Anthropic API key not found; set {API_KEY_ENV} or add generation.api_key to {}",
                config_path().display()
            );
        };

        let mut anthropic = AnthropicConfig::new(api_key);
        if let Some(model) = overrides
            .model
            .clone()
            .or_else(|| non_empty(MODEL_ENV))
            .or(file.generation.model)
        {
            anthropic.model = model;
        }
        if let Some(base_url) = file.generation.base_url {
            anthropic.base_url = base_url;
        }
        if let Some(secs) = file.generation.request_timeout_secs {
            anthropic.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.generation.idle_timeout_secs {
            anthropic.idle_timeout = Duration::from_secs(secs);
        }

        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| non_empty(OUTPUT_DIR_ENV).map(PathBuf::from))
            .or(file.export.output_dir)
            .map(expand_home)
            .unwrap_or_else(default_output_dir);

        Ok(Self {
            anthropic,
            output_dir,
            bind: overrides
                .bind
                .clone()
                .or(file.server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: overrides.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            prompts: file.prompts,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file_with_everything() -> ConfigFile {
        toml::from_str(
            r#"
[generation]
api_key = "file-key"
model = "file-model"
base_url = "http://localhost:9999/v1"
request_timeout_secs = 30
idle_timeout_secs = 5

[export]
output_dir = "/srv/articles"

[server]
bind = "0.0.0.0"
port = 8080

[prompts]
faq_count = 7
"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = ScribeConfig::resolve_with(
            ConfigFile::default(),
            &CliOverrides::default(),
            env_of(&[(API_KEY_ENV, "env-key")]),
        )
        .unwrap();

        assert_eq!(config.anthropic.api_key, "env-key");
        assert_eq!(config.anthropic.model, AnthropicConfig::DEFAULT_MODEL);
        assert_eq!(config.output_dir, default_output_dir());
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.prompts, PromptSettings::default());
    }

    #[test]
    fn config_file_values_are_used() {
        let config = ScribeConfig::resolve_with(
            file_with_everything(),
            &CliOverrides::default(),
            env_of(&[]),
        )
        .unwrap();

        assert_eq!(config.anthropic.api_key, "file-key");
        assert_eq!(config.anthropic.model, "file-model");
        assert_eq!(config.anthropic.base_url, "http://localhost:9999/v1");
        assert_eq!(config.anthropic.request_timeout, Duration::from_secs(30));
        assert_eq!(config.anthropic.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.output_dir, PathBuf::from("/srv/articles"));
        assert_eq!((config.bind.as_str(), config.port), ("0.0.0.0", 8080));
        assert_eq!(config.prompts.faq_count, 7);
        assert_eq!(config.prompts.word_count, PromptSettings::default().word_count);
    }

    #[test]
    fn env_overrides_config_file() {
        let config = ScribeConfig::resolve_with(
            file_with_everything(),
            &CliOverrides::default(),
            env_of(&[
                (API_KEY_ENV, "env-key"),
                (MODEL_ENV, "env-model"),
                (OUTPUT_DIR_ENV, "/tmp/env-out"),
            ]),
        )
        .unwrap();

        assert_eq!(config.anthropic.api_key, "env-key");
        assert_eq!(config.anthropic.model, "env-model");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/env-out"));
    }

    #[test]
    fn cli_flags_override_everything() {
        let overrides = CliOverrides {
            output_dir: Some(PathBuf::from("/tmp/cli-out")),
            model: Some("cli-model".to_string()),
            bind: Some("::1".to_string()),
            port: Some(7000),
        };
        let config = ScribeConfig::resolve_with(
            file_with_everything(),
            &overrides,
            env_of(&[(MODEL_ENV, "env-model"), (OUTPUT_DIR_ENV, "/tmp/env-out")]),
        )
        .unwrap();

        assert_eq!(config.anthropic.model, "cli-model");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/cli-out"));
        assert_eq!((config.bind.as_str(), config.port), ("::1", 7000));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = ScribeConfig::resolve_with(
            file_with_everything(),
            &CliOverrides::default(),
            env_of(&[(API_KEY_ENV, "  "), (MODEL_ENV, "")]),
        )
        .unwrap();
        assert_eq!(config.anthropic.api_key, "file-key");
        assert_eq!(config.anthropic.model, "file-model");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = ScribeConfig::resolve_with(
            ConfigFile::default(),
            &CliOverrides::default(),
            env_of(&[]),
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("API key not found"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn tilde_output_dir_is_expanded() {
        let file: ConfigFile = toml::from_str("[export]\noutput_dir = \"~/articles\"").unwrap();
        let config = ScribeConfig::resolve_with(
            file,
            &CliOverrides::default(),
            env_of(&[(API_KEY_ENV, "k")]),
        )
        .unwrap();
        assert_eq!(config.output_dir, home().join("articles"));
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("seoscribe").join("config.toml");

        let mut original = ConfigFile::default();
        original.generation.model = Some("claude-test".to_string());
        original.server.port = Some(5050);

        save_config_to(&original, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.generation.model.as_deref(), Some("claude-test"));
        assert_eq!(loaded.generation.api_key, None);
        assert_eq!(loaded.server.port, Some(5050));
        assert_eq!(loaded.prompts, PromptSettings::default());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&ConfigFile::default(), &path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn malformed_config_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("seoscribe/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
