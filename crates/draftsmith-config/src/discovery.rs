use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use draftsmith_utils::error::ConfigError;
use draftsmith_utils::types::ConfigSource;

use crate::{
    BlueprintsConfig, CliArgs, Config, Defaults, GenerationConfig, LlmConfig, RefinementConfig,
    RunsConfig, VerificationConfig,
};

/// Environment variable pointing at a directory holding a fallback `config.toml`
pub const HOME_ENV: &str = "DRAFTSMITH_HOME";
/// Environment override for `[llm] provider`
pub const PROVIDER_ENV: &str = "DRAFTSMITH_LLM_PROVIDER";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    generation: Option<GenerationConfig>,
    verification: Option<VerificationConfig>,
    refinement: Option<RefinementConfig>,
    blueprints: Option<BlueprintsConfig>,
    runs: Option<RunsConfig>,
    llm: Option<LlmConfig>,
}

/// Overwrite `slot` with `value` when present and record where it came from.
fn apply<T>(
    slot: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if value.is_some() {
        *slot = value;
        attribution.insert(key.to_string(), source);
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot determine current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid depending on the process
    /// working directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::defaults_only();

        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(start_dir).or_else(Self::home_config_file),
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)?;
            config.apply_file(file_config);
            config.config_path = Some(path.clone());
        }

        if let Ok(env_provider) = env::var(PROVIDER_ENV)
            && !env_provider.is_empty()
        {
            config.llm.provider = Some(env_provider);
            config
                .source_attribution
                .insert("llm_provider".to_string(), ConfigSource::Env);
        }

        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let src = ConfigSource::Config;
        let attr = &mut self.source_attribution;

        if let Some(d) = file.defaults {
            apply(&mut self.defaults.model, d.model, "model", src, attr);
            apply(
                &mut self.defaults.call_timeout,
                d.call_timeout,
                "call_timeout",
                src,
                attr,
            );
            apply(&mut self.defaults.verbose, d.verbose, "verbose", src, attr);
        }

        if let Some(g) = file.generation {
            let gen_cfg = &mut self.generation;
            apply(
                &mut gen_cfg.max_regenerations,
                g.max_regenerations,
                "max_regenerations",
                src,
                attr,
            );
            apply(
                &mut gen_cfg.context_char_budget,
                g.context_char_budget,
                "context_char_budget",
                src,
                attr,
            );
            apply(
                &mut gen_cfg.excerpt_chars,
                g.excerpt_chars,
                "excerpt_chars",
                src,
                attr,
            );
            apply(
                &mut gen_cfg.default_target_words,
                g.default_target_words,
                "default_target_words",
                src,
                attr,
            );
            apply(
                &mut gen_cfg.temperature,
                g.temperature,
                "generation_temperature",
                src,
                attr,
            );
        }

        if let Some(v) = file.verification {
            apply(
                &mut self.verification.max_tokens,
                v.max_tokens,
                "verification_max_tokens",
                src,
                attr,
            );
            apply(
                &mut self.verification.temperature,
                v.temperature,
                "verification_temperature",
                src,
                attr,
            );
            apply(
                &mut self.verification.context_char_budget,
                v.context_char_budget,
                "verification_context_chars",
                src,
                attr,
            );
        }

        if let Some(r) = file.refinement {
            apply(
                &mut self.refinement.max_iterations,
                r.max_iterations,
                "refinement_max_iterations",
                src,
                attr,
            );
            apply(
                &mut self.refinement.temperature,
                r.temperature,
                "refinement_temperature",
                src,
                attr,
            );
            apply(
                &mut self.refinement.context_char_budget,
                r.context_char_budget,
                "refinement_context_chars",
                src,
                attr,
            );
        }

        if let Some(b) = file.blueprints {
            apply(&mut self.blueprints.dir, b.dir, "blueprints_dir", src, attr);
        }
        if let Some(r) = file.runs {
            apply(&mut self.runs.dir, r.dir, "runs_dir", src, attr);
        }

        if let Some(llm) = file.llm {
            apply(&mut self.llm.provider, llm.provider, "llm_provider", src, attr);
            apply(
                &mut self.llm.fallback_provider,
                llm.fallback_provider,
                "llm_fallback_provider",
                src,
                attr,
            );
            apply(
                &mut self.llm.anthropic,
                llm.anthropic,
                "llm_anthropic_config",
                src,
                attr,
            );
            apply(
                &mut self.llm.openrouter,
                llm.openrouter,
                "llm_openrouter_config",
                src,
                attr,
            );
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let src = ConfigSource::Cli;
        let attr = &mut self.source_attribution;

        apply(&mut self.defaults.model, cli.model.clone(), "model", src, attr);
        apply(&mut self.defaults.verbose, cli.verbose, "verbose", src, attr);
        apply(
            &mut self.defaults.call_timeout,
            cli.call_timeout,
            "call_timeout",
            src,
            attr,
        );
        apply(
            &mut self.generation.max_regenerations,
            cli.max_regenerations,
            "max_regenerations",
            src,
            attr,
        );
        apply(
            &mut self.llm.provider,
            cli.llm_provider.clone(),
            "llm_provider",
            src,
            attr,
        );
        apply(
            &mut self.blueprints.dir,
            cli.blueprints_dir.clone(),
            "blueprints_dir",
            src,
            attr,
        );
        apply(&mut self.runs.dir, cli.runs_dir.clone(), "runs_dir", src, attr);
    }

    /// Discover config file by searching upward from a given directory.
    ///
    /// Walks up the directory tree looking for `.draftsmith/config.toml`,
    /// stopping at repository root markers (.git, .hg, .svn) or filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = start_dir;

        loop {
            let config_path = current_dir.join(".draftsmith").join("config.toml");
            if config_path.is_file() {
                return Some(config_path);
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                return None;
            }

            current_dir = current_dir.parent()?;
        }
    }

    /// `$DRAFTSMITH_HOME/config.toml`, or `~/.draftsmith/config.toml`, when it exists.
    fn home_config_file() -> Option<PathBuf> {
        let home = match env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()?.join(".draftsmith"),
        };
        let path = home.join("config.toml");
        path.is_file().then_some(path)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::InvalidFile(format!("{}: {}", path.display(), e.message()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::DiscoveryFailed {
                    reason: format!("config file not found: {}", path.display()),
                })
            }
            Err(e) => Err(ConfigError::DiscoveryFailed {
                reason: format!("failed to read {}: {e}", path.display()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let cfg_dir = dir.join(".draftsmith");
        fs::create_dir_all(&cfg_dir).unwrap();
        let path = cfg_dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let config = Config::discover_from(dir.path(), &CliArgs::default()).unwrap();
        assert_eq!(config.max_regenerations(), 2);
        assert_eq!(config.context_char_budget(), 3000);
        assert_eq!(config.excerpt_chars(), 400);
        assert_eq!(config.source_attribution["max_regenerations"], ConfigSource::Default);
    }

    #[test]
    #[serial]
    fn test_upward_discovery_and_cli_precedence() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write_config(
            dir.path(),
            r#"
[defaults]
model = "file-model"

[generation]
max_regenerations = 4
excerpt_chars = 300
"#,
        );
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let cli = CliArgs {
            max_regenerations: Some(1),
            ..CliArgs::default()
        };
        let config = Config::discover_from(&nested, &cli).unwrap();

        assert_eq!(config.model(), "file-model");
        assert_eq!(config.source_attribution["model"], ConfigSource::Config);
        assert_eq!(config.excerpt_chars(), 300);
        assert_eq!(config.max_regenerations(), 1);
        assert_eq!(config.source_attribution["max_regenerations"], ConfigSource::Cli);
    }

    #[test]
    #[serial]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[generation\nmax_regenerations = ");
        let cli = CliArgs {
            config_path: Some(path),
            ..CliArgs::default()
        };
        let err = Config::discover_from(dir.path(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    #[serial]
    fn test_unknown_section_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[selectors]\ninclude = []\n");
        let cli = CliArgs {
            config_path: Some(path),
            ..CliArgs::default()
        };
        assert!(Config::discover_from(dir.path(), &cli).is_err());
    }

    #[test]
    #[serial]
    fn test_explicit_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(dir.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let err = Config::discover_from(dir.path(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::DiscoveryFailed { .. }));
    }

    #[test]
    #[serial]
    fn test_env_provider_override() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        // SAFETY: serialized test; no other thread reads the environment concurrently.
        unsafe { env::set_var(PROVIDER_ENV, "openrouter") };
        let config = Config::discover_from(dir.path(), &CliArgs::default());
        unsafe { env::remove_var(PROVIDER_ENV) };

        let config = config.unwrap();
        assert_eq!(config.llm_provider(), "openrouter");
        assert_eq!(config.source_attribution["llm_provider"], ConfigSource::Env);
    }
}
