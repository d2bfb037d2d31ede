use std::path::PathBuf;

/// CLI overrides fed into [`Config::discover`](crate::Config::discover).
///
/// Every field is optional; `None` means "not given on the command line".
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub verbose: Option<bool>,
    pub call_timeout: Option<u64>,
    pub max_regenerations: Option<u32>,
    pub llm_provider: Option<String>,
    pub blueprints_dir: Option<String>,
    pub runs_dir: Option<String>,
}
