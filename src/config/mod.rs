use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default limit on `$and` / `$or` nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompilerConfig {
    #[serde(default)]
    pub mode: CompileMode,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Prefix non-empty fragments with `filter `.
    #[serde(default)]
    pub clause: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            mode: CompileMode::Legacy,
            max_depth: DEFAULT_MAX_DEPTH,
            clause: false,
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl CompilerConfig {
    /// Load settings from an optional YAML file, then `GELFILTER_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix("GELFILTER").try_parsing(true))
            .build()?;
        let config: Self = settings.try_deserialize()?;

        if config.max_depth == 0 {
            anyhow::bail!("Config: max_depth must be at least 1");
        }
        Ok(config)
    }
}

/// How literals and field names are written into the fragment.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Values inlined as-is, without escaping
    #[default]
    Legacy,
    /// Values inlined with `\` and `"` escaped
    Escaped,
    /// Values bound as named query parameters
    Parameterized,
}

impl CompileMode {
    pub fn label(&self) -> &'static str {
        match self {
            CompileMode::Legacy => "legacy",
            CompileMode::Escaped => "escaped",
            CompileMode::Parameterized => "parameterized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "mode: parameterized\nmax_depth: 8\nclause: true").unwrap();

        let config = CompilerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.mode, CompileMode::Parameterized);
        assert_eq!(config.max_depth, 8);
        assert!(config.clause);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "mode: escaped").unwrap();

        let config = CompilerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.mode, CompileMode::Escaped);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.clause);
    }

    #[test]
    fn test_rejects_zero_depth() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "max_depth: 0").unwrap();

        assert!(CompilerConfig::load(Some(file.path())).is_err());
    }
}
