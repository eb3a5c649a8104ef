use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CliError;

/// Default env file, relative to the home directory.
const DEFAULT_ENV_FILE: &str = ".import-monitor/env";

/// Environment variable manager that loads from system and .env files
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
    sensitive_patterns: Vec<String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
            sensitive_patterns: Self::default_sensitive_patterns(),
        }
    }

    /// System environment plus `path`, or plus the default env file when
    /// `path` is not given and the default exists.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let mut env = Self::new();
        match path {
            Some(path) => env.load_from_file(path)?,
            None => {
                if let Some(path) = Self::default_file().filter(|p| p.is_file()) {
                    env.load_from_file(path)?;
                }
            }
        }
        Ok(env)
    }

    pub fn default_file() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_ENV_FILE))
    }

    /// Load variables from a .env file. File values override system ones.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        let loaded = self.parse_env_content(&content)?;
        for key in &loaded {
            debug!(
                file = %path.display(),
                key = %key,
                value = %self.display_value(key),
                "Loaded setting"
            );
        }
        Ok(())
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_patterns
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
    }

    /// Value safe to print: sensitive keys are masked.
    pub fn display_value(&self, key: &str) -> String {
        match self.get(key) {
            Some(_) if self.is_sensitive(key) => "***".to_string(),
            Some(value) => value.to_string(),
            None => String::new(),
        }
    }

    fn parse_env_content(&mut self, content: &str) -> Result<Vec<String>, CliError> {
        let mut loaded = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
            loaded.push(key.to_string());
        }

        Ok(loaded)
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();

        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }

        value.to_string()
    }

    fn default_sensitive_patterns() -> Vec<String> {
        ["password", "passwd", "secret", "token", "key", "auth", "credential"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
