//! Indirection for credential values in `config.toml`.
//!
//! `env::NAME` reads the variable `NAME`, `pass::entry` asks the `pass`
//! password store, and anything else is taken literally.

use std::collections::HashMap;

/// Where environment variables are read from.
///
/// The process environment in production, a map in tests.
pub trait Environment {
    /// Returns the variable's value, or `None` when unset or blank.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment (after `.env` has been loaded).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Expands an `env::` or `pass::` reference; other values pass through.
pub fn resolve(value: &str, env: &dyn Environment) -> Result<String, String> {
    match value.split_once("::") {
        Some(("env", name)) => env
            .var(name)
            .ok_or_else(|| format!("environment variable `{}` is not set", name)),
        Some(("pass", entry)) => pass_show(entry),
        _ => Ok(value.to_string()),
    }
}

/// First line of `pass show <entry>`, trimmed.
fn pass_show(entry: &str) -> Result<String, String> {
    let shown = std::process::Command::new("pass")
        .args(["show", entry])
        .output()
        .map_err(|e| format!("cannot run pass for `{}`: {}", entry, e))?;

    if !shown.status.success() {
        return Err(format!(
            "pass could not show `{}` ({}): {}",
            entry,
            shown.status,
            String::from_utf8_lossy(&shown.stderr).trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&shown.stdout);
    match stdout.lines().next().map(str::trim) {
        Some(first) if !first.is_empty() => Ok(first.to_string()),
        _ => Err(format!("pass entry `{}` is empty", entry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn literal_values_pass_through() {
        let empty = env(&[]);
        assert_eq!(resolve("hello", &empty).unwrap(), "hello");
        assert_eq!(
            resolve("contoso.onmicrosoft.com", &empty).unwrap(),
            "contoso.onmicrosoft.com"
        );
    }

    #[test]
    fn env_reference() {
        let vars = env(&[("AZURE_APP_SECRET", "s3cr3t")]);
        assert_eq!(resolve("env::AZURE_APP_SECRET", &vars).unwrap(), "s3cr3t");
    }

    #[test]
    fn env_prefix_missing_or_blank_var_errors() {
        let vars = env(&[("BLANK", "  ")]);
        assert!(resolve("env::MISSING", &vars).unwrap_err().contains("not set"));
        assert!(resolve("env::BLANK", &vars).unwrap_err().contains("not set"));
    }

    #[test]
    fn pass_prefix_unknown_entry_errors() {
        let result = resolve("pass::nonexistent/entry/that/should/not/exist/12345", &env(&[]));
        assert!(result.is_err());
    }
}
