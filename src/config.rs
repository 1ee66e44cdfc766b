//! Account credentials, read from the environment.
//!
//! Two complete credential sets are required, one per account, under the
//! `SOURCE_CLOUDINARY_*` and `DEST_CLOUDINARY_*` prefixes. Validation is
//! all-or-nothing: every missing variable is reported in a single error so
//! one `.env` edit fixes the run.

use std::collections::HashMap;

/// API credentials for one account.
#[derive(Clone)]
pub struct Credentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Credentials for both ends of the migration.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: Credentials,
    pub dest: Credentials,
}

const VAR_SUFFIXES: [&str; 3] = ["CLOUD_NAME", "API_KEY", "API_SECRET"];

impl Config {
    /// Read both credential sets from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] but with an injected variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = HashMap::new();
        let mut missing = Vec::new();
        for prefix in ["SOURCE", "DEST"] {
            for suffix in VAR_SUFFIXES {
                let name = format!("{}_CLOUDINARY_{}", prefix, suffix);
                match lookup(&name).filter(|v| !v.is_empty()) {
                    Some(value) => {
                        values.insert(name, value);
                    }
                    None => missing.push(name),
                }
            }
        }
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let mut take = |prefix: &str, suffix: &str| -> String {
            values
                .remove(&format!("{}_CLOUDINARY_{}", prefix, suffix))
                .unwrap_or_default()
        };
        let mut credentials = |prefix: &str| Credentials {
            cloud_name: take(prefix, "CLOUD_NAME"),
            api_key: take(prefix, "API_KEY"),
            api_secret: take(prefix, "API_SECRET"),
        };

        Ok(Self {
            source: credentials("SOURCE"),
            dest: credentials("DEST"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> HashMap<String, String> {
        let mut env = HashMap::new();
        for prefix in ["SOURCE", "DEST"] {
            env.insert(
                format!("{}_CLOUDINARY_CLOUD_NAME", prefix),
                format!("{}-cloud", prefix.to_lowercase()),
            );
            env.insert(format!("{}_CLOUDINARY_API_KEY", prefix), "key123".into());
            env.insert(
                format!("{}_CLOUDINARY_API_SECRET", prefix),
                "secret456".into(),
            );
        }
        env
    }

    #[test]
    fn test_from_lookup_complete() {
        let env = full_env();
        let config = Config::from_lookup(|name| env.get(name).cloned()).unwrap();
        assert_eq!(config.source.cloud_name, "source-cloud");
        assert_eq!(config.dest.cloud_name, "dest-cloud");
        assert_eq!(config.source.api_key, "key123");
        assert_eq!(config.dest.api_secret, "secret456");
    }

    #[test]
    fn test_missing_vars_all_reported_at_once() {
        let mut env = full_env();
        env.remove("SOURCE_CLOUDINARY_API_KEY");
        env.remove("DEST_CLOUDINARY_API_SECRET");
        let err = Config::from_lookup(|name| env.get(name).cloned()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SOURCE_CLOUDINARY_API_KEY"));
        assert!(msg.contains("DEST_CLOUDINARY_API_SECRET"));
        assert!(!msg.contains("SOURCE_CLOUDINARY_CLOUD_NAME"));
    }

    #[test]
    fn test_empty_value_treated_as_missing() {
        let mut env = full_env();
        env.insert("DEST_CLOUDINARY_API_KEY".into(), String::new());
        let err = Config::from_lookup(|name| env.get(name).cloned()).unwrap_err();
        assert!(err.to_string().contains("DEST_CLOUDINARY_API_KEY"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let env = full_env();
        let config = Config::from_lookup(|name| env.get(name).cloned()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("source-cloud"));
        assert!(!rendered.contains("key123"));
        assert!(!rendered.contains("secret456"));
        assert!(rendered.contains("<redacted>"));
    }
}
