use dotenv::dotenv;
use std::env;
use thiserror::Error;
use tracing::info;

const AFFINITY_THREAD: &str = "BINDERY_AFFINITY_THREAD";
const AFFINITY_STACK_SIZE: &str = "BINDERY_AFFINITY_STACK_SIZE";

const DEFAULT_THREAD_NAME: &str = "bindery-affinity";

/// Errors raised while loading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse environment variable {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("environment variable {0} must not be empty")]
    Empty(&'static str),
}

/// Settings for a spawned [`AffinityThread`](crate::scheduling::AffinityThread)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub thread_name: String,
    pub stack_size: Option<usize>,
}

impl SchedulerConfig {
    pub fn named(thread_name: impl Into<String>) -> SchedulerConfig {
        SchedulerConfig {
            thread_name: thread_name.into(),
            stack_size: None,
        }
    }

    pub fn from_env() -> SchedulerConfig {
        match Self::try_from_env() {
            Ok(config) => config,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_from_env() -> Result<SchedulerConfig, ConfigError> {
        // Load .env file
        dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<SchedulerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let thread_name = match lookup(AFFINITY_THREAD) {
            Some(name) if name.trim().is_empty() => return Err(ConfigError::Empty(AFFINITY_THREAD)),
            Some(name) => name.trim().to_string(),
            None => DEFAULT_THREAD_NAME.to_string(),
        };

        let stack_size = lookup(AFFINITY_STACK_SIZE)
            .map(|raw| {
                let trimmed = raw.trim();
                trimmed
                    .parse::<usize>()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| ConfigError::InvalidVar {
                        name: AFFINITY_STACK_SIZE,
                        value: trimmed.to_string(),
                    })
            })
            .transpose()?;

        info!(
            "Scheduler config: thread_name={}, stack_size={:?}",
            thread_name, stack_size
        );

        Ok(SchedulerConfig {
            thread_name,
            stack_size,
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> SchedulerConfig {
        SchedulerConfig::named(DEFAULT_THREAD_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = SchedulerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.thread_name, "bindery-affinity");
        assert_eq!(config.stack_size, None);
    }

    #[test]
    fn test_reads_both_variables() {
        let config = SchedulerConfig::from_lookup(lookup_from(&[
            (AFFINITY_THREAD, " ui "),
            (AFFINITY_STACK_SIZE, "262144"),
        ]))
        .unwrap();
        assert_eq!(config.thread_name, "ui");
        assert_eq!(config.stack_size, Some(262_144));
    }

    #[test]
    fn test_rejects_bad_stack_size() {
        for bad in ["lots", "0", "-1"] {
            let err = SchedulerConfig::from_lookup(lookup_from(&[(AFFINITY_STACK_SIZE, bad)]))
                .unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidVar {
                    name: AFFINITY_STACK_SIZE,
                    value: bad.to_string()
                }
            );
        }
    }

    #[test]
    fn test_rejects_empty_thread_name() {
        let err = SchedulerConfig::from_lookup(lookup_from(&[(AFFINITY_THREAD, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty(AFFINITY_THREAD));
    }
}
