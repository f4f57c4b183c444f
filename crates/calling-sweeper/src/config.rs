//! Sweeper configuration.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Instances whose name contains this are destroyed.
    pub name_filter: String,

    /// List matching instances without destroying them.
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum SweeperConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("SWEEP_NAME_FILTER must not be empty")]
    EmptyFilter,

    #[error("Invalid SWEEP_DRY_RUN value '{0}', expected true or false")]
    InvalidDryRun(String),
}

impl SweeperConfig {
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, SweeperConfigError> {
        let name_filter = vars
            .get("SWEEP_NAME_FILTER")
            .ok_or_else(|| SweeperConfigError::MissingEnvVar("SWEEP_NAME_FILTER".to_string()))?
            .trim()
            .to_string();
        // An empty filter would match every named instance in the fleet.
        if name_filter.is_empty() {
            return Err(SweeperConfigError::EmptyFilter);
        }

        let dry_run = match vars.get("SWEEP_DRY_RUN").map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(value) => match value.as_str() {
                "true" | "1" => true,
                "false" | "0" | "" => false,
                _ => return Err(SweeperConfigError::InvalidDryRun(value)),
            },
        };

        Ok(Self {
            name_filter,
            dry_run,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_defaults_to_live_sweep() {
        let config = SweeperConfig::from_vars(&vars(&[("SWEEP_NAME_FILTER", "Android")])).unwrap();

        assert_eq!(config.name_filter, "Android");
        assert!(!config.dry_run);
    }

    #[test]
    fn test_from_vars_dry_run() {
        let config = SweeperConfig::from_vars(&vars(&[
            ("SWEEP_NAME_FILTER", " nightly "),
            ("SWEEP_DRY_RUN", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.name_filter, "nightly");
        assert!(config.dry_run);
    }

    #[test]
    fn test_from_vars_missing_filter() {
        let result = SweeperConfig::from_vars(&HashMap::new());
        assert!(matches!(
            result,
            Err(SweeperConfigError::MissingEnvVar(ref var)) if var == "SWEEP_NAME_FILTER"
        ));
    }

    #[test]
    fn test_from_vars_rejects_empty_filter() {
        let result = SweeperConfig::from_vars(&vars(&[("SWEEP_NAME_FILTER", "  ")]));
        assert!(matches!(result, Err(SweeperConfigError::EmptyFilter)));
    }

    #[test]
    fn test_from_vars_rejects_invalid_dry_run() {
        let result = SweeperConfig::from_vars(&vars(&[
            ("SWEEP_NAME_FILTER", "Android"),
            ("SWEEP_DRY_RUN", "maybe"),
        ]));
        assert!(matches!(result, Err(SweeperConfigError::InvalidDryRun(_))));
    }
}
