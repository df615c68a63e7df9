//! Configuration for the renewal desk.

use serde::{Deserialize, Serialize};
use validity::{ThresholdError, ThresholdTable};

/// Error types for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// YAML could not be parsed or written
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Threshold table is inconsistent
    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),

    /// A value is out of its allowed range
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration for one office.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeConfig {
    /// Office identifier, stamped on audit entries
    pub office_id: String,
    /// Bucket boundaries per expiry context
    #[serde(default)]
    pub thresholds: ThresholdTable,
    /// Renewal audit trail
    #[serde(default)]
    pub audit: AuditConfig,
    /// Bill generation
    #[serde(default)]
    pub documents: DocumentConfig,
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            office_id: uuid::Uuid::new_v4().to_string(),
            thresholds: ThresholdTable::default(),
            audit: AuditConfig::default(),
            documents: DocumentConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl OfficeConfig {
    /// Create a new config with office ID.
    pub fn new(office_id: impl Into<String>) -> Self {
        Self {
            office_id: office_id.into(),
            ..Default::default()
        }
    }

    /// Load and validate config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.office_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "office_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.audit.enabled && self.audit.max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "audit.max_entries",
                reason: "must be positive when auditing is enabled".to_string(),
            });
        }
        self.thresholds.validate()?;
        Ok(())
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Record renewals in the audit trail
    pub enabled: bool,
    /// Maximum entries to retain
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// When to generate bills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Generate a bill for the original record at issuance
    pub on_issue: bool,
    /// Generate a bill for every renewal
    pub on_renewal: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            on_issue: false,
            on_renewal: true,
        }
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level hint for the embedding binary
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OfficeConfig::new("rto-pune");
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.permit_part_b.warning_days, Some(30));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = OfficeConfig::new("rto-pune");
        let yaml = config.to_yaml().unwrap();
        let parsed = OfficeConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.office_id, "rto-pune");
        assert_eq!(parsed.thresholds, config.thresholds);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
office_id: rto-nashik
documents:
  on_issue: true
  on_renewal: false
"#;
        let config = OfficeConfig::from_yaml(yaml).unwrap();
        assert!(config.documents.on_issue);
        assert!(config.audit.enabled);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.thresholds, ThresholdTable::default());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let yaml = r#"
office_id: rto-nashik
thresholds:
  permit_part_b:
    critical_days: 40
    warning_days: 30
    attention_days: null
    renew_offer_days: 35
"#;
        assert!(matches!(
            OfficeConfig::from_yaml(yaml),
            Err(ConfigError::Thresholds(_))
        ));
    }

    #[test]
    fn test_rejects_empty_audit_capacity() {
        let mut config = OfficeConfig::new("rto-pune");
        config.audit.max_entries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "audit.max_entries", .. })
        ));
    }
}
