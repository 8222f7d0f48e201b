//! Configuration for the ledger

use crate::types::AccountId;
use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Account seeded as the first admin (derived from its Ed25519 public key)
    pub genesis_admin: Option<AccountId>,

    /// Display-unit configuration
    pub denomination: DenominationConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Audit log configuration
    pub audit: AuditConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "custody-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            genesis_admin: None,
            denomination: DenominationConfig::default(),
            actor: ActorConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Display-unit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenominationConfig {
    /// Decimal places between the display unit and the smallest unit
    pub decimals: u32,

    /// Display symbol
    pub symbol: String,
}

impl Default for DenominationConfig {
    fn default() -> Self {
        Self {
            decimals: 18,
            symbol: "ETH".to_string(),
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox capacity (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Sign every event hash with Ed25519
    pub sign_events: bool,

    /// Hex-encoded 32-byte signing seed; random when absent
    pub signing_seed: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(admin) = std::env::var("CUSTODY_GENESIS_ADMIN") {
            config.genesis_admin = Some(admin.parse()?);
        }

        if let Ok(decimals) = std::env::var("CUSTODY_DECIMALS") {
            config.denomination.decimals = decimals
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid CUSTODY_DECIMALS: {}", e)))?;
        }

        if let Ok(capacity) = std::env::var("CUSTODY_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CUSTODY_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        if let Ok(seed) = std::env::var("CUSTODY_SIGNING_SEED") {
            config.audit.sign_events = true;
            config.audit.signing_seed = Some(seed);
        }

        if let Ok(json) = std::env::var("CUSTODY_LOG_JSON") {
            config.logging.json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can open a ledger
    pub fn validate(&self) -> crate::Result<()> {
        match self.genesis_admin {
            None => {
                return Err(crate::Error::Config(
                    "genesis_admin is required".to_string(),
                ))
            }
            Some(admin) if admin.is_zero() => {
                return Err(crate::Error::Config(
                    "genesis_admin must not be the null account".to_string(),
                ))
            }
            Some(_) => {}
        }

        if self.denomination.decimals > 28 {
            return Err(crate::Error::Config(format!(
                "decimals must be at most 28, got {}",
                self.denomination.decimals
            )));
        }

        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "custody-ledger");
        assert_eq!(config.denomination.decimals, 18);
        assert_eq!(config.actor.mailbox_capacity, 1000);
        assert!(!config.audit.sign_events);
    }

    #[test]
    fn test_default_config_requires_genesis_admin() {
        assert!(matches!(
            Config::default().validate(),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_null_genesis_admin_rejected() {
        let config = Config {
            genesis_admin: Some(AccountId::ZERO),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            genesis_admin = "0x0101010101010101010101010101010101010101"

            [denomination]
            decimals = 6
            symbol = "USDC"

            [audit]
            sign_events = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config.genesis_admin,
            Some(AccountId::from_bytes([1u8; 20]))
        );
        assert_eq!(config.denomination.decimals, 6);
        assert!(config.audit.sign_events);
        assert_eq!(config.actor.mailbox_capacity, 1000);
        assert!(config.validate().is_ok());
    }
}
