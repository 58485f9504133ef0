use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tributary_types::{Principal, MAX_FEE_BPS};

/// Engine construction parameters. Immutable after start apart from the
/// fee rate and treasury sink, which have their own admin operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// EIP-712 domain name baked into every receipt digest.
    pub eip712_name: String,
    /// EIP-712 domain version.
    pub eip712_version: String,
    /// Chain id of the deployment, part of the signing domain.
    pub chain_id: u64,
    /// Seconds a payment stays disputable before anyone may release it.
    pub dispute_window_seconds: u64,
    /// Initial protocol fee in basis points (max 1000 = 10%).
    pub fee_bps: u16,
    /// Hex-encoded principal receiving protocol fees.
    pub treasury_sink: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            eip712_name: "AIUsageReceipts".to_string(),
            eip712_version: "1".to_string(),
            chain_id: 1,
            dispute_window_seconds: 259_200, // three days
            fee_bps: 250,
            treasury_sink: "0x00000000000000000000000000000000000000fe".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.eip712_name.is_empty() {
            return Err(EngineError::Config("eip712_name must not be empty".into()));
        }
        if self.fee_bps > MAX_FEE_BPS {
            return Err(EngineError::Config(format!(
                "fee_bps {} exceeds maximum {}",
                self.fee_bps, MAX_FEE_BPS
            )));
        }
        if self.dispute_window_seconds == 0 {
            return Err(EngineError::Config(
                "dispute_window_seconds must be positive".into(),
            ));
        }
        let sink = self.treasury_sink()?;
        if sink.is_zero() {
            return Err(EngineError::Config(
                "treasury_sink must not be the zero address".into(),
            ));
        }
        Ok(())
    }

    pub fn treasury_sink(&self) -> Result<Principal> {
        Principal::from_hex(&self.treasury_sink)
            .map_err(|e| EngineError::Config(format!("treasury_sink: {}", e)))
    }
}
