//! Configuration management with validation and defaults
//!
//! Every knob the external UI may set lives here: bet bounds, phase durations,
//! RTP constants, grid and segment counts, and the ledger retry policy.

use crate::errors::{ConfigurationError, EngineResult};
use crate::games::pump::Difficulty;
use crate::games::wheel::{RiskLevel, SegmentCount};
use crate::money::{BetLimits, Money};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bets: BetConfig,
    pub crash: CrashConfig,
    pub mines: MinesConfig,
    pub pump: PumpConfig,
    pub wheel: WheelConfig,
    pub roulette: RouletteConfig,
    pub cases: CaseConfig,
    pub ledger: LedgerConfig,
    pub monitoring: MonitoringConfig,
}

/// Stake bounds shared by every game
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BetConfig {
    pub min_bet: f64,
    pub max_bet: f64,
}

impl Default for BetConfig {
    fn default() -> Self {
        Self {
            min_bet: 0.20,
            max_bet: 1000.00,
        }
    }
}

impl BetConfig {
    pub fn limits(&self) -> BetLimits {
        BetLimits::new(Money::from_decimal(self.min_bet), Money::from_decimal(self.max_bet))
    }
}

/// Continuous multiplier game timing and curve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    /// Return-to-player constant used by the crash point draw
    pub rtp: f64,
    /// Largest crash point the generator will produce
    pub cap: f64,
    /// Curve time constant: m(t) = exp(t / tau)
    pub growth_tau_ms: u64,
    pub waiting_ms: u64,
    pub cooldown_ms: u64,
    pub min_auto_collect: f64,
    pub bet_slots: usize,
    pub history_len: usize,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl CrashConfig {
    /// Rocket-style crash: 5s countdown, 3s cooldown
    pub fn classic() -> Self {
        Self {
            rtp: 0.99,
            cap: 10_000.0,
            growth_tau_ms: 4_000,
            waiting_ms: 5_000,
            cooldown_ms: 3_000,
            min_auto_collect: 1.01,
            bet_slots: 2,
            history_len: 20,
        }
    }

    /// Runner-style crash with a faster curve and a longer pre-round window
    pub fn dino() -> Self {
        Self {
            growth_tau_ms: 1_667,
            waiting_ms: 6_000,
            ..Self::classic()
        }
    }

    pub fn growth_tau(&self) -> Duration {
        Duration::from_millis(self.growth_tau_ms)
    }

    pub fn waiting(&self) -> Duration {
        Duration::from_millis(self.waiting_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Reveal grid parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinesConfig {
    pub grid_size: usize,
    pub default_mines: usize,
    pub rtp: f64,
}

impl Default for MinesConfig {
    fn default() -> Self {
        Self {
            grid_size: 25,
            default_mines: 5,
            rtp: 0.99,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    pub default_difficulty: Difficulty,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            default_difficulty: Difficulty::Hard,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub default_risk: RiskLevel,
    pub default_segments: SegmentCount,
    pub spin_ms: u64,
    pub cooldown_ms: u64,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            default_risk: RiskLevel::Medium,
            default_segments: SegmentCount::Thirty,
            spin_ms: 7_500,
            cooldown_ms: 3_000,
        }
    }
}

impl WheelConfig {
    pub fn phase_timing(&self) -> SpinTiming {
        SpinTiming::new(self.spin_ms, self.cooldown_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteConfig {
    pub spin_ms: u64,
    pub cooldown_ms: u64,
    pub history_len: usize,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            spin_ms: 8_500,
            cooldown_ms: 3_000,
            history_len: 20,
        }
    }
}

impl RouletteConfig {
    pub fn phase_timing(&self) -> SpinTiming {
        SpinTiming::new(self.spin_ms, self.cooldown_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub spin_ms: u64,
    pub quick_spin_ms: u64,
    pub cooldown_ms: u64,
    pub max_batch: u32,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            spin_ms: 6_000,
            quick_spin_ms: 1_500,
            cooldown_ms: 1_000,
            max_batch: 5,
        }
    }
}

impl CaseConfig {
    pub fn phase_timing(&self, quick: bool) -> SpinTiming {
        let spin = if quick { self.quick_spin_ms } else { self.spin_ms };
        SpinTiming::new(spin, self.cooldown_ms)
    }
}

/// RUNNING and RESOLVED durations of a one-shot spin game
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinTiming {
    pub spin: Duration,
    pub cooldown: Duration,
}

impl SpinTiming {
    pub fn new(spin_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            spin: Duration::from_millis(spin_ms),
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }
}

/// Retry policy for credits that fail at the ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub credit_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            credit_attempts: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl LedgerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_filter: String,
    pub event_capacity: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: "roundhouse=info".to_string(),
            event_capacity: 1_024,
        }
    }
}

impl EngineConfig {
    /// Crash settings for the runner variant, everything else default
    pub fn dino() -> Self {
        Self {
            crash: CrashConfig::dino(),
            ..Default::default()
        }
    }

    /// Short phases for local demos and tests
    pub fn fast() -> Self {
        Self {
            crash: CrashConfig {
                waiting_ms: 500,
                cooldown_ms: 300,
                growth_tau_ms: 800,
                ..CrashConfig::classic()
            },
            wheel: WheelConfig {
                spin_ms: 200,
                cooldown_ms: 100,
                ..Default::default()
            },
            roulette: RouletteConfig {
                spin_ms: 200,
                cooldown_ms: 100,
                ..Default::default()
            },
            ledger: LedgerConfig {
                credit_attempts: 3,
                retry_backoff_ms: 10,
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let limits = self.bets.limits();
        if !limits.min.is_positive() {
            return Err(invalid("bets.min_bet", self.bets.min_bet, "must be > 0"));
        }
        if limits.max < limits.min {
            return Err(invalid("bets.max_bet", self.bets.max_bet, "must be >= min_bet"));
        }

        check_rtp("crash.rtp", self.crash.rtp)?;
        if !(self.crash.cap >= 1.0) {
            return Err(invalid("crash.cap", self.crash.cap, "must be >= 1.00"));
        }
        if self.crash.growth_tau_ms == 0 {
            return Err(invalid("crash.growth_tau_ms", 0, "must be > 0"));
        }
        if self.crash.waiting_ms == 0 {
            return Err(invalid("crash.waiting_ms", 0, "must be > 0"));
        }
        if self.crash.cooldown_ms == 0 {
            return Err(invalid("crash.cooldown_ms", 0, "must be > 0"));
        }
        if self.crash.min_auto_collect <= 1.0 {
            return Err(invalid(
                "crash.min_auto_collect",
                self.crash.min_auto_collect,
                "must be > 1.00",
            ));
        }
        if self.crash.bet_slots == 0 {
            return Err(invalid("crash.bet_slots", 0, "must be > 0"));
        }

        check_rtp("mines.rtp", self.mines.rtp)?;
        if self.mines.grid_size < 2 {
            return Err(invalid("mines.grid_size", self.mines.grid_size, "must be >= 2"));
        }
        if self.mines.default_mines == 0 || self.mines.default_mines >= self.mines.grid_size {
            return Err(invalid(
                "mines.default_mines",
                self.mines.default_mines,
                "must be between 1 and grid_size - 1",
            ));
        }

        if self.cases.max_batch == 0 {
            return Err(invalid("cases.max_batch", 0, "must be > 0"));
        }
        if self.ledger.credit_attempts == 0 {
            return Err(invalid("ledger.credit_attempts", 0, "must be > 0"));
        }
        if self.monitoring.event_capacity == 0 {
            return Err(invalid("monitoring.event_capacity", 0, "must be > 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_rtp(field: &str, rtp: f64) -> Result<(), ConfigurationError> {
    if !(rtp > 0.0 && rtp <= 1.0) {
        return Err(invalid(field, rtp, "must be in (0, 1]"));
    }
    Ok(())
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> EngineResult<EngineConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => EngineConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> EngineResult<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut EngineConfig) -> EngineResult<()> {
        if let Some(value) = env_parse::<f64>("ROUNDHOUSE_MIN_BET")? {
            config.bets.min_bet = value;
        }
        if let Some(value) = env_parse::<f64>("ROUNDHOUSE_MAX_BET")? {
            config.bets.max_bet = value;
        }
        if let Some(value) = env_parse::<f64>("ROUNDHOUSE_CRASH_RTP")? {
            config.crash.rtp = value;
        }
        if let Some(value) = env_parse::<f64>("ROUNDHOUSE_MINES_RTP")? {
            config.mines.rtp = value;
        }
        if let Some(value) = env_parse::<u32>("ROUNDHOUSE_CREDIT_ATTEMPTS")? {
            config.ledger.credit_attempts = value;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &EngineConfig, path: &str) -> EngineResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigurationError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigurationError::InvalidValue {
            field: key.to_string(),
            value: raw,
            reason: "could not be parsed".to_string(),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bets.limits().min, Money::from_cents(20));
        assert_eq!(config.bets.limits().max, Money::from_cents(100_000));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(EngineConfig::dino().validate().is_ok());
        assert!(EngineConfig::fast().validate().is_ok());
        assert_eq!(CrashConfig::dino().waiting(), Duration::from_millis(6_000));
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = EngineConfig::default();
        config.crash.rtp = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.mines.default_mines = 25;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.bets.max_bet = 0.10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let config = EngineConfig::default();
        assert_eq!(config.crash.waiting(), Duration::from_millis(5_000));
        assert_eq!(config.crash.cooldown(), Duration::from_millis(3_000));
        assert_eq!(config.cases.phase_timing(true).spin, Duration::from_millis(1_500));
    }

    #[test]
    fn test_save_and_load_config() -> EngineResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original = EngineConfig::default();
        original.crash = CrashConfig::dino();
        original.wheel.default_risk = RiskLevel::High;

        let loader = ConfigLoader::new();
        loader.save(&original, path)?;

        let loaded = ConfigLoader::new().with_path(path).load()?;
        assert_eq!(loaded.crash, original.crash);
        assert_eq!(loaded.wheel.default_risk, RiskLevel::High);

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> EngineResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[mines]\ndefault_mines = 3\n").unwrap();

        let loaded = ConfigLoader::new().with_path(temp_file.path()).load()?;
        assert_eq!(loaded.mines.default_mines, 3);
        assert_eq!(loaded.mines.grid_size, 25);
        assert_eq!(loaded.crash.waiting_ms, 5_000);

        Ok(())
    }
}
