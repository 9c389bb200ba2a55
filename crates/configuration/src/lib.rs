use crate::error::ConfigError;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    BacktestConfig, Config, GatewayConfig, InstrumentSpec, LogLevel, LoggingConfig, RunnerConfig,
    SizingParams, StrategyParams, Trading,
};

/// The prefix for environment overrides, e.g. `FUTBOT__GATEWAY__PASSWORD`.
pub const ENV_PREFIX: &str = "FUTBOT";

/// Loads the application configuration from a TOML file, layered with environment overrides.
///
/// The configuration is validated before it is returned, so every consumer can rely on
/// periods being non-zero and the symbol list being populated.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

impl Config {
    /// Rejects parameter combinations the strategy and sizing code cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.trading.symbols.is_empty() {
            return invalid("trading.symbols must list at least one symbol");
        }
        if self.trading.bar_period_secs == 0 {
            return invalid("trading.bar_period_secs must be greater than 0");
        }
        if self.trading.roll_check_interval_bars == 0 {
            return invalid("trading.roll_check_interval_bars must be at least 1");
        }

        let s = &self.strategy;
        if s.ma_short_period == 0
            || s.ma_long_period == 0
            || s.wr_period == 0
            || s.atr_period == 0
            || s.adx_period == 0
        {
            return invalid("indicator periods cannot be zero");
        }
        if s.ma_short_period >= s.ma_long_period {
            return invalid("strategy.ma_short_period must be less than strategy.ma_long_period");
        }
        if s.wr_oversold >= s.wr_overbought {
            return invalid("strategy.wr_oversold must be below strategy.wr_overbought");
        }
        if s.stop_loss_atr_multiplier <= Decimal::ZERO || s.take_profit_ratio <= Decimal::ZERO {
            return invalid("stop-loss multiplier and take-profit ratio must be positive");
        }

        let z = &self.sizing;
        if z.risk_ratio <= Decimal::ZERO || z.risk_ratio >= Decimal::ONE {
            return invalid("sizing.risk_ratio must be between 0 and 1");
        }
        if z.margin_ratio <= Decimal::ZERO
            || z.margin_headroom <= Decimal::ZERO
            || z.stop_atr_multiplier <= Decimal::ZERO
            || z.min_atr <= Decimal::ZERO
        {
            return invalid("sizing ratios, multipliers and min_atr must be positive");
        }

        let mut seen = HashSet::new();
        for spec in &self.instruments {
            if !seen.insert(spec.code.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "instrument '{}' is listed more than once",
                    spec.code
                )));
            }
            if spec.point_value <= Decimal::ZERO || spec.min_volume == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "instrument '{}' needs a positive point_value and min_volume",
                    spec.code
                )));
            }
        }

        // The bar window must be able to hold the longest lookback.
        let longest = s
            .ma_long_period
            .max(s.ma_short_period)
            .max(s.wr_period)
            .max(s.atr_period + 1)
            .max(2 * s.adx_period);
        if self.trading.bar_window_len < longest {
            return Err(ConfigError::ValidationError(format!(
                "trading.bar_window_len ({}) is shorter than the longest indicator lookback ({})",
                self.trading.bar_window_len, longest
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const SAMPLE: &str = r#"
[trading]
symbols = ["CZCE.SA", "SHFE.rb"]
bar_period_secs = 3600
fixed_size = 5

[strategy]
ma_short_period = 21
adx_period = 14

[[instruments]]
code = "CZCE.SA"
point_value = 20

[[instruments]]
code = "SHFE.rb"
point_value = 10
min_volume = 2

[logging]
level = "debug"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_sample_with_defaults() {
        let file = write_config(SAMPLE);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.trading.symbols, vec!["CZCE.SA", "SHFE.rb"]);
        assert_eq!(config.trading.bar_period_secs, 3600);
        assert_eq!(config.trading.fixed_size, 5);
        assert_eq!(config.trading.roll_check_interval_bars, 100);
        assert_eq!(config.strategy.ma_short_period, 21);
        assert_eq!(config.strategy.ma_long_period, 144);
        assert_eq!(config.strategy.adx_period, 14);
        assert_eq!(config.strategy.wr_oversold, dec!(-70));
        assert_eq!(config.sizing.risk_ratio, dec!(0.05));
        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.instruments[0].min_volume, 1);
        assert_eq!(config.instruments[1].code, "SHFE.rb");
        assert_eq!(config.instruments[1].min_volume, 2);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.runner.reconnect_backoff_secs, 30);
    }

    #[test]
    fn instrument_table_defaults_to_every_traded_contract() {
        let file = write_config("[trading]\nsymbols = [\"CZCE.FG\"]\n");
        let config = load_config(file.path()).unwrap();

        let codes: Vec<&str> = config.instruments.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["SHFE.rb", "SHFE.hc", "DCE.m", "CZCE.FG", "CZCE.SA", "DCE.c"]
        );
        let glass = &config.instruments[3];
        assert_eq!(glass.point_value, dec!(20));
        assert_eq!(glass.min_volume, 1);
    }

    #[test]
    fn rejects_zero_roll_interval() {
        let file = write_config(
            r#"
[trading]
symbols = ["DCE.m"]
roll_check_interval_bars = 0
"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("roll_check_interval_bars"));
    }

    #[test]
    fn rejects_inverted_moving_averages() {
        let file = write_config(
            r#"
[trading]
symbols = ["DCE.m"]

[strategy]
ma_short_period = 144
ma_long_period = 55
"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_empty_symbol_list() {
        let file = write_config("[trading]\nsymbols = []\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_window_shorter_than_lookback() {
        let file = write_config(
            r#"
[trading]
symbols = ["DCE.m"]
bar_window_len = 100
"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("bar_window_len"));
    }

    #[test]
    fn rejects_duplicate_instruments() {
        let file = write_config(
            r#"
[trading]
symbols = ["DCE.m"]

[[instruments]]
code = "DCE.m"
point_value = 10

[[instruments]]
code = "DCE.m"
point_value = 10
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = load_config("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
