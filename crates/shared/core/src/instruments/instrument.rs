use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::InstrumentSpec;
use crate::values::{Price, Symbol, Volume};

fn default_contract_size() -> Decimal {
    Decimal::ONE
}

/// Static description of the traded instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub tick_size: Price,
    pub volume_step: Volume,
    pub min_volume: Volume,
    /// Defaults to `tick_size` when zero
    #[serde(default)]
    pub pip_size: Price,
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<Symbol>,
        tick_size: Price,
        volume_step: Volume,
        min_volume: Volume,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            tick_size,
            volume_step,
            min_volume,
            pip_size: Decimal::ZERO,
            contract_size: Decimal::ONE,
        }
    }

    pub fn with_pip_size(mut self, pip_size: Price) -> Self {
        self.pip_size = pip_size;
        self
    }

    pub fn with_contract_size(mut self, contract_size: Decimal) -> Self {
        self.contract_size = contract_size;
        self
    }

    /// A 5-digit FX major: 0.00001 ticks, 0.0001 pips, 0.01 lot steps
    pub fn fx_major(symbol: impl Into<Symbol>) -> Self {
        Self::new(
            symbol,
            Decimal::new(1, 5),
            Decimal::new(1, 2),
            Decimal::new(1, 2),
        )
        .with_pip_size(Decimal::new(1, 4))
        .with_contract_size(Decimal::new(100_000, 0))
    }
}

impl InstrumentSpec for Instrument {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn tick_size(&self) -> Price {
        self.tick_size
    }

    fn volume_step(&self) -> Volume {
        self.volume_step
    }

    fn min_volume(&self) -> Volume {
        self.min_volume
    }

    fn pip_size(&self) -> Price {
        if self.pip_size.is_zero() {
            self.tick_size
        } else {
            self.pip_size
        }
    }

    fn contract_size(&self) -> Decimal {
        self.contract_size
    }
}
