use rust_decimal::Decimal;

use crate::values::{Price, Volume};

/// Trading constraints of an instrument
///
/// Every price the engine emits is rounded to `tick_size`; every volume is
/// rounded down to `volume_step` and must reach `min_volume`.
pub trait InstrumentSpec {
    /// Unique symbol for this instrument (e.g., "EURUSD", "BTC-PERP")
    fn symbol(&self) -> &str;

    /// Minimum price increment
    fn tick_size(&self) -> Price;

    /// Minimum volume increment
    fn volume_step(&self) -> Volume;

    /// Smallest tradable volume
    fn min_volume(&self) -> Volume;

    /// Size of one pip in price units (e.g., 0.0001 for EURUSD)
    fn pip_size(&self) -> Price {
        self.tick_size()
    }

    /// Quote-currency value of a one-unit price move for one lot
    fn contract_size(&self) -> Decimal {
        Decimal::ONE
    }

    /// Convert a distance in pips into price units
    fn pips(&self, pips: Decimal) -> Price {
        pips * self.pip_size()
    }

    /// Round a price to the nearest valid tick
    fn round_price(&self, price: Price) -> Price {
        let tick = self.tick_size();
        if tick == Decimal::ZERO {
            return price;
        }
        (price / tick).round() * tick
    }

    /// Round a volume down to the nearest valid step
    fn round_volume_down(&self, volume: Volume) -> Volume {
        let step = self.volume_step();
        if step == Decimal::ZERO {
            return volume;
        }
        (volume / step).floor() * step
    }

    /// Whether a volume can be sent as an order
    fn is_tradable(&self, volume: Volume) -> bool {
        volume > Decimal::ZERO && volume >= self.min_volume()
    }
}
