mod instrument;
mod spec;

pub use instrument::Instrument;
pub use spec::InstrumentSpec;
