pub mod accumulator;
pub mod bank;

pub use accumulator::PixelAccumulator;
pub use bank::{AccumulatorBank, IncrementalBank, PassSeed, ProfileBank, bank_for};
