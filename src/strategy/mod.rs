pub mod crossover;
pub mod indicators;

pub use crossover::{generate_signal, latest_signal, CrossoverParams, Signal};
pub use indicators::{compute_snapshots, IndicatorParams};
