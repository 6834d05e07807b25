pub mod rows;
pub mod runner;

pub use rows::{load_rows, parse_rows, BatchRow, Cell};
pub use runner::{BatchRunner, OutcomeRecord};
