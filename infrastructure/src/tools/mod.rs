//! Tool broker adapters

pub mod calculator;

pub use calculator::{CalculatorBroker, evaluate};
