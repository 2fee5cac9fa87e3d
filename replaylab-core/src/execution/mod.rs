//! Execution: turns order requests into fills.
//!
//! - **Reference price**: the limit price when given, otherwise the reference bar's close
//! - **Slippage**: applied against the order side (BUY pays more, SELL receives less)
//! - **Order ids**: deterministic per-engine sequence

pub mod fill_engine;
pub mod slippage;

pub use fill_engine::FillEngine;
pub use slippage::{PercentSlippage, SlippageModel};
