//! Domain types for ReplayLab

pub mod bar;
pub mod equity;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;

pub use bar::{parse_timestamp, Bar, BarError};
pub use equity::EquitySample;
pub use fill::{Fill, FillStatus};
pub use ids::{IdGen, OrderId};
pub use order::{OrderKind, OrderRequest, OrderSide};
pub use position::{Position, PositionSnapshot, SnapshotCause};

/// Symbol type alias
pub type Symbol = String;

/// Symbol used when the input data does not name one.
pub const DEFAULT_SYMBOL: &str = "BTC/USD";
