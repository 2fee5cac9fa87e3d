//! Trade log and equity curve recorder.

use std::sync::Mutex;

use super::Component;
use crate::domain::{EquitySample, Fill, SnapshotCause};
use crate::error::HandlerError;
use crate::event::{Event, EventKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub trades: Vec<Fill>,
    pub equity_curve: Vec<EquitySample>,
}

/// Collects every fill, and one equity sample per price-driven position update.
#[derive(Debug, Default)]
pub struct Recorder {
    recording: Mutex<Recording>,
}

impl Recorder {
    pub const NAME: &'static str = "Recorder";

    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn recording(&self) -> Result<Recording, HandlerError> {
        self.recording
            .lock()
            .map(|r| r.clone())
            .map_err(|_| HandlerError::Poisoned(Self::NAME.into()))
    }
}

impl Component for Recorder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::OrderFilled, EventKind::PositionUpdate]
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let mut recording = self
            .recording
            .lock()
            .map_err(|_| HandlerError::Poisoned(Self::NAME.into()))?;
        match event.kind() {
            EventKind::OrderFilled => recording.trades.push(event.as_fill()?.clone()),
            _ => {
                let snapshot = event.as_position_update()?;
                if snapshot.cause != SnapshotCause::PriceUpdate {
                    return Ok(());
                }
                // Keep the curve ordered even if bars arrive out of order.
                let timestamp = recording
                    .equity_curve
                    .last()
                    .map_or(snapshot.timestamp, |prev| prev.timestamp.max(snapshot.timestamp));
                recording.equity_curve.push(EquitySample {
                    timestamp,
                    price: snapshot.last_price,
                    equity: snapshot.equity,
                    realized_pnl: snapshot.total_realized_pnl,
                    unrealized_pnl: snapshot.total_unrealized_pnl,
                });
            }
        }
        Ok(())
    }
}
