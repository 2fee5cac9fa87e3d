use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for OrderId {
    fn from(seq: u64) -> Self {
        Self(format!("ORD-{seq:06}"))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic ID sequence.
///
/// IDs come from a per-owner counter rather than random UUIDs, so a rerun of
/// the same input issues the same IDs in the same order.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&mut self) -> OrderId {
        self.next += 1;
        OrderId::from(self.next)
    }

    /// Number of IDs issued so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_unique() {
        let mut gen = IdGen::new();
        let a = gen.next_order_id();
        let b = gen.next_order_id();
        assert_eq!(a, OrderId::new("ORD-000001"));
        assert_eq!(b, OrderId::new("ORD-000002"));
        assert_eq!(gen.issued(), 2);
    }

    #[test]
    fn two_generators_issue_the_same_sequence() {
        let mut g1 = IdGen::new();
        let mut g2 = IdGen::new();
        for _ in 0..5 {
            assert_eq!(g1.next_order_id(), g2.next_order_id());
        }
    }
}
