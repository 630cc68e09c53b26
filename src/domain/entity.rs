//! Keys for entities that own derived rows.

use crate::domain::{ContractId, InstrumentId};
use serde::{Serialize, Serializer};
use std::fmt;

/// An entity whose derived rows are rebuilt as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    /// Open lots, realized gains and the fixed-income schedule.
    Instrument(InstrumentId),
    /// Rental cashflow rows.
    Contract(ContractId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Instrument(id) => write!(f, "instrument:{}", id),
            EntityKey::Contract(id) => write!(f, "contract:{}", id),
        }
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_display() {
        assert_eq!(
            EntityKey::Instrument(InstrumentId::new(3)).to_string(),
            "instrument:3"
        );
        assert_eq!(
            EntityKey::Contract(ContractId::new(12)).to_string(),
            "contract:12"
        );
    }
}
