//! Rental contract terms.

use crate::domain::{ContractId, CurrencyCode, Decimal, IndexType, YearMonth};
use serde::{Deserialize, Serialize};

/// Which index prints feed an index-linked adjustment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexCompounding {
    /// Multiply by the single print of the month before the adjustment month.
    #[default]
    PriorMonth,
    /// Multiply by the compounded product of every print published since the
    /// previous adjustment (the `frequency` months before the adjustment month).
    CompoundedWindow,
}

impl IndexCompounding {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexCompounding::PriorMonth => "prior_month",
            IndexCompounding::CompoundedWindow => "compounded_window",
        }
    }
}

/// How the rent changes at each adjustment boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adjustment {
    /// Rent grows by a fixed agreed percentage at each boundary.
    FixedPercentage { rate: Decimal },
    /// Rent follows a published index.
    IndexLinked {
        index_type: IndexType,
        #[serde(default)]
        compounding: IndexCompounding,
    },
}

impl Adjustment {
    /// Index series this contract depends on, if any.
    pub fn index_type(&self) -> Option<&IndexType> {
        match self {
            Adjustment::FixedPercentage { .. } => None,
            Adjustment::IndexLinked { index_type, .. } => Some(index_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    pub name: String,
    pub start: YearMonth,
    pub duration_months: u32,
    pub initial_rent: Decimal,
    pub currency: CurrencyCode,
    pub adjustment: Adjustment,
    pub adjustment_frequency_months: u32,
}

impl Contract {
    /// Every calendar month the contract covers, in order.
    pub fn covered_months(&self) -> impl Iterator<Item = YearMonth> + '_ {
        (0..self.duration_months).map(move |offset| self.start.add_months(offset as i32))
    }

    /// Last covered month, or `None` for a zero-length contract.
    pub fn last_month(&self) -> Option<YearMonth> {
        self.duration_months
            .checked_sub(1)
            .map(|offset| self.start.add_months(offset as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(duration_months: u32) -> Contract {
        Contract {
            id: ContractId::new(1),
            name: "Flat 3B".to_string(),
            start: "2023-11".parse().unwrap(),
            duration_months,
            initial_rent: Decimal::from_i64(1000),
            currency: CurrencyCode::new("ARS"),
            adjustment: Adjustment::IndexLinked {
                index_type: IndexType::new("CPI"),
                compounding: IndexCompounding::PriorMonth,
            },
            adjustment_frequency_months: 3,
        }
    }

    #[test]
    fn test_covered_months_exact_count() {
        let c = contract(4);
        let months: Vec<String> = c.covered_months().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(c.last_month().unwrap().to_string(), "2024-02");
        assert!(contract(0).last_month().is_none());
    }

    #[test]
    fn test_adjustment_json_shape() {
        let json = serde_json::to_value(&contract(1).adjustment).unwrap();
        assert_eq!(json["type"], "index_linked");
        assert_eq!(json["index_type"], "CPI");
        assert_eq!(json["compounding"], "prior_month");

        let parsed: Adjustment =
            serde_json::from_str(r#"{"type":"fixed_percentage","rate":5}"#).unwrap();
        assert_eq!(
            parsed,
            Adjustment::FixedPercentage {
                rate: Decimal::from_i64(5)
            }
        );
    }
}
