pub mod deal;
pub mod rental;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Rate;

/// Coarse deal grade shared by the rental and MAO screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl DealQuality {
    /// Grade a rental on year-1 cash-on-cash and DSCR. Unlevered deals are
    /// graded on cash-on-cash alone.
    pub fn for_rental(cash_on_cash: Rate, dscr: Decimal, has_debt: bool) -> Self {
        let covered = |min: Decimal| !has_debt || dscr >= min;
        if cash_on_cash >= dec!(0.10) && covered(dec!(1.25)) {
            DealQuality::Excellent
        } else if cash_on_cash >= dec!(0.08) && covered(dec!(1.20)) {
            DealQuality::Good
        } else if cash_on_cash >= dec!(0.05) && covered(dec!(1.00)) {
            DealQuality::Fair
        } else {
            DealQuality::Poor
        }
    }

    /// Grade an offer by how the asking price sits against the MAO.
    pub fn for_price_to_mao(ratio: Decimal) -> Self {
        if ratio <= dec!(0.90) {
            DealQuality::Excellent
        } else if ratio <= dec!(1.00) {
            DealQuality::Good
        } else if ratio <= dec!(1.05) {
            DealQuality::Fair
        } else {
            DealQuality::Poor
        }
    }
}
