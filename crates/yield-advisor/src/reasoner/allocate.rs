//! Allocation slices
//!
//! Template percentages are applied in order to ranked venues. When there
//! are fewer venues than template slots the unassigned share goes to the top
//! venue, so slices always total 100%.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{RiskTier, YieldOpportunity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub protocol: String,
    pub asset: String,
    pub percent: u8,
    pub amount_usd: Option<Decimal>,
    pub apy: Option<Decimal>,
    pub risk: RiskTier,
}

/// Size `template` across `venues` (already in preference order)
pub fn slices(template: &[u8], venues: &[&YieldOpportunity], amount: Option<Decimal>) -> Vec<AllocationSlice> {
    let used = template.len().min(venues.len());
    if used == 0 {
        return Vec::new();
    }

    let mut percents: Vec<u8> = template[..used].to_vec();
    let leftover: u8 = template[used..].iter().copied().fold(0u8, u8::saturating_add);
    percents[0] = percents[0].saturating_add(leftover);

    venues
        .iter()
        .zip(percents)
        .map(|(venue, percent)| AllocationSlice {
            protocol: venue.protocol.clone(),
            asset: venue.asset.clone(),
            percent,
            amount_usd: amount.and_then(|a| share(a, percent)),
            apy: venue.apy,
            risk: venue.risk,
        })
        .collect()
}

/// `percent` of `amount`, or `None` when it does not fit in a `Decimal`
fn share(amount: Decimal, percent: u8) -> Option<Decimal> {
    amount
        .checked_mul(Decimal::from(percent))?
        .checked_div(Decimal::ONE_HUNDRED)
        .map(|d| d.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn venue(protocol: &str) -> YieldOpportunity {
        YieldOpportunity::new(protocol, "USDC", RiskTier::Low, protocol)
    }

    #[test]
    fn test_amounts() {
        let (a, b, c) = (venue("Kamino"), venue("Solend"), venue("Orca"));
        let out = slices(&[40, 30, 30], &[&a, &b, &c], Some(dec!(1000)));

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].amount_usd, Some(dec!(400)));
        assert_eq!(out[2].protocol, "Orca");
        assert_eq!(out[2].amount_usd, Some(dec!(300)));
    }

    #[test]
    fn test_fewer_venues_than_slots() {
        let a = venue("Kamino");
        let out = slices(&[40, 30, 30], &[&a], None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].percent, 100);
        assert_eq!(out[0].amount_usd, None);
    }

    #[test]
    fn test_no_venues() {
        assert!(slices(&[40, 30, 30], &[], Some(dec!(10))).is_empty());
    }

    #[test]
    fn test_amount_too_large_is_left_out() {
        let (a, b) = (venue("Kamino"), venue("Solend"));
        let out = slices(&[40, 30, 30], &[&a, &b], Some(Decimal::MAX));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].percent, 70);
        assert_eq!(out[0].amount_usd, None);
        assert_eq!(out[1].amount_usd, None);
    }
}
