//! Opportunity ranking
//!
//! APY descending, then TVL descending, missing values last in both. The sort
//! is stable, so anything still tied keeps source-declared order.

use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::model::YieldOpportunity;

fn descending_nulls_last(a: Option<Decimal>, b: Option<Decimal>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare_rank(a: &YieldOpportunity, b: &YieldOpportunity) -> Ordering {
    descending_nulls_last(a.apy, b.apy).then_with(|| descending_nulls_last(a.tvl_usd, b.tvl_usd))
}

pub fn rank(opportunities: &mut [YieldOpportunity]) {
    opportunities.sort_by(compare_rank);
}
