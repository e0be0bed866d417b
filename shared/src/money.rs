//! Money calculation utilities using rust_decimal for precision
//!
//! All monetary arithmetic is done on `Decimal`. Floating point never
//! touches a money path.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Rounding for monetary values (2 decimal places, half-up)
pub const DECIMAL_PLACES: u32 = 2;

/// Total for one line: unit price × quantity
pub fn line_total(price: Decimal, quantity: i32) -> Decimal {
    (price * Decimal::from(quantity)).round_dp(DECIMAL_PLACES)
}

/// Total across (price, quantity) pairs
pub fn order_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| line_total(price, quantity))
        .sum()
}

/// Convert a decimal amount to minor units (cents) for the gateway.
///
/// Returns `None` if the amount does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round_dp(0).to_i64()
}
