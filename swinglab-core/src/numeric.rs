//! Rounding applied at the point of storage.
//!
//! The simulator keeps full precision internally; these helpers are used only
//! when a value is written into a `TradeMark` or the slope column.

/// Decimals for balances, costs and P&L.
pub const MONEY_DECIMALS: i32 = 2;
/// Decimals for trade prices (entry, exit, target, stop).
pub const PRICE_DECIMALS: i32 = 3;
/// Decimals for position quantity.
pub const QUANTITY_DECIMALS: i32 = 6;
/// Decimals for the regression slope.
pub const SLOPE_DECIMALS: i32 = 8;

/// Round `value` to `decimals` places (half away from zero).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // Normalize -0.0 so stored output is byte-stable.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn money(value: f64) -> f64 {
    round_to(value, MONEY_DECIMALS)
}

pub fn price(value: f64) -> f64 {
    round_to(value, PRICE_DECIMALS)
}

pub fn quantity(value: f64) -> f64 {
    round_to(value, QUANTITY_DECIMALS)
}
