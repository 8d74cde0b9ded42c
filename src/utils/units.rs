//! Conversion of raw integer amounts into human readable decimal strings.

use alloy::primitives::U256;

/// 10^77 is the largest power of ten that fits into 256 bits
pub const MAX_DECIMALS: u8 = 77;

/// Formats a base-unit amount with the given number of decimals.
///
/// The integer part is always present. The fractional part keeps at most
/// `decimals` digits, trailing zeros are stripped, and the decimal point is
/// dropped when nothing remains after it. Amounts with more than
/// [`MAX_DECIMALS`] decimals cannot be represented and read as `"0"`.
///
/// # Examples
/// ```
/// use alloy::primitives::U256;
/// use faction::utils::units::format_units;
///
/// assert_eq!(format_units(U256::from(1_500_000_000_000_000_000_u128), 18), "1.5");
/// assert_eq!(format_units(U256::ZERO, 18), "0");
/// ```
#[must_use]
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    if decimals > MAX_DECIMALS {
        return "0".to_string();
    }

    let base = U256::from(10).pow(U256::from(decimals));
    let (whole, fraction) = value.div_rem(base);

    if fraction.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Formats a wei amount as ether.
#[must_use]
pub fn format_ether(wei: U256) -> String {
    format_units(wei, 18)
}

/// Parses a quantity as returned by JSON-RPC (`0x` prefixed hex) or a plain
/// decimal string.
///
/// Returns `None` for anything that is not a valid unsigned integer.
#[must_use]
pub fn parse_quantity(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        return U256::from_str_radix(hex, 16).ok();
    }
    if raw.is_empty() {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ether_fractional() {
        let wei = U256::from(1_500_000_000_000_000_000_u128);
        assert_eq!(format_ether(wei), "1.5");
    }

    #[test]
    fn test_format_ether_zero() {
        assert_eq!(format_ether(U256::ZERO), "0");
    }

    #[test]
    fn test_format_ether_strips_decimal_point() {
        let wei = U256::from(2_000_000_000_000_000_000_u128);
        assert_eq!(format_ether(wei), "2");
    }

    #[test]
    fn test_format_ether_smallest_unit() {
        assert_eq!(format_ether(U256::from(1)), "0.000000000000000001");
    }

    #[test]
    fn test_format_units_token_decimals() {
        // 12.34 USDC
        assert_eq!(format_units(U256::from(12_340_000), 6), "12.34");
        assert_eq!(format_units(U256::from(42), 0), "42");
    }

    #[test]
    fn test_format_units_decimal_bounds() {
        let one = U256::from(10).pow(U256::from(MAX_DECIMALS));
        assert_eq!(format_units(one, MAX_DECIMALS), "1");
        assert_eq!(format_units(one, MAX_DECIMALS + 1), "0");
        assert_eq!(format_units(U256::MAX, u8::MAX), "0");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0"), Some(U256::ZERO));
        assert_eq!(
            parse_quantity("0x14d1120d7b160000"),
            Some(U256::from(1_500_000_000_000_000_000_u128))
        );
        assert_eq!(parse_quantity("3"), Some(U256::from(3)));
        assert_eq!(parse_quantity("0x"), None);
        assert_eq!(parse_quantity("not a number"), None);
        assert_eq!(parse_quantity(""), None);
    }
}
