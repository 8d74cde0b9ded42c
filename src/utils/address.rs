use alloy::primitives::Address;

use crate::wallet::error::WalletError;

/// Validates an address the way wallets do before accepting it.
///
/// The input must be `0x` followed by 40 hex digits. All-lowercase and
/// all-uppercase inputs are accepted as is; mixed-case inputs must carry a
/// valid EIP-55 checksum.
///
/// # Errors
/// * `WalletError::InvalidAddress` if the input is not a valid address
pub fn parse_address(raw: &str) -> Result<Address, WalletError> {
    let raw = raw.trim();
    let invalid = || WalletError::InvalidAddress(raw.to_string());

    let digits = raw.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(raw, None).map_err(|_| invalid());
    }

    raw.parse::<Address>().map_err(|_| invalid())
}

/// Lowercase `0x` prefixed representation used for session state.
#[must_use]
pub fn to_lower_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WETH_CHECKSUMMED: &str = "0x4200000000000000000000000000000000000006";
    const USDC_CHECKSUMMED: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

    #[test]
    fn test_accepts_checksummed_and_single_case() {
        assert!(parse_address(WETH_CHECKSUMMED).is_ok());
        assert!(parse_address(USDC_CHECKSUMMED).is_ok());
        assert!(parse_address(&USDC_CHECKSUMMED.to_lowercase()).is_ok());
        assert!(parse_address(&format!("0x{}", USDC_CHECKSUMMED[2..].to_uppercase())).is_ok());
    }

    #[test]
    fn test_rejects_bad_checksum() {
        // Flip the case of one letter in a checksummed address
        let bad = USDC_CHECKSUMMED.replacen("fCD", "FCD", 1);
        assert!(matches!(
            parse_address(&bad),
            Err(WalletError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in ["", "0x", "0x1234", "4200000000000000000000000000000000000006", "0xzz00000000000000000000000000000000000006"] {
            assert!(parse_address(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_to_lower_hex() {
        let address = parse_address(USDC_CHECKSUMMED).unwrap();
        assert_eq!(to_lower_hex(&address), USDC_CHECKSUMMED.to_lowercase());
    }
}
