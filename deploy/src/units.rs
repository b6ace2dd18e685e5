use alloy::primitives::U256;

use crate::error::DeployError;

/// Parses a whole-token count such as `100000000` or `100_000_000`.
pub fn parse_whole(amount: &str) -> Result<U256, DeployError> {
    let digits: String = amount.trim().chars().filter(|c| *c != '_').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DeployError::InvalidAmount(amount.to_string()));
    }
    U256::from_str_radix(&digits, 10).map_err(|_| DeployError::InvalidAmount(amount.to_string()))
}

/// Converts whole tokens into the token's smallest unit.
pub fn scale_whole(amount: U256, decimals: u8) -> Result<U256, DeployError> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .and_then(|unit| amount.checked_mul(unit))
        .ok_or_else(|| DeployError::AmountOverflow {
            amount: amount.to_string(),
            decimals,
        })
}
