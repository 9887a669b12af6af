use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use chrono::DateTime;

use crate::error::{ClientError, Result};

/// Truncate an address to "0xabcd...ef12" format
pub fn truncate_address(addr: &Address) -> String {
    let s = format!("{addr}");
    if s.len() > 14 {
        format!("{}...{}", &s[..8], &s[s.len() - 4..])
    } else {
        s
    }
}

/// Format a U256 wei value as ETH
pub fn format_eth(wei: U256) -> String {
    let eth_str = format_u256_as_decimal(wei, 18);
    format!("{eth_str} ETH")
}

/// Format a U256 value as decimal with given decimals, without losing digits.
pub fn format_u256_as_decimal(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0.0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        return format!("{whole}.0");
    }

    let remainder_str = format!("{remainder}");
    let padded = format!("{:0>width$}", remainder_str, width = decimals as usize);
    let trimmed = padded.trim_end_matches('0');
    format!("{whole}.{trimmed}")
}

/// Format a Unix timestamp as a datetime string
pub fn format_timestamp(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%b %d, %Y %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Parse a user-entered ether amount into wei. Must be strictly positive.
pub fn parse_eth_amount(input: &str) -> Result<U256> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ClientError::Validation("amount is required".to_string()));
    }
    if input.starts_with('-') {
        return Err(ClientError::Validation(format!(
            "amount must be positive, got {input}"
        )));
    }
    if let Some((_, fraction)) = input.split_once('.') {
        if fraction.len() > 18 {
            return Err(ClientError::Validation(format!(
                "amount {input} has more than 18 decimal places"
            )));
        }
    }
    let wei = parse_ether(input)
        .map_err(|e| ClientError::Validation(format!("invalid amount {input:?}: {e}")))?;
    if wei.is_zero() {
        return Err(ClientError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(wei)
}

/// Parse a 0x-prefixed, 40 hex digit address in any letter case.
pub fn parse_address(input: &str) -> Result<Address> {
    let input = input.trim();
    if !(input.starts_with("0x") && input.len() == 42) {
        return Err(ClientError::Validation(format!(
            "{input:?} is not a 0x-prefixed 20-byte address"
        )));
    }
    input
        .parse::<Address>()
        .map_err(|e| ClientError::Validation(format!("invalid address {input:?}: {e}")))
}
