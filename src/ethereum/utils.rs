use alloy::primitives::Address;
use std::str::FromStr;

use crate::error::{FetchError, FetchResult};

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> FetchResult<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(FetchError::Config("Address cannot be empty".to_string()));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(FetchError::Config(format!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        )));
    }

    if address.len() != 42 {
        return Err(FetchError::Config(format!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        )));
    }

    if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FetchError::Config(format!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        )));
    }

    Address::from_str(address)
        .map_err(|e| FetchError::Config(format!("Invalid Ethereum address: '{}'. Error: {}", address, e)))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check your internet connection and web3_provider_api_key.".to_string()
    } else if error.contains("timeout") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("rate limit") || error.contains("429") {
        "Rate limit error: Too many requests to the RPC endpoint. Try again in a few moments or use a different endpoint.".to_string()
    } else if error.contains("query returned more than") || error.contains("block range") {
        format!(
            "Log query too large: the RPC endpoint limits eth_getLogs ranges. Pass a later start block. ({})",
            error
        )
    } else if error.contains("method not found") {
        "RPC error: The requested method is not supported by this RPC endpoint. Try using a different endpoint.".to_string()
    } else if error.contains("401") || error.contains("403") {
        "RPC authentication error: The endpoint rejected the request. Check the project key in web3_provider_api_key.".to_string()
    } else {
        error.to_string()
    }
}

/// Creates user-friendly error messages for block explorer failures
pub fn interpret_explorer_error(error: &str) -> String {
    let lowered = error.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("429") {
        "API rate limit: Too many requests to Etherscan API. Try again in a few moments.".to_string()
    } else if lowered.contains("invalid api key") || lowered.contains("missing/invalid api key") || lowered.contains("403") {
        "API authentication error: Invalid Etherscan API key. Check etherscan_api_key in your configuration.".to_string()
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        "Timeout error: Request to Etherscan API timed out. Try again in a few moments.".to_string()
    } else if lowered.contains("connect") || lowered.contains("dns") {
        "Network error: Cannot connect to Etherscan API. Check your internet connection.".to_string()
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        // Valid addresses
        assert!(validate_address("0x4Ced71C6F18b112A36634eef5aCFA6156C6dADaD").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());
        assert!(validate_address("  0x4ced71c6f18b112a36634eef5acfa6156c6dadad ").is_ok());

        // Invalid addresses
        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err()); // Too short
        assert!(validate_address("4Ced71C6F18b112A36634eef5aCFA6156C6dADaD").is_err()); // Missing 0x
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
    }

    #[test]
    fn test_interpret_errors() {
        assert!(interpret_rpc_error("error sending request: connection refused")
            .starts_with("Network error"));
        assert_eq!(interpret_rpc_error("something odd"), "something odd");

        assert!(interpret_explorer_error("NOTOK -- Invalid API Key").contains("API key"));
        assert!(interpret_explorer_error("Max rate limit reached").starts_with("API rate limit"));
    }
}
