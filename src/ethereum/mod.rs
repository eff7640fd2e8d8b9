pub mod abi;
pub mod events;
pub mod explorer;
pub mod fetch;
pub mod provider;
pub mod utils;

use alloy::primitives::{Address, B256, U256};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A contract log decoded against its ABI event definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub address: Address,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
    pub event: String,
    /// Event arguments in ABI declaration order.
    pub args: Map<String, Value>,
}

/// A transaction's calldata decoded against the contract's function table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedCall {
    pub function: String,
    pub inputs: Map<String, Value>,
    #[serde(
        rename = "tokenId",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_decimal"
    )]
    pub token_id: Option<U256>,
}

/// Decoded calls keyed by transaction hash, in explorer order.
pub type FunctionCalls = Vec<(B256, DecodedCall)>;

fn serialize_decimal<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_call_json_shape() {
        let mut inputs = Map::new();
        inputs.insert("quantity".to_string(), Value::String("1".to_string()));

        let call = DecodedCall {
            function: "mint".to_string(),
            inputs: inputs.clone(),
            token_id: Some(U256::from(42)),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["function"], "mint");
        assert_eq!(json["tokenId"], "42");

        let call = DecodedCall {
            function: "withdraw".to_string(),
            inputs,
            token_id: None,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert!(json.get("tokenId").is_none());
    }
}
