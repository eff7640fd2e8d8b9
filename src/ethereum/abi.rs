use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::{Function, JsonAbi, Param},
    primitives::Selector,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{FetchError, FetchResult};

/// Read and parse a contract ABI document (a JSON array of ABI entries).
pub async fn load_abi<P: AsRef<Path>>(path: P) -> FetchResult<JsonAbi> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let abi: JsonAbi = serde_json::from_str(&content).map_err(|e| {
        FetchError::Abi(format!("Malformed ABI JSON in {}: {}", path.display(), e))
    })?;

    info!(
        "Loaded ABI from {:?}: {} functions, {} events",
        path,
        abi.functions().count(),
        abi.events().count()
    );
    Ok(abi)
}

/// Selector-indexed view over the functions of an ABI.
///
/// Built once per contract. Keys are fixed-width 4-byte selectors, so a
/// lookup compares exactly the leading four bytes of calldata.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    functions: BTreeMap<Selector, Function>,
}

impl SignatureTable {
    pub fn from_abi(abi: &JsonAbi) -> Self {
        let mut functions = BTreeMap::new();
        for function in abi.functions() {
            functions
                .entry(function.selector())
                .or_insert_with(|| function.clone());
        }
        debug!("Built signature table with {} selectors", functions.len());
        Self { functions }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, selector: &Selector) -> Option<&Function> {
        self.functions.get(selector)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Selector, &Function)> {
        self.functions.iter()
    }

    /// Find the function whose selector matches the first four bytes of `input`.
    pub fn lookup(&self, input: &[u8]) -> Option<&Function> {
        let selector = Selector::try_from(input.get(..4)?).ok()?;
        self.get(&selector)
    }

    /// Decode calldata against the matching function.
    ///
    /// Returns `Ok(None)` when no selector matches.
    pub fn decode_input(&self, input: &[u8]) -> FetchResult<Option<(&Function, Vec<DynSolValue>)>> {
        let Some(function) = self.lookup(input) else {
            return Ok(None);
        };

        let values = function.abi_decode_input(&input[4..], false).map_err(|e| {
            FetchError::Decode(format!("Failed to decode input of {}: {}", function.name, e))
        })?;

        Ok(Some((function, values)))
    }
}

/// Pair decoded values with their parameter names, keeping ABI order.
///
/// Unnamed parameters are keyed by their position.
pub fn named_values<'a, I>(names: I, values: &[DynSolValue]) -> FetchResult<Map<String, Value>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut map = Map::new();
    for (index, (name, value)) in names.into_iter().zip(values).enumerate() {
        let key = if name.is_empty() {
            index.to_string()
        } else {
            name.to_string()
        };
        map.insert(key, dyn_sol_value_to_json(value)?);
    }
    Ok(map)
}

pub fn param_names(params: &[Param]) -> impl Iterator<Item = &str> {
    params.iter().map(|p| p.name.as_str())
}

/// Convert a decoded ABI value to JSON.
///
/// Integers are rendered as decimal strings so that 256-bit values survive.
pub fn dyn_sol_value_to_json(value: &DynSolValue) -> FetchResult<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(format!("0x{:x}", addr))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(word, size) => Ok(Value::String(format!(
            "0x{}",
            hex::encode(&word[..*size])
        ))),
        DynSolValue::Function(function) => Ok(Value::String(format!(
            "0x{}",
            hex::encode(function.as_slice())
        ))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            let mut json_arr = Vec::with_capacity(items.len());
            for item in items {
                json_arr.push(dyn_sol_value_to_json(item)?);
            }
            Ok(Value::Array(json_arr))
        }
        #[allow(unreachable_patterns)]
        _ => Err(FetchError::Decode(format!(
            "Unsupported DynSolValue type: {:?}",
            value
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use tempfile::tempdir;

    pub(crate) const NFT_ABI: &str = include_str!("testdata/nft_abi.json");

    pub(crate) fn nft_abi() -> JsonAbi {
        parse_abi(NFT_ABI)
    }

    fn parse_abi(content: &str) -> JsonAbi {
        serde_json::from_str(content).unwrap()
    }

    #[test]
    fn test_signature_table_matches_abi() {
        let abi = nft_abi();
        let table = SignatureTable::from_abi(&abi);

        assert_eq!(table.len(), abi.functions().count());
        for function in abi.functions() {
            let entry = table.get(&function.selector()).unwrap();
            assert_eq!(entry.name, function.name);
            assert_eq!(entry.inputs, function.inputs);
            assert_eq!(entry.outputs, function.outputs);
        }
    }

    #[test]
    fn test_signature_table_deduplicates_selectors() {
        let doubled = r#"[
            {"type":"function","name":"burn","inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
            {"type":"function","name":"burn","inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"}
        ]"#;
        let abi = parse_abi(doubled);

        assert_eq!(SignatureTable::from_abi(&abi).len(), 1);
    }

    #[test]
    fn test_lookup_requires_full_selector() {
        let abi = nft_abi();
        let table = SignatureTable::from_abi(&abi);
        let mint = abi.function("mint").unwrap()[0].clone();
        let selector = mint.selector();

        assert!(table.lookup(&selector[..3]).is_none());
        assert!(table.lookup(&[]).is_none());
        assert_eq!(table.lookup(selector.as_slice()).unwrap().name, "mint");
        assert!(table.lookup(&[0xde, 0xad, 0xbe, 0xef, 0x00]).is_none());
    }

    #[test]
    fn test_decode_input_names_arguments() {
        let abi = nft_abi();
        let table = SignatureTable::from_abi(&abi);
        let mint = &abi.function("mint").unwrap()[0];
        let to = Address::repeat_byte(0x11);
        let calldata = mint
            .abi_encode_input(&[DynSolValue::Address(to), DynSolValue::Uint(U256::from(3), 256)])
            .unwrap();

        let (function, values) = table.decode_input(&calldata).unwrap().unwrap();
        let inputs = named_values(param_names(&function.inputs), &values).unwrap();

        assert_eq!(function.name, "mint");
        assert_eq!(inputs["to"], Value::String(format!("0x{:x}", to)));
        assert_eq!(inputs["quantity"], Value::String("3".to_string()));
        let keys: Vec<&String> = inputs.keys().collect();
        assert_eq!(keys, vec!["to", "quantity"]);
    }

    #[test]
    fn test_decode_input_rejects_truncated_arguments() {
        let abi = nft_abi();
        let table = SignatureTable::from_abi(&abi);
        let selector = abi.function("mint").unwrap()[0].selector();
        let mut calldata = selector.to_vec();
        calldata.extend_from_slice(&[0u8; 7]);

        assert!(matches!(
            table.decode_input(&calldata),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_named_values_uses_position_for_unnamed_params() {
        let values = vec![DynSolValue::Bool(true), DynSolValue::Bytes(vec![0xab])];
        let map = named_values(["", "data"], &values).unwrap();

        assert_eq!(map["0"], Value::Bool(true));
        assert_eq!(map["data"], Value::String("0xab".to_string()));
    }

    #[tokio::test]
    async fn test_load_abi_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abi.json");
        std::fs::write(&path, NFT_ABI).unwrap();

        let abi = load_abi(&path).await.unwrap();
        assert!(abi.function("mint").is_some());
    }

    #[tokio::test]
    async fn test_load_abi_errors() {
        let dir = tempdir().unwrap();

        let missing = load_abi(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(FetchError::Io { .. })));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not an abi").unwrap();
        let broken = load_abi(&path).await;
        assert!(matches!(broken, Err(FetchError::Abi(_))));
    }
}
