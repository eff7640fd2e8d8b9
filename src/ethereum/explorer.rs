use alloy::primitives::{Address, B256, U256};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::utils;
use crate::error::{FetchError, FetchResult};

/// Etherscan's sentinel for "up to the chain head".
pub const LATEST_BLOCK: u64 = 99_999_999;

/// Page size used for ERC-721 transfer history. Only the first page is
/// ever requested, so results beyond this count are not returned.
pub const TRANSFER_PAGE_SIZE: u32 = 10_000;

/// Messages Etherscan returns with status "0" for an empty result set.
const EMPTY_RESULT_MESSAGES: [&str; 2] = ["No transactions found", "No token transfers found"];

/// Host of the multichain Etherscan API; the chain is picked by `chainid`.
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io";

/// A normal transaction as listed by the explorer. Numeric fields are kept
/// as the decimal strings Etherscan returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    pub hash: B256,
    pub block_number: String,
    pub time_stamp: String,
    pub from: Address,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub is_error: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// An ERC-721 transfer event as indexed by the explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftTransfer {
    pub hash: B256,
    #[serde(rename = "tokenID")]
    pub token_id: String,
    pub from: Address,
    pub to: Address,
    #[serde(default)]
    pub block_number: String,
    #[serde(default)]
    pub time_stamp: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl NftTransfer {
    pub fn token_id(&self) -> FetchResult<U256> {
        U256::from_str_radix(self.token_id.trim(), 10).map_err(|e| {
            FetchError::Decode(format!("Invalid tokenID '{}' in transfer {}: {}", self.token_id, self.hash, e))
        })
    }
}

/// Client for the Etherscan account API. Listings are always requested
/// newest first.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    client: Client,
    api_key: String,
    base_url: String,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn new(api_key: impl Into<String>, network: &str) -> FetchResult<Self> {
        let chain_id = Self::chain_id_for(network)?;
        Ok(Self::with_base_url(api_key, ETHERSCAN_API_URL, chain_id))
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            chain_id,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Map a network identifier to the chain id Etherscan expects.
    pub fn chain_id_for(network: &str) -> FetchResult<u64> {
        match network.to_lowercase().as_str() {
            "main" | "mainnet" | "ethereum" => Ok(1),
            "sepolia" => Ok(11155111),
            "holesky" => Ok(17000),
            other => Err(FetchError::Config(format!(
                "Unsupported explorer network: '{}'. Supported: main, sepolia, holesky",
                other
            ))),
        }
    }

    /// Normal transactions sent from or to `address`.
    pub async fn normal_transactions(
        &self,
        address: Address,
        start_block: u64,
        end_block: u64,
    ) -> FetchResult<Vec<ExplorerTransaction>> {
        let query = txlist_query(address, start_block, end_block);
        let txns: Vec<ExplorerTransaction> = self.get(&query).await?;
        info!("Explorer returned {} transactions for {}", txns.len(), address);
        Ok(txns)
    }

    /// One page of ERC-721 transfer events for a token contract.
    pub async fn nft_transfers_by_contract(
        &self,
        contract: Address,
        page: u32,
        offset: u32,
    ) -> FetchResult<Vec<NftTransfer>> {
        let query = tokennfttx_query(contract, page, offset);
        let transfers: Vec<NftTransfer> = self.get(&query).await?;
        info!(
            "Explorer returned {} ERC-721 transfers for {} (page {}, offset {})",
            transfers.len(),
            contract,
            page,
            offset
        );
        Ok(transfers)
    }

    async fn get<T: DeserializeOwned>(&self, query: &[(&'static str, String)]) -> FetchResult<Vec<T>> {
        let url = format!("{}/v2/api", self.base_url);
        debug!("GET {} {:?}", url, query);

        let response: Value = self
            .client
            .get(&url)
            .query(&[("chainid", self.chain_id.to_string())])
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Explorer(utils::interpret_explorer_error(&e.to_string())))?
            .error_for_status()
            .map_err(|e| FetchError::Explorer(utils::interpret_explorer_error(&e.to_string())))?
            .json()
            .await
            .map_err(|e| FetchError::Explorer(format!("Failed to parse explorer response: {}", e)))?;

        parse_response(response)
    }
}

pub fn txlist_query(
    address: Address,
    start_block: u64,
    end_block: u64,
) -> Vec<(&'static str, String)> {
    vec![
        ("module", "account".to_string()),
        ("action", "txlist".to_string()),
        ("address", format!("{:?}", address)),
        ("startblock", start_block.to_string()),
        ("endblock", end_block.to_string()),
        ("sort", "desc".to_string()),
    ]
}

pub fn tokennfttx_query(
    contract: Address,
    page: u32,
    offset: u32,
) -> Vec<(&'static str, String)> {
    vec![
        ("module", "account".to_string()),
        ("action", "tokennfttx".to_string()),
        ("contractaddress", format!("{:?}", contract)),
        ("page", page.to_string()),
        ("offset", offset.to_string()),
        ("sort", "desc".to_string()),
    ]
}

/// Unwrap an Etherscan `{status, message, result}` envelope.
pub fn parse_response<T: DeserializeOwned>(response: Value) -> FetchResult<Vec<T>> {
    let message = response["message"].as_str().unwrap_or("Unknown error");

    if response["status"] != "1" {
        if EMPTY_RESULT_MESSAGES.contains(&message) {
            debug!("Explorer returned an empty result: {}", message);
            return Ok(Vec::new());
        }
        let detail = match &response["result"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(FetchError::Explorer(utils::interpret_explorer_error(&format!(
            "{} -- {}",
            message, detail
        ))));
    }

    serde_json::from_value(response["result"].clone())
        .map_err(|e| FetchError::Explorer(format!("Unexpected explorer result format: {}", e)))
}
