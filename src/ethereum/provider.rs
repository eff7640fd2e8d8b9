use alloy::{
    consensus::Transaction as _,
    primitives::B256,
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, Log},
    transports::http::{Client, Http},
};
use tracing::debug;

use super::utils;
use crate::error::{FetchError, FetchResult};

pub type HttpProvider = RootProvider<Http<Client>>;

/// JSON-RPC access to an Ethereum node.
///
/// Building the client does not touch the network; an unreachable endpoint
/// surfaces on the first request.
#[derive(Debug, Clone)]
pub struct RpcClient {
    provider: HttpProvider,
}

impl RpcClient {
    pub fn connect(rpc_url: &str) -> FetchResult<Self> {
        let url = rpc_url
            .trim()
            .parse()
            .map_err(|e| FetchError::Config(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self { provider })
    }

    /// `eth_getLogs` for `filter`, in the order the node returns them.
    pub async fn get_logs(&self, filter: &Filter) -> FetchResult<Vec<Log>> {
        let logs = self
            .provider
            .get_logs(filter)
            .await
            .map_err(|e| FetchError::Rpc(utils::interpret_rpc_error(&e.to_string())))?;
        debug!("eth_getLogs returned {} logs", logs.len());
        Ok(logs)
    }

    /// Calldata of a mined transaction.
    pub async fn transaction_input(&self, hash: B256) -> FetchResult<Vec<u8>> {
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| FetchError::Rpc(utils::interpret_rpc_error(&e.to_string())))?
            .ok_or_else(|| FetchError::Rpc(format!("Transaction {} not found", hash)))?;

        Ok(tx.input().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_is_lazy() {
        // Nothing listens here; construction must still succeed.
        assert!(RpcClient::connect("http://127.0.0.1:1").is_ok());
    }

    #[test]
    fn test_connect_rejects_malformed_url() {
        assert!(matches!(
            RpcClient::connect("not a url"),
            Err(FetchError::Config(_))
        ));
    }
}
