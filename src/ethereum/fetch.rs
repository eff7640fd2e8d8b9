use alloy::{
    dyn_abi::DynSolValue,
    json_abi::{JsonAbi, Param},
    primitives::{Address, B256, U256},
    rpc::types::{BlockNumberOrTag, Filter, Log},
};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{
    abi::{self, SignatureTable},
    events::{self, EventDecoder, EventKind},
    explorer::{EtherscanClient, ExplorerTransaction, NftTransfer, LATEST_BLOCK, TRANSFER_PAGE_SIZE},
    provider::RpcClient,
    DecodedCall, EventRecord, FunctionCalls,
};
use crate::error::FetchResult;

/// Everything needed to wire a [`Fetch`] to its services.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub abi_path: PathBuf,
    pub deployment_block: u64,
    pub explorer_api_key: String,
    pub network: String,
}

/// Reconstructs the history of a single NFT contract from node logs and
/// explorer listings.
#[derive(Debug)]
pub struct Fetch {
    rpc: RpcClient,
    explorer: EtherscanClient,
    contract_address: Address,
    abi: JsonAbi,
    deployment_block: u64,
    signatures: SignatureTable,
    decoder: EventDecoder,
}

impl Fetch {
    pub async fn new(config: FetchConfig) -> FetchResult<Self> {
        let rpc = RpcClient::connect(&config.rpc_url)?;
        let abi = abi::load_abi(&config.abi_path).await?;
        let explorer = EtherscanClient::new(config.explorer_api_key, &config.network)?;

        Ok(Self::from_parts(
            rpc,
            explorer,
            config.contract_address,
            abi,
            config.deployment_block,
        ))
    }

    pub fn from_parts(
        rpc: RpcClient,
        explorer: EtherscanClient,
        contract_address: Address,
        abi: JsonAbi,
        deployment_block: u64,
    ) -> Self {
        let signatures = SignatureTable::from_abi(&abi);
        let decoder = EventDecoder::from_abi(&abi);

        if signatures.is_empty() {
            warn!("ABI declares no functions; no transaction will decode");
        }
        if decoder.is_empty() {
            warn!("ABI declares no events; event queries will fail or return nothing");
        }
        info!(
            "Tracking {} from block {} via {} chain {} ({} selectors, {} events)",
            contract_address,
            deployment_block,
            explorer.base_url(),
            explorer.chain_id(),
            signatures.len(),
            decoder.len()
        );

        Self {
            rpc,
            explorer,
            contract_address,
            abi,
            deployment_block,
            signatures,
            decoder,
        }
    }

    pub fn signatures(&self) -> &SignatureTable {
        &self.signatures
    }

    /// Decoded contract events of `kind` from `start_block` to the chain head.
    ///
    /// A missing or zero start block means the deployment block.
    pub async fn events(&self, kind: EventKind, start_block: Option<u64>) -> FetchResult<Vec<EventRecord>> {
        let from = resolve_start_block(start_block, self.deployment_block);
        info!("Fetching '{}' events from block {}", kind, from);

        let filter = self.event_filter(kind, from)?;
        let logs = self.rpc.get_logs(&filter).await?;
        let records = self.decode_events(kind, &logs)?;

        info!("Decoded {} '{}' events", records.len(), kind);
        Ok(records)
    }

    /// The log filter for `kind`: the contract address, the event's topic0
    /// unless every event is wanted, and blocks `from..=latest`.
    pub fn event_filter(&self, kind: EventKind, from: u64) -> FetchResult<Filter> {
        let filter = Filter::new()
            .address(self.contract_address)
            .from_block(from)
            .to_block(BlockNumberOrTag::Latest);

        match abi_event_name(kind) {
            Some(name) => {
                let event = events::find_event(&self.abi, name)?;
                Ok(filter.event_signature(event.selector()))
            }
            None => Ok(filter),
        }
    }

    /// Decode logs fetched with [`Fetch::event_filter`] for the same `kind`.
    pub fn decode_events(&self, kind: EventKind, logs: &[Log]) -> FetchResult<Vec<EventRecord>> {
        let Some(name) = abi_event_name(kind) else {
            return self.decoder.decode_all(logs);
        };

        let event = events::find_event(&self.abi, name)?;
        let records = logs
            .iter()
            .map(|log| events::decode_log(event, log))
            .collect::<FetchResult<Vec<_>>>()?;

        match kind {
            EventKind::Mint => Ok(events::partition_mints(records)?.0),
            EventKind::NotMint => Ok(events::partition_mints(records)?.1),
            _ => Ok(records),
        }
    }

    /// Hashes of the normal transactions sent to the contract, newest first.
    pub async fn transactions(&self) -> FetchResult<Vec<B256>> {
        let txns = self.contract_txns(self.contract_address).await?;
        Ok(txns.into_iter().map(|txn| txn.hash).collect())
    }

    /// Full explorer records of the normal transactions of `address` since
    /// the contract's deployment block, newest first.
    pub async fn contract_txns(&self, address: Address) -> FetchResult<Vec<ExplorerTransaction>> {
        self.explorer
            .normal_transactions(address, self.deployment_block, LATEST_BLOCK)
            .await
    }

    /// The first page of ERC-721 transfers of the contract, newest first.
    ///
    /// Only one page of [`TRANSFER_PAGE_SIZE`] records is requested; older
    /// transfers beyond it are not returned.
    pub async fn contract_transfers(&self) -> FetchResult<Vec<NftTransfer>> {
        let transfers = self
            .explorer
            .nft_transfers_by_contract(self.contract_address, 1, TRANSFER_PAGE_SIZE)
            .await?;
        if page_is_full(transfers.len()) {
            warn!(
                "Transfer history reached the page size of {}; older transfers are not included",
                TRANSFER_PAGE_SIZE
            );
        }
        Ok(transfers)
    }

    /// Decode the calldata of every transaction sent to the contract.
    ///
    /// Transactions whose calldata matches no known selector are left out.
    /// The first failing request aborts the whole run.
    pub async fn functions(&self) -> FetchResult<FunctionCalls> {
        let hashes = self.transactions().await?;
        let transfers = self.contract_transfers().await?;

        let mut inputs = Vec::with_capacity(hashes.len());
        for hash in hashes {
            inputs.push((hash, self.rpc.transaction_input(hash).await?));
        }

        let calls = decode_calls(&self.signatures, inputs, &transfers)?;
        info!("Decoded {} contract calls", calls.len());
        Ok(calls)
    }
}

/// The ABI event a kind is fetched as. `All` spans every event.
fn abi_event_name(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Listed => Some("Listed"),
        EventKind::Bought => Some("Bought"),
        EventKind::Transfer | EventKind::Mint | EventKind::NotMint => Some("Transfer"),
        EventKind::Approval => Some("Approval"),
        EventKind::OwnershipTransferred => Some("OwnershipTransferred"),
        EventKind::All => None,
    }
}

fn page_is_full(count: usize) -> bool {
    count >= TRANSFER_PAGE_SIZE as usize
}

/// Decode `(hash, calldata)` pairs in order, dropping those that match no
/// known selector. The first decoding error aborts the batch.
pub fn decode_calls<I>(
    signatures: &SignatureTable,
    inputs: I,
    transfers: &[NftTransfer],
) -> FetchResult<FunctionCalls>
where
    I: IntoIterator<Item = (B256, Vec<u8>)>,
{
    let mut calls = FunctionCalls::new();
    for (hash, input) in inputs {
        match decode_transaction(signatures, hash, &input, transfers)? {
            Some(call) => {
                debug!("{} -> {}", hash, call.function);
                calls.push((hash, call));
            }
            None => debug!("{} has no known selector, skipping", hash),
        }
    }
    Ok(calls)
}

pub fn resolve_start_block(start_block: Option<u64>, deployment_block: u64) -> u64 {
    match start_block {
        None | Some(0) => deployment_block,
        Some(block) => block,
    }
}

/// Decode one transaction's calldata and work out the token it touched.
///
/// For `mint*` calls the token id comes from the explorer transfer with the
/// same hash; for anything else from a decoded `tokenId` argument.
pub fn decode_transaction(
    signatures: &SignatureTable,
    hash: B256,
    input: &[u8],
    transfers: &[NftTransfer],
) -> FetchResult<Option<DecodedCall>> {
    let Some((function, values)) = signatures.decode_input(input)? else {
        return Ok(None);
    };

    let inputs = abi::named_values(abi::param_names(&function.inputs), &values)?;

    let token_id = if function.name.starts_with("mint") {
        transfers
            .iter()
            .find(|transfer| transfer.hash == hash)
            .map(NftTransfer::token_id)
            .transpose()?
    } else {
        token_id_argument(&function.inputs, &values)
    };

    Ok(Some(DecodedCall {
        function: function.name.clone(),
        inputs,
        token_id,
    }))
}

// Only an unsigned `tokenId` is carried over; other types are left out.
fn token_id_argument(params: &[Param], values: &[DynSolValue]) -> Option<U256> {
    params
        .iter()
        .zip(values)
        .find(|(param, _)| param.name == "tokenId")
        .and_then(|(_, value)| match value {
            DynSolValue::Uint(id, _) => Some(*id),
            _ => None,
        })
}
