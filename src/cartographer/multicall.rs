//! Batched read transport - MULTICALL3 Edition
//!
//! The resolver never talks to an RPC node directly. It hands a list of
//! targets and one encoded call to a `BatchStateFetcher` and gets back one
//! positional result per target. `Multicall3Fetcher` does that with a single
//! `tryBlockAndAggregate` eth_call per chunk.

use alloy_primitives::{address, Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use futures::future::try_join_all;
use std::time::Instant;
use tracing::{debug, trace, warn};

// ============================================
// MULTICALL3 INTERFACE
// ============================================

sol! {
    /// Multicall3 - deployed at same address on all EVM chains
    interface IMulticall3 {
        struct Call {
            address target;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function tryBlockAndAggregate(bool requireSuccess, Call[] calldata calls)
            external payable returns (uint256 blockNumber, bytes32 blockHash, Result[] memory returnData);
    }
}

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Maximum calls per batch (to avoid gas limits)
pub const MAX_CALLS_PER_BATCH: usize = 100;

// ============================================
// TYPES
// ============================================

/// Undecoded outcome of one call inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCallResult {
    pub success: bool,
    pub return_data: Bytes,
}

/// Positional results of a batch plus the block they were read at
#[derive(Debug, Clone, Default)]
pub struct BatchResponse {
    pub block_number: u64,
    pub results: Vec<RawCallResult>,
}

/// Decoded outcome of one call inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult<T> {
    Success(T),
    Failed { return_data: Bytes },
}

impl<T> CallResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            CallResult::Success(value) => Some(value),
            CallResult::Failed { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            CallResult::Success(value) => Some(value),
            CallResult::Failed { .. } => None,
        }
    }
}

/// Decoded batch
#[derive(Debug, Clone)]
pub struct DecodedBatch<T> {
    pub block_number: u64,
    pub results: Vec<CallResult<T>>,
}

/// Executes the same read-only call against many targets in one round trip.
///
/// Implementations must keep result order identical to request order and
/// must report per-call reverts as `success = false`. An `Err` means the
/// batch itself could not be executed.
#[async_trait]
pub trait BatchStateFetcher: Send + Sync {
    async fn call_same_function_on_multiple_contracts(
        &self,
        addresses: &[Address],
        call_data: Bytes,
    ) -> Result<BatchResponse>;

    async fn call_same_function_on_contract_with_multiple_params(
        &self,
        address: Address,
        call_data: Vec<Bytes>,
    ) -> Result<BatchResponse>;
}

// ============================================
// TYPED HELPERS
// ============================================

fn decode_results<C: SolCall>(expected: usize, response: BatchResponse) -> Result<DecodedBatch<C::Return>> {
    if response.results.len() != expected {
        return Err(eyre!(
            "{} batch returned {} results for {} calls",
            C::SIGNATURE,
            response.results.len(),
            expected
        ));
    }

    let results = response
        .results
        .into_iter()
        .map(|raw| {
            if !raw.success {
                return CallResult::Failed { return_data: raw.return_data };
            }
            match C::abi_decode_returns(&raw.return_data) {
                Ok(value) => CallResult::Success(value),
                Err(e) => {
                    trace!("Failed to decode {} return: {}", C::SIGNATURE, e);
                    CallResult::Failed { return_data: raw.return_data }
                }
            }
        })
        .collect();

    Ok(DecodedBatch {
        block_number: response.block_number,
        results,
    })
}

/// Run `call` against every address and decode each successful return
pub async fn fetch_same_call<C: SolCall>(
    fetcher: &dyn BatchStateFetcher,
    addresses: &[Address],
    call: &C,
) -> Result<DecodedBatch<C::Return>> {
    let response = fetcher
        .call_same_function_on_multiple_contracts(addresses, call.abi_encode().into())
        .await
        .wrap_err_with(|| format!("Batched {} failed", C::SIGNATURE))?;

    decode_results::<C>(addresses.len(), response)
}

/// Run one call per parameter set against a single contract
pub async fn fetch_with_params<C: SolCall>(
    fetcher: &dyn BatchStateFetcher,
    address: Address,
    calls: &[C],
) -> Result<DecodedBatch<C::Return>> {
    let call_data = calls.iter().map(|c| Bytes::from(c.abi_encode())).collect();

    let response = fetcher
        .call_same_function_on_contract_with_multiple_params(address, call_data)
        .await
        .wrap_err_with(|| format!("Batched {} on {:?} failed", C::SIGNATURE, address))?;

    decode_results::<C>(calls.len(), response)
}

// ============================================
// MULTICALL3 FETCHER
// ============================================

pub struct Multicall3Fetcher {
    rpc_url: String,
    multicall: Address,
    max_calls_per_batch: usize,
}

impl Multicall3Fetcher {
    pub fn new(rpc_url: String) -> Self {
        Self::with_settings(rpc_url, MULTICALL3, MAX_CALLS_PER_BATCH)
    }

    pub fn with_settings(rpc_url: String, multicall: Address, max_calls_per_batch: usize) -> Self {
        Self {
            rpc_url,
            multicall,
            max_calls_per_batch: max_calls_per_batch.max(1),
        }
    }

    /// Execute one Multicall3 batch
    async fn execute_multicall(&self, calls: Vec<IMulticall3::Call>) -> Result<BatchResponse> {
        if calls.is_empty() {
            return Ok(BatchResponse::default());
        }

        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let calldata = IMulticall3::tryBlockAndAggregateCall {
            requireSuccess: false,
            calls,
        }
        .abi_encode();

        let tx = TransactionRequest::default()
            .to(self.multicall)
            .input(calldata.into());

        let result = provider
            .call(tx)
            .await
            .map_err(|e| eyre!("Multicall3 failed: {}", e))?;

        let decoded = IMulticall3::tryBlockAndAggregateCall::abi_decode_returns(&result)
            .map_err(|e| eyre!("Failed to decode multicall result: {}", e))?;

        Ok(BatchResponse {
            block_number: decoded.blockNumber.saturating_to::<u64>(),
            results: decoded
                .returnData
                .into_iter()
                .map(|r| RawCallResult {
                    success: r.success,
                    return_data: r.returnData,
                })
                .collect(),
        })
    }

    /// Split into chunks, run them concurrently, stitch results back in order
    async fn execute_chunked(&self, calls: Vec<IMulticall3::Call>) -> Result<BatchResponse> {
        let start = Instant::now();
        let total = calls.len();

        let chunks: Vec<Vec<IMulticall3::Call>> = calls
            .chunks(self.max_calls_per_batch)
            .map(|c| c.to_vec())
            .collect();
        let chunk_count = chunks.len();

        let responses = try_join_all(chunks.into_iter().map(|c| self.execute_multicall(c))).await?;

        let block_number = responses.first().map(|r| r.block_number).unwrap_or_default();
        if responses.iter().any(|r| r.block_number != block_number) {
            warn!("Multicall3 chunks were served from different blocks");
        }

        let results: Vec<RawCallResult> = responses.into_iter().flat_map(|r| r.results).collect();

        debug!(
            "Multicall3: {} calls in {} chunk(s) at block {} ({:?})",
            total,
            chunk_count,
            block_number,
            start.elapsed()
        );

        Ok(BatchResponse {
            block_number,
            results,
        })
    }
}

#[async_trait]
impl BatchStateFetcher for Multicall3Fetcher {
    async fn call_same_function_on_multiple_contracts(
        &self,
        addresses: &[Address],
        call_data: Bytes,
    ) -> Result<BatchResponse> {
        let calls = addresses
            .iter()
            .map(|target| IMulticall3::Call {
                target: *target,
                callData: call_data.clone(),
            })
            .collect();

        self.execute_chunked(calls).await
    }

    async fn call_same_function_on_contract_with_multiple_params(
        &self,
        address: Address,
        call_data: Vec<Bytes>,
    ) -> Result<BatchResponse> {
        let calls = call_data
            .into_iter()
            .map(|data| IMulticall3::Call {
                target: address,
                callData: data,
            })
            .collect();

        self.execute_chunked(calls).await
    }
}
