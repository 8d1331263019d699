//! SwapRouter02 approval lookups
//!
//! Asks the router which approval flow each side of a swap needs. Both
//! answers come from one batched call; if either side fails there is no
//! answer at all.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;
use eyre::{eyre, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cartographer::{fetch_with_params, BatchStateFetcher, CallResult};
use crate::tokens::TokenAmount;

sol! {
    interface ISwapRouter02 {
        function getApprovalType(address token, uint256 amount) external returns (uint8);
    }
}

/// Router the approval queries are sent to
pub const SWAP_ROUTER_ADDRESS: Address = address!("075B36dE1Bd11cb361c5B3B1E80A9ab0e7aa8a60");

/// How a token must be approved before the router can pull it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalType {
    NotRequired,
    Max,
    MaxMinusOne,
    ZeroThenMax,
    ZeroThenMaxMinusOne,
}

impl TryFrom<u8> for ApprovalType {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ApprovalType::NotRequired),
            1 => Ok(ApprovalType::Max),
            2 => Ok(ApprovalType::MaxMinusOne),
            3 => Ok(ApprovalType::ZeroThenMax),
            4 => Ok(ApprovalType::ZeroThenMaxMinusOne),
            other => Err(eyre!("Unknown approval type {}", other)),
        }
    }
}

impl fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalType::NotRequired => write!(f, "NOT_REQUIRED"),
            ApprovalType::Max => write!(f, "MAX"),
            ApprovalType::MaxMinusOne => write!(f, "MAX_MINUS_ONE"),
            ApprovalType::ZeroThenMax => write!(f, "ZERO_THEN_MAX"),
            ApprovalType::ZeroThenMaxMinusOne => write!(f, "ZERO_THEN_MAX_MINUS_ONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenApprovalTypes {
    pub approval_token_in: ApprovalType,
    pub approval_token_out: ApprovalType,
}

pub struct ApprovalResolver {
    fetcher: Arc<dyn BatchStateFetcher>,
    router: Address,
}

impl ApprovalResolver {
    pub fn new(fetcher: Arc<dyn BatchStateFetcher>, router: Address) -> Self {
        Self { fetcher, router }
    }

    /// Approval type needed for each token. Fails if either query fails.
    pub async fn get_approval_type(
        &self,
        token_in_amount: &TokenAmount,
        token_out_amount: &TokenAmount,
    ) -> Result<TokenApprovalTypes> {
        let calls = [
            ISwapRouter02::getApprovalTypeCall {
                token: token_in_amount.token.address,
                amount: token_in_amount.amount,
            },
            ISwapRouter02::getApprovalTypeCall {
                token: token_out_amount.token.address,
                amount: token_out_amount.amount,
            },
        ];

        let batch = fetch_with_params(self.fetcher.as_ref(), self.router, &calls).await?;
        debug!("Approval types fetched as of block {}", batch.block_number);

        let decoded: Vec<Option<ApprovalType>> = batch
            .results
            .iter()
            .map(|r| match r {
                CallResult::Success(raw) => ApprovalType::try_from(*raw).ok(),
                CallResult::Failed { .. } => None,
            })
            .collect();

        match decoded.as_slice() {
            [Some(approval_token_in), Some(approval_token_out)] => Ok(TokenApprovalTypes {
                approval_token_in: *approval_token_in,
                approval_token_out: *approval_token_out,
            }),
            _ => {
                info!(
                    "Failed to get approval type from swap router for token in or token out: {:?}",
                    batch.results
                );
                Err(eyre!(
                    "Failed to get approval type from swap router for token in ({}) or token out ({})",
                    token_in_amount.token,
                    token_out_amount.token
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::multicall::testing::{failed, ok, uint8, MockFetcher};
    use crate::tokens::fixtures::*;
    use alloy_primitives::U256;
    use tokio_test::assert_err;

    type ApprovalCall = ISwapRouter02::getApprovalTypeCall;

    fn amounts() -> (TokenAmount, TokenAmount) {
        (
            TokenAmount::new(usdc(), U256::from(1_000_000u64)),
            TokenAmount::new(weth(), U256::from(10u64).pow(U256::from(18u64))),
        )
    }

    fn resolver(fetcher: Arc<MockFetcher>) -> ApprovalResolver {
        ApprovalResolver::new(fetcher, SWAP_ROUTER_ADDRESS)
    }

    #[tokio::test]
    async fn test_both_sides_succeed() {
        let fetcher = Arc::new(MockFetcher::new(7));
        fetcher.respond::<ApprovalCall>(vec![ok(uint8(0)), ok(uint8(3))]);

        let (token_in, token_out) = amounts();
        let approvals = resolver(fetcher.clone())
            .get_approval_type(&token_in, &token_out)
            .await
            .unwrap();

        assert_eq!(approvals.approval_token_in, ApprovalType::NotRequired);
        assert_eq!(approvals.approval_token_out, ApprovalType::ZeroThenMax);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, vec![SWAP_ROUTER_ADDRESS; 2]);
    }

    #[tokio::test]
    async fn test_either_failure_is_fatal() {
        let (token_in, token_out) = amounts();

        let fetcher = Arc::new(MockFetcher::new(7));
        fetcher.respond::<ApprovalCall>(vec![ok(uint8(1)), failed()]);
        assert_err!(resolver(fetcher).get_approval_type(&token_in, &token_out).await);

        let fetcher = Arc::new(MockFetcher::new(7));
        fetcher.respond::<ApprovalCall>(vec![failed(), ok(uint8(1))]);
        assert_err!(resolver(fetcher).get_approval_type(&token_in, &token_out).await);
    }

    #[tokio::test]
    async fn test_unknown_approval_type_is_fatal() {
        let fetcher = Arc::new(MockFetcher::new(7));
        fetcher.respond::<ApprovalCall>(vec![ok(uint8(1)), ok(uint8(9))]);

        let (token_in, token_out) = amounts();
        assert_err!(resolver(fetcher).get_approval_type(&token_in, &token_out).await);
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let fetcher = Arc::new(MockFetcher::new(7));
        fetcher.fail::<ApprovalCall>("timeout");

        let (token_in, token_out) = amounts();
        assert_err!(resolver(fetcher).get_approval_type(&token_in, &token_out).await);
    }

    #[test]
    fn test_approval_type_display() {
        assert_eq!(ApprovalType::try_from(2).unwrap().to_string(), "MAX_MINUS_ONE");
        assert!(ApprovalType::try_from(5).is_err());
    }
}
