//! Token identities for pool resolution
//!
//! A `Token` is the asset identity the resolver canonicalizes on. Ordering
//! between two tokens is the Uniswap sort rule (address bytes), the symbol
//! is carried for logs and display only.

use alloy_primitives::{address, Address, U256};
use eyre::{eyre, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Ethereum mainnet
pub const MAINNET_CHAIN_ID: u64 = 1;

/// An ERC-20 token on a specific chain
#[derive(Debug, Clone)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
        }
    }

    /// True if this token is token0 of any pool it shares with `other`.
    ///
    /// Both tokens must live on the same chain and be distinct; that is a
    /// caller precondition.
    pub fn sorts_before(&self, other: &Token) -> bool {
        debug_assert_eq!(self.chain_id, other.chain_id, "tokens on different chains");
        debug_assert_ne!(self.address, other.address, "tokens have the same address");
        self.address < other.address
    }
}

// Identity is (chain, address). Symbol and decimals are metadata.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// A raw token amount (already scaled by decimals)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    pub token: Token,
    pub amount: U256,
}

impl TokenAmount {
    pub fn new(token: Token, amount: U256) -> Self {
        Self { token, amount }
    }
}

// ============================================
// KNOWN MAINNET TOKENS
// ============================================

const KNOWN_TOKENS: &[(&str, Address, u8)] = &[
    ("WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18),
    ("USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6),
    ("USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 6),
    ("DAI", address!("6B175474E89094C44Da98b954EedcdeCB5BE3830"), 18),
    ("WBTC", address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8),
    ("wstETH", address!("7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0"), 18),
    ("LINK", address!("514910771AF9Ca656af840dff83E8264EcF986CA"), 18),
    ("UNI", address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984"), 18),
    ("AAVE", address!("7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9"), 18),
    ("PEPE", address!("6982508145454Ce325dDbE47a25d4ec3d2311933"), 18),
    ("SHIB", address!("95aD61b0a150d79219dCF64E1E6Cc01f0B64C4cE"), 18),
    ("LDO", address!("5A98FcBEA516Cf06857215779Fd812CA3beF1B32"), 18),
    ("MKR", address!("9f8F72aA9304c8B593d555F12eF6589cC3A579A2"), 18),
];

/// All tokens with a known symbol on mainnet
pub fn known_tokens() -> Vec<Token> {
    KNOWN_TOKENS
        .iter()
        .map(|(symbol, address, decimals)| Token::new(MAINNET_CHAIN_ID, *address, *decimals, *symbol))
        .collect()
}

/// Look up a known token by symbol (case-insensitive)
pub fn find_by_symbol(symbol: &str) -> Option<Token> {
    known_tokens()
        .into_iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// Get token by address
pub fn find_by_address(address: &Address) -> Option<Token> {
    known_tokens().into_iter().find(|t| t.address == *address)
}

/// Resolve a CLI token argument: a known symbol or a raw `0x` address.
///
/// Unknown addresses are assumed to have 18 decimals and get a shortened
/// address as their symbol.
pub fn parse_token(arg: &str, chain_id: u64) -> Result<Token> {
    if let Some(mut token) = find_by_symbol(arg) {
        token.chain_id = chain_id;
        return Ok(token);
    }

    let address = Address::from_str(arg)
        .map_err(|_| eyre!("'{}' is neither a known symbol nor an address", arg))?;

    Ok(match find_by_address(&address) {
        Some(mut token) => {
            token.chain_id = chain_id;
            token
        }
        None => {
            let hex = format!("{:?}", address);
            Token::new(chain_id, address, 18, format!("{}...", &hex[..8]))
        }
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn weth() -> Token {
        find_by_symbol("WETH").unwrap()
    }

    pub fn usdc() -> Token {
        find_by_symbol("USDC").unwrap()
    }

    pub fn wbtc() -> Token {
        find_by_symbol("WBTC").unwrap()
    }

    pub fn dai() -> Token {
        find_by_symbol("DAI").unwrap()
    }
}
