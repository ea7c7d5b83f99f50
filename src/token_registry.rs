//! Token registry for managing token information

use ethers::types::Address;
use eyre::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::types::Token;

#[derive(Debug, Deserialize)]
struct TokenFileEntry {
    address: Address,
    symbol: String,
    #[serde(default)]
    name: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    tokens: Vec<TokenFileEntry>,
}

/// Tokens known to the service, indexed by address and symbol. Built once at
/// startup and never mutated afterwards; requests for unknown addresses fall
/// back to [`Token::unknown`].
#[derive(Debug, Default)]
pub struct TokenRegistry {
    by_address: HashMap<Address, Token>,
    by_symbol: HashMap<String, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the mainnet anchor tokens.
    pub fn mainnet_defaults() -> Self {
        let mut registry = Self::new();
        for (address, symbol, name, decimals) in [
            (
                "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
                "WETH",
                "Wrapped Ether",
                18u8,
            ),
            (
                "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "USDC",
                "USD Coin",
                6,
            ),
            (
                "0xdAC17F958D2ee523a2206206994597C13D831ec7",
                "USDT",
                "Tether USD",
                6,
            ),
            (
                "0x6B175474E89094C44Da98b954EedeAC495271d0F",
                "DAI",
                "Dai Stablecoin",
                18,
            ),
        ] {
            registry.register(Token {
                address: address.parse().expect("known-good token address"),
                symbol: symbol.to_string(),
                name: name.to_string(),
                decimals,
            });
        }
        registry
    }

    /// Loads additional tokens from a JSON file of the shape
    /// `{"tokens": [{"address", "symbol", "name", "decimals"}, ...]}`.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let raw = std::fs::read_to_string(path.as_ref())
            .wrap_err("failed to read token config")?;
        let file: TokenFile =
            serde_json::from_str(&raw).wrap_err("failed to parse token config")?;

        let count = file.tokens.len();
        for entry in file.tokens {
            self.register(Token {
                address: entry.address,
                symbol: entry.symbol,
                name: entry.name,
                decimals: entry.decimals,
            });
        }
        Ok(count)
    }

    pub fn register(&mut self, token: Token) {
        self.by_symbol.insert(token.symbol.clone(), token.clone());
        self.by_address.insert(token.address, token);
    }

    pub fn by_address(&self, address: Address) -> Option<&Token> {
        self.by_address.get(&address)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.by_symbol.get(symbol)
    }

    /// The registered token, or a generic 18-decimals placeholder for
    /// addresses the registry has never seen.
    pub fn resolve(&self, address: Address) -> Token {
        self.by_address
            .get(&address)
            .cloned()
            .unwrap_or_else(|| Token::unknown(address))
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
