//! Static chain, DEX and price-feed tables.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// EVM networks with a configured RPC endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
    Fantom,
}

impl ChainId {
    pub const ALL: [Self; 7] = [
        Self::Ethereum,
        Self::Bsc,
        Self::Polygon,
        Self::Arbitrum,
        Self::Optimism,
        Self::Avalanche,
        Self::Fantom,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Bsc => "bsc",
            Self::Polygon => "polygon",
            Self::Arbitrum => "arbitrum",
            Self::Optimism => "optimism",
            Self::Avalanche => "avalanche",
            Self::Fantom => "fantom",
        }
    }

    /// Environment key fragment, e.g. `ETHEREUM` in `TOKENFEED_ETHEREUM_RPC_URL`.
    pub const fn env_name(self) -> &'static str {
        match self {
            Self::Ethereum => "ETHEREUM",
            Self::Bsc => "BSC",
            Self::Polygon => "POLYGON",
            Self::Arbitrum => "ARBITRUM",
            Self::Optimism => "OPTIMISM",
            Self::Avalanche => "AVALANCHE",
            Self::Fantom => "FANTOM",
        }
    }

    pub fn spec(self) -> &'static ChainSpec {
        match self {
            Self::Ethereum => &CHAINS[0],
            Self::Bsc => &CHAINS[1],
            Self::Polygon => &CHAINS[2],
            Self::Arbitrum => &CHAINS[3],
            Self::Optimism => &CHAINS[4],
            Self::Avalanche => &CHAINS[5],
            Self::Fantom => &CHAINS[6],
        }
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|chain| chain.as_str() == normalized)
            .ok_or(ValidationError::UnknownChain { value: normalized })
    }
}

/// Static description of one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
    pub id: ChainId,
    pub network_id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
    pub supported_dexes: &'static [&'static str],
    pub wrapped_native: &'static str,
    pub default_rpc_url: &'static str,
}

pub static CHAINS: [ChainSpec; 7] = [
    ChainSpec {
        id: ChainId::Ethereum,
        network_id: 1,
        name: "Ethereum",
        native_symbol: "ETH",
        explorer_url: "https://etherscan.io",
        is_testnet: false,
        supported_dexes: &["uniswap_v2", "uniswap_v3", "sushiswap", "curve", "balancer"],
        wrapped_native: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        default_rpc_url: "https://mainnet.infura.io/v3/9aa3d95b3bc440fa88ea12eaa4456161",
    },
    ChainSpec {
        id: ChainId::Bsc,
        network_id: 56,
        name: "Binance Smart Chain",
        native_symbol: "BNB",
        explorer_url: "https://bscscan.com",
        is_testnet: false,
        supported_dexes: &["pancakeswap_v2", "pancakeswap_v3", "biswap"],
        wrapped_native: "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c",
        default_rpc_url: "https://bsc-dataseed.binance.org/",
    },
    ChainSpec {
        id: ChainId::Polygon,
        network_id: 137,
        name: "Polygon",
        native_symbol: "MATIC",
        explorer_url: "https://polygonscan.com",
        is_testnet: false,
        supported_dexes: &["quickswap", "sushiswap", "curve"],
        wrapped_native: "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270",
        default_rpc_url: "https://polygon-rpc.com/",
    },
    ChainSpec {
        id: ChainId::Arbitrum,
        network_id: 42161,
        name: "Arbitrum One",
        native_symbol: "ETH",
        explorer_url: "https://arbiscan.io",
        is_testnet: false,
        supported_dexes: &["uniswap_v3", "sushiswap", "curve", "balancer"],
        wrapped_native: "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1",
        default_rpc_url: "https://arb1.arbitrum.io/rpc",
    },
    ChainSpec {
        id: ChainId::Optimism,
        network_id: 10,
        name: "Optimism",
        native_symbol: "ETH",
        explorer_url: "https://optimistic.etherscan.io",
        is_testnet: false,
        supported_dexes: &["uniswap_v3", "curve"],
        wrapped_native: "0x4200000000000000000000000000000000000006",
        default_rpc_url: "https://mainnet.optimism.io",
    },
    ChainSpec {
        id: ChainId::Avalanche,
        network_id: 43114,
        name: "Avalanche",
        native_symbol: "AVAX",
        explorer_url: "https://snowtrace.io",
        is_testnet: false,
        supported_dexes: &["traderjoe", "pangolin"],
        wrapped_native: "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7",
        default_rpc_url: "https://api.avax.network/ext/bc/C/rpc",
    },
    ChainSpec {
        id: ChainId::Fantom,
        network_id: 250,
        name: "Fantom",
        native_symbol: "FTM",
        explorer_url: "https://ftmscan.com",
        is_testnet: false,
        supported_dexes: &["spookyswap", "spiritswap"],
        wrapped_native: "0x21be370D5312f44cB42ce377BC9b8a0cEF1A4C83",
        default_rpc_url: "https://rpc.ftm.tools/",
    },
];

/// Swap fee schedule advertised by a DEX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSchedule {
    Flat(&'static str),
    Tiered(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub website: &'static str,
    pub supported_chains: &'static [ChainId],
    pub factory_address: &'static str,
    pub router_address: &'static str,
    pub fees: FeeSchedule,
}

pub static DEXES: [DexSpec; 8] = [
    DexSpec {
        id: "uniswap_v2",
        name: "Uniswap V2",
        website: "https://uniswap.org",
        supported_chains: &[ChainId::Ethereum],
        factory_address: "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f",
        router_address: "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
        fees: FeeSchedule::Flat("0.3%"),
    },
    DexSpec {
        id: "uniswap_v3",
        name: "Uniswap V3",
        website: "https://uniswap.org",
        supported_chains: &[
            ChainId::Ethereum,
            ChainId::Arbitrum,
            ChainId::Optimism,
            ChainId::Polygon,
        ],
        factory_address: "0x1F98431c8aD98523631AE4a59f267346ea31F984",
        router_address: "0xE592427A0AEce92De3Edee1F18E0157C05861564",
        fees: FeeSchedule::Tiered(&["0.01%", "0.05%", "0.3%", "1%"]),
    },
    DexSpec {
        id: "pancakeswap_v2",
        name: "PancakeSwap V2",
        website: "https://pancakeswap.finance",
        supported_chains: &[ChainId::Bsc],
        factory_address: "0xcA143Ce32Fe78f1f7019d7d551a6402fC5350c73",
        router_address: "0x10ED43C718714eb63d5aA57B78B54704E256024E",
        fees: FeeSchedule::Flat("0.25%"),
    },
    DexSpec {
        id: "pancakeswap_v3",
        name: "PancakeSwap V3",
        website: "https://pancakeswap.finance",
        supported_chains: &[ChainId::Bsc, ChainId::Ethereum],
        factory_address: "0x0BFbCF9fa4f9C56B0F40a671Ad40E0805A091865",
        router_address: "0x13f4EA83D0bd40E75C8222255bc855a974568Dd4",
        fees: FeeSchedule::Tiered(&["0.01%", "0.05%", "0.25%", "1%"]),
    },
    DexSpec {
        id: "sushiswap",
        name: "SushiSwap",
        website: "https://sushi.com",
        supported_chains: &[
            ChainId::Ethereum,
            ChainId::Polygon,
            ChainId::Arbitrum,
            ChainId::Avalanche,
        ],
        factory_address: "0xC0AEe478e3658e2610c5F7A4A2E1777cE9e4f2Ac",
        router_address: "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F",
        fees: FeeSchedule::Flat("0.3%"),
    },
    DexSpec {
        id: "quickswap",
        name: "QuickSwap",
        website: "https://quickswap.exchange",
        supported_chains: &[ChainId::Polygon],
        factory_address: "0x5757371414417b8C6CAad45bAeF941aBc7d3Ab32",
        router_address: "0xa5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff",
        fees: FeeSchedule::Flat("0.3%"),
    },
    DexSpec {
        id: "traderjoe",
        name: "Trader Joe",
        website: "https://traderjoexyz.com",
        supported_chains: &[ChainId::Avalanche],
        factory_address: "0x9Ad6C38BE94206cA50bb0d90783181662f0Cfa10",
        router_address: "0x60aE616a2155Ee3d9A68541Ba4544862310933d4",
        fees: FeeSchedule::Flat("0.3%"),
    },
    DexSpec {
        id: "spookyswap",
        name: "SpookySwap",
        website: "https://spookyswap.finance",
        supported_chains: &[ChainId::Fantom],
        factory_address: "0x152eE697f2E276fA89E96742e9bB9aB1F2E61bE3",
        router_address: "0xF491e7B69E4244ad4002BC14e878a34207E38c29",
        fees: FeeSchedule::Flat("0.2%"),
    },
];

const ETHEREUM_FEEDS: &[(&str, &str)] = &[
    ("ETH/USD", "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"),
    ("BTC/USD", "0xF4030086522a5bEEa4988F8cA5B36dbC97BeE88c"),
    ("USDC/USD", "0x8fFfFfd4AfB6115b954Bd326cbe7B4BA576818f6"),
    ("USDT/USD", "0x3E7d1eAB13ad0104d2750B8863b489D65364e32D"),
    ("DAI/USD", "0xAed0c38402a5d19df6E4c03F4E2DceD6e29c1ee9"),
    ("LINK/USD", "0x2c1d072e956AFFC0D435Cb7AC38EF18d24d9127c"),
    ("UNI/USD", "0x553303d460EE0afB37EdFf9bE42922D8FF63220e"),
];

const BSC_FEEDS: &[(&str, &str)] = &[
    ("BNB/USD", "0x0567F2323251f0Aab15c8dFb1967E4e8A7D42aeE"),
    ("BTC/USD", "0x264990fbd0A4796A3E3d8E37C4d5F87a3aCa5Ebf"),
    ("ETH/USD", "0x9ef1B8c0E4F7dc8bF5719Ea496883DC6401d5b2e"),
    ("USDT/USD", "0xB97Ad0E74fa7d920791E90258A6E2085088b4320"),
];

const POLYGON_FEEDS: &[(&str, &str)] = &[
    ("MATIC/USD", "0xAB594600376Ec9fD91F8e885dADF0CE036862dE0"),
    ("ETH/USD", "0xF9680D99D6C9589e2a93a78A04A279e509205945"),
    ("BTC/USD", "0xc907E116054Ad103354f2D350FD2514433D57F6f"),
    ("USDC/USD", "0xfE4A8cc5b5B2366C1B58Bea3858e81843581b2F7"),
];

/// Price-feed aggregator contracts deployed on `chain`, keyed by pair.
pub fn price_feeds(chain: ChainId) -> &'static [(&'static str, &'static str)] {
    match chain {
        ChainId::Ethereum => ETHEREUM_FEEDS,
        ChainId::Bsc => BSC_FEEDS,
        ChainId::Polygon => POLYGON_FEEDS,
        _ => &[],
    }
}

/// Feed contract for `pair` (case-insensitive, `BASE/QUOTE`) on `chain`.
pub fn feed_address(chain: ChainId, pair: &str) -> Option<&'static str> {
    let wanted = pair.trim().to_ascii_uppercase();
    price_feeds(chain)
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, address)| *address)
}
