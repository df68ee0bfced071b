use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_FINALITY_POLL_ATTEMPTS, DEFAULT_FINALITY_POLL_INTERVAL_MS, DEFAULT_GAS_BUDGET,
    DEFAULT_LANE_COUNT, DEFAULT_MAX_SCAN_PAGES, DEFAULT_START_STAKE, IDENTITY_STRUCT, MODULE_NFT,
    RANDOM_OBJECT_ID, STAKE_COIN_STRUCT, SUI_MAINNET_RPC_URL, SUI_TESTNET_RPC_URL,
    TESTNET_GP_PACKAGE_ID, TESTNET_JUMPING_DATA_POOL_ID, TESTNET_JUMPING_ENDLESS_GAME_ID,
    TESTNET_JUMPING_PACKAGE_ID, TESTNET_JUMPING_PUBLISHER_ID,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Mainnet => SUI_MAINNET_RPC_URL,
            Network::Testnet => SUI_TESTNET_RPC_URL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" | "" => Ok(Network::Testnet),
            other => anyhow::bail!("Unknown SUI_NETWORK: {}", other),
        }
    }
}

/// On-chain object references the game transactions point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainObjects {
    pub package_id: String,
    pub publisher_id: String,
    pub data_pool_id: String,
    pub endless_game_id: String,
    pub random_id: String,
    pub gp_package_id: String,
}

impl ChainObjects {
    pub fn stake_coin_type(&self) -> String {
        format!("{}::{}", self.gp_package_id, STAKE_COIN_STRUCT)
    }

    pub fn identity_type(&self) -> String {
        format!("{}::{}::{}", self.package_id, MODULE_NFT, IDENTITY_STRUCT)
    }

    fn testnet_defaults() -> Self {
        Self {
            package_id: TESTNET_JUMPING_PACKAGE_ID.to_string(),
            publisher_id: TESTNET_JUMPING_PUBLISHER_ID.to_string(),
            data_pool_id: TESTNET_JUMPING_DATA_POOL_ID.to_string(),
            endless_game_id: TESTNET_JUMPING_ENDLESS_GAME_ID.to_string(),
            random_id: RANDOM_OBJECT_ID.to_string(),
            gp_package_id: TESTNET_GP_PACKAGE_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Chain
    pub network: Network,
    pub rpc_url: String,
    pub objects: ChainObjects,

    // Backend signing
    pub backend_private_key: String,
    pub gas_budget: u64,
    /// Lets the backend signer submit starts itself instead of handing
    /// prepared transactions back to the player's wallet.
    pub backend_submit: bool,

    // Game rules
    pub lane_count: u8,
    pub start_stake: u64,

    // RPC behaviour
    pub finality_poll_attempts: usize,
    pub finality_poll_interval_ms: u64,
    pub max_scan_pages: usize,

    // CORS
    pub cors_allowed_origins: String,
}

pub(crate) fn env_or(name: &str, fallback: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

pub(crate) fn env_parse<T: FromStr>(name: &str, fallback: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        _ => Ok(fallback),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let network: Network = env_or("SUI_NETWORK", "testnet").parse()?;
        let defaults = match network {
            Network::Testnet => ChainObjects::testnet_defaults(),
            // Mainnet deployment ids must come from the environment.
            Network::Mainnet => ChainObjects {
                package_id: String::new(),
                publisher_id: String::new(),
                data_pool_id: String::new(),
                endless_game_id: String::new(),
                random_id: RANDOM_OBJECT_ID.to_string(),
                gp_package_id: String::new(),
            },
        };

        let objects = ChainObjects {
            package_id: env_or("JUMPING_PACKAGE_ID", &defaults.package_id),
            publisher_id: env_or("JUMPING_PUBLISHER_ID", &defaults.publisher_id),
            data_pool_id: env_or("JUMPING_DATA_POOL_ID", &defaults.data_pool_id),
            endless_game_id: env_or("JUMPING_ENDLESS_GAME_ID", &defaults.endless_game_id),
            random_id: env_or("RANDOM_OBJECT_ID", &defaults.random_id),
            gp_package_id: env_or("GP_PACKAGE_ID", &defaults.gp_package_id),
        };

        Ok(Config {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 7457)?,
            environment: env_or("ENVIRONMENT", "development"),

            network,
            rpc_url: env_or("SUI_RPC_URL", network.default_rpc_url()),
            objects,

            backend_private_key: env::var("BACKEND_PRIVATE_KEY")?,
            gas_budget: env_parse("GAS_BUDGET", DEFAULT_GAS_BUDGET)?,
            backend_submit: crate::utils::is_env_flag_enabled("BACKEND_SUBMIT"),

            lane_count: env_parse("LANE_COUNT", DEFAULT_LANE_COUNT)?,
            start_stake: env_parse("START_STAKE", DEFAULT_START_STAKE)?,

            finality_poll_attempts: env_parse(
                "FINALITY_POLL_ATTEMPTS",
                DEFAULT_FINALITY_POLL_ATTEMPTS,
            )?,
            finality_poll_interval_ms: env_parse(
                "FINALITY_POLL_INTERVAL_MS",
                DEFAULT_FINALITY_POLL_INTERVAL_MS,
            )?,
            max_scan_pages: env_parse("MAX_SCAN_PAGES", DEFAULT_MAX_SCAN_PAGES)?,

            cors_allowed_origins: env_or("CORS_ALLOWED_ORIGINS", "*"),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_url.trim().is_empty() {
            anyhow::bail!("SUI_RPC_URL is empty");
        }
        url::Url::parse(&self.rpc_url)
            .map_err(|e| anyhow::anyhow!("SUI_RPC_URL is not a valid URL: {}", e))?;
        if self.backend_private_key.trim().is_empty() {
            anyhow::bail!("BACKEND_PRIVATE_KEY is missing");
        }
        if self.lane_count < 2 {
            anyhow::bail!("LANE_COUNT must be at least 2");
        }
        if self.finality_poll_attempts == 0 || self.finality_poll_interval_ms == 0 {
            anyhow::bail!("Finality polling needs at least one attempt and a non-zero interval");
        }
        if self.max_scan_pages == 0 {
            anyhow::bail!("MAX_SCAN_PAGES must be > 0");
        }

        let required = [
            ("JUMPING_PACKAGE_ID", &self.objects.package_id),
            ("JUMPING_PUBLISHER_ID", &self.objects.publisher_id),
            ("JUMPING_DATA_POOL_ID", &self.objects.data_pool_id),
            ("JUMPING_ENDLESS_GAME_ID", &self.objects.endless_game_id),
            ("GP_PACKAGE_ID", &self.objects.gp_package_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("{} is empty", name);
            }
            if crate::utils::normalize_object_id(value).is_err() {
                anyhow::bail!("{} is not a valid object id", name);
            }
        }

        if self.network == Network::Mainnet && self.is_testnet() {
            tracing::warn!("SUI_NETWORK is mainnet but ENVIRONMENT looks like a test setup");
        }
        if self.start_stake == 0 {
            tracing::warn!("START_STAKE is 0; the contract will most likely reject new games");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        if self.environment == "development" || self.environment == "testnet" {
            return true;
        }
        self.network == Network::Testnet
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        network: Network::Testnet,
        rpc_url: SUI_TESTNET_RPC_URL.to_string(),
        objects: ChainObjects::testnet_defaults(),
        backend_private_key: "11".repeat(32),
        gas_budget: DEFAULT_GAS_BUDGET,
        backend_submit: true,
        lane_count: DEFAULT_LANE_COUNT,
        start_stake: DEFAULT_START_STAKE,
        finality_poll_attempts: 3,
        finality_poll_interval_ms: 1,
        max_scan_pages: 10,
        cors_allowed_origins: "*".to_string(),
    }
}
