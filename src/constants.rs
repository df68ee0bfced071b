/// Application constants

pub const API_VERSION: &str = "v1";

// Move package layout of the jumping contract
pub const MODULE_DATA: &str = "data";
pub const MODULE_NFT: &str = "nft";
pub const FN_NEW_GAME: &str = "new_game";
pub const FN_NEW_GAME_WITH_NFT: &str = "new_game_with_nft";
pub const FN_NEXT_STEP: &str = "next_step";
pub const FN_ENDLESS_NEXT_STEP: &str = "endless_next_step";
pub const FN_CLEAR_USER_INFO: &str = "clear_user_info";
pub const FN_BUY_STEPS: &str = "buy_steps";
pub const FN_MINT: &str = "mint";
pub const IDENTITY_STRUCT: &str = "BlackSquidJumpingNFT";
pub const STAKE_COIN_STRUCT: &str = "gp::GP";

// Shared on-chain randomness object
pub const RANDOM_OBJECT_ID: &str = "0x8";

// Session keys
pub const SESSION_KEY_MIN_LEN: usize = 30;
pub const SESSION_KEY_MAX_LEN: usize = 60; // exclusive
/// Wire keys this short select an endless-mode row instead of a session.
pub const ENDLESS_KEY_MAX_LEN: usize = 3;

// Step outcome encoding
pub const DEFAULT_LANE_COUNT: u8 = 2;
/// `safe_pos` reported to clients when no outcome could be resolved.
pub const SAFE_POS_REJECTED: i64 = -2;

// Transactions
pub const DEFAULT_GAS_BUDGET: u64 = 50_000_000;
pub const DEFAULT_START_STAKE: u64 = 10;

// Finality polling
pub const DEFAULT_FINALITY_POLL_ATTEMPTS: usize = 20;
pub const DEFAULT_FINALITY_POLL_INTERVAL_MS: u64 = 1_500;

// Dynamic field / owned object scans
pub const SCAN_PAGE_LIMIT: usize = 50;
pub const DEFAULT_MAX_SCAN_PAGES: usize = 200;

// Client-side reconciliation
pub const DEFAULT_SESSION_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_RECONCILE_GRACE_POLLS: u32 = 3;
pub const DEFAULT_RECONCILE_GRACE_SECS: i64 = 10;
pub const DEFAULT_DISPLAY_TIMEOUT_MS: u64 = 15_000;

// Network fullnodes
pub const SUI_MAINNET_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";
pub const SUI_TESTNET_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";

// Testnet deployment of the jumping and GP packages
pub const TESTNET_JUMPING_PACKAGE_ID: &str =
    "0x5da4fca2f86ccaf4b3b6a9564c851b89708e82797c982878de74133c14d1305f";
pub const TESTNET_JUMPING_PUBLISHER_ID: &str =
    "0xd8e658f23e0657b0c51da0e21c4b67f5133595fae0927665b344d588d5bda79d";
pub const TESTNET_JUMPING_DATA_POOL_ID: &str =
    "0xc9cdae81c480d7bf7215043a1a875f4c51a06f7f8ce0fbd687e4780b3396bde3";
pub const TESTNET_JUMPING_ENDLESS_GAME_ID: &str =
    "0xfac108a3a4f559feb02da45cf080f6a6fc4d70d54a3c23cbb2966535e207ca58";
pub const TESTNET_GP_PACKAGE_ID: &str =
    "0xed76019f4dd4bebdf513d03acdb66f6a728d69248e9046eead4d9a3420081e43";
