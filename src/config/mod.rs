pub mod schema;

pub use schema::{
    BridgeConfig, Config, GatewayConfig, ReliabilityConfig, StorageConfig,
};
