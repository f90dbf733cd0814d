//! Configuration for MUTT services: static tunables loaded once from
//! environment and file at startup ([`static_config`]), and the dynamic,
//! hot-reloadable cache backed by the substrate ([`dynamic`]).

mod dynamic;
mod static_config;

pub use dynamic::DynamicConfigClient;
pub use static_config::{
    config_path, load_static_config, AdminApiConfig, AlerterConfig, DatabaseConfig,
    DelivererConfig, IngestorConfig, RemediatorConfig, StaticConfig, StaticConfigError,
    SubstrateConfig, CONFIG_FILE,
};
