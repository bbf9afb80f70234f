pub mod config;

pub use self::config::{
    load_node_config, load_proxy_config, save_node_config, validate_node_config,
    validate_proxy_config,
};
