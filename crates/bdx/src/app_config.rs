//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of self-harm that
//! even the borrow checker wouldn't approve of. Loaded once at startup and handed to
//! [`crate::client::Client::connect`]. Nothing deeper in the crate reads the environment.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::accumulator::BulkConfig;
use crate::backends::OpenSearchConfig;
use crate::indices::IndexResolver;

/// 📦 Everything the client needs to know about itself, which is more self-awareness
/// than most apps achieve in their lifetime.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🏷️ Deployment prefix, e.g. `prod` for `prod_sessions`. Empty is legal.
    #[serde(default)]
    pub index_prefix: String,
    /// 📡 Where the cluster lives and how to talk to it.
    pub backend: OpenSearchConfig,
    /// 📦 How hard to batch.
    #[serde(default)]
    pub bulk: BulkConfig,
}

impl AppConfig {
    pub fn resolver(&self) -> IndexResolver {
        IndexResolver::new(self.index_prefix.clone())
    }
}

/// 🚀 Load the config from env vars, a file, or the sheer power of hoping.
///
/// 🔧 `BDX_*` env vars form the base layer, `__` separates nesting
/// (`BDX_BULK__WORKERS=4`, `BDX_BACKEND__ADDRESSES=["https://search:9200"]`).
/// If a TOML file is given it's merged on top and wins on conflicts.
/// No file means env only. No pizza defaults.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("BDX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BDX_*). \
             The file exists in our hearts, but apparently not in a shape serde likes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BDX_*). \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
