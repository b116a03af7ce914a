//! Node configuration, read from command line flags.
//!
//! ```text
//! bucket-node [--bind <addr:port>] [--data-dir <path>] [--buckets <n>]
//!             [--name <name>] [--uri <url>]... [--log-level <level>]
//! ```

use anyhow::{Context, Result, bail};
use reqwest::Url;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

use crate::storage::locator::DEFAULT_BUCKET_COUNT;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_NODE_NAME: &str = "node";
pub const DEFAULT_LOG_LEVEL: Level = Level::INFO;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub bucket_count: u32,
    pub name: String,
    /// Contact URIs advertised for this node. Defaults to `http://<bind>/`.
    pub uris: Vec<Url>,
    pub log_level: Level,
    /// Flags that were not recognized, reported once logging is up.
    pub ignored: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5000))),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            bucket_count: DEFAULT_BUCKET_COUNT,
            name: DEFAULT_NODE_NAME.to_string(),
            uris: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL,
            ignored: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    /// Parses flags, not including the program name.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut config = Self::default();

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .map(String::as_str)
                    .with_context(|| format!("{} requires a value", flag))
            };

            match flag {
                "--bind" => {
                    config.bind = value()?
                        .parse()
                        .with_context(|| format!("invalid --bind address {:?}", args[i + 1]))?;
                    i += 2;
                }
                "--data-dir" => {
                    config.data_dir = PathBuf::from(value()?);
                    i += 2;
                }
                "--buckets" => {
                    config.bucket_count = value()?
                        .parse()
                        .with_context(|| format!("invalid --buckets value {:?}", args[i + 1]))?;
                    i += 2;
                }
                "--name" => {
                    config.name = value()?.to_string();
                    i += 2;
                }
                "--uri" => {
                    config.uris.push(
                        Url::parse(value()?)
                            .with_context(|| format!("invalid --uri {:?}", args[i + 1]))?,
                    );
                    i += 2;
                }
                "--log-level" => {
                    config.log_level = value()?
                        .parse()
                        .with_context(|| format!("invalid --log-level {:?}", args[i + 1]))?;
                    i += 2;
                }
                _ => {
                    config.ignored.push(args[i].clone());
                    i += 1;
                }
            }
        }

        if config.bucket_count == 0 {
            bail!("--buckets must be greater than zero");
        }
        if config.uris.is_empty() {
            config.uris.push(Url::parse(&format!("http://{}/", config.bind))?);
        }

        Ok(config)
    }
}
