//! CLI argument definitions for the Apothecary binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use apothecary_core::config::ApothecaryConfig;

/// Apothecary - semantic product recommendations with generated explanations.
#[derive(Parser, Debug)]
#[command(name = "apothecary", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed the product catalog and persist a new index version.
    BuildIndex {
        /// Catalog JSON file (overrides `paths.catalog`).
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Output index file (overrides `paths.index`).
        #[arg(long)]
        index: Option<PathBuf>,
        /// Output metadata file (overrides `paths.metadata`).
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Run one query against the persisted index and print JSON.
    Recommend {
        /// Free-text query.
        query: String,
        /// Number of products to return.
        #[arg(short = 'k', long = "top-k", allow_negative_numbers = true)]
        top_k: Option<i64>,
        /// Also generate an explanation.
        #[arg(long)]
        augment: bool,
    },
    /// Generate a description for one catalog product and print JSON.
    Describe {
        /// Product id.
        id: i64,
    },
    /// Start the HTTP API.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > APOTHECARY_CONFIG env var > ./apothecary.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("APOTHECARY_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("apothecary.toml")
    }

    /// Apply command-line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut ApothecaryConfig) {
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        match &self.command {
            Command::BuildIndex {
                catalog,
                index,
                metadata,
            } => {
                if let Some(p) = catalog {
                    config.paths.catalog = p.clone();
                }
                if let Some(p) = index {
                    config.paths.index = p.clone();
                }
                if let Some(p) = metadata {
                    config.paths.metadata = p.clone();
                }
            }
            Command::Serve { port: Some(p) } => config.general.port = *p,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recommend() {
        let args =
            CliArgs::try_parse_from(["apothecary", "recommend", "tea for sleep", "-k", "5"])
                .unwrap();
        match args.command {
            Command::Recommend {
                query,
                top_k,
                augment,
            } => {
                assert_eq!(query, "tea for sleep");
                assert_eq!(top_k, Some(5));
                assert!(!augment);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "apothecary",
            "serve",
            "--port",
            "8080",
            "--config",
            "/tmp/a.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/a.toml"));

        let mut config = ApothecaryConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_build_index_path_overrides() {
        let args = CliArgs::try_parse_from([
            "apothecary",
            "build-index",
            "--catalog",
            "data/other.json",
            "--index",
            "out/idx.bin",
        ])
        .unwrap();

        let mut config = ApothecaryConfig::default();
        let default_metadata = config.paths.metadata.clone();
        args.apply_overrides(&mut config);
        assert_eq!(config.paths.catalog, PathBuf::from("data/other.json"));
        assert_eq!(config.paths.index, PathBuf::from("out/idx.bin"));
        assert_eq!(config.paths.metadata, default_metadata);
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(CliArgs::try_parse_from(["apothecary"]).is_err());
    }
}
