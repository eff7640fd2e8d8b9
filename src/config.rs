use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{FetchError, FetchResult};
use crate::ethereum::{fetch::FetchConfig, utils};

/// The "In Writing" contract this tool was built around.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x4Ced71C6F18b112A36634eef5aCFA6156C6dADaD";
/// Block in which [`DEFAULT_CONTRACT_ADDRESS`] was deployed.
pub const DEFAULT_DEPLOYMENT_BLOCK: u64 = 14536393;
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Full JSON-RPC endpoint URL, including any project key.
    #[serde(default)]
    pub web3_provider_api_key: String,
    #[serde(default)]
    pub etherscan_api_key: String,
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    #[serde(default = "default_abi_path")]
    pub abi_path: PathBuf,
    #[serde(default = "default_deployment_block")]
    pub deployment_block: u64,
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.to_string()
}

fn default_abi_path() -> PathBuf {
    PathBuf::from("abi.json")
}

fn default_deployment_block() -> u64 {
    DEFAULT_DEPLOYMENT_BLOCK
}

fn default_network() -> String {
    "main".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web3_provider_api_key: String::new(),
            etherscan_api_key: String::new(),
            contract_address: default_contract_address(),
            abi_path: default_abi_path(),
            deployment_block: default_deployment_block(),
            network: default_network(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, or TOML when the extension is `.toml`
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(content)
                .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))
        } else {
            serde_json::from_str(content)
                .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))
        }
    }

    /// Load configuration, falling back to defaults only when no path was
    /// given and [`DEFAULT_CONFIG_FILE`] does not exist.
    ///
    /// An explicit path that cannot be read, or any file that fails to
    /// parse, is an error.
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let explicit = path.map(|p| p.as_ref().to_path_buf());
        let mut config = Self::load_with_fallback(explicit, Path::new(DEFAULT_CONFIG_FILE)).await?;
        config.apply_env_vars(|name| std::env::var(name).ok());
        Ok(config)
    }

    async fn load_with_fallback(explicit: Option<PathBuf>, default_path: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if !fs::try_exists(default_path).await.unwrap_or(false) => {
                tracing::warn!("No config file at {:?}, using defaults", default_path);
                return Ok(Self::default());
            }
            None => default_path.to_path_buf(),
        };

        let config = Self::load_from_file(&path).await?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Apply environment variable overrides to the API keys
    fn apply_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("WEB3_PROVIDER_API_KEY").filter(|v| !v.is_empty()) {
            tracing::info!("Using WEB3_PROVIDER_API_KEY environment variable for the RPC endpoint");
            self.web3_provider_api_key = provider;
        }

        if let Some(key) = lookup("ETHERSCAN_API_KEY").filter(|v| !v.is_empty()) {
            tracing::debug!("Using ETHERSCAN_API_KEY environment variable");
            self.etherscan_api_key = key;
        }
    }

    /// Fail fast when a required key is missing
    pub fn validate(&self) -> FetchResult<()> {
        if self.web3_provider_api_key.trim().is_empty() || self.etherscan_api_key.trim().is_empty() {
            return Err(FetchError::Config(
                "config.json has not been properly filled out! Both web3_provider_api_key and etherscan_api_key are required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_fetch_config(&self) -> FetchResult<FetchConfig> {
        self.validate()?;
        let contract_address = utils::validate_address(&self.contract_address)?;

        Ok(FetchConfig {
            rpc_url: self.web3_provider_api_key.clone(),
            contract_address,
            abi_path: self.abi_path.clone(),
            deployment_block: self.deployment_block,
            explorer_api_key: self.etherscan_api_key.clone(),
            network: self.network.clone(),
        })
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("nft-history").join(DEFAULT_CONFIG_FILE))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample = Config {
            web3_provider_api_key: "https://mainnet.infura.io/v3/YOUR_PROJECT_ID".to_string(),
            etherscan_api_key: "YOUR_ETHERSCAN_API_KEY".to_string(),
            ..Config::default()
        };
        serde_json::to_string_pretty(&sample).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config = Config::parse(
            r#"{"web3_provider_api_key": "https://rpc.example", "etherscan_api_key": "ABC"}"#,
            Path::new("config.json"),
        )
        .unwrap();

        assert_eq!(config.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.deployment_block, DEFAULT_DEPLOYMENT_BLOCK);
        assert_eq!(config.abi_path, PathBuf::from("abi.json"));
        assert_eq!(config.network, "main");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_config() {
        let config = Config::parse(
            "web3_provider_api_key = \"https://rpc.example\"\netherscan_api_key = \"ABC\"\nnetwork = \"sepolia\"\n",
            Path::new("config.toml"),
        )
        .unwrap();

        assert_eq!(config.network, "sepolia");
        assert_eq!(config.etherscan_api_key, "ABC");
    }

    #[test]
    fn test_validate_rejects_empty_keys() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(FetchError::Config(_))));

        config.web3_provider_api_key = "https://rpc.example".to_string();
        assert!(matches!(config.validate(), Err(FetchError::Config(_))));

        config.web3_provider_api_key.clear();
        config.etherscan_api_key = "ABC".to_string();
        assert!(matches!(config.validate(), Err(FetchError::Config(_))));
        assert!(config.to_fetch_config().is_err());
    }

    #[test]
    fn test_env_overrides_keys() {
        let mut config = Config::default();
        config.apply_env_vars(|name| match name {
            "WEB3_PROVIDER_API_KEY" => Some("https://rpc.example".to_string()),
            "ETHERSCAN_API_KEY" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.web3_provider_api_key, "https://rpc.example");
        assert!(config.etherscan_api_key.is_empty());
    }

    #[test]
    fn test_to_fetch_config() {
        let config = Config {
            web3_provider_api_key: "https://rpc.example".to_string(),
            etherscan_api_key: "ABC".to_string(),
            ..Config::default()
        };

        let fetch_config = config.to_fetch_config().unwrap();
        assert_eq!(
            fetch_config.contract_address,
            utils::validate_address(DEFAULT_CONTRACT_ADDRESS).unwrap()
        );
        assert_eq!(fetch_config.explorer_api_key, "ABC");
    }

    #[test]
    fn test_generated_sample_round_trips() {
        let sample = Config::generate_sample();
        let config = Config::parse(&sample, Path::new("config.json")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_missing_default_file_falls_back() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_fallback(None, &dir.path().join(DEFAULT_CONFIG_FILE))
            .await
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_default_file_is_loaded_when_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{"web3_provider_api_key": "https://rpc.example", "etherscan_api_key": "ABC"}"#)
            .unwrap();

        let config = Config::load_with_fallback(None, &path).await.unwrap();
        assert_eq!(config.etherscan_api_key, "ABC");
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = Config::load_or_default(Some(dir.path().join("absent.json"))).await;
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        // Trailing comma
        std::fs::write(
            &path,
            r#"{"web3_provider_api_key": "https://rpc.example", "etherscan_api_key": "ABC",}"#,
        )
        .unwrap();

        let explicit = Config::load_or_default(Some(&path)).await.unwrap_err();
        assert!(explicit.to_string().contains("Failed to parse config file"));

        let implicit = Config::load_with_fallback(None, &path).await.unwrap_err();
        assert!(implicit.to_string().contains("Failed to parse config file"));
    }
}
