//! Per-environment records of where the four contracts are deployed. The
//! client never deploys anything itself; it only needs the addresses a
//! deployment run recorded.

use crate::chain::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// Addresses of the four deployed contracts a session talks to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractAddresses {
    pub whitelist: Address,
    pub nft: Address,
    pub token: Address,
    pub governance: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub network_url: String,
    pub whitelist_address: String,
    pub nft_address: String,
    pub token_address: String,
    pub governance_address: String,
}

impl DeploymentRecord {
    pub fn new(
        network_url: impl Into<String>,
        addresses: &ContractAddresses,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            network_url: network_url.into(),
            whitelist_address: addresses.whitelist.to_string(),
            nft_address: addresses.nft.to_string(),
            token_address: addresses.token.to_string(),
            governance_address: addresses.governance.to_string(),
        }
    }

    pub fn addresses(&self) -> Result<ContractAddresses> {
        Ok(ContractAddresses {
            whitelist: self
                .whitelist_address
                .parse()
                .wrap_err("invalid whitelist address in record")?,
            nft: self
                .nft_address
                .parse()
                .wrap_err("invalid NFT address in record")?,
            token: self
                .token_address
                .parse()
                .wrap_err("invalid token address in record")?,
            governance: self
                .governance_address
                .parse()
                .wrap_err("invalid governance address in record")?,
        })
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::new_under(Path::new(DEPLOYMENTS_ROOT), env)
    }

    /// Open (creating if missing) the record file under a custom root.
    pub fn new_under(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root, env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// The most recently appended record, which is the deployment a client
    /// session should use.
    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self.load()?.pop())
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create deployments/{} directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").wrap_err_with(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn sample_addresses() -> ContractAddresses {
        ContractAddresses {
            whitelist: Address([0x11; 20]),
            nft: Address([0x22; 20]),
            token: Address([0x33; 20]),
            governance: Address([0x44; 20]),
        }
    }

    #[test]
    fn appended_record_round_trips() {
        let dir = TempDir::new("deployments").unwrap();
        let store =
            DeploymentStore::new_under(dir.path(), DeploymentEnv::Local).unwrap();

        let addresses = sample_addresses();
        store
            .append(DeploymentRecord::new("http://localhost:8545", &addresses))
            .unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.network_url, "http://localhost:8545");
        assert_eq!(latest.addresses().unwrap(), addresses);
    }

    #[test]
    fn empty_store_has_no_latest() {
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new_under(dir.path(), DeploymentEnv::Dev).unwrap();
        assert!(store.latest().unwrap().is_none());
    }
}
