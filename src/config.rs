//! App configuration and the JSON storage manager it lives in.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Smallest and largest requestable window.
pub const MIN_DAYS: u32 = 1;
pub const MAX_DAYS: u32 = 365;

/// Quote currencies supported by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Eur,
    Jpy,
    Gbp,
    Cad,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Jpy,
        Currency::Gbp,
        Currency::Cad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
            Currency::Jpy => "jpy",
            Currency::Gbp => "gbp",
            Currency::Cad => "cad",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "usd" => Some(Currency::Usd),
            "eur" => Some(Currency::Eur),
            "jpy" => Some(Currency::Jpy),
            "gbp" => Some(Currency::Gbp),
            "cad" => Some(Currency::Cad),
            _ => None,
        }
    }

    /// Next currency in the fixed cycle, for the UI toggle.
    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|c| c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub coin_id: String,
    pub vs_currency: Currency,
    pub days: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            coin_id: "bitcoin".to_string(),
            vs_currency: Currency::Usd,
            days: 90,
        }
    }
}

/// Requested days clamped to the supported 1..=365 window.
pub fn clamp_days(days: u32) -> u32 {
    days.clamp(MIN_DAYS, MAX_DAYS)
}

// STORAGE MANAGER

pub struct StorageManager {
    pub base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a manager whose storage path is relative to the running
    /// binary, creating the directory up front so save never has to check.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);
        Self::new_in(base_dir).await
    }

    /// Manager rooted at an explicit directory.
    pub async fn new_in(base_dir: PathBuf) -> anyhow::Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Saves any `Serialize` struct as pretty JSON. Writes to a .tmp file
    /// first and renames, so a crash mid-write leaves the original intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{}.json", filename);
        let final_path = self.base_dir.join(&file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&tmp_path, json_bytes).await?;
        tokio::fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));
        let content = fs::read(path).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }
}

/// Load `storage/config.json`, writing the defaults on first run so the
/// file is there to edit.
pub async fn load_or_init(storage: &StorageManager) -> anyhow::Result<AppConfig> {
    match storage.load::<AppConfig>("config").await {
        Ok(mut config) => {
            config.days = clamp_days(config.days);
            Ok(config)
        }
        Err(_) => {
            let config = AppConfig::default();
            storage.save("config", &config).await?;
            Ok(config)
        }
    }
}
