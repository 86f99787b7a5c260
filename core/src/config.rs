use crate::{classifier::Classification, directory::Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    Gemini,
    #[default]
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub provider: ClassifierProvider,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    /// The key itself never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Classification returned by the `fixed` provider.
    #[serde(default)]
    pub fixed: Classification,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            fixed: Classification::default(),
        }
    }
}

/// A directory entry seeded into the agent mirror at start-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSeed {
    pub agent_id: String,
    pub name: String,
    pub email: String,
    #[serde(default = "default_seed_role")]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    pub org_id: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Attempts made for one mutation before a version conflict surfaces.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    1.0
}
fn default_top_p() -> f32 {
    0.95
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_seed_role() -> Role {
    Role::Agent
}
fn default_database_path() -> String {
    "complaints.db".into()
}
fn default_max_conflict_retries() -> u32 {
    3
}
fn default_page_size() -> u32 {
    10
}
fn default_max_page_size() -> u32 {
    100
}

impl DeskConfig {
    /// Load from a JSON file.
    /// In tests, use DeskConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: DeskConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.org_id.trim().is_empty() {
            anyhow::bail!("org_id must not be empty");
        }
        if self.max_conflict_retries == 0 {
            anyhow::bail!("max_conflict_retries must be at least 1");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            anyhow::bail!(
                "default_page_size ({}) must be between 1 and max_page_size ({})",
                self.default_page_size,
                self.max_page_size
            );
        }
        if self.classifier.timeout_secs == 0 {
            anyhow::bail!("classifier.timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn default_test() -> Self {
        Self {
            org_id: "org-test".into(),
            database_path: ":memory:".into(),
            max_conflict_retries: default_max_conflict_retries(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            classifier: ClassifierConfig::default(),
            agents: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_gets_defaults() {
        let config: DeskConfig = serde_json::from_str(r#"{"org_id": "acme"}"#).unwrap();
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.classifier.provider, ClassifierProvider::Fixed);
        assert_eq!(config.classifier.api_key_env, "GEMINI_API_KEY");
        config.validate().unwrap();
    }

    #[test]
    fn agent_seeds_default_to_agent_role() {
        let config: DeskConfig = serde_json::from_str(
            r#"{"org_id": "acme", "agents": [{"agent_id": "a1", "name": "Ravi", "email": "ravi@acme.test"}]}"#,
        )
        .unwrap();
        assert_eq!(config.agents[0].role, Role::Agent);
    }

    #[test]
    fn page_size_above_max_is_rejected() {
        let mut config = DeskConfig::default_test();
        config.default_page_size = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_org_is_rejected() {
        let mut config = DeskConfig::default_test();
        config.org_id = " ".into();
        assert!(config.validate().is_err());
    }
}
