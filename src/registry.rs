//! Agent registry
//!
//! Registration is keyed by hostname: the same machine registering twice
//! keeps its agent id and stored configuration, only its address, OS and
//! `last_seen` are refreshed. New agents get a default configuration
//! document whose canonical hash is returned to the agent so it can detect
//! configuration drift on later heartbeats.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::storage::{AgentConfig, AgentFilter, StorageBackend, StorageError};
use crate::util::{config_hash, is_valid_hostname};
use crate::{Agent, RegisterRequest};

/// Errors surfaced by registry operations
#[derive(Debug)]
pub enum RegistryError {
    /// Request failed validation before touching storage
    Validation(String),

    /// The referenced agent does not exist
    UnknownAgent(Uuid),

    Storage(StorageError),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Validation(msg) => write!(f, "validation failed: {}", msg),
            RegistryError::UnknownAgent(id) => write!(f, "unknown agent: {}", id),
            RegistryError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for RegistryError {
    fn from(e: StorageError) -> Self {
        RegistryError::Storage(e)
    }
}

/// Result of a registration: the authoritative agent record plus whether
/// this hostname was seen for the first time.
#[derive(Debug, Clone)]
pub struct Registration {
    pub agent: Agent,
    pub created: bool,
}

/// Hostname-keyed registry of backup agents
#[derive(Clone)]
pub struct AgentRegistry {
    storage: Arc<dyn StorageBackend>,
}

impl AgentRegistry {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Default configuration handed to newly registered agents.
    fn default_config_document(agent_id: Uuid) -> serde_json::Value {
        json!({
            "heartbeat_interval": 60,
            "backup_jobs": [],
            "repositories": [],
            "logging": {
                "level": "INFO",
                "file": format!("/var/log/custodia_agent_{agent_id}.log"),
            },
        })
    }

    /// Register an agent (or refresh an existing one) by hostname.
    #[instrument(skip(self), fields(hostname = %request.hostname))]
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, RegistryError> {
        let hostname = request.hostname.trim();
        if hostname.is_empty() {
            return Err(RegistryError::Validation("hostname is required".to_string()));
        }
        if !is_valid_hostname(hostname) {
            return Err(RegistryError::Validation(format!(
                "invalid hostname: {hostname}"
            )));
        }

        let now = Utc::now();
        let agent_id = Uuid::new_v4();
        let config = Self::default_config_document(agent_id);
        let hash = config_hash(&config);

        let candidate = Agent {
            agent_id,
            hostname: hostname.to_string(),
            ip_address: request.ip_address,
            os: request.os,
            enabled: true,
            last_seen: now,
            config_hash: hash.clone(),
            registered_at: now,
        };
        let default_config = AgentConfig {
            agent_id,
            config,
            config_hash: hash,
            updated_at: now,
        };

        let (agent, created) = self.storage.upsert_agent(candidate, default_config).await?;

        if created {
            info!("agent registered: {} ({})", agent.hostname, agent.agent_id);
        }

        Ok(Registration { agent, created })
    }

    /// Record a heartbeat. Returns `false` for unknown agents so callers
    /// can tell the agent to re-register.
    pub async fn heartbeat(&self, agent_id: Uuid) -> Result<bool, RegistryError> {
        Ok(self.storage.touch_agent(agent_id, Utc::now()).await?)
    }

    pub async fn get(&self, agent_id: Uuid) -> Result<Option<Agent>, RegistryError> {
        Ok(self.storage.get_agent(agent_id).await?)
    }

    pub async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Agent>, RegistryError> {
        Ok(self.storage.get_agent_by_hostname(hostname).await?)
    }

    pub async fn list(&self, filter: AgentFilter) -> Result<Vec<Agent>, RegistryError> {
        Ok(self.storage.list_agents(filter).await?)
    }

    /// Enable or disable an agent. Disabled agents are skipped by the
    /// health evaluator but keep their history.
    #[instrument(skip(self))]
    pub async fn set_enabled(&self, agent_id: Uuid, enabled: bool) -> Result<(), RegistryError> {
        if self.storage.set_agent_enabled(agent_id, enabled).await? {
            info!("agent {} enabled={}", agent_id, enabled);
            Ok(())
        } else {
            Err(RegistryError::UnknownAgent(agent_id))
        }
    }

    /// Replace an agent's configuration document, returning the new
    /// canonical hash.
    #[instrument(skip(self, config))]
    pub async fn update_config(
        &self,
        agent_id: Uuid,
        config: serde_json::Value,
    ) -> Result<String, RegistryError> {
        if !config.is_object() {
            return Err(RegistryError::Validation(
                "configuration must be a JSON object".to_string(),
            ));
        }

        let hash = config_hash(&config);
        let record = AgentConfig {
            agent_id,
            config,
            config_hash: hash.clone(),
            updated_at: Utc::now(),
        };

        if self.storage.set_agent_config(record).await? {
            info!("configuration updated for agent {}", agent_id);
            Ok(hash)
        } else {
            Err(RegistryError::UnknownAgent(agent_id))
        }
    }

    pub async fn get_config(
        &self,
        agent_id: Uuid,
    ) -> Result<Option<AgentConfig>, RegistryError> {
        Ok(self.storage.get_agent_config(agent_id).await?)
    }
}
