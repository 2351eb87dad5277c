use thiserror::Error;

use crate::core::types::{AgentId, SectorId};

#[derive(Error, Debug)]
pub enum ProximaError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Commit overdraft: {sector}/{resource} would reach {attempted:.3}")]
    CommitOverdraft {
        sector: SectorId,
        resource: String,
        attempted: f64,
    },

    #[error("Event delivery failed for {topic} in {sector}: {message}")]
    EventDelivery {
        topic: &'static str,
        sector: SectorId,
        message: String,
    },

    #[error("Backlog request expired after {age_steps} steps in {sector}")]
    BacklogTimeout { sector: SectorId, age_steps: u64 },

    #[error("Agent {0} faulted")]
    AgentFault(AgentId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProximaError>;
