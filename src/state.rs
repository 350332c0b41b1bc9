//! Application state: configuration, roster store, sessions, text generator and verifier.
//!
//! This module owns:
//!   - the prompts and topic list (from TOML or defaults)
//!   - the file-backed roster store
//!   - the per-client session store
//!   - the optional text-generation backend
//!   - the credential verifier for privileged roles

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};

use crate::auth::{BcryptVerifier, CredentialVerifier};
use crate::config::{load_app_config_from_env, AppConfig, Prompts};
use crate::llm::{self, TextGenerator};
use crate::roster::{IdRule, RosterStore};
use crate::session::SessionStore;

pub struct AppState {
    pub prompts: Prompts,
    pub topics: Vec<String>,
    pub roster: RosterStore,
    pub sessions: SessionStore,
    pub llm: Option<Arc<dyn TextGenerator>>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    /// Build state from env: load config, init the roster store, verifier and backend.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_app_config_from_env();
        let llm = llm::from_env(&cfg.llm);
        let verifier: Arc<dyn CredentialVerifier> = Arc::new(BcryptVerifier::new(cfg.auth.clone()));
        Self::from_parts(cfg, llm, verifier)
    }

    /// Assemble state from explicit parts (used by `new` and by tests).
    pub fn from_parts(
        cfg: AppConfig,
        llm: Option<Arc<dyn TextGenerator>>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let mut thresholds = cfg.roster.thresholds();
        if !thresholds.is_monotonic() {
            error!(target: "roster", ?thresholds, "Configured thresholds overlap or leave gaps; using format defaults");
            thresholds = cfg.roster.format.default_thresholds();
        }
        let id_rule = IdRule::for_config(&cfg.roster);
        info!(
            target: "roster",
            path = %cfg.roster.path.display(),
            format = ?cfg.roster.format,
            ?id_rule,
            ?thresholds,
            "Roster configured"
        );
        info!(target: "studygen", topics = ?cfg.topics, "Study topics");
        info!(
            target: "studygen",
            idle_ttl_secs = cfg.sessions.idle_ttl_secs,
            max_live = cfg.sessions.max_live,
            "Session limits"
        );
        let sessions = SessionStore::new(Duration::from_secs(cfg.sessions.idle_ttl_secs), cfg.sessions.max_live);

        Self {
            prompts: cfg.prompts,
            topics: cfg.topics,
            roster: RosterStore::new(cfg.roster.path, cfg.roster.format, id_rule, thresholds),
            sessions,
            llm,
            verifier,
        }
    }

    /// Exact match against the configured topic list.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }
}
