/// Session events and the transport traits.
pub mod broadcast;
/// Core error taxonomy.
pub mod error;
/// Questions and players.
pub mod game;
/// Registry task and its client handle.
pub mod registry;
/// Per-session state and progression loop.
pub mod session;
mod sse;
/// Session lifecycle phases.
pub mod state_machine;

use std::{sync::Arc, time::SystemTime};

use tracing::info;

use crate::{
    config::AppConfig,
    dao::{question_bank::QuestionBank, storage::StorageResult},
    state::{
        game::QuestionSet,
        registry::{RegistryHandle, SessionRegistry},
    },
};

pub use self::error::SessionError;
pub use self::sse::SessionHubs;

/// Application state shared with every handler.
pub type SharedState = Arc<AppState>;

/// Central application state: the registry handle and the broadcast hubs
/// the SSE routes subscribe to.
pub struct AppState {
    registry: RegistryHandle,
    hubs: Arc<SessionHubs>,
    started_at: SystemTime,
}

impl AppState {
    /// Load the question bank once and start the session registry.
    ///
    /// A bank that cannot be loaded is returned as an error; callers treat it
    /// as fatal.
    pub async fn bootstrap(
        config: &AppConfig,
        bank: &dyn QuestionBank,
    ) -> StorageResult<SharedState> {
        let questions: QuestionSet = bank.load().await?.into();
        Ok(Self::with_questions(config, questions))
    }

    /// Start the registry with an already loaded question set.
    pub fn with_questions(config: &AppConfig, questions: QuestionSet) -> SharedState {
        let hubs = Arc::new(SessionHubs::new(config.channel_capacity()));
        let registry =
            SessionRegistry::spawn(config.registry_options(), questions, hubs.clone());
        info!("application state ready");

        Arc::new(Self {
            registry,
            hubs,
            started_at: SystemTime::now(),
        })
    }

    /// Client handle of the session registry task.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Per-session broadcast hubs backing the SSE streams.
    pub fn session_hubs(&self) -> &SessionHubs {
        &self.hubs
    }

    /// When the server started.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}
