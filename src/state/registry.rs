//! Session registry: the single task that owns the waiting and in-progress
//! partitions. Every mutation arrives as a [`RegistryCommand`] on one intake
//! queue and is processed to completion before the next one is dequeued.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{
    broadcast::BroadcastTransport,
    error::SessionError,
    game::{Player, PlayerId, QuestionSet, SessionId},
    session::{Session, SessionSettings, SessionSnapshot},
};

/// Reply path carried by every command.
type Reply<T> = oneshot::Sender<T>;

/// Commands accepted by the registry task.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Seat a player in a waiting session, creating one when needed.
    JoinSession {
        /// Player to seat, score zero.
        player: Player,
        /// Session the player was seated in.
        reply: Reply<Result<SessionId, SessionError>>,
    },
    /// Route an answer to an in-progress session.
    SubmitAnswer {
        /// Target session.
        session_id: SessionId,
        /// Answering player.
        player_id: PlayerId,
        /// 0-based option index.
        answer_index: usize,
        /// Result of the session's scoring.
        reply: Reply<Result<(), SessionError>>,
    },
    /// Move a filled session from waiting to in-progress.
    MoveToInProgress {
        /// Session leaving the waiting partition.
        session_id: SessionId,
        /// `SessionNotFound` when it was not waiting.
        reply: Reply<Result<(), SessionError>>,
    },
    /// Drop a finished session and free its slot.
    EndSession {
        /// Session to remove.
        session_id: SessionId,
        /// Acknowledgement.
        reply: Reply<()>,
    },
    /// Read-only view of a session in either partition.
    DescribeSession {
        /// Session to describe.
        session_id: SessionId,
        /// Snapshot of the session.
        reply: Reply<Result<SessionSnapshot, SessionError>>,
    },
    /// Partition sizes.
    Stats {
        /// Current counters.
        reply: Reply<RegistryStats>,
    },
}

/// Counters exposed by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Sessions counted against the registry limit.
    pub active: usize,
    /// Sessions still accepting players.
    pub waiting: usize,
    /// Sessions playing questions.
    pub in_progress: usize,
}

/// Registry-wide limits.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Maximum number of concurrently active sessions.
    pub max_sessions: usize,
    /// Bound of the intake queue.
    pub intake_capacity: usize,
    /// Settings applied to every session created.
    pub session: SessionSettings,
}

/// Cloneable client of the registry task.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Handle whose commands land on the returned receiver instead of a
    /// registry task.
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<RegistryCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RegistryCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SessionError::RegistryUnavailable)?;
        response.await.map_err(|_| SessionError::RegistryUnavailable)
    }

    /// Join any waiting session with room, returning its id.
    pub async fn join_session(
        &self,
        player_name: impl Into<String>,
        player_id: impl Into<PlayerId>,
    ) -> Result<SessionId, SessionError> {
        let player = Player::new(player_id, player_name);
        self.request(|reply| RegistryCommand::JoinSession { player, reply })
            .await?
    }

    /// Submit a 0-based answer index for the question open in `session_id`.
    pub async fn submit_answer(
        &self,
        session_id: impl Into<SessionId>,
        player_id: impl Into<PlayerId>,
        answer_index: usize,
    ) -> Result<(), SessionError> {
        let session_id = session_id.into();
        let player_id = player_id.into();
        self.request(|reply| RegistryCommand::SubmitAnswer {
            session_id,
            player_id,
            answer_index,
            reply,
        })
        .await?
    }

    /// Move `session_id` from the waiting to the in-progress partition.
    pub async fn move_to_in_progress(&self, session_id: SessionId) -> Result<(), SessionError> {
        self.request(|reply| RegistryCommand::MoveToInProgress { session_id, reply })
            .await?
    }

    /// Remove `session_id`. Only fails when the registry itself is gone.
    pub async fn end_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        self.request(|reply| RegistryCommand::EndSession { session_id, reply })
            .await
    }

    /// Snapshot a session from either partition.
    pub async fn describe_session(
        &self,
        session_id: impl Into<SessionId>,
    ) -> Result<SessionSnapshot, SessionError> {
        let session_id = session_id.into();
        self.request(|reply| RegistryCommand::DescribeSession { session_id, reply })
            .await?
    }

    /// Current partition sizes.
    pub async fn stats(&self) -> Result<RegistryStats, SessionError> {
        self.request(|reply| RegistryCommand::Stats { reply }).await
    }
}

/// State owned by the registry task.
pub struct SessionRegistry {
    waiting: IndexMap<SessionId, Arc<Session>>,
    in_progress: IndexMap<SessionId, Arc<Session>>,
    active_count: usize,
    max_sessions: usize,
    settings: SessionSettings,
    questions: QuestionSet,
    transport: Arc<dyn BroadcastTransport>,
    // Weak so the task stops once every handle and session is gone.
    intake: mpsc::WeakSender<RegistryCommand>,
}

impl SessionRegistry {
    /// Start the registry task and return a handle to it.
    pub fn spawn(
        options: RegistryOptions,
        questions: QuestionSet,
        transport: Arc<dyn BroadcastTransport>,
    ) -> RegistryHandle {
        let (tx, rx) = mpsc::channel(options.intake_capacity.max(1));
        let registry = Self {
            waiting: IndexMap::new(),
            in_progress: IndexMap::new(),
            active_count: 0,
            max_sessions: options.max_sessions,
            settings: options.session,
            questions,
            transport,
            intake: tx.downgrade(),
        };

        tokio::spawn(registry.run(rx));
        RegistryHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RegistryCommand>) {
        info!(
            max_sessions = self.max_sessions,
            max_players = self.settings.max_players,
            questions = self.questions.len(),
            "starting session registry"
        );

        while let Some(command) = rx.recv().await {
            self.handle_command(command).await;
            debug_assert_eq!(
                self.active_count,
                self.waiting.len() + self.in_progress.len()
            );
        }

        info!("session registry stopped");
    }

    async fn handle_command(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::JoinSession { player, reply } => {
                debug!(player_id = %player.id, "handling join session");
                let result = self.join_session(player).await;
                send_reply(reply, result, "join session");
            }
            RegistryCommand::SubmitAnswer {
                session_id,
                player_id,
                answer_index,
                reply,
            } => {
                debug!(%session_id, %player_id, answer_index, "handling submit answer");
                let result = match self.in_progress.get(&session_id) {
                    Some(session) => session.submit_answer(&player_id, answer_index).await,
                    None => Err(SessionError::SessionNotFound(session_id)),
                };
                send_reply(reply, result, "submit answer");
            }
            RegistryCommand::MoveToInProgress { session_id, reply } => {
                let result = self.move_to_in_progress(session_id);
                send_reply(reply, result, "move to in progress");
            }
            RegistryCommand::EndSession { session_id, reply } => {
                self.end_session(&session_id);
                send_reply(reply, (), "end session");
            }
            RegistryCommand::DescribeSession { session_id, reply } => {
                let session = self
                    .waiting
                    .get(&session_id)
                    .or_else(|| self.in_progress.get(&session_id));
                let result = match session {
                    Some(session) => Ok(session.snapshot().await),
                    None => Err(SessionError::SessionNotFound(session_id)),
                };
                send_reply(reply, result, "describe session");
            }
            RegistryCommand::Stats { reply } => {
                send_reply(reply, self.stats(), "stats");
            }
        }
    }

    async fn join_session(&mut self, player: Player) -> Result<SessionId, SessionError> {
        let session = match self.first_open_session().await {
            Some(session) => session,
            None => self.create_session()?,
        };

        session.add_player(player).await?;
        Ok(session.id().to_owned())
    }

    /// Oldest waiting session that still has a free seat. Filled sessions
    /// linger here until their loop requests the move, so they are skipped.
    async fn first_open_session(&self) -> Option<Arc<Session>> {
        for session in self.waiting.values() {
            if session.has_capacity().await {
                return Some(Arc::clone(session));
            }
        }
        None
    }

    fn create_session(&mut self) -> Result<Arc<Session>, SessionError> {
        if self.active_count >= self.max_sessions {
            warn!(
                active = self.active_count,
                max_sessions = self.max_sessions,
                "session limit reached"
            );
            return Err(SessionError::CapacityExceeded);
        }

        let registry = self
            .intake
            .upgrade()
            .map(|tx| RegistryHandle { tx })
            .ok_or(SessionError::RegistryUnavailable)?;

        let session_id = Uuid::new_v4().to_string();
        let channel = self.transport.open(&session_id);
        let session = Session::new(
            session_id.clone(),
            self.settings.clone(),
            Arc::clone(&self.questions),
            channel,
            registry,
        );

        self.waiting.insert(session_id.clone(), Arc::clone(&session));
        self.active_count += 1;
        info!(%session_id, active = self.active_count, "created session");
        Ok(session)
    }

    fn move_to_in_progress(&mut self, session_id: SessionId) -> Result<(), SessionError> {
        let Some(session) = self.waiting.shift_remove(&session_id) else {
            warn!(%session_id, "cannot move unknown session to in progress");
            return Err(SessionError::SessionNotFound(session_id));
        };

        info!(%session_id, "moving session to in progress");
        self.in_progress.insert(session_id, session);
        Ok(())
    }

    fn end_session(&mut self, session_id: &str) {
        let removed = self
            .in_progress
            .shift_remove(session_id)
            .or_else(|| self.waiting.shift_remove(session_id));

        match removed {
            Some(_) => {
                self.active_count -= 1;
                info!(%session_id, active = self.active_count, "ending session");
            }
            None => warn!(%session_id, "session not found, nothing to end"),
        }

        self.transport.close(session_id);
    }

    fn stats(&self) -> RegistryStats {
        RegistryStats {
            active: self.active_count,
            waiting: self.waiting.len(),
            in_progress: self.in_progress.len(),
        }
    }
}

fn send_reply<T>(reply: Reply<T>, value: T, command: &'static str) {
    if reply.send(value).is_err() {
        debug!(command, "requester dropped before the reply was sent");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::state::{
        SessionHubs,
        game::Question,
        state_machine::SessionPhase,
    };

    fn questions() -> QuestionSet {
        vec![
            Question {
                prompt: "Capital of France?".into(),
                options: vec!["Paris".into(), "Rome".into(), "Berlin".into()],
                correct_index: 0,
            },
            Question {
                prompt: "2 + 2?".into(),
                options: vec!["3".into(), "4".into()],
                correct_index: 1,
            },
        ]
        .into()
    }

    fn spawn_registry(max_sessions: usize) -> (RegistryHandle, Arc<SessionHubs>) {
        let hubs = Arc::new(SessionHubs::new(16));
        let options = RegistryOptions {
            max_sessions,
            intake_capacity: 8,
            session: SessionSettings::default(),
        };
        let handle = SessionRegistry::spawn(options, questions(), hubs.clone());
        (handle, hubs)
    }

    #[tokio::test(start_paused = true)]
    async fn two_players_share_a_session_that_starts_when_full() {
        let (registry, _hubs) = spawn_registry(4);

        let alice_session = registry.join_session("Alice", "a").await.unwrap();
        let waiting = registry.describe_session(alice_session.clone()).await.unwrap();
        assert_eq!(waiting.phase, SessionPhase::Waiting);
        assert_eq!(registry.stats().await.unwrap().waiting, 1);

        let bob_session = registry.join_session("Bob", "b").await.unwrap();
        assert_eq!(alice_session, bob_session);

        // let the progression loop request its move
        tokio::time::sleep(Duration::from_millis(1)).await;

        let stats = registry.stats().await.unwrap();
        assert_eq!(
            stats,
            RegistryStats {
                active: 1,
                waiting: 0,
                in_progress: 1,
            }
        );
        let snapshot = registry.describe_session(bob_session).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::InProgress);
        assert_eq!(snapshot.players.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn third_player_opens_a_new_session() {
        let (registry, _hubs) = spawn_registry(4);

        let first = registry.join_session("Alice", "a").await.unwrap();
        registry.join_session("Bob", "b").await.unwrap();
        let second = registry.join_session("Carol", "c").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.stats().await.unwrap().active, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn session_limit_rejects_new_sessions_until_one_ends() {
        let (registry, _hubs) = spawn_registry(1);

        let session_id = registry.join_session("Alice", "a").await.unwrap();
        registry.join_session("Bob", "b").await.unwrap();

        let err = registry.join_session("Carol", "c").await.unwrap_err();
        assert!(matches!(err, SessionError::CapacityExceeded));

        registry.end_session(session_id.clone()).await.unwrap();
        assert_eq!(registry.stats().await.unwrap().active, 0);

        let next = registry.join_session("Carol", "c").await.unwrap();
        assert_ne!(next, session_id);
    }

    #[tokio::test(start_paused = true)]
    async fn ending_twice_does_not_underflow_the_count() {
        let (registry, _hubs) = spawn_registry(2);

        let session_id = registry.join_session("Alice", "a").await.unwrap();
        registry.end_session(session_id.clone()).await.unwrap();
        registry.end_session(session_id).await.unwrap();

        assert_eq!(registry.stats().await.unwrap().active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_player_in_waiting_session_is_rejected() {
        let (registry, _hubs) = spawn_registry(2);

        registry.join_session("Alice", "a").await.unwrap();
        let err = registry.join_session("Alice again", "a").await.unwrap_err();

        assert!(matches!(err, SessionError::AlreadyJoined(id) if id == "a"));
    }

    #[tokio::test(start_paused = true)]
    async fn answers_are_only_routed_to_in_progress_sessions() {
        let (registry, _hubs) = spawn_registry(2);

        let err = registry.submit_answer("missing", "a", 0).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(id) if id == "missing"));

        let waiting = registry.join_session("Alice", "a").await.unwrap();
        let err = registry.submit_answer(waiting, "a", 0).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_session_cannot_be_moved_or_described() {
        let (registry, _hubs) = spawn_registry(2);

        let err = registry.move_to_in_progress("ghost".into()).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(_)));
        let err = registry.describe_session("ghost").await.unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_game_publishes_questions_then_scores_and_cleans_up() {
        let (registry, hubs) = spawn_registry(2);

        let session_id = registry.join_session("Alice", "a").await.unwrap();
        let mut events = hubs.subscribe(&session_id).unwrap();
        registry.join_session("Bob", "b").await.unwrap();

        let starting = events.recv().await.unwrap();
        assert_eq!(starting.event.as_deref(), Some("quiz-update"));
        assert_eq!(starting.data, "\"Quiz starting in 3s\"");

        let first = events.recv().await.unwrap();
        assert_eq!(first.event.as_deref(), Some("new_question"));
        assert!(first.data.contains("Capital of France?"));
        registry.submit_answer(session_id.clone(), "a", 0).await.unwrap();
        registry.submit_answer(session_id.clone(), "b", 0).await.unwrap();

        let second = events.recv().await.unwrap();
        assert_eq!(second.event.as_deref(), Some("new_question"));
        registry.submit_answer(session_id.clone(), "a", 0).await.unwrap();
        registry.submit_answer(session_id.clone(), "b", 1).await.unwrap();

        let scores = events.recv().await.unwrap();
        assert_eq!(scores.event.as_deref(), Some("quiz-update"));
        assert_eq!(scores.data, r#"{"Alice":1,"Bob":2}"#);

        let end = events.recv().await.unwrap();
        assert_eq!(end.event.as_deref(), Some("quiz-end"));
        assert_eq!(end.data, "\"thank you for playing\"");

        assert!(matches!(events.recv().await, Err(RecvError::Closed)));
        assert_eq!(registry.stats().await.unwrap().active, 0);
        assert!(matches!(
            registry.submit_answer(session_id, "a", 0).await,
            Err(SessionError::SessionNotFound(_))
        ));
    }
}
