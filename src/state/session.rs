//! Per-game state and the timer-driven progression loop.
//!
//! All mutable fields sit behind one mutex shared by the registry task (joins
//! and answer routing) and the session's own background task (opening and
//! closing questions). The lock is only held for map and cursor updates, never
//! across a publish or a registry round trip.

use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use tokio::{
    sync::{Mutex, watch},
    time::sleep,
};
use tracing::{debug, error, info, warn};

use crate::state::{
    broadcast::{QuizEvent, Scoreboard, SessionChannel},
    error::SessionError,
    game::{Player, PlayerId, QuestionSet, SessionId},
    registry::RegistryHandle,
    state_machine::{EndReason, SessionEvent, SessionPhase, SessionStateMachine},
};

/// Completion notice sent on the `quiz-end` event.
pub const QUIZ_END_MESSAGE: &str = "thank you for playing";

/// Per-session knobs handed down by the registry.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Roster size; the game starts as soon as it is reached.
    pub max_players: usize,
    /// How long each question stays open.
    pub question_time_limit: Duration,
    /// Pause between the partition move and the "starting soon" notice.
    pub grace_period: Duration,
    /// Pause between the "starting soon" notice and the first question.
    pub lead_in: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_players: 2,
            question_time_limit: Duration::from_secs(3),
            grace_period: Duration::from_millis(500),
            lead_in: Duration::from_secs(3),
        }
    }
}

/// Read-only view of a session used by the describe endpoint.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Cursor into the question sequence.
    pub current_question: usize,
    /// Length of the question sequence.
    pub question_count: usize,
    /// Roster size that starts the game.
    pub max_players: usize,
}

#[derive(Debug, Default)]
struct SessionInner {
    players: IndexMap<PlayerId, Player>,
    current_question: usize,
    voting_open: bool,
    machine: SessionStateMachine,
}

/// One quiz game: roster, question cursor and lifecycle phase.
pub struct Session {
    id: SessionId,
    settings: SessionSettings,
    questions: QuestionSet,
    inner: Mutex<SessionInner>,
    channel: Arc<dyn SessionChannel>,
    registry: RegistryHandle,
    ended: watch::Sender<bool>,
}

impl Session {
    /// Build a waiting session. The progression loop starts once the roster fills.
    pub fn new(
        id: SessionId,
        settings: SessionSettings,
        questions: QuestionSet,
        channel: Arc<dyn SessionChannel>,
        registry: RegistryHandle,
    ) -> Arc<Self> {
        let (ended, _rx) = watch::channel(false);
        Arc::new(Self {
            id,
            settings,
            questions,
            inner: Mutex::new(SessionInner::default()),
            channel,
            registry,
            ended,
        })
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subscribe to the teardown flag; it flips to `true` once the session
    /// has been removed from the registry and its resources released.
    pub fn ended_watcher(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }

    /// Whether another player can still join.
    pub async fn has_capacity(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.machine.phase() == SessionPhase::Waiting
            && inner.players.len() < self.settings.max_players
    }

    /// Seat `player` with a zero score. Taking the last seat moves the session
    /// to in-progress and spawns the progression loop.
    pub async fn add_player(self: &Arc<Self>, player: Player) -> Result<(), SessionError> {
        let filled = {
            let mut inner = self.inner.lock().await;
            if inner.machine.phase() != SessionPhase::Waiting
                || inner.players.len() >= self.settings.max_players
            {
                return Err(SessionError::SessionFull);
            }
            if inner.players.contains_key(&player.id) {
                return Err(SessionError::AlreadyJoined(player.id));
            }

            info!(session_id = %self.id, player_id = %player.id, "adding player to session");
            inner
                .players
                .insert(player.id.clone(), Player::new(player.id, player.name));

            if inner.players.len() == self.settings.max_players {
                inner.machine.apply(SessionEvent::Filled)?;
                true
            } else {
                false
            }
        };

        if filled {
            info!(session_id = %self.id, "session full; starting quiz");
            tokio::spawn(Arc::clone(self).run());
        }

        Ok(())
    }

    /// Record an answer for the open question. A correct `answer_index` earns
    /// exactly one point; wrong or out-of-range indices earn nothing.
    pub async fn submit_answer(
        &self,
        player_id: &str,
        answer_index: usize,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let SessionInner {
            players,
            current_question,
            voting_open,
            ..
        } = &mut *inner;

        let player = players
            .get_mut(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_owned()))?;
        if player.has_answered {
            return Err(SessionError::AlreadyAnswered(player_id.to_owned()));
        }
        let question = self
            .questions
            .get(*current_question)
            .filter(|_| *voting_open)
            .ok_or(SessionError::VotingClosed)?;

        if question.is_correct(answer_index) {
            player.score += 1;
        }
        player.has_answered = true;
        debug!(
            session_id = %self.id,
            player_id,
            question = *current_question,
            answer_index,
            "answer recorded"
        );
        Ok(())
    }

    /// Current scores keyed by display name.
    pub async fn scoreboard(&self) -> Scoreboard {
        let inner = self.inner.lock().await;
        inner
            .players
            .values()
            .map(|player| (player.name.clone(), player.score))
            .collect()
    }

    /// Capture the session state for read-only projections.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            id: self.id.clone(),
            phase: inner.machine.phase(),
            players: inner.players.values().cloned().collect(),
            current_question: inner.current_question,
            question_count: self.questions.len(),
            max_players: self.settings.max_players,
        }
    }

    /// Background task started once, when the roster fills.
    async fn run(self: Arc<Self>) {
        if let Err(err) = self.registry.move_to_in_progress(self.id.clone()).await {
            warn!(session_id = %self.id, error = %err, "could not move session to in progress");
            self.abort().await;
            return;
        }

        if let Err(err) = self.play().await {
            warn!(session_id = %self.id, error = %err, "publish failed; aborting session");
            self.abort().await;
            return;
        }

        // a failed end notice is not retried
        match self.channel.publish(QuizEvent::End(QUIZ_END_MESSAGE.into())).await {
            Ok(()) => self.teardown(EndReason::Completed).await,
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "failed to publish end of quiz");
                self.teardown(EndReason::Aborted).await;
            }
        }
    }

    /// Announce, cycle through every question, then publish the scoreboard.
    async fn play(&self) -> Result<(), SessionError> {
        sleep(self.settings.grace_period).await;
        self.channel
            .publish(QuizEvent::status(format!(
                "Quiz starting in {}s",
                self.settings.lead_in.as_secs_f64()
            )))
            .await?;

        sleep(self.settings.lead_in).await;
        while let Some(index) = self.open_question().await {
            let question = &self.questions[index];
            debug!(session_id = %self.id, question = index, "publishing question");
            self.channel.publish(QuizEvent::question(question)).await?;

            sleep(self.settings.question_time_limit).await;
            self.close_question().await;
        }

        let scores = self.scoreboard().await;
        info!(session_id = %self.id, ?scores, "publishing final scoreboard");
        self.channel.publish(QuizEvent::scoreboard(scores)).await?;
        Ok(())
    }

    /// Reset every answered flag and open the question under the cursor.
    /// Returns `None` once the sequence is exhausted.
    async fn open_question(&self) -> Option<usize> {
        let mut inner = self.inner.lock().await;
        if inner.current_question >= self.questions.len() {
            return None;
        }
        for player in inner.players.values_mut() {
            player.has_answered = false;
        }
        inner.voting_open = true;
        Some(inner.current_question)
    }

    /// Stop accepting answers and advance the cursor.
    async fn close_question(&self) {
        let mut inner = self.inner.lock().await;
        inner.voting_open = false;
        inner.current_question += 1;
    }

    /// Best-effort end notice, then the regular teardown.
    async fn abort(&self) {
        if let Err(err) = self
            .channel
            .publish(QuizEvent::End(QUIZ_END_MESSAGE.into()))
            .await
        {
            warn!(session_id = %self.id, error = %err, "failed to publish end of quiz");
        }
        self.teardown(EndReason::Aborted).await;
    }

    /// Mark the session ended, ask the registry to drop it, then release it.
    async fn teardown(&self, reason: EndReason) {
        {
            let mut inner = self.inner.lock().await;
            inner.voting_open = false;
            if let Err(err) = inner.machine.apply(SessionEvent::Finished(reason)) {
                warn!(session_id = %self.id, error = %err, "unexpected session phase at teardown");
            }
        }

        if let Err(err) = self.registry.end_session(self.id.clone()).await {
            error!(
                session_id = %self.id,
                error = %err,
                "failed to remove session from registry; halting teardown"
            );
            return;
        }

        self.ended.send_replace(true);
        info!(session_id = %self.id, ?reason, "session ended");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::{FutureExt, future::BoxFuture};
    use tokio::sync::{broadcast, mpsc};

    use super::*;
    use crate::{
        dto::sse::ServerEvent,
        state::{
            SessionHubs,
            broadcast::{BroadcastTransport, PublishError},
            game::Question,
            registry::RegistryCommand,
        },
    };

    struct ClosedChannel;

    impl SessionChannel for ClosedChannel {
        fn publish(&self, _event: QuizEvent) -> BoxFuture<'static, Result<(), PublishError>> {
            futures::future::ready(Err(PublishError::ChannelClosed {
                session_id: "s1".into(),
            }))
            .boxed()
        }
    }

    /// Accepts every event except the end notice, counting end attempts.
    #[derive(Default)]
    struct EndRejectingChannel {
        end_attempts: AtomicUsize,
    }

    impl SessionChannel for EndRejectingChannel {
        fn publish(&self, event: QuizEvent) -> BoxFuture<'static, Result<(), PublishError>> {
            let result = match event {
                QuizEvent::End(_) => {
                    self.end_attempts.fetch_add(1, Ordering::SeqCst);
                    Err(PublishError::ChannelClosed {
                        session_id: "s1".into(),
                    })
                }
                _ => Ok(()),
            };
            futures::future::ready(result).boxed()
        }
    }

    fn questions() -> QuestionSet {
        vec![
            Question {
                prompt: "Largest planet?".into(),
                options: vec!["Mars".into(), "Jupiter".into()],
                correct_index: 1,
            },
            Question {
                prompt: "Boiling point of water in C?".into(),
                options: vec!["90".into(), "100".into(), "110".into()],
                correct_index: 1,
            },
        ]
        .into()
    }

    /// Stand-in registry accepting every move and reporting ended sessions.
    fn fake_registry(accept_move: bool) -> (RegistryHandle, mpsc::UnboundedReceiver<SessionId>) {
        let (handle, mut commands) = RegistryHandle::detached(8);
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                match command {
                    RegistryCommand::MoveToInProgress { session_id, reply } => {
                        let result = if accept_move {
                            Ok(())
                        } else {
                            Err(SessionError::SessionNotFound(session_id))
                        };
                        let _ = reply.send(result);
                    }
                    RegistryCommand::EndSession { session_id, reply } => {
                        let _ = ended_tx.send(session_id);
                        let _ = reply.send(());
                    }
                    _ => {}
                }
            }
        });
        (handle, ended_rx)
    }

    fn session_with(
        channel: Arc<dyn SessionChannel>,
        registry: RegistryHandle,
    ) -> Arc<Session> {
        Session::new(
            "s1".into(),
            SessionSettings::default(),
            questions(),
            channel,
            registry,
        )
    }

    /// Session wired to a real hub, with its subscriber.
    struct Harness {
        session: Arc<Session>,
        events: broadcast::Receiver<ServerEvent>,
        ended: mpsc::UnboundedReceiver<SessionId>,
        _hubs: SessionHubs,
    }

    fn hub_session() -> Harness {
        let hubs = SessionHubs::new(16);
        let channel = hubs.open("s1");
        let events = hubs.subscribe("s1").unwrap();
        let (registry, ended) = fake_registry(true);
        Harness {
            session: session_with(channel, registry),
            events,
            ended,
            _hubs: hubs,
        }
    }

    async fn fill(session: &Arc<Session>) {
        session.add_player(Player::new("a", "Alice")).await.unwrap();
        session.add_player(Player::new("b", "Bob")).await.unwrap();
    }

    async fn next_question(events: &mut broadcast::Receiver<ServerEvent>) {
        loop {
            let event = events.recv().await.unwrap();
            if event.event.as_deref() == Some("new_question") {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn roster_rejects_duplicates_and_overflow() {
        let Harness { session, _hubs, .. } = hub_session();

        session.add_player(Player::new("a", "Alice")).await.unwrap();
        assert!(matches!(
            session.add_player(Player::new("a", "Alice")).await,
            Err(SessionError::AlreadyJoined(_))
        ));
        assert!(session.has_capacity().await);

        session.add_player(Player::new("b", "Bob")).await.unwrap();
        assert!(!session.has_capacity().await);
        assert!(matches!(
            session.add_player(Player::new("c", "Carol")).await,
            Err(SessionError::SessionFull)
        ));
        assert_eq!(session.snapshot().await.phase, SessionPhase::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn answers_before_the_first_question_are_rejected() {
        let Harness { session, _hubs, .. } = hub_session();
        fill(&session).await;

        assert!(matches!(
            session.submit_answer("a", 1).await,
            Err(SessionError::VotingClosed)
        ));
        assert!(matches!(
            session.submit_answer("zed", 1).await,
            Err(SessionError::PlayerNotFound(id)) if id == "zed"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn second_answer_to_the_same_question_is_rejected() {
        let Harness {
            session,
            mut events,
            _hubs,
            ..
        } = hub_session();
        fill(&session).await;
        next_question(&mut events).await;

        session.submit_answer("a", 1).await.unwrap();
        assert!(matches!(
            session.submit_answer("a", 0).await,
            Err(SessionError::AlreadyAnswered(id)) if id == "a"
        ));

        let scores = session.scoreboard().await;
        assert_eq!(scores.get("Alice"), Some(&1));
        assert_eq!(scores.get("Bob"), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_answer_is_recorded_without_points() {
        let Harness {
            session,
            mut events,
            _hubs,
            ..
        } = hub_session();
        fill(&session).await;
        next_question(&mut events).await;

        session.submit_answer("b", 42).await.unwrap();

        assert_eq!(session.scoreboard().await.get("Bob"), Some(&0));
        assert!(matches!(
            session.submit_answer("b", 1).await,
            Err(SessionError::AlreadyAnswered(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn answered_flags_reset_for_the_next_question() {
        let Harness {
            session,
            mut events,
            _hubs,
            ..
        } = hub_session();
        fill(&session).await;

        next_question(&mut events).await;
        session.submit_answer("a", 1).await.unwrap();
        next_question(&mut events).await;
        session.submit_answer("a", 1).await.unwrap();

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.current_question, 1);
        assert_eq!(session.scoreboard().await.get("Alice"), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_session_closes_voting_and_notifies_registry() {
        let Harness {
            session,
            mut events,
            mut ended,
            _hubs,
        } = hub_session();
        let mut watcher = session.ended_watcher();
        fill(&session).await;

        let mut names = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            let name = event.event.clone().unwrap_or_default();
            names.push(name.clone());
            if name == "quiz-end" {
                break;
            }
        }
        assert_eq!(
            names,
            ["quiz-update", "new_question", "new_question", "quiz-update", "quiz-end"]
        );

        assert_eq!(ended.recv().await.as_deref(), Some("s1"));
        watcher.wait_for(|done| *done).await.unwrap();

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Ended(EndReason::Completed));
        assert_eq!(snapshot.current_question, 2);
        assert!(matches!(
            session.submit_answer("a", 1).await,
            Err(SessionError::VotingClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_aborts_the_session() {
        let (registry, mut ended) = fake_registry(true);
        let session = session_with(Arc::new(ClosedChannel), registry);
        let mut watcher = session.ended_watcher();
        fill(&session).await;

        assert_eq!(ended.recv().await.as_deref(), Some("s1"));
        watcher.wait_for(|done| *done).await.unwrap();
        assert_eq!(
            session.snapshot().await.phase,
            SessionPhase::Ended(EndReason::Aborted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_move_aborts_before_any_question() {
        let (registry, mut ended) = fake_registry(false);
        let hubs = SessionHubs::new(16);
        let channel = hubs.open("s1");
        let mut events = hubs.subscribe("s1").unwrap();
        let session = session_with(channel, registry);
        fill(&session).await;

        assert_eq!(ended.recv().await.as_deref(), Some("s1"));
        let end = events.recv().await.unwrap();
        assert_eq!(end.event.as_deref(), Some("quiz-end"));
        assert_eq!(session.snapshot().await.current_question, 0);
        assert_eq!(
            session.snapshot().await.phase,
            SessionPhase::Ended(EndReason::Aborted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_end_notice_is_not_retried() {
        let (registry, mut ended) = fake_registry(true);
        let channel = Arc::new(EndRejectingChannel::default());
        let session = session_with(channel.clone(), registry);
        fill(&session).await;

        assert_eq!(ended.recv().await.as_deref(), Some("s1"));
        assert_eq!(channel.end_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.snapshot().await.phase,
            SessionPhase::Ended(EndReason::Aborted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn answer_exactly_at_the_deadline_counts_for_the_open_question() {
        let Harness {
            session,
            mut events,
            _hubs,
            ..
        } = hub_session();
        fill(&session).await;
        next_question(&mut events).await;

        sleep(SessionSettings::default().question_time_limit).await;
        session.submit_answer("a", 1).await.unwrap();

        assert_eq!(session.snapshot().await.current_question, 0);
        assert_eq!(session.scoreboard().await.get("Alice"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn answer_after_the_deadline_lands_on_the_next_question_or_is_closed() {
        let Harness {
            session,
            mut events,
            _hubs,
            ..
        } = hub_session();
        let limit = SessionSettings::default().question_time_limit;
        fill(&session).await;
        next_question(&mut events).await;

        sleep(limit + Duration::from_millis(1)).await;
        assert_eq!(session.snapshot().await.current_question, 1);
        session.submit_answer("a", 0).await.unwrap();
        assert!(matches!(
            session.submit_answer("a", 1).await,
            Err(SessionError::AlreadyAnswered(_))
        ));
        assert_eq!(session.scoreboard().await.get("Alice"), Some(&0));

        sleep(limit).await;
        assert_eq!(session.snapshot().await.current_question, 2);
        assert!(matches!(
            session.submit_answer("b", 1).await,
            Err(SessionError::VotingClosed)
        ));
        assert_eq!(session.scoreboard().await.get("Bob"), Some(&0));
    }
}
