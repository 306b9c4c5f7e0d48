//! Autonomous players that poll their games and act when it is their turn.
//!
//! An [`Agent`] owns its registry outright. Once spawned, the registry lives
//! inside a single task and every other task reaches it through an
//! [`AgentHandle`], which forwards commands over a channel and waits for the
//! reply. Registration and polling therefore never touch the map at the
//! same time.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use blackjack_engine::game::{GameId, GameStatus};
use blackjack_engine::player::TurnAction;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::boundary::{BoundaryError, GameBoundary};
use crate::strategy::Strategy;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Time between polling passes
    pub tick_interval: Duration,
    /// Upper bound on each call into the game boundary
    pub call_timeout: Duration,
    /// Consecutive fetch failures tolerated before an entry is dropped
    pub max_fetch_failures: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            call_timeout: Duration::from_secs(2),
            max_fetch_failures: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("Game {0} already has an automated player")]
    DuplicateGame(GameId),
    #[error("Agent is not running")]
    Stopped,
}

/// A registered automated seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoPlayer {
    pub game_id: GameId,
    pub player_name: String,
    pub strategy: Strategy,
    /// Fetch failures since the last successful fetch
    pub fetch_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Finished,
    Unreachable,
    MissingHand,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RemovalReason::Finished => "game finished",
            RemovalReason::Unreachable => "game unreachable",
            RemovalReason::MissingHand => "player has no hand",
        };
        f.write_str(reason)
    }
}

/// What one polling pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub played: Vec<(GameId, TurnAction)>,
    pub waiting: usize,
    pub fetch_failures: usize,
    pub submit_failures: usize,
    pub removed: Vec<(GameId, RemovalReason)>,
}

impl TickReport {
    pub fn was_removed(&self, game_id: &str) -> bool {
        self.removed.iter().any(|(id, _)| id == game_id)
    }
}

enum EntryOutcome {
    Played(TurnAction),
    Waiting,
    FetchFailed { drop: bool },
    SubmitFailed,
    Remove(RemovalReason),
}

pub struct Agent {
    boundary: Arc<dyn GameBoundary>,
    config: AgentConfig,
    entries: BTreeMap<GameId, AutoPlayer>,
}

impl Agent {
    pub fn new(boundary: Arc<dyn GameBoundary>, config: AgentConfig) -> Self {
        Self {
            boundary,
            config,
            entries: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Adds an automated player for `game_id`. Only one entry per game.
    pub fn register(
        &mut self,
        game_id: impl Into<GameId>,
        player_name: impl Into<String>,
        strategy: Strategy,
    ) -> Result<(), AgentError> {
        let game_id = game_id.into();
        if self.entries.contains_key(&game_id) {
            return Err(AgentError::DuplicateGame(game_id));
        }
        let entry = AutoPlayer {
            game_id: game_id.clone(),
            player_name: player_name.into(),
            strategy,
            fetch_failures: 0,
        };
        info!(
            game_id = %entry.game_id,
            player = %entry.player_name,
            strategy = %entry.strategy,
            "Registered automated player"
        );
        self.entries.insert(game_id, entry);
        Ok(())
    }

    pub fn entries(&self) -> Vec<AutoPlayer> {
        self.entries.values().cloned().collect()
    }

    pub fn is_registered(&self, game_id: &str) -> bool {
        self.entries.contains_key(game_id)
    }

    /// Runs one polling pass over every registered entry.
    ///
    /// Entries are handled one after another but independently: an error in
    /// one game only affects that game's entry.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let ids: Vec<GameId> = self.entries.keys().cloned().collect();

        for game_id in ids {
            let Some(entry) = self.entries.get(&game_id).cloned() else {
                continue;
            };
            match self.poll_entry(&entry).await {
                EntryOutcome::Played(action) => {
                    self.reset_failures(&game_id);
                    report.played.push((game_id, action));
                }
                EntryOutcome::Waiting => {
                    self.reset_failures(&game_id);
                    report.waiting += 1;
                }
                EntryOutcome::SubmitFailed => {
                    self.reset_failures(&game_id);
                    report.submit_failures += 1;
                }
                EntryOutcome::FetchFailed { drop } => {
                    report.fetch_failures += 1;
                    if drop {
                        self.remove(&game_id, RemovalReason::Unreachable, &mut report);
                    } else if let Some(entry) = self.entries.get_mut(&game_id) {
                        entry.fetch_failures += 1;
                    }
                }
                EntryOutcome::Remove(reason) => self.remove(&game_id, reason, &mut report),
            }
        }

        debug!(
            entries = self.entries.len(),
            played = report.played.len(),
            removed = report.removed.len(),
            "Agent tick complete"
        );
        report
    }

    async fn poll_entry(&self, entry: &AutoPlayer) -> EntryOutcome {
        let game_id = entry.game_id.as_str();
        let player = entry.player_name.as_str();

        let view = match self
            .bounded(self.boundary.get_game(game_id, player))
            .await
        {
            Ok(view) => view,
            Err(err) => {
                let failures = entry.fetch_failures + 1;
                let drop = failures >= self.config.max_fetch_failures;
                warn!(
                    game_id,
                    player,
                    failures,
                    limit = self.config.max_fetch_failures,
                    error = %err,
                    "Failed to fetch game"
                );
                return EntryOutcome::FetchFailed { drop };
            }
        };

        if view.status == GameStatus::Finished {
            return EntryOutcome::Remove(RemovalReason::Finished);
        }
        if !view.is_turn_of(player) {
            return EntryOutcome::Waiting;
        }
        let Some(hand) = view.hand(player) else {
            return EntryOutcome::Remove(RemovalReason::MissingHand);
        };

        let action = entry.strategy.decide(hand);
        debug!(game_id, player, score = hand.score, %action, "Strategy decided");

        match self
            .bounded(self.boundary.play_turn(game_id, player, action))
            .await
        {
            Ok(after) => {
                info!(
                    game_id,
                    player,
                    %action,
                    status = ?after.status,
                    next_player = after.next_player.as_deref().unwrap_or("-"),
                    "Automated turn played"
                );
                EntryOutcome::Played(action)
            }
            Err(err) => {
                warn!(game_id, player, %action, error = %err, "Failed to submit turn");
                EntryOutcome::SubmitFailed
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, BoundaryError>
    where
        F: Future<Output = Result<T, BoundaryError>>,
    {
        let limit = self.config.call_timeout;
        time::timeout(limit, call)
            .await
            .unwrap_or(Err(BoundaryError::Timeout(limit)))
    }

    fn reset_failures(&mut self, game_id: &str) {
        if let Some(entry) = self.entries.get_mut(game_id) {
            entry.fetch_failures = 0;
        }
    }

    fn remove(&mut self, game_id: &str, reason: RemovalReason, report: &mut TickReport) {
        if let Some(entry) = self.entries.remove(game_id) {
            info!(
                game_id,
                player = %entry.player_name,
                %reason,
                "Deregistered automated player"
            );
            report.removed.push((game_id.to_string(), reason));
        }
    }

    /// Moves the agent onto its own task and starts the polling loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> AgentRuntime {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(self.run(rx));
        AgentRuntime {
            handle: AgentHandle { tx },
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first pass runs one full
        // interval after spawn.
        ticker.tick().await;

        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            "Agent loop started"
        );

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!(entries = self.entries.len(), "Agent loop stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Register {
                game_id,
                player_name,
                strategy,
                reply,
            } => {
                let _ = reply.send(self.register(game_id, player_name, strategy));
            }
            Command::Entries { reply } => {
                let _ = reply.send(self.entries());
            }
            Command::Tick { reply } => {
                let report = self.tick().await;
                let _ = reply.send(report);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

enum Command {
    Register {
        game_id: GameId,
        player_name: String,
        strategy: Strategy,
        reply: oneshot::Sender<Result<(), AgentError>>,
    },
    Entries {
        reply: oneshot::Sender<Vec<AutoPlayer>>,
    },
    Tick {
        reply: oneshot::Sender<TickReport>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable mailbox into a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<Command>,
}

impl AgentHandle {
    pub async fn register(
        &self,
        game_id: impl Into<GameId>,
        player_name: impl Into<String>,
        strategy: Strategy,
    ) -> Result<(), AgentError> {
        let game_id = game_id.into();
        let player_name = player_name.into();
        self.request(|reply| Command::Register {
            game_id,
            player_name,
            strategy,
            reply,
        })
        .await?
    }

    pub async fn entries(&self) -> Result<Vec<AutoPlayer>, AgentError> {
        self.request(|reply| Command::Entries { reply }).await
    }

    /// Runs a polling pass right away instead of waiting for the timer.
    pub async fn tick_now(&self) -> Result<TickReport, AgentError> {
        self.request(|reply| Command::Tick { reply }).await
    }

    /// Asks the loop to stop. Returns once the loop has acknowledged.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AgentError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| AgentError::Stopped)?;
        response.await.map_err(|_| AgentError::Stopped)
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Owner of a spawned agent task. Dropping it without calling
/// [`AgentRuntime::shutdown`] aborts the loop.
pub struct AgentRuntime {
    handle: AgentHandle,
    task: Option<JoinHandle<()>>,
}

impl AgentRuntime {
    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    /// Stops the loop and waits for its task to finish.
    pub async fn shutdown(mut self) {
        if self.handle.shutdown().await.is_err() {
            debug!("Agent loop already stopped");
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Agent task ended abnormally");
            }
        }
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blackjack_engine::view::GameView;

    struct Unreachable;

    #[async_trait]
    impl GameBoundary for Unreachable {
        async fn get_game(&self, _: &str, _: &str) -> Result<GameView, BoundaryError> {
            Err(BoundaryError::Unavailable("down".into()))
        }

        async fn play_turn(
            &self,
            _: &str,
            _: &str,
            _: TurnAction,
        ) -> Result<GameView, BoundaryError> {
            Err(BoundaryError::Unavailable("down".into()))
        }
    }

    #[test]
    fn default_config_polls_every_five_seconds() {
        let config = AgentConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert_eq!(config.max_fetch_failures, 3);
    }

    #[test]
    fn one_entry_per_game() {
        let mut agent = Agent::new(Arc::new(Unreachable), AgentConfig::default());
        agent.register("g1", "Dealer", Strategy::Dealer).unwrap();
        assert_eq!(
            agent.register("g1", "Ann", Strategy::Greedy),
            Err(AgentError::DuplicateGame("g1".into()))
        );
        agent.register("g2", "Ann", Strategy::Greedy).unwrap();
        assert_eq!(agent.entries().len(), 2);
    }

    #[tokio::test]
    async fn single_failure_threshold_drops_immediately() {
        let config = AgentConfig {
            max_fetch_failures: 1,
            ..AgentConfig::default()
        };
        let mut agent = Agent::new(Arc::new(Unreachable), config);
        agent.register("g1", "Dealer", Strategy::Dealer).unwrap();

        let report = agent.tick().await;
        assert_eq!(report.fetch_failures, 1);
        assert_eq!(
            report.removed,
            vec![("g1".to_string(), RemovalReason::Unreachable)]
        );
        assert!(!agent.is_registered("g1"));
    }
}
