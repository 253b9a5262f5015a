use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use tagrush_core::net::messages::{
    CountdownMsg, EndReason, GameEndMsg, GameStartMsg, InputMsg, ServerMessage,
};
use tagrush_core::net::protocol::encode_server_message;
use tagrush_core::player::{Player, PlayerId};
use tagrush_core::room::{MIN_PLAYERS, RoomStatus};
use tagrush_sim::TagMatch;
use tagrush_sim::arena::Arena;
use tagrush_sim::config::TagConfig;
use tagrush_sim::physics::TICK_RATE;

/// Countdown steps before a round, one per second.
pub const COUNTDOWN_SECS: u8 = 3;

/// Commands sent from the WebSocket handlers to a room's session task.
#[derive(Debug)]
pub enum GameCommand {
    PlayerInput { player_id: PlayerId, input: InputMsg },
    PlayerLeft { player_id: PlayerId },
    Stop,
}

/// Output of a session task, consumed by the room's forwarder.
#[derive(Debug, Clone)]
pub enum GameBroadcast {
    /// Serialized ServerMessage bytes ready to send over WebSocket.
    /// Uses `Bytes` for zero-copy cloning across player channels.
    EncodedMessage(Bytes),
    /// The room moved to a new lifecycle status.
    StatusChanged(RoomStatus),
    /// The session is over; the room should return to the lobby.
    Finished,
}

/// Everything a session needs, captured when the host starts the game.
pub struct GameSessionConfig {
    pub room_code: String,
    pub arena_index: u8,
    pub arena: Arc<Arena>,
    pub tag_config: Arc<TagConfig>,
    pub round_duration_secs: u16,
    /// Members in join order at start time.
    pub members: Vec<Player>,
    pub results_delay: Duration,
    pub seed: u64,
}

/// Spawn a room's countdown + round + results sequence as a tokio task.
/// Returns the command sender, broadcast receiver and task handle.
pub fn spawn_game_session(
    config: GameSessionConfig,
) -> (
    mpsc::UnboundedSender<GameCommand>,
    mpsc::UnboundedReceiver<GameBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_session(config, cmd_rx, &broadcast_tx).await;
        let _ = broadcast_tx.send(GameBroadcast::Finished);
    });

    (cmd_tx, broadcast_rx, handle)
}

fn send_message(tx: &mpsc::UnboundedSender<GameBroadcast>, room: &str, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(data) => {
            let _ = tx.send(GameBroadcast::EncodedMessage(Bytes::from(data)));
        },
        Err(e) => tracing::error!(
            room, kind = ?msg.message_type(), error = %e, "Failed to encode broadcast"
        ),
    }
}

/// How a phase of the session finished.
enum PhaseExit {
    Continue,
    /// Countdown cancelled, too few members.
    Aborted,
    Stopped,
}

async fn run_session(
    config: GameSessionConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
    tx: &mpsc::UnboundedSender<GameBroadcast>,
) {
    let room = config.room_code.as_str();
    let mut game = TagMatch::new(
        Arc::clone(&config.arena),
        Arc::clone(&config.tag_config),
        config.round_duration_secs,
        &config.members,
        config.seed,
    );

    match run_countdown(&mut game, room, &mut cmd_rx, tx).await {
        PhaseExit::Continue => {},
        PhaseExit::Aborted => {
            tracing::info!(room, "Countdown cancelled, not enough players");
            return;
        },
        PhaseExit::Stopped => return,
    }

    let Some(it_player_id) = game.start_round() else {
        return;
    };
    let _ = tx.send(GameBroadcast::StatusChanged(RoomStatus::Playing));
    send_message(
        tx,
        room,
        &ServerMessage::GameStart(GameStartMsg {
            arena_index: config.arena_index,
            round_duration_secs: config.round_duration_secs,
            it_player_id,
        }),
    );
    tracing::info!(
        room,
        arena = %game.arena().name,
        players = game.players().len(),
        it = it_player_id,
        "Round started"
    );

    let reason = match run_round(&mut game, room, &mut cmd_rx, tx).await {
        Some(reason) => reason,
        None => return,
    };

    let _ = tx.send(GameBroadcast::StatusChanged(RoomStatus::Ended));
    send_message(
        tx,
        room,
        &ServerMessage::GameEnd(GameEndMsg {
            reason,
            results: game.results(),
        }),
    );
    tracing::info!(room, reason = ?reason, ticks = game.tick_count(), "Round ended");

    // Results screen: keep draining commands until the delay elapses.
    let deadline = tokio::time::Instant::now() + config.results_delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            cmd = cmd_rx.recv() => match cmd {
                Some(GameCommand::PlayerLeft { player_id }) => {
                    game.remove_player(player_id);
                },
                Some(GameCommand::PlayerInput { .. }) => {},
                Some(GameCommand::Stop) | None => return,
            },
        }
    }
}

async fn run_countdown(
    game: &mut TagMatch,
    room: &str,
    cmd_rx: &mut mpsc::UnboundedReceiver<GameCommand>,
    tx: &mpsc::UnboundedSender<GameBroadcast>,
) -> PhaseExit {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut value = COUNTDOWN_SECS;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if value == 0 {
                    return PhaseExit::Continue;
                }
                send_message(tx, room, &ServerMessage::Countdown(CountdownMsg { value }));
                value -= 1;
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(GameCommand::PlayerLeft { player_id }) => {
                    game.remove_player(player_id);
                    if game.players().len() < MIN_PLAYERS {
                        return PhaseExit::Aborted;
                    }
                },
                Some(GameCommand::PlayerInput { .. }) => {},
                Some(GameCommand::Stop) | None => return PhaseExit::Stopped,
            },
        }
    }
}

/// Run the fixed-rate clock until the round ends. `None` means stopped.
async fn run_round(
    game: &mut TagMatch,
    room: &str,
    cmd_rx: &mut mpsc::UnboundedReceiver<GameCommand>,
    tx: &mpsc::UnboundedSender<GameBroadcast>,
) -> Option<EndReason> {
    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(TICK_RATE));
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = game.tick();
                if let Some(tagged) = outcome.tagged {
                    tracing::debug!(
                        room, old_it = tagged.old_it_id, new_it = tagged.new_it_id, "Tag"
                    );
                    send_message(tx, room, &ServerMessage::Tagged(tagged));
                }
                send_message(tx, room, &ServerMessage::GameState(game.snapshot()));
                if let Some(reason) = outcome.ended {
                    return Some(reason);
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(GameCommand::PlayerInput { player_id, input }) => {
                    game.apply_input(player_id, &input);
                },
                Some(GameCommand::PlayerLeft { player_id }) => {
                    let outcome = game.remove_player(player_id);
                    if let Some(new_it) = outcome.new_it {
                        tracing::info!(room, player_id, new_it, "It left, reassigned");
                    }
                    if let Some(reason) = outcome.ended {
                        send_message(tx, room, &ServerMessage::GameState(game.snapshot()));
                        return Some(reason);
                    }
                },
                Some(GameCommand::Stop) | None => return None,
            },
        }
    }
}
