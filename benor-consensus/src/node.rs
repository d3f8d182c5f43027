//! The per-node consensus state machine.
//!
//! `Init → Running → {Decided, Stopped}`, or `Faulty-Inert` from the start
//! for a node configured faulty.
//!
//! Opinion, round, decided flag, kill flag, message log and coin share one
//! mutex. The inbound path and the round loop both take it for short
//! critical sections and neither holds it across a timer or a send, so an
//! eager adoption can never interleave with half of a round's decision.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use benor_common::{Bit, Message, NodeId, NodeState, NodeStatus, Opinion};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::ConsensusConfig,
    error::ConsensusError,
    log::MessageLog,
    network::{self, traits::Network},
    readiness::ReadinessBarrier,
    round::{RoundCoordinator, RoundOutcome},
};

/// How a call to [`ConsensusNode::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Decided(Bit),
    Stopped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Decided(bit) => write!(f, "decided {bit}"),
            Outcome::Stopped => write!(f, "stopped"),
        }
    }
}

/// Counters exposed for diagnosing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub failed_sends: u64,
    pub rejected_messages: u64,
    pub logged_messages: usize,
}

struct NodeCore {
    opinion: Opinion,
    round: Option<u64>,
    decided: Option<bool>,
    killed: bool,
    log: MessageLog,
    coin: Box<dyn RngCore + Send>,
}

impl NodeCore {
    fn snapshot(&self) -> NodeState {
        NodeState {
            killed: self.killed,
            opinion: self.opinion,
            decided: self.decided,
            round: self.round,
        }
    }

    fn mark_faulty(&mut self) {
        self.opinion = None;
        self.round = None;
        self.decided = None;
    }

    /// The latched decision, if any.
    fn decision(&self) -> Option<Bit> {
        match self.decided {
            Some(true) => self.opinion,
            _ => None,
        }
    }

    /// Latches `value` unless a decision is already held. Returns the value
    /// the node ends up decided on.
    fn decide(&mut self, value: Bit) -> Bit {
        if let Some(existing) = self.decision() {
            return existing;
        }
        self.decided = Some(true);
        self.opinion = Some(value);
        value
    }
}

pub struct ConsensusNode {
    id: NodeId,
    faulty: bool,
    config: ConsensusConfig,
    coordinator: RoundCoordinator,
    network: Arc<dyn Network>,
    readiness: Arc<dyn ReadinessBarrier>,
    core: Mutex<NodeCore>,
    running: AtomicBool,
    failed_sends: Arc<AtomicU64>,
    rejected_messages: AtomicU64,
}

impl ConsensusNode {
    pub fn new(
        id: NodeId,
        initial: Opinion,
        faulty: bool,
        config: ConsensusConfig,
        network: Arc<dyn Network>,
        readiness: Arc<dyn ReadinessBarrier>,
    ) -> Self {
        let coin: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed.wrapping_add(id.0 as u64))),
            None => Box::new(StdRng::from_entropy()),
        };

        let mut core = NodeCore {
            opinion: initial,
            round: Some(0),
            decided: Some(false),
            killed: false,
            log: MessageLog::new(),
            coin,
        };
        if faulty {
            core.mark_faulty();
        }

        Self {
            id,
            faulty,
            coordinator: RoundCoordinator::new(config.quorum),
            config,
            network,
            readiness,
            core: Mutex::new(core),
            running: AtomicBool::new(false),
            failed_sends: Arc::new(AtomicU64::new(0)),
            rejected_messages: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty
    }

    pub fn status(&self) -> NodeStatus {
        if self.faulty {
            NodeStatus::Faulty
        } else {
            NodeStatus::Live
        }
    }

    /// Records an inbound message and, for a decision announcement, adopts
    /// its value on the spot.
    ///
    /// The first decision a node holds is final. A later announcement with
    /// a different value is logged and ignored.
    pub async fn handle_inbound(&self, message: Message) -> Result<(), ConsensusError> {
        if let Err(e) = message.validate() {
            self.record_rejection(&e);
            return Err(e.into());
        }

        let mut core = self.core.lock().await;
        if message.is_decision() && !self.faulty {
            if let Some(value) = message.value {
                match core.decision() {
                    None => {
                        core.decide(value);
                        info!(node = %self.id, value = %value, round = message.round, "adopted announced decision");
                    }
                    Some(held) if held != value => {
                        warn!(node = %self.id, held = %held, announced = %value, "ignoring conflicting decision");
                    }
                    Some(_) => {}
                }
            }
        }
        core.log.record(message);
        Ok(())
    }

    /// Counts a message that never made it into the log, e.g. a body the
    /// transport could not decode.
    pub fn record_rejection(&self, reason: &dyn fmt::Display) {
        self.rejected_messages.fetch_add(1, Ordering::Relaxed);
        warn!(node = %self.id, error = %reason, "rejecting malformed message");
    }

    /// Runs the protocol until this node decides or is stopped.
    ///
    /// A faulty node returns [`Outcome::Stopped`] right away with its state
    /// undefined. Otherwise the call waits for the readiness barrier first.
    pub async fn start(&self) -> Result<Outcome, ConsensusError> {
        if self.faulty {
            self.core.lock().await.mark_faulty();
            info!(node = %self.id, "faulty node, not participating");
            return Ok(Outcome::Stopped);
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConsensusError::AlreadyRunning(self.id));
        }
        let outcome = self.run().await;
        self.running.store(false, Ordering::SeqCst);
        Ok(outcome)
    }

    /// Sets the kill flag. The round in flight still completes; the loop
    /// notices the flag before starting the next one.
    pub async fn stop(&self) {
        self.core.lock().await.killed = true;
        info!(node = %self.id, "stop requested");
    }

    pub async fn get_state(&self) -> NodeState {
        self.core.lock().await.snapshot()
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let logged_messages = self.core.lock().await.log.len();
        Diagnostics {
            failed_sends: self.failed_sends.load(Ordering::Relaxed),
            rejected_messages: self.rejected_messages.load(Ordering::Relaxed),
            logged_messages,
        }
    }

    async fn run(&self) -> Outcome {
        self.readiness.wait_ready(self.config.readiness_poll_interval).await;
        info!(node = %self.id, n = self.config.n(), f = self.config.f(), "all peers ready, starting rounds");

        loop {
            let (round, opinion) = {
                let core = self.core.lock().await;
                if core.killed {
                    info!(node = %self.id, round = ?core.round, "stopped");
                    return Outcome::Stopped;
                }
                if let Some(value) = core.decision() {
                    return Outcome::Decided(value);
                }
                (core.round.unwrap_or(0), core.opinion)
            };

            self.broadcast(Message::vote(round, opinion));
            pause(self.config.propagation_delay).await;

            let mut core = self.core.lock().await;
            if let Some(value) = core.decision() {
                debug!(node = %self.id, round, "decision adopted while waiting for peers");
                return Outcome::Decided(value);
            }

            let messages = core.log.messages_for_round(round);
            let outcome = self.coordinator.conclude(opinion, &messages, &mut *core.coin);
            match outcome {
                RoundOutcome::AdoptedDecision(value) => {
                    let value = core.decide(value);
                    info!(node = %self.id, round, value = %value, "adopted decision from round messages");
                    info!(target: "consensus", "EVENT:DECIDE node={} round={} value={} via=announcement", self.id, round, value);
                    return Outcome::Decided(value);
                }
                RoundOutcome::Decided(value) => {
                    let value = core.decide(value);
                    self.apply_retention(&mut core, round);
                    drop(core);
                    self.broadcast(Message::announce(round, value));
                    info!(node = %self.id, round, value = %value, "decided by majority");
                    info!(target: "consensus", "EVENT:DECIDE node={} round={} value={} via=majority", self.id, round, value);
                    return Outcome::Decided(value);
                }
                RoundOutcome::SafeAdopt(value) | RoundOutcome::CoinToss(value) => {
                    core.opinion = Some(value);
                    core.round = Some(round + 1);
                    self.apply_retention(&mut core, round + 1);
                    debug!(node = %self.id, outcome = ?outcome, state = ?core.snapshot(), "round complete");
                }
            }
        }
    }

    fn broadcast(&self, message: Message) {
        network::broadcast(&self.network, self.id, self.config.n(), message, &self.failed_sends);
    }

    fn apply_retention(&self, core: &mut NodeCore, current_round: u64) {
        if let Some(window) = self.config.retention_rounds {
            let dropped = core.log.retain_from(current_round.saturating_sub(window));
            if dropped > 0 {
                debug!(node = %self.id, dropped, current_round, "pruned message log");
            }
        }
    }
}

async fn pause(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
