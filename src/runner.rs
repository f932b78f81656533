use crate::map::{GridMap, StepError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Failure modes of starting a run.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RunError {
    /// A run is already ticking; it is rejected, not queued.
    #[error("a run is already active")]
    AlreadyRunning,
    /// The map has no open cell, so there is nothing to run.
    #[error("robot has not been placed on the map")]
    RobotNotPlaced,
}

/// The state a run is in when a frame is emitted. Every state other than
/// `Running` is terminal: no further frames follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Complete,
    /// The robot has no passable neighboring cell left.
    Deadlocked,
    /// The map was replaced while the run was active.
    Cancelled,
    /// The simulation reported an unrecoverable condition mid-run.
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        self != RunState::Running
    }
}

/// Progress statistics for one tick, in the shape the observers expect.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub spaces_cleaned: usize,
    /// Percentage of open cells cleaned, rounded to a whole number.
    pub completion: u32,
    /// Elapsed run time, rounded to whole seconds.
    pub duration: u64,
    /// Cleaning rate in spaces per second, one decimal place. Zero until a
    /// whole second has elapsed.
    pub rate: f64,
}

/// The structured per-tick output pushed to observers.
#[derive(Clone, Debug, Serialize)]
pub struct StatusFrame {
    pub state: RunState,
    pub stats: RunStats,
    pub map: String,
}

impl StatusFrame {
    fn new(state: RunState, map: &GridMap, elapsed: Duration) -> StatusFrame {
        let cleaned = map.spaces_cleaned();
        let total = map.total_spaces();

        let completion = if total == 0 {
            0
        } else {
            (100.0 * cleaned as f64 / total as f64).round() as u32
        };

        let duration = elapsed.as_secs_f64().round() as u64;
        let rate = if duration == 0 {
            0.0
        } else {
            (10.0 * cleaned as f64 / duration as f64).round() / 10.0
        };

        StatusFrame {
            state,
            stats: RunStats {
                spaces_cleaned: cleaned,
                completion,
                duration,
                rate,
            },
            map: map.render(),
        }
    }
}

/// Drives one simulation forward on a fixed tick cadence and broadcasts a
/// [`StatusFrame`] after every tick.
///
/// The runner is the single writer of the simulation state. Observers hold
/// broadcast receivers and never touch the grid directly; a receiver only
/// sees frames emitted after it subscribed. At most one ticker task exists at
/// a time, and submitting a new map aborts it before the old grid is
/// discarded.
pub struct Runner {
    shared: Arc<Shared>,
    tick: Duration,
}

struct Shared {
    slot: Mutex<Slot>,
    frames: broadcast::Sender<StatusFrame>,
}

struct Slot {
    map: GridMap,
    rng: StdRng,
    run: Option<ActiveRun>,
}

struct ActiveRun {
    id: Uuid,
    started: Instant,
    ticker: JoinHandle<()>,
}

impl Runner {
    /// Creates a runner with an empty map and the given tick interval.
    pub fn new(tick: Duration) -> Runner {
        let (frames, _) = broadcast::channel(64);

        Runner {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    map: GridMap::parse(""),
                    rng: StdRng::from_entropy(),
                    run: None,
                }),
                frames,
            }),
            tick,
        }
    }

    /// Replaces the simulation with a freshly parsed map.
    ///
    /// Any active run is cancelled first: its ticker is aborted and its
    /// observers receive a terminal `Cancelled` frame for the old grid.
    pub async fn submit_map(&self, contents: &str) {
        let mut slot = self.shared.slot.lock().await;

        if let Some(run) = slot.run.take() {
            run.ticker.abort();
            tracing::info!(run_id = %run.id, "run cancelled by map submission");

            let frame = StatusFrame::new(RunState::Cancelled, &slot.map, run.started.elapsed());
            let _ = self.shared.frames.send(frame);
        }

        slot.map = GridMap::parse(contents);
        slot.rng = StdRng::from_entropy();
        tracing::info!(
            total_spaces = slot.map.total_spaces(),
            "map replaced"
        );
    }

    /// The current textual rendering of the grid, independent of run state.
    pub async fn snapshot(&self) -> String {
        self.shared.slot.lock().await.map.render()
    }

    /// Subscribes to the per-tick frame feed. Frames are delivered at most
    /// once and are not replayed to late subscribers.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusFrame> {
        self.shared.frames.subscribe()
    }

    /// Starts ticking the current map until completion or a terminal error.
    ///
    /// The first tick fires immediately, so a map that is already complete
    /// emits its single `Complete` frame right away without any movement.
    pub async fn start(&self) -> Result<Uuid, RunError> {
        let mut slot = self.shared.slot.lock().await;

        if slot.run.is_some() {
            return Err(RunError::AlreadyRunning);
        }
        if slot.map.robot_position().is_none() {
            return Err(RunError::RobotNotPlaced);
        }

        let id = Uuid::new_v4();
        let started = Instant::now();
        let ticker = tokio::spawn(run_loop(Arc::clone(&self.shared), id, started, self.tick));

        slot.run = Some(ActiveRun { id, started, ticker });
        tracing::info!(run_id = %id, unclean = slot.map.unclean_spaces(), "run started");

        Ok(id)
    }
}

async fn run_loop(shared: Arc<Shared>, id: Uuid, started: Instant, tick: Duration) {
    let mut interval = tokio::time::interval(tick);

    loop {
        interval.tick().await;

        let frame = {
            let mut slot = shared.slot.lock().await;

            // A map submission aborts this task, but it may already be past
            // the tick await; never touch a grid this run does not own.
            if slot.run.as_ref().map(|run| run.id) != Some(id) {
                return;
            }

            let frame = advance_once(&mut slot, started);

            if frame.state.is_terminal() {
                slot.run = None;
                tracing::info!(run_id = %id, state = ?frame.state, "run finished");
            }

            frame
        };

        let terminal = frame.state.is_terminal();
        let _ = shared.frames.send(frame);

        if terminal {
            return;
        }
    }
}

/// One tick: a single `advance` plus the resulting statistics.
fn advance_once(slot: &mut Slot, started: Instant) -> StatusFrame {
    let state = if slot.map.is_complete() {
        // Nothing left to clean; covers maps that start out complete.
        RunState::Complete
    } else {
        match slot.map.advance(&mut slot.rng) {
            Ok(_) if slot.map.is_complete() => RunState::Complete,
            Ok(_) => RunState::Running,
            Err(StepError::Deadlock) => RunState::Deadlocked,
            Err(StepError::RobotNotPlaced) => RunState::Failed,
        }
    };

    StatusFrame::new(state, &slot.map, started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    const TICK: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn when_a_run_completes_the_last_frame_reports_full_completion() {
        let runner = Runner::new(TICK);
        runner.submit_map("   ").await;

        let mut frames = runner.subscribe();
        runner.start().await.unwrap();

        let mut previous_cleaned = 0;
        let last = loop {
            let frame = frames.recv().await.unwrap();

            assert!(frame.stats.spaces_cleaned >= previous_cleaned);
            previous_cleaned = frame.stats.spaces_cleaned;

            if frame.state.is_terminal() {
                break frame;
            }
        };

        assert_eq!(last.state, RunState::Complete);
        assert_eq!(last.stats.spaces_cleaned, 3);
        assert_eq!(last.stats.completion, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn when_the_map_starts_complete_a_single_complete_frame_is_emitted() {
        let runner = Runner::new(TICK);
        runner.submit_map(" ").await;

        let mut frames = runner.subscribe();
        runner.start().await.unwrap();

        let frame = frames.recv().await.unwrap();

        assert_eq!(frame.state, RunState::Complete);
        assert_eq!(frame.stats.spaces_cleaned, 1);
        assert_eq!(frame.stats.completion, 100);
        assert_eq!(frame.stats.duration, 0);
        assert_eq!(frame.stats.rate, 0.0);
        // The robot never moved off its start cell.
        assert_eq!(frame.map, "X\n");

        // The ticker stopped; no further frames arrive.
        tokio::time::sleep(TICK * 4).await;
        assert!(matches!(frames.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn when_the_robot_is_enclosed_the_run_ends_with_a_deadlocked_frame() {
        let runner = Runner::new(TICK);
        runner.submit_map("# #\n #\n# #").await;

        let mut frames = runner.subscribe();
        runner.start().await.unwrap();

        let last = loop {
            let frame = frames.recv().await.unwrap();
            if frame.state.is_terminal() {
                break frame;
            }
        };

        assert_eq!(last.state, RunState::Deadlocked);
        assert!(last.stats.completion < 100);

        // A terminal run releases the slot; starting again is allowed.
        assert!(runner.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn when_a_run_is_active_a_second_start_is_rejected() {
        let runner = Runner::new(TICK);
        runner.submit_map("          ").await;

        runner.start().await.unwrap();

        assert_eq!(runner.start().await, Err(RunError::AlreadyRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn when_the_map_has_no_open_cell_the_run_cannot_start() {
        let runner = Runner::new(TICK);
        runner.submit_map("###").await;

        assert_eq!(runner.start().await, Err(RunError::RobotNotPlaced));

        let empty = Runner::new(TICK);
        assert_eq!(empty.start().await, Err(RunError::RobotNotPlaced));
    }

    #[tokio::test(start_paused = true)]
    async fn when_a_map_is_submitted_mid_run_observers_receive_a_cancelled_frame() {
        let runner = Runner::new(TICK);
        runner.submit_map("                    ").await;

        let mut frames = runner.subscribe();
        runner.start().await.unwrap();

        // Let the run produce at least one frame before replacing the map.
        let first = frames.recv().await.unwrap();
        assert_eq!(first.state, RunState::Running);

        runner.submit_map("## \n## ").await;

        let frame = loop {
            let frame = frames.recv().await.unwrap();
            if frame.state.is_terminal() {
                break frame;
            }
        };
        assert_eq!(frame.state, RunState::Cancelled);

        // The new simulation is installed and idle.
        assert_eq!(runner.snapshot().await, "##X\n## \n");
        assert!(runner.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn when_serialized_a_frame_uses_the_wire_field_names() {
        let map = GridMap::parse("  ");
        let frame = StatusFrame::new(RunState::Running, &map, Duration::from_secs(2));
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["state"], "running");
        assert_eq!(json["stats"]["spacesCleaned"], 1);
        assert_eq!(json["stats"]["completion"], 50);
        assert_eq!(json["stats"]["duration"], 2);
        assert_eq!(json["stats"]["rate"], 0.5);
        assert_eq!(json["map"], "X \n");
    }

    #[tokio::test(start_paused = true)]
    async fn when_no_observer_is_subscribed_the_run_still_finishes() {
        let runner = Runner::new(TICK);
        runner.submit_map("  ").await;
        runner.start().await.unwrap();

        // Give the ticker enough virtual time to finish the two-cell map.
        tokio::time::sleep(TICK * 50).await;

        assert!(runner.shared.slot.lock().await.run.is_none());
        assert!(runner.shared.slot.lock().await.map.is_complete());
    }
}
