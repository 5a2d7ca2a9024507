//! Render-loop scheduling.
//!
//! Two disciplines are supported behind one [`FrameScheduler`]:
//!
//! - **Vsync-cooperative**: every completed frame schedules exactly one successor at the next
//!   refresh boundary, and the loop yields between frames. A poll never reports more than one
//!   frame.
//! - **Fixed-interval**: ticks fire at `anchor + k * interval` regardless of how long frames take.
//!   When a frame overruns the interval, several ticks are due at once; [`OverrunPolicy`] decides
//!   whether the extra ticks are dropped or run back to back.
//!
//! Frames never overlap: the bridge context is driven through `&mut`, so a tick cannot start
//! while another is running. The overrun policy is the only place where "late" ticks are handled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Run one frame for any number of elapsed ticks and drop the rest.
    Drop,
    /// Run every elapsed tick, up to `max_backlog` per poll; the excess is dropped.
    Queue { max_backlog: u32 },
}

impl Default for OverrunPolicy {
    fn default() -> Self {
        OverrunPolicy::Drop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStrategy {
    VsyncCooperative { refresh: Duration },
    FixedInterval {
        interval: Duration,
        overrun: OverrunPolicy,
    },
}

impl ScheduleStrategy {
    /// 60 Hz display-synced scheduling.
    pub fn vsync_60hz() -> Self {
        ScheduleStrategy::VsyncCooperative {
            refresh: Duration::from_nanos(1_000_000_000 / 60),
        }
    }
}

impl Default for ScheduleStrategy {
    fn default() -> Self {
        Self::vsync_60hz()
    }
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    strategy: ScheduleStrategy,
    next_deadline: Option<Duration>,
    /// Vsync only: a frame was handed out and has not completed yet.
    awaiting_completion: bool,
    /// Fixed-interval only: scheduled time of the first tick handed out by the last poll.
    first_due_tick: Option<Duration>,
    dropped_ticks: u64,
}

impl FrameScheduler {
    pub fn new(strategy: ScheduleStrategy) -> Self {
        Self {
            strategy,
            next_deadline: None,
            awaiting_completion: false,
            first_due_tick: None,
            dropped_ticks: 0,
        }
    }

    pub fn strategy(&self) -> ScheduleStrategy {
        self.strategy
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.next_deadline
    }

    /// Fixed-interval ticks discarded by the overrun policy.
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }

    /// Scheduled start of frame `index` among those returned by the last [`Self::frames_due`].
    ///
    /// Fixed-interval frames are stamped with their own tick, so a backlog run back to back still
    /// reports the nominal cadence. Vsync frames have no scheduled time and return `None`; the
    /// caller samples its clock instead.
    pub fn frame_start(&self, index: u32) -> Option<Duration> {
        let ScheduleStrategy::FixedInterval { interval, .. } = self.strategy else {
            return None;
        };
        let first = self.first_due_tick?;
        Some(first + interval.max(Duration::from_nanos(1)) * index)
    }

    /// Number of frames to run now.
    ///
    /// The first poll starts the schedule: vsync runs a frame immediately, fixed-interval anchors
    /// its first tick one interval later.
    pub fn frames_due(&mut self, now: Duration) -> u32 {
        match self.strategy {
            ScheduleStrategy::VsyncCooperative { .. } => {
                self.first_due_tick = None;
                if self.awaiting_completion {
                    return 0;
                }
                match self.next_deadline {
                    Some(deadline) if now < deadline => 0,
                    _ => {
                        self.next_deadline = None;
                        self.awaiting_completion = true;
                        1
                    }
                }
            }
            ScheduleStrategy::FixedInterval { interval, overrun } => {
                self.first_due_tick = None;
                let Some(deadline) = self.next_deadline else {
                    self.next_deadline = Some(now + interval);
                    return 0;
                };
                if now < deadline {
                    return 0;
                }

                let interval = interval.max(Duration::from_nanos(1));
                let interval_ns = interval.as_nanos();
                let elapsed = (now - deadline).as_nanos() / interval_ns + 1;
                let advance = interval_ns.saturating_mul(elapsed);
                self.next_deadline =
                    Some(deadline + Duration::from_nanos(advance.min(u64::MAX as u128) as u64));

                let elapsed = elapsed.min(u32::MAX as u128) as u32;
                let due = match overrun {
                    OverrunPolicy::Drop => 1,
                    OverrunPolicy::Queue { max_backlog } => elapsed.min(max_backlog.max(1)),
                };
                // The frames run are the most recent `due` ticks; older ones are the dropped ones.
                self.first_due_tick = Some(deadline + interval * (elapsed - due));
                let dropped = elapsed - due;
                if dropped > 0 {
                    self.dropped_ticks += u64::from(dropped);
                    tracing::debug!(dropped, due, "frame overran the tick interval");
                }
                due
            }
        }
    }

    /// Reports that a frame finished at `now`.
    ///
    /// For vsync this schedules the single successor frame at the next refresh boundary.
    pub fn frame_completed(&mut self, now: Duration) {
        if let ScheduleStrategy::VsyncCooperative { refresh } = self.strategy {
            let refresh_ns = refresh.as_nanos().max(1);
            let next = (now.as_nanos() / refresh_ns + 1) * refresh_ns;
            self.next_deadline = Some(Duration::from_nanos(next.min(u64::MAX as u128) as u64));
            self.awaiting_completion = false;
        }
    }
}
