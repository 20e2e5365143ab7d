//! Flow modifiers: pluggable per-tick iteration policies.
//!
//! The scheduler core asks the active modifier, lane by lane, whether it may
//! process the lane and whether it may move on to the next one. Refusing
//! either ends the tick early; the core remembers where it stopped and the
//! modifier decides where the next tick starts.

use std::fmt;
use std::time::{Duration, Instant};

/// What happened to the lane that was just processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneOutcome {
    /// The lane's occupant reached a terminal state.
    pub completed: bool,
    /// The occupant gave up the rest of this tick's budget.
    pub surrendered: bool,
}

/// Per-tick iteration policy.
pub trait FlowModifier: Send + fmt::Debug {
    /// Called once before the first lane of every tick that runs lanes.
    fn begin_tick(&mut self) {}

    /// Lane to start from, given where the previous tick stopped.
    fn first_lane(
        &mut self,
        resume: usize,
        _lane_count: usize,
    ) -> usize {
        resume
    }

    /// May the lane at `index` be processed now?
    fn can_process_lane(
        &mut self,
        index: usize,
    ) -> bool;

    /// May the tick move on past the lane at `index`?
    fn can_advance(
        &mut self,
        index: usize,
        lane_count: usize,
        outcome: LaneOutcome,
    ) -> bool;

    fn name(&self) -> &'static str;
}

/// Every lane, every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl FlowModifier for Standard {
    fn first_lane(
        &mut self,
        _resume: usize,
        _lane_count: usize,
    ) -> usize {
        0
    }

    fn can_process_lane(
        &mut self,
        _index: usize,
    ) -> bool {
        true
    }

    fn can_advance(
        &mut self,
        _index: usize,
        _lane_count: usize,
        _outcome: LaneOutcome,
    ) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Only lane 0 runs: one root task, with all of its inline children, finishes
/// before the next root task takes its first step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

impl FlowModifier for Serial {
    fn first_lane(
        &mut self,
        _resume: usize,
        _lane_count: usize,
    ) -> usize {
        0
    }

    fn can_process_lane(
        &mut self,
        index: usize,
    ) -> bool {
        index == 0
    }

    fn can_advance(
        &mut self,
        _index: usize,
        _lane_count: usize,
        _outcome: LaneOutcome,
    ) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

/// At most `max_lanes` lanes per tick, round-robin across ticks.
#[derive(Debug, Clone, Copy)]
pub struct Staggered {
    max_lanes: usize,
    processed: usize,
}

impl Staggered {
    pub fn new(max_lanes: usize) -> Self {
        Self {
            max_lanes: max_lanes.max(1),
            processed: 0,
        }
    }

    #[inline]
    pub fn max_lanes(&self) -> usize {
        self.max_lanes
    }
}

impl FlowModifier for Staggered {
    fn begin_tick(&mut self) {
        self.processed = 0;
    }

    fn can_process_lane(
        &mut self,
        _index: usize,
    ) -> bool {
        self.processed < self.max_lanes
    }

    fn can_advance(
        &mut self,
        _index: usize,
        _lane_count: usize,
        _outcome: LaneOutcome,
    ) -> bool {
        self.processed += 1;
        self.processed < self.max_lanes
    }

    fn name(&self) -> &'static str {
        "staggered"
    }
}

/// Wall-clock budget shared by [`TimeBound`] and [`TimeSliced`].
#[derive(Debug, Clone, Copy)]
struct Budget {
    limit: Duration,
    started: Option<Instant>,
    lanes: usize,
}

impl Budget {
    fn new(limit: Duration) -> Self {
        Self {
            limit,
            started: None,
            lanes: 0,
        }
    }

    fn begin(&mut self) {
        self.started = Some(Instant::now());
        self.lanes = 0;
    }

    fn exhausted(&self) -> bool {
        self.started
            .map(|start| start.elapsed() >= self.limit)
            .unwrap_or(false)
    }

    /// The first lane of a tick always runs so a tiny budget cannot starve the runner.
    fn may_process(&self) -> bool {
        self.lanes == 0 || !self.exhausted()
    }

    fn lane_done(&mut self) -> bool {
        self.lanes += 1;
        !self.exhausted()
    }
}

/// Stop advancing once the tick has used up its wall-clock budget.
#[derive(Debug, Clone, Copy)]
pub struct TimeBound {
    budget: Budget,
}

impl TimeBound {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget: Budget::new(budget),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl FlowModifier for TimeBound {
    fn begin_tick(&mut self) {
        self.budget.begin();
    }

    fn can_process_lane(
        &mut self,
        _index: usize,
    ) -> bool {
        self.budget.may_process()
    }

    fn can_advance(
        &mut self,
        _index: usize,
        _lane_count: usize,
        _outcome: LaneOutcome,
    ) -> bool {
        self.budget.lane_done()
    }

    fn name(&self) -> &'static str {
        "time-bound"
    }
}

/// Like [`TimeBound`], and a lane may surrender the rest of the slice.
#[derive(Debug, Clone, Copy)]
pub struct TimeSliced {
    budget: Budget,
}

impl TimeSliced {
    pub fn new(slice: Duration) -> Self {
        Self {
            budget: Budget::new(slice),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl FlowModifier for TimeSliced {
    fn begin_tick(&mut self) {
        self.budget.begin();
    }

    fn can_process_lane(
        &mut self,
        _index: usize,
    ) -> bool {
        self.budget.may_process()
    }

    fn can_advance(
        &mut self,
        _index: usize,
        _lane_count: usize,
        outcome: LaneOutcome,
    ) -> bool {
        let within = self.budget.lane_done();
        within && !outcome.surrendered
    }

    fn name(&self) -> &'static str {
        "time-sliced"
    }
}

/// Parse a flow modifier spelled as `standard`, `serial`, `staggered:N`,
/// `time-bound:MS` or `time-sliced:MS`.
pub fn parse_flow(text: &str) -> Option<Box<dyn FlowModifier>> {
    let (kind, arg) = match text.split_once(':') {
        Some((kind, arg)) => (kind, Some(arg)),
        None => (text, None),
    };
    let number = || arg.and_then(|a| a.trim().parse::<u64>().ok());

    let flow: Box<dyn FlowModifier> = match kind.trim() {
        "standard" => Box::new(Standard),
        "serial" => Box::new(Serial),
        "staggered" => Box::new(Staggered::new(number()? as usize)),
        "time-bound" => Box::new(TimeBound::from_millis(number()?)),
        "time-sliced" => Box::new(TimeSliced::from_millis(number()?)),
        _ => return None,
    };
    Some(flow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staggered_caps_lanes_per_tick() {
        let mut flow = Staggered::new(2);
        flow.begin_tick();
        assert!(flow.can_process_lane(0));
        assert!(flow.can_advance(0, 8, LaneOutcome::default()));
        assert!(flow.can_process_lane(1));
        assert!(!flow.can_advance(1, 8, LaneOutcome::default()));
        assert!(!flow.can_process_lane(2));

        flow.begin_tick();
        assert!(flow.can_process_lane(2));
    }

    #[test]
    fn test_serial_only_lane_zero() {
        let mut flow = Serial;
        assert_eq!(flow.first_lane(3, 5), 0);
        assert!(flow.can_process_lane(0));
        assert!(!flow.can_process_lane(1));
        assert!(!flow.can_advance(0, 5, LaneOutcome::default()));
    }

    #[test]
    fn test_time_sliced_honours_surrender() {
        let mut flow = TimeSliced::from_millis(10_000);
        flow.begin_tick();
        assert!(flow.can_advance(0, 3, LaneOutcome::default()));
        let surrendered = LaneOutcome {
            completed: false,
            surrendered: true,
        };
        assert!(!flow.can_advance(1, 3, surrendered));
    }

    #[test]
    fn test_time_bound_zero_budget_runs_one_lane() {
        let mut flow = TimeBound::new(Duration::ZERO);
        flow.begin_tick();
        assert!(flow.can_process_lane(0));
        assert!(!flow.can_advance(0, 2, LaneOutcome::default()));
        assert!(!flow.can_process_lane(1));
    }

    #[test]
    fn test_parse_flow() {
        assert_eq!(parse_flow("standard").map(|f| f.name()), Some("standard"));
        assert_eq!(parse_flow("staggered:4").map(|f| f.name()), Some("staggered"));
        assert_eq!(parse_flow("time-sliced:5").map(|f| f.name()), Some("time-sliced"));
        assert!(parse_flow("staggered").is_none());
        assert!(parse_flow("fastest").is_none());
    }
}
