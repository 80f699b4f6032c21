use log::{log_enabled, Level};
use std::time::{Duration, Instant};

/// Timed sections of a world step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepPhase {
    /// Proxy updates, both before collision and after the solve.
    BroadPhase,
    Collide,
    Solve,
    Toi,
}

impl StepPhase {
    pub fn label(self) -> &'static str {
        match self {
            StepPhase::BroadPhase => "broadphase",
            StepPhase::Collide => "contacts::collide",
            StepPhase::Solve => "islands::solve",
            StepPhase::Toi => "toi::solve",
        }
    }
}

/// Timing and population counts recorded for the most recent world step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfile {
    pub collide_time: Duration,
    pub solve_time: Duration,
    pub toi_time: Duration,
    pub broadphase_time: Duration,
    pub total_time: Duration,

    pub body_count: usize,
    pub contact_count: usize,
    pub joint_count: usize,
    pub island_count: usize,
    pub awake_body_count: usize,
    pub toi_events: usize,
}

impl StepProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn phase_time(&self, phase: StepPhase) -> Duration {
        match phase {
            StepPhase::BroadPhase => self.broadphase_time,
            StepPhase::Collide => self.collide_time,
            StepPhase::Solve => self.solve_time,
            StepPhase::Toi => self.toi_time,
        }
    }

    fn phase_slot(&mut self, phase: StepPhase) -> &mut Duration {
        match phase {
            StepPhase::BroadPhase => &mut self.broadphase_time,
            StepPhase::Collide => &mut self.collide_time,
            StepPhase::Solve => &mut self.solve_time,
            StepPhase::Toi => &mut self.toi_time,
        }
    }

    /// Starts timing `phase`; the guard adds its lifetime to the phase total on drop.
    pub fn time(&mut self, phase: StepPhase) -> PhaseTimer<'_> {
        PhaseTimer::new(phase, self.phase_slot(phase))
    }

    /// Records the step duration, reports it and warns when it overruns `budget_ms`.
    pub fn finish(&mut self, total: Duration, budget_ms: Option<f32>) {
        self.total_time = total;
        self.report();
        if let Some(budget_ms) = budget_ms {
            if self.exceeds_budget(budget_ms) {
                log::warn!(
                    "step exceeded budget: {:.2} ms > {:.2} ms",
                    self.total_time.as_secs_f32() * 1000.0,
                    budget_ms
                );
            }
        }
    }

    pub fn exceeds_budget(&self, budget_ms: f32) -> bool {
        self.total_time.as_secs_f32() * 1000.0 > budget_ms
    }

    /// Writes the profile through the `log` facade at debug level.
    pub fn report(&self) {
        let total_us = self.total_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        let share = |phase: StepPhase| (self.phase_time(phase).as_micros() as f32 / total_us) * 100.0;
        log::debug!(
            "step {:.2} ms | bodies {} (awake {}), contacts {}, joints {}, islands {}, toi {}",
            self.total_time.as_secs_f32() * 1000.0,
            self.body_count,
            self.awake_body_count,
            self.contact_count,
            self.joint_count,
            self.island_count,
            self.toi_events,
        );
        log::debug!(
            "  collide {:.1}% | solve {:.1}% | toi {:.1}% | broadphase {:.1}%",
            share(StepPhase::Collide),
            share(StepPhase::Solve),
            share(StepPhase::Toi),
            share(StepPhase::BroadPhase),
        );
    }
}

/// Scoped guard around one step phase. Emits trace lines at both ends when
/// trace logging is on and always accumulates into the profile slot.
pub struct PhaseTimer<'a> {
    phase: StepPhase,
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(phase: StepPhase, output: &'a mut Duration) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {}", phase.label());
        }
        Self {
            phase,
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for PhaseTimer<'a> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        *self.output += elapsed;
        if log_enabled!(Level::Trace) {
            log::trace!("end {} ({} µs)", self.phase.label(), elapsed.as_micros());
        }
    }
}
