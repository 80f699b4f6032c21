//! Per-step solver context, step metrics and island dispatch.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::island::Island;
use crate::config::SimulationConfig;

/// Timing and iteration parameters shared by every island in one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt * inv_dt0`: rescales last step's impulses when the step size changes.
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    pub fn new(dt: f32, inv_dt0: f32, velocity_iterations: u32, position_iterations: u32, warm_starting: bool) -> Self {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Self {
            dt,
            inv_dt,
            dt_ratio: dt * inv_dt0,
            velocity_iterations,
            position_iterations,
            warm_starting,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SolverStepMetrics {
    pub islands_solved: usize,
    pub contacts_solved: usize,
    pub joints_solved: usize,
    pub normal_impulse_sum: f32,
    pub tangent_impulse_sum: f32,
    /// Impulses dropped because they came out non-finite or singular.
    pub discarded_impulses: usize,
    pub islands_put_to_sleep: usize,
    pub toi_events: usize,
}

impl SolverStepMetrics {
    pub fn merge(&mut self, other: &Self) {
        self.islands_solved += other.islands_solved;
        self.contacts_solved += other.contacts_solved;
        self.joints_solved += other.joints_solved;
        self.normal_impulse_sum += other.normal_impulse_sum;
        self.tangent_impulse_sum += other.tangent_impulse_sum;
        self.discarded_impulses += other.discarded_impulses;
        self.islands_put_to_sleep += other.islands_put_to_sleep;
        self.toi_events += other.toi_events;
    }
}

/// Solves every island, on the rayon pool when enabled.
///
/// Islands never share a body, so each one owns its data outright; results stay
/// in island order for the sequential write-back that follows.
pub fn solve_islands(islands: &mut [Island], step: &TimeStep, config: &SimulationConfig) {
    #[cfg(feature = "parallel")]
    {
        if config.parallel_islands && islands.len() > 1 {
            islands
                .par_iter_mut()
                .for_each(|island| island.solve(step, config));
            return;
        }
    }

    for island in islands.iter_mut() {
        island.solve(step, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_ratio_tracks_step_changes() {
        let step = TimeStep::new(1.0 / 120.0, 60.0, 8, 3, true);
        assert!((step.dt_ratio - 0.5).abs() < 1e-6);
        assert!((step.inv_dt - 120.0).abs() < 1e-3);
        let paused = TimeStep::new(0.0, 60.0, 8, 3, true);
        assert_eq!(paused.inv_dt, 0.0);
    }

    #[test]
    fn metrics_merge_sums_counts() {
        let mut total = SolverStepMetrics {
            islands_solved: 1,
            discarded_impulses: 2,
            ..SolverStepMetrics::default()
        };
        total.merge(&SolverStepMetrics {
            islands_solved: 2,
            normal_impulse_sum: 1.5,
            ..SolverStepMetrics::default()
        });
        assert_eq!(total.islands_solved, 3);
        assert_eq!(total.discarded_impulses, 2);
        assert_eq!(total.normal_impulse_sum, 1.5);
    }
}
