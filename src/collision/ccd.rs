//! Time of impact by conservative advancement.

use super::{narrowphase::separation, shapes::ColliderShape};
use crate::{config::LINEAR_SLOP, core::types::Sweep};

/// Two shapes moving along their sweeps over the normalized interval `[0, t_max]`.
#[derive(Debug, Clone, Copy)]
pub struct ToiInput<'a> {
    pub shape_a: &'a ColliderShape,
    pub sweep_a: Sweep,
    pub shape_b: &'a ColliderShape,
    pub sweep_b: Sweep,
    pub t_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    /// The iteration cap was hit before converging.
    Failed,
    /// The shapes already overlap deeper than the target at the start of the sweep.
    Overlapped,
    /// The shapes come within the target gap at `t`.
    Touching,
    /// The shapes stay apart over the whole interval.
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
}

/// Conservative advancement driver.
#[derive(Debug, Clone, Copy)]
pub struct CcdSolver {
    /// Gap the advancement stops at. Negative values stop slightly inside contact,
    /// below where the position solver leaves a resting pair, so a resolved
    /// impact is not found again at the start of its remaining sweep.
    pub target: f32,
    pub tolerance: f32,
    pub max_iterations: u32,
}

impl Default for CcdSolver {
    fn default() -> Self {
        Self {
            target: -3.0 * LINEAR_SLOP,
            tolerance: 0.25 * LINEAR_SLOP,
            max_iterations: 30,
        }
    }
}

impl CcdSolver {
    pub fn time_of_impact(&self, input: &ToiInput<'_>) -> ToiOutput {
        let bound = motion_bound(input.shape_a, &input.sweep_a) + motion_bound(input.shape_b, &input.sweep_b);
        let mut t = 0.0;

        for iteration in 0..self.max_iterations {
            let xf_a = input.sweep_a.transform_at(t);
            let xf_b = input.sweep_b.transform_at(t);
            let gap = separation(input.shape_a, &xf_a, input.shape_b, &xf_b);

            if iteration == 0 && gap < self.target - self.tolerance {
                return ToiOutput {
                    state: ToiState::Overlapped,
                    t: 0.0,
                };
            }

            if gap <= self.target + self.tolerance {
                return ToiOutput {
                    state: ToiState::Touching,
                    t,
                };
            }

            if bound <= f32::EPSILON {
                break;
            }

            t += (gap - self.target) / bound;
            if t >= input.t_max {
                break;
            }

            if iteration + 1 == self.max_iterations {
                return ToiOutput {
                    state: ToiState::Failed,
                    t,
                };
            }
        }

        ToiOutput {
            state: ToiState::Separated,
            t: input.t_max,
        }
    }
}

/// Upper bound on how far any point of the shape travels over the sweep.
fn motion_bound(shape: &ColliderShape, sweep: &Sweep) -> f32 {
    let reach = shape.bounding_radius() + sweep.local_center.length();
    (sweep.c - sweep.c0).length() + (sweep.a - sweep.a0).abs() * reach
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Vec2;

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn fast_circle_hits_thin_wall() {
        let ball = ColliderShape::circle(0.1).expect("ball");
        let wall = ColliderShape::cuboid(0.05, 5.0).expect("wall");
        let input = ToiInput {
            shape_a: &ball,
            sweep_a: linear_sweep(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            shape_b: &wall,
            sweep_b: linear_sweep(Vec2::ZERO, Vec2::ZERO),
            t_max: 1.0,
        };
        let output = CcdSolver::default().time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);
        // Contact at x = -0.15 (wall face minus radius), pushed in by the target depth.
        let depth = 3.0 * LINEAR_SLOP;
        assert_abs_diff_eq!(output.t, (5.0 - 0.15 + depth) / 10.0, epsilon = 1e-3);
    }

    #[test]
    fn parallel_motion_stays_separated() {
        let ball = ColliderShape::circle(0.5).expect("ball");
        let input = ToiInput {
            shape_a: &ball,
            sweep_a: linear_sweep(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)),
            shape_b: &ball,
            sweep_b: linear_sweep(Vec2::new(0.0, 3.0), Vec2::new(10.0, 3.0)),
            t_max: 1.0,
        };
        let output = CcdSolver::default().time_of_impact(&input);
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn initial_overlap_is_reported() {
        let ball = ColliderShape::circle(0.5).expect("ball");
        let input = ToiInput {
            shape_a: &ball,
            sweep_a: linear_sweep(Vec2::ZERO, Vec2::X),
            shape_b: &ball,
            sweep_b: linear_sweep(Vec2::new(0.5, 0.0), Vec2::new(0.5, 0.0)),
            t_max: 1.0,
        };
        assert_eq!(CcdSolver::default().time_of_impact(&input).state, ToiState::Overlapped);
    }

    #[test]
    fn resting_pair_at_solver_depth_is_not_an_impact() {
        // Left the way the TOI position pass leaves a pair: 1.5 slop deep, not moving.
        let ball = ColliderShape::circle(0.5).expect("ball");
        let depth = 1.5 * LINEAR_SLOP;
        let input = ToiInput {
            shape_a: &ball,
            sweep_a: linear_sweep(Vec2::ZERO, Vec2::ZERO),
            shape_b: &ball,
            sweep_b: linear_sweep(Vec2::new(1.0 - depth, 0.0), Vec2::new(1.0 - depth, 0.0)),
            t_max: 1.0,
        };
        let output = CcdSolver::default().time_of_impact(&input);
        assert_eq!(output.state, ToiState::Separated);
    }
}
