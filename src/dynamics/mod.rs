//! Simulation dynamics: integration, forces, contact and joint solvers, islands and TOI.

pub mod contact_solver;
pub mod forces;
pub mod integrator;
pub mod island;
pub mod joints;
pub mod solver;
pub mod toi;

pub use contact_solver::{ContactConstraint, ContactConstraintPoint, PositionParams};
pub use forces::{DragForce, ForceGenerator, ForceRegistry, SpringForce};
pub use integrator::Integrator;
pub use island::{build_islands, Island, IslandJoint};
pub use joints::{
    AngleJoint, AngleLimitJoint, Joint, JointDef, JointDefKind, JointKind, JointParams, LimitState, PinJoint,
    RevoluteJoint, SliderJoint,
};
pub use solver::{solve_islands, SolverStepMetrics, TimeStep};
