use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::utils::math::wrap_angle;

/// Rotation stored as the unit vector `(cos θ, sin θ)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub cos: f32,
    pub sin: f32,
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation {
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    pub fn from_angle(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { cos, sin }
    }

    /// Angle in `(-π, π]`.
    pub fn angle(&self) -> f32 {
        self.sin.atan2(self.cos)
    }

    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x - self.sin * v.y, self.sin * v.x + self.cos * v.y)
    }

    pub fn inv_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x + self.sin * v.y, -self.sin * v.x + self.cos * v.y)
    }

    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.cos, self.sin)
    }
}

/// Position and orientation of a body origin or shape frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: Rotation,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: Rotation::IDENTITY,
    };

    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            position,
            rotation: Rotation::from_angle(angle),
        }
    }

    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            rotation: Rotation::IDENTITY,
        }
    }

    /// Maps a local point into world space.
    pub fn apply(&self, local: Vec2) -> Vec2 {
        self.position + self.rotation.rotate(local)
    }

    /// Maps a world point into local space.
    pub fn apply_inverse(&self, world: Vec2) -> Vec2 {
        self.rotation.inv_rotate(world - self.position)
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        let cos = self.rotation.cos * other.rotation.cos - self.rotation.sin * other.rotation.sin;
        let sin = self.rotation.sin * other.rotation.cos + self.rotation.cos * other.rotation.sin;
        Transform {
            position: self.apply(other.position),
            rotation: Rotation { cos, sin },
        }
    }
}

/// Motion of a body's center of mass over one step, used by continuous collision.
///
/// `c0`/`a0` describe the pose at `alpha0`, `c`/`a` the pose at the end of the step.
/// Angles are never wrapped, so `a` carries the full revolution count.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sweep {
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f32,
    pub a: f32,
    pub alpha0: f32,
}

impl Sweep {
    /// Body-origin transform interpolated at `beta` in `[0, 1]` of the remaining sweep.
    pub fn transform_at(&self, beta: f32) -> Transform {
        let center = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = self.a0 * (1.0 - beta) + self.a * beta;
        let rotation = Rotation::from_angle(angle);
        Transform {
            position: center - rotation.rotate(self.local_center),
            rotation,
        }
    }

    /// Moves the sweep start forward to `alpha`, keeping the end pose.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += (self.a - self.a0) * beta;
        self.alpha0 = alpha;
    }

    /// Collapses the sweep onto its end pose.
    pub fn settle(&mut self) {
        self.c0 = self.c;
        self.a0 = self.a;
        self.alpha0 = 0.0;
    }

    /// Full revolutions contained in the unwrapped end angle, truncated toward zero.
    pub fn revolutions(&self) -> i32 {
        (self.a / std::f32::consts::TAU).trunc() as i32
    }

    /// End angle reduced to `(-π, π]`.
    pub fn normalized_angle(&self) -> f32 {
        wrap_angle(self.a)
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec2,
    pub angular: f32,
}

/// Mass, centroid and rotational inertia about the centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassData {
    pub mass: f32,
    /// Center of mass relative to the body origin.
    pub center: Vec2,
    /// Rotational inertia about `center`. Zero means the body cannot rotate.
    pub inertia: f32,
}

impl Default for MassData {
    fn default() -> Self {
        Self {
            mass: 1.0,
            center: Vec2::ZERO,
            inertia: 0.0,
        }
    }
}

/// Material coefficients that affect contact response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// How this material mixes its coefficients with another material.
    pub mixing: MaterialMixing,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            mixing: MaterialMixing::default(),
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            density: 1.4,
            friction: 1.0,
            restitution: 0.8,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn steel() -> Self {
        Self {
            density: 7.8,
            friction: 0.44,
            restitution: 0.4,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn ice() -> Self {
        Self {
            density: 0.9,
            friction: 0.03,
            restitution: 0.05,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn frictionless() -> Self {
        Self {
            friction: 0.0,
            ..Self::default()
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn combine_with(&self, other: &Self) -> MaterialPairProperties {
        let friction_mode = self.mixing.friction.resolve(other.mixing.friction);
        let restitution_mode = self.mixing.restitution.resolve(other.mixing.restitution);

        MaterialPairProperties {
            friction: friction_mode.combine(self.friction, other.friction),
            restitution: restitution_mode.combine(self.restitution, other.restitution),
        }
    }

    /// Symmetric combination: the result does not depend on pair order.
    pub fn combine_pair(a: &Self, b: &Self) -> MaterialPairProperties {
        let ab = a.combine_with(b);
        let ba = b.combine_with(a);
        MaterialPairProperties {
            friction: 0.5 * (ab.friction + ba.friction),
            restitution: 0.5 * (ab.restitution + ba.restitution),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialMixing {
    pub friction: MixingMode,
    pub restitution: MixingMode,
}

impl MaterialMixing {
    pub fn with_friction(mut self, mode: MixingMode) -> Self {
        self.friction = mode;
        self
    }

    pub fn with_restitution(mut self, mode: MixingMode) -> Self {
        self.restitution = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MixingMode {
    #[default]
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.max(0.0) * b.max(0.0)).sqrt(),
        }
    }

    fn resolve(self, other: MixingMode) -> MixingMode {
        if matches!(self, MixingMode::Average) {
            other
        } else {
            self
        }
    }
}

/// Friction and restitution of one contacting collider pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialPairProperties {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for MaterialPairProperties {
    fn default() -> Self {
        MaterialPairProperties::from_materials(&Material::default(), &Material::default())
    }
}

impl MaterialPairProperties {
    pub fn from_materials(a: &Material, b: &Material) -> Self {
        Material::combine_pair(a, b)
    }
}
