//! Math types for the audio translation layer

pub use glam::{Quat, Vec3};

/// Position and orientation of an audio object or listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformation {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transformation {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.position.distance(other.position)
    }

    /// Returns true if `other` lies within `position_threshold` of this
    /// transformation and faces the same way.
    pub fn is_equivalent(&self, other: &Self, position_threshold: f32) -> bool {
        self.distance(other) <= position_threshold
            && self.rotation.abs_diff_eq(other.rotation, 1e-3)
    }
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transformation plus velocity, as forwarded to the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Object3DAttributes {
    pub transformation: Transformation,
    pub velocity: Vec3,
}

impl Object3DAttributes {
    pub fn new(transformation: Transformation, velocity: Vec3) -> Self {
        Self {
            transformation,
            velocity,
        }
    }

    /// Attributes reported when no default listener exists.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec3 {
        self.transformation.position
    }
}
