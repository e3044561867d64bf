//! Transform helpers shared by the registry, pose store and assembly code
//!
//! All matrices are column-major `glam` doubles. A local matrix lives in the
//! parent space, so `world = parent_world * parent_inverse * local`.

pub use glam::{DMat4, DQuat, DVec2, DVec3, DVec4};
use glam::DMat3;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Determinant magnitude below which a matrix is treated as singular
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// Default tolerance for transform comparisons
pub const TRANSFORM_EPSILON: f64 = 1e-6;

/// Build a matrix from location, rotation and scale
pub fn compose(location: DVec3, rotation: DQuat, scale: DVec3) -> DMat4 {
    DMat4::from_scale_rotation_translation(scale, rotation, location)
}

/// Split a matrix into location, rotation and scale
pub fn decompose(matrix: &DMat4) -> (DVec3, DQuat, DVec3) {
    let (scale, rotation, location) = matrix.to_scale_rotation_translation();
    (location, rotation.normalize(), scale)
}

/// The matrix rebuilt from its location, rotation and scale, without shear
pub fn trs_matrix(matrix: &DMat4) -> DMat4 {
    let (location, rotation, scale) = decompose(matrix);
    compose(location, rotation, scale)
}

/// Translation part of a matrix
pub fn translation(matrix: &DMat4) -> DVec3 {
    matrix.w_axis.truncate()
}

pub fn is_invertible(matrix: &DMat4) -> bool {
    matrix.determinant().abs() > SINGULAR_EPSILON && matrix.is_finite()
}

/// Invert a matrix, failing with `InvertibleMatrix` when it is singular
pub fn try_inverse(matrix: &DMat4, what: &str) -> CoreResult<DMat4> {
    if !is_invertible(matrix) {
        return Err(CoreError::InvertibleMatrix(what.to_string()));
    }
    Ok(matrix.inverse())
}

/// Local matrix that keeps `world` unchanged under `parent_world`
pub fn local_from_world(parent_world: &DMat4, world: &DMat4) -> CoreResult<DMat4> {
    Ok(try_inverse(parent_world, "parent world matrix")? * *world)
}

pub fn approx_eq(a: &DMat4, b: &DMat4, tolerance: f64) -> bool {
    a.abs_diff_eq(*b, tolerance)
}

/// Rebuild a matrix so that its scale is positive on every axis.
///
/// The sign flips move into the rotation: an even number of negative axes is
/// already a rotation, and a single mirror becomes a half turn about the
/// mirrored axis. Location, rotation handedness and scale magnitudes stay as
/// they were, so the result frames the same place as the mirrored matrix.
pub fn flatten_negative_scale(matrix: &DMat4) -> DMat4 {
    let (location, rotation, scale) = decompose(matrix);
    if scale.x >= 0.0 && scale.y >= 0.0 && scale.z >= 0.0 {
        return *matrix;
    }
    let mut flips = scale.signum();
    if flips.x * flips.y * flips.z < 0.0 {
        // drop the point inversion, what remains is a proper rotation
        flips = -flips;
    }
    let turn = DQuat::from_mat3(&DMat3::from_diagonal(flips));
    compose(location, (rotation * turn).normalize(), scale.abs())
}

pub fn has_negative_scale(matrix: &DMat4) -> bool {
    matrix.determinant() < 0.0
}

/// Arithmetic mean of a set of points
pub fn mean(points: &[DVec3]) -> Option<DVec3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(DVec3::ZERO, |acc, p| acc + *p);
    Some(sum / points.len() as f64)
}

/// Replace zero scale components with one, keeping the sign of the rest
pub fn normalize_zero_scale(scale: DVec3) -> DVec3 {
    DVec3::new(
        if scale.x.abs() < SINGULAR_EPSILON { 1.0 } else { scale.x },
        if scale.y.abs() < SINGULAR_EPSILON { 1.0 } else { scale.y },
        if scale.z.abs() < SINGULAR_EPSILON { 1.0 } else { scale.z },
    )
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn from_point(point: DVec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self::from_point(first);
        for point in iter {
            aabb.extend(point);
        }
        Some(aabb)
    }

    pub fn extend(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn dimensions(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after transforming its corners
    pub fn transformed(&self, matrix: &DMat4) -> Aabb {
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        // eight corners, never empty
        let mut aabb = Aabb::from_point(corners[0]);
        for corner in &corners[1..] {
            aabb.extend(*corner);
        }
        aabb
    }
}
