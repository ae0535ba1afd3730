//! 2D affine algebra for bone/object transforms.
//!
//! A [`Space`] is a position/rotation/scale triple; everything here is a pure
//! value transform on `Copy` data. Rotations are signed radians kept in the
//! canonical range (−π, π]. Mirrored spaces (negative `scale.x * scale.y`)
//! flip handedness, which negates the child rotation contribution when
//! composing — see [`Space::combine`].

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };
    pub const ONE: Vector = Vector { x: 1.0, y: 1.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Linear interpolation of scalars.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn signum(n: f32) -> f32 {
    if n < 0.0 {
        -1.0
    } else if n > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Wrap an angle into (−π, π].
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    if angle <= 0.0 {
        ((angle - PI) % (2.0 * PI)) + PI
    } else {
        ((angle + PI) % (2.0 * PI)) - PI
    }
}

/// Interpolate an angle along the sweep direction encoded by `spin`.
///
/// `spin > 0` forces an increasing (counter-clockwise) sweep, `spin < 0` a
/// decreasing one, and `spin == 0` means no rotation occurs across the
/// interval: the result stays at `a` regardless of `t`.
pub fn tween_angle(a: f32, mut b: f32, t: f32, spin: i32) -> f32 {
    if spin == 0 {
        return a;
    }
    if spin > 0 {
        if b - a < 0.0 {
            b += 2.0 * PI;
        }
    } else if b - a > 0.0 {
        b -= 2.0 * PI;
    }
    wrap_angle(lerp(a, b, t))
}

/// Position/rotation/scale triple. Value type: every operation returns or
/// mutates plain data, no hierarchy is implied here.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Space {
    pub position: Vector,
    /// Radians in (−π, π].
    pub rotation: f32,
    pub scale: Vector,
}

impl Default for Space {
    fn default() -> Self {
        Self::identity()
    }
}

impl Space {
    #[inline]
    pub fn identity() -> Self {
        Self {
            position: Vector::ZERO,
            rotation: 0.0,
            scale: Vector::ONE,
        }
    }

    #[inline]
    fn handedness(&self) -> f32 {
        signum(self.scale.x * self.scale.y)
    }

    /// Offset `position` by (x, y) expressed in this space's own axes:
    /// scaled by `scale`, then rotated by `rotation`.
    pub fn translate(&mut self, x: f32, y: f32) {
        let x = x * self.scale.x;
        let y = y * self.scale.y;
        let (s, c) = self.rotation.sin_cos();
        self.position.x += c * x - s * y;
        self.position.y += s * x + c * y;
    }

    pub fn rotate(&mut self, rad: f32) {
        self.rotation = wrap_angle(self.rotation + rad);
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.scale.x *= x;
        self.scale.y *= y;
    }

    /// Transform a local point into the space: scale, rotate, offset.
    pub fn transform_point(&self, point: Vector) -> Vector {
        let x = point.x * self.scale.x;
        let y = point.y * self.scale.y;
        let (s, c) = self.rotation.sin_cos();
        Vector {
            x: self.position.x + c * x - s * y,
            y: self.position.y + s * x + c * y,
        }
    }

    /// The space that undoes this one: `combine(s, s.invert())` is identity
    /// for any nonzero scale, mirrored or not.
    pub fn invert(&self) -> Space {
        let inv_rotation = wrap_angle(-self.rotation * self.handedness());
        let (s, c) = (-self.rotation).sin_cos();
        let x = -self.position.x;
        let y = -self.position.y;
        Space {
            position: Vector {
                x: (c * x - s * y) / self.scale.x,
                y: (s * x + c * y) / self.scale.y,
            },
            rotation: inv_rotation,
            scale: Vector {
                x: 1.0 / self.scale.x,
                y: 1.0 / self.scale.y,
            },
        }
    }

    /// Compose a parent space with a local child space into a world space.
    pub fn combine(parent: &Space, local: &Space) -> Space {
        let mut out = *parent;
        out.translate(local.position.x, local.position.y);
        out.rotation = wrap_angle(parent.rotation + parent.handedness() * local.rotation);
        out.scale.x = parent.scale.x * local.scale.x;
        out.scale.y = parent.scale.y * local.scale.y;
        out
    }

    /// Recover the local space such that `combine(parent, local) == world`.
    pub fn extract(world: &Space, parent: &Space) -> Space {
        let dx = world.position.x - parent.position.x;
        let dy = world.position.y - parent.position.y;
        let (s, c) = (-parent.rotation).sin_cos();
        Space {
            position: Vector {
                x: (c * dx - s * dy) / parent.scale.x,
                y: (s * dx + c * dy) / parent.scale.y,
            },
            rotation: wrap_angle(parent.handedness() * (world.rotation - parent.rotation)),
            scale: Vector {
                x: world.scale.x / parent.scale.x,
                y: world.scale.y / parent.scale.y,
            },
        }
    }

    /// Interpolate position and scale component-wise and rotation via the
    /// spin rule of [`tween_angle`].
    pub fn tween(a: &Space, b: &Space, t: f32, spin: i32) -> Space {
        Space {
            position: Vector {
                x: lerp(a.position.x, b.position.x, t),
                y: lerp(a.position.y, b.position.y, t),
            },
            rotation: tween_angle(a.rotation, b.rotation, t, spin),
            scale: Vector {
                x: lerp(a.scale.x, b.scale.x, t),
                y: lerp(a.scale.y, b.scale.y, t),
            },
        }
    }
}
