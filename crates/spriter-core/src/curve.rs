//! Keyframe easing curves.
//!
//! A [`Curve`] maps the normalized fraction between two keyframes through one
//! of the shapes the format declares: instant, linear, polynomial blends of
//! degree 2–5, or a two-control-point cubic Bezier solved numerically.

use serde::{Deserialize, Serialize};

use crate::math::lerp;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    Instant,
    #[default]
    Linear,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    Bezier,
}

/// Curve descriptor as authored: a kind plus up to four control scalars.
/// For the polynomial kinds c1..cN are intermediate control points between
/// the implicit endpoints 0 and 1; for `Bezier` they are (x1, y1, x2, y2).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub kind: CurveKind,
    pub c1: f32,
    pub c2: f32,
    pub c3: f32,
    pub c4: f32,
}

#[inline]
fn interpolate_quadratic(a: f32, b: f32, c: f32, t: f32) -> f32 {
    lerp(lerp(a, b, t), lerp(b, c, t), t)
}

#[inline]
fn interpolate_cubic(a: f32, b: f32, c: f32, d: f32, t: f32) -> f32 {
    lerp(
        interpolate_quadratic(a, b, c, t),
        interpolate_quadratic(b, c, d, t),
        t,
    )
}

#[inline]
fn interpolate_quartic(a: f32, b: f32, c: f32, d: f32, e: f32, t: f32) -> f32 {
    lerp(
        interpolate_cubic(a, b, c, d, t),
        interpolate_cubic(b, c, d, e, t),
        t,
    )
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn interpolate_quintic(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32, t: f32) -> f32 {
    lerp(
        interpolate_quartic(a, b, c, d, e, t),
        interpolate_quartic(b, c, d, e, f, t),
        t,
    )
}

#[inline]
fn sample_curve(a: f32, b: f32, c: f32, t: f32) -> f32 {
    ((a * t + b) * t + c) * t
}

#[inline]
fn sample_curve_derivative(a: f32, b: f32, c: f32, t: f32) -> f32 {
    (3.0 * a * t + 2.0 * b) * t + c
}

/// Solve the x polynomial of a unit cubic Bezier for its parameter.
/// A few Newton iterations handle the common case; bisection is the
/// fallback when the derivative degenerates.
fn solve_curve_x(ax: f32, bx: f32, cx: f32, x: f32, epsilon: f32) -> f32 {
    let mut t2 = x;
    for _ in 0..8 {
        let x2 = sample_curve(ax, bx, cx, t2) - x;
        if x2.abs() < epsilon {
            return t2;
        }
        let d2 = sample_curve_derivative(ax, bx, cx, t2);
        if d2.abs() < 1e-6 {
            break;
        }
        t2 -= x2 / d2;
    }

    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    t2 = x;
    if t2 < t0 {
        return t0;
    }
    if t2 > t1 {
        return t1;
    }
    let mut iterations = 0;
    while t0 < t1 && iterations < 64 {
        let x2 = sample_curve(ax, bx, cx, t2);
        if (x2 - x).abs() < epsilon {
            return t2;
        }
        if x > x2 {
            t0 = t2;
        } else {
            t1 = t2;
        }
        t2 = (t1 - t0) * 0.5 + t0;
        iterations += 1;
    }
    t2
}

fn interpolate_bezier(x1: f32, y1: f32, x2: f32, y2: f32, t: f32) -> f32 {
    let cx = 3.0 * x1;
    let bx = 3.0 * (x2 - x1) - cx;
    let ax = 1.0 - cx - bx;
    let cy = 3.0 * y1;
    let by = 3.0 * (y2 - y1) - cy;
    let ay = 1.0 - cy - by;
    let epsilon = 1.0 / 200.0;
    sample_curve(ay, by, cy, solve_curve_x(ax, bx, cx, t, epsilon))
}

impl Curve {
    pub fn new(kind: CurveKind, c1: f32, c2: f32, c3: f32, c4: f32) -> Self {
        Self {
            kind,
            c1,
            c2,
            c3,
            c4,
        }
    }

    /// Map a local fraction `t ∈ [0, 1]` to its eased value.
    pub fn evaluate(&self, t: f32) -> f32 {
        match self.kind {
            CurveKind::Instant => 0.0,
            CurveKind::Linear => t,
            CurveKind::Quadratic => interpolate_quadratic(0.0, self.c1, 1.0, t),
            CurveKind::Cubic => interpolate_cubic(0.0, self.c1, self.c2, 1.0, t),
            CurveKind::Quartic => interpolate_quartic(0.0, self.c1, self.c2, self.c3, 1.0, t),
            CurveKind::Quintic => {
                interpolate_quintic(0.0, self.c1, self.c2, self.c3, self.c4, 1.0, t)
            }
            CurveKind::Bezier => interpolate_bezier(self.c1, self.c2, self.c3, self.c4, t),
        }
    }
}
