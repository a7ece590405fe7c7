//! Membrane outlines: inclusion tests and boundary projection.
//!
//! Both shapes are centered on the origin. A rimguide sits at the
//! projection of its junction onto the outline; the projection distance
//! sets the rimguide delay.

use crate::Vec2;
use libm::sqrtf;

/// Outline of the simulated surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Circular membrane
    Circle {
        /// Radius in meters
        radius: f32,
    },
    /// Rectangular plate, `length` along x and `width` along y
    Rectangle {
        /// Extent along x in meters
        length: f32,
        /// Extent along y in meters
        width: f32,
    },
}

impl Shape {
    /// True when `pos` lies inside or on the outline.
    pub fn contains(&self, pos: Vec2) -> bool {
        match *self {
            Shape::Circle { radius } => pos.length() <= radius,
            Shape::Rectangle { length, width } => {
                pos.x.abs() <= length * 0.5 && pos.y.abs() <= width * 0.5
            }
        }
    }

    /// Closest point on the outline to `pos`.
    ///
    /// For a circle this is the radial projection; the center itself maps to
    /// `(radius, 0)`. For a rectangle the nearest of the four edges wins, with
    /// ties resolved north, south, east, west.
    pub fn project_to_boundary(&self, pos: Vec2) -> Vec2 {
        match *self {
            Shape::Circle { radius } => project_to_circle(radius, pos),
            Shape::Rectangle { length, width } => project_to_rect(length, width, pos),
        }
    }

    /// The same outline shrunk by `margin` on every side.
    pub fn shrunk(&self, margin: f32) -> Self {
        match *self {
            Shape::Circle { radius } => Shape::Circle {
                radius: radius - margin,
            },
            Shape::Rectangle { length, width } => Shape::Rectangle {
                length: length - 2.0 * margin,
                width: width - 2.0 * margin,
            },
        }
    }
}

fn project_to_circle(radius: f32, pos: Vec2) -> Vec2 {
    let dist = pos.length();
    if dist == 0.0 {
        return Vec2::new(radius, 0.0);
    }
    pos * (radius / dist)
}

/// Distance from `p0` to the infinite line through `p1` and `p2`.
fn distance_to_line(p1: Vec2, p2: Vec2, p0: Vec2) -> f32 {
    let dy = p2.y - p1.y;
    let dx = p2.x - p1.x;
    (dy * p0.x - dx * p0.y + p2.x * p1.y - p2.y * p1.x).abs() / sqrtf(dy * dy + dx * dx)
}

fn project_to_rect(length: f32, width: f32, pos: Vec2) -> Vec2 {
    let hl = length * 0.5;
    let hw = width * 0.5;

    let candidates = [
        (
            distance_to_line(Vec2::new(-hl, hw), Vec2::new(hl, hw), pos),
            Vec2::new(pos.x, hw),
        ),
        (
            distance_to_line(Vec2::new(-hl, -hw), Vec2::new(hl, -hw), pos),
            Vec2::new(pos.x, -hw),
        ),
        (
            distance_to_line(Vec2::new(hl, -hw), Vec2::new(hl, hw), pos),
            Vec2::new(hl, pos.y),
        ),
        (
            distance_to_line(Vec2::new(-hl, -hw), Vec2::new(-hl, hw), pos),
            Vec2::new(-hl, pos.y),
        ),
    ];

    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.0 < best.0 {
            best = *candidate;
        }
    }
    best.1
}
