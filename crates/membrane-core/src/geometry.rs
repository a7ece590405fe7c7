//! Planar and spatial vectors plus the row-major grid that stores the mesh.
//!
//! The mesh lives in the `z = 0` plane. [`Vec3`] exists for the listener,
//! which sits above the surface.

use core::ops::{Add, Mul, Sub};
use libm::sqrtf;

/// A point or displacement in the mesh plane, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl Vec2 {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a vector from its components.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    #[inline]
    pub fn length(self) -> f32 {
        sqrtf(self.x * self.x + self.y * self.y)
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Lift into 3D at the given height.
    #[inline]
    pub fn with_z(self, z: f32) -> Vec3 {
        Vec3::new(self.x, self.y, z)
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// A point in space, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Height above the mesh plane
    pub z: f32,
}

impl Vec3 {
    /// Create a vector from its components.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        sqrtf(dx * dx + dy * dy + dz * dz)
    }

    /// Projection onto the mesh plane.
    #[inline]
    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Fixed-size row-major 2D container.
///
/// Element `(x, y)` lives at `y * lx + x`. The size is set at construction
/// and never changes.
///
/// # Example
///
/// ```rust
/// use membrane_core::Grid;
///
/// let mut grid = Grid::new(3, 2, 0u8);
/// grid.set(2, 1, 7);
/// assert_eq!(grid.get(2, 1), Some(&7));
/// assert_eq!(grid.index_of(2, 1), 5);
/// assert_eq!(grid.coords_of(5), (2, 1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    lx: usize,
    ly: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create an `lx × ly` grid filled with `value`.
    pub fn new(lx: usize, ly: usize, value: T) -> Self {
        Self {
            lx,
            ly,
            cells: vec![value; lx * ly],
        }
    }
}

impl<T> Grid<T> {
    /// Build a grid by evaluating `f(x, y)` for every cell.
    pub fn from_fn(lx: usize, ly: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(lx * ly);
        for y in 0..ly {
            for x in 0..lx {
                cells.push(f(x, y));
            }
        }
        Self { lx, ly, cells }
    }

    /// Grid dimensions as `(lx, ly)`.
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.lx, self.ly)
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the grid has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flat index of `(x, y)`.
    #[inline]
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        y * self.lx + x
    }

    /// Grid coordinates of a flat index.
    #[inline]
    pub fn coords_of(&self, index: usize) -> (usize, usize) {
        (index % self.lx, index / self.lx)
    }

    /// Cell at `(x, y)`, or `None` when out of range.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.lx && y < self.ly {
            self.cells.get(self.index_of(x, y))
        } else {
            None
        }
    }

    /// Mutable cell at `(x, y)`, or `None` when out of range.
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x < self.lx && y < self.ly {
            let index = self.index_of(x, y);
            self.cells.get_mut(index)
        } else {
            None
        }
    }

    /// Overwrite the cell at `(x, y)`. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        if let Some(cell) = self.get_mut(x, y) {
            *cell = value;
        }
    }

    /// All cells in row-major order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// Consume the grid, returning its cells in row-major order.
    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(b.length(), 5.0);
    }

    #[test]
    fn test_vec3_distance_includes_height() {
        let mic = Vec3::new(0.0, 0.0, 2.0);
        let point = Vec2::ZERO.with_z(0.0);
        assert_eq!(mic.distance(point), 2.0);
        assert_eq!(mic.xy(), Vec2::ZERO);
    }

    #[test]
    fn test_grid_row_major() {
        let grid = Grid::from_fn(4, 3, |x, y| (x, y));
        assert_eq!(grid.size(), (4, 3));
        assert_eq!(grid.len(), 12);
        assert_eq!(grid.as_slice()[5], (1, 1));
        assert_eq!(grid.coords_of(11), (3, 2));
    }

    #[test]
    fn test_grid_out_of_range() {
        let mut grid = Grid::new(2, 2, 1.0f32);
        assert!(grid.get(2, 0).is_none());
        assert!(grid.get(0, 2).is_none());
        grid.set(5, 5, 3.0);
        assert!(grid.as_slice().iter().all(|&v| v == 1.0));
    }
}
