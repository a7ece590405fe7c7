//! Mesh topologies: port layout, neighbor offsets and junction placement.
//!
//! The rectilinear and triangular meshes share one scattering engine. All
//! that differs is captured here as static tables:
//!
//! | | Rectilinear | Triangular |
//! |---|---|---|
//! | Ports | N, S, E, W | NW, NE, E, W, SW, SE |
//! | Scattering weight | 1/2 | 1/3 |
//! | Row spacing | `d` | `d * sqrt(3)/2` |
//! | Row offset | none | odd rows shifted by `-d/2` |
//!
//! Triangular neighbors depend on row parity because of the half-spacing
//! shift: from an odd row the north-west neighbor is one column to the left,
//! from an even row it is in the same column.

use crate::Vec2;
use crate::wave_math::TRIANGULAR_VERTICAL_SCALER;

/// Row pitch of the triangular lattice in junction spacings, `sqrt(3)/2`.
const TRIANGULAR_ROW_SPACING: f32 = 0.866_025_4;

/// Largest port count of any topology.
pub const MAX_PORTS: usize = 6;

/// Compass direction of a junction port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// +y
    North,
    /// -y
    South,
    /// +x
    East,
    /// -x
    West,
    /// Up and left
    NorthWest,
    /// Up and right
    NorthEast,
    /// Down and left
    SouthWest,
    /// Down and right
    SouthEast,
}

impl Direction {
    /// The direction pointing back.
    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
            Direction::NorthEast => Direction::SouthWest,
            Direction::SouthWest => Direction::NorthEast,
            Direction::SouthEast => Direction::NorthWest,
        }
    }
}

const RECTILINEAR_PORTS: [Direction; 4] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
];

const TRIANGULAR_PORTS: [Direction; 6] = [
    Direction::NorthWest,
    Direction::NorthEast,
    Direction::East,
    Direction::West,
    Direction::SouthWest,
    Direction::SouthEast,
];

/// Junction lattice of a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Topology {
    /// Square grid, 4-port junctions
    Rectilinear,
    /// Hexagonal packing, 6-port junctions
    #[default]
    Triangular,
}

impl Topology {
    /// Number of ports per junction.
    #[inline]
    pub const fn ports(self) -> usize {
        match self {
            Topology::Rectilinear => 4,
            Topology::Triangular => 6,
        }
    }

    /// Port directions in port-index order.
    #[inline]
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Topology::Rectilinear => &RECTILINEAR_PORTS,
            Topology::Triangular => &TRIANGULAR_PORTS,
        }
    }

    /// Port index of `dir`, or `None` if this topology has no such port.
    pub fn port_of(self, dir: Direction) -> Option<usize> {
        self.directions().iter().position(|&d| d == dir)
    }

    /// Direction of port `port`.
    #[inline]
    pub fn direction_of(self, port: usize) -> Direction {
        self.directions()[port]
    }

    /// Index of the port facing back along `port`.
    #[inline]
    pub const fn opposite_port(self, port: usize) -> usize {
        match self {
            // N <-> S, E <-> W
            Topology::Rectilinear => port ^ 1,
            // NW <-> SE, NE <-> SW, E <-> W
            Topology::Triangular => match port {
                0 => 5,
                1 => 4,
                2 => 3,
                3 => 2,
                4 => 1,
                _ => 0,
            },
        }
    }

    /// Junction admittance weight: `2 / ports`.
    #[inline]
    pub const fn scaler(self) -> f32 {
        match self {
            Topology::Rectilinear => 0.5,
            Topology::Triangular => 1.0 / 3.0,
        }
    }

    /// Rows per unit height relative to columns per unit width.
    #[inline]
    pub const fn vertical_scaler(self) -> f32 {
        match self {
            Topology::Rectilinear => 1.0,
            Topology::Triangular => TRIANGULAR_VERTICAL_SCALER,
        }
    }

    /// Grid offset `(dx, dy)` of the neighbor behind `port` from a junction in row `y`.
    pub fn neighbor_offset(self, port: usize, y: usize) -> (isize, isize) {
        let odd_row = y % 2 == 1;
        match self.direction_of(port) {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthWest => (if odd_row { -1 } else { 0 }, 1),
            Direction::NorthEast => (if odd_row { 0 } else { 1 }, 1),
            Direction::SouthWest => (if odd_row { -1 } else { 0 }, -1),
            Direction::SouthEast => (if odd_row { 0 } else { 1 }, -1),
        }
    }

    /// Grid coordinates of the neighbor behind `port`, if inside an `lx × ly` grid.
    pub fn neighbor_coords(
        self,
        port: usize,
        x: usize,
        y: usize,
        lx: usize,
        ly: usize,
    ) -> Option<(usize, usize)> {
        let (dx, dy) = self.neighbor_offset(port, y);
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < lx && ny < ly).then_some((nx, ny))
    }

    /// Physical position of junction `(x, y)` in an `lx × ly` grid.
    ///
    /// The grid is centered so that junction `(lx/2, ly/2)` sits exactly at
    /// the origin for both topologies.
    pub fn position(self, x: usize, y: usize, lx: usize, ly: usize, sample_distance: f32) -> Vec2 {
        let x_center = (lx / 2) as f32;
        let y_center = (ly / 2) as f32;
        match self {
            Topology::Rectilinear => Vec2::new(
                (x as f32 - x_center) * sample_distance,
                (y as f32 - y_center) * sample_distance,
            ),
            Topology::Triangular => {
                let mut x_offset = -x_center;
                if (ly / 2) % 2 == 1 {
                    x_offset += 0.5;
                }
                let row_shift = if y % 2 == 1 { 0.5 } else { 0.0 };
                Vec2::new(
                    (x as f32 - row_shift + x_offset) * sample_distance,
                    (y as f32 - y_center) * sample_distance * TRIANGULAR_ROW_SPACING,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_port_matches_direction() {
        for topology in [Topology::Rectilinear, Topology::Triangular] {
            for port in 0..topology.ports() {
                let opp = topology.opposite_port(port);
                assert_eq!(
                    topology.direction_of(opp),
                    topology.direction_of(port).opposite(),
                    "{:?} port {}",
                    topology,
                    port
                );
                assert_eq!(topology.opposite_port(opp), port);
            }
        }
    }

    #[test]
    fn test_port_order() {
        assert_eq!(Topology::Rectilinear.port_of(Direction::North), Some(0));
        assert_eq!(Topology::Rectilinear.port_of(Direction::West), Some(3));
        assert_eq!(Topology::Rectilinear.port_of(Direction::NorthEast), None);
        assert_eq!(Topology::Triangular.port_of(Direction::NorthWest), Some(0));
        assert_eq!(Topology::Triangular.port_of(Direction::SouthEast), Some(5));
        assert_eq!(Topology::Triangular.port_of(Direction::North), None);
    }

    #[test]
    fn test_neighbor_offsets_are_reciprocal() {
        for topology in [Topology::Rectilinear, Topology::Triangular] {
            for y in 1..3usize {
                for port in 0..topology.ports() {
                    let (dx, dy) = topology.neighbor_offset(port, y);
                    let ny = (y as isize + dy) as usize;
                    let (bx, by) = topology.neighbor_offset(topology.opposite_port(port), ny);
                    assert_eq!((dx + bx, dy + by), (0, 0), "{:?} port {} row {}", topology, port, y);
                }
            }
        }
    }

    #[test]
    fn test_triangular_neighbors_are_equidistant() {
        let (lx, ly) = (9, 9);
        let d = 0.01;
        let topology = Topology::Triangular;
        for y in 1..ly - 1 {
            let x = 4;
            let here = topology.position(x, y, lx, ly, d);
            for port in 0..topology.ports() {
                let (nx, ny) = topology
                    .neighbor_coords(port, x, y, lx, ly)
                    .expect("interior junction has all neighbors");
                let there = topology.position(nx, ny, lx, ly, d);
                assert!(
                    (here.distance(there) - d).abs() < 1e-6,
                    "port {} from row {} is {} away",
                    port,
                    y,
                    here.distance(there)
                );
            }
        }
    }

    #[test]
    fn test_row_spacing_inverts_vertical_scaler() {
        assert!((TRIANGULAR_ROW_SPACING * TRIANGULAR_VERTICAL_SCALER - 1.0).abs() < 1e-6);
        assert!((TRIANGULAR_ROW_SPACING - libm::sqrtf(3.0) * 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_center_at_origin() {
        for topology in [Topology::Rectilinear, Topology::Triangular] {
            for (lx, ly) in [(7, 7), (8, 6), (41, 48), (5, 10)] {
                let center = topology.position(lx / 2, ly / 2, lx, ly, 0.0145);
                assert_eq!(center, Vec2::ZERO, "{:?} {}x{}", topology, lx, ly);
            }
        }
    }

    #[test]
    fn test_neighbor_coords_edges() {
        let t = Topology::Rectilinear;
        assert_eq!(t.neighbor_coords(1, 0, 0, 3, 3), None);
        assert_eq!(t.neighbor_coords(3, 0, 0, 3, 3), None);
        assert_eq!(t.neighbor_coords(0, 0, 0, 3, 3), Some((0, 1)));
        assert_eq!(t.neighbor_coords(2, 2, 0, 3, 3), None);
    }
}
