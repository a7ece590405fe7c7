//! Scattering junction: one node of the waveguide mesh.
//!
//! A junction joins up to [`MAX_PORTS`] unit-delay waveguides. Each tick it
//! receives one wave per port, computes the junction pressure
//!
//! ```text
//! p = (2 / ports) * (Σ in[d] + open * rim_out) + input
//! ```
//!
//! and emits `out[d] = p - in[d]` on every connected port. Ports without a
//! neighbor are terminated by the junction's [`Rimguide`], counted once per
//! open port, which receives `p - rim_out`.
//!
//! Junctions do not own their wave buffers. The mesh stores incoming and
//! outgoing waves in flat per-partition arrays and hands each junction its
//! slices, so the junction only carries wiring, pressure and its rimguide.

use crate::topology::MAX_PORTS;
use crate::{Rimguide, RimguideInfo, Topology, Vec2};

/// Tolerance of the scattering energy check.
#[cfg(debug_assertions)]
const ENERGY_TOLERANCE: f32 = 1e-5;

/// One mesh node.
///
/// `port_mask` bit `d` is set exactly when `neighbors[d]` is `Some`, and
/// `num_connections` is its popcount. A junction with an empty mask is
/// inert and skipped by every pass.
#[derive(Debug)]
pub struct Junction {
    topology: Topology,
    coords: (usize, usize),
    pos: Vec2,
    neighbors: [Option<usize>; MAX_PORTS],
    port_mask: u8,
    num_connections: usize,
    pressure: f32,
    input: f32,
    rimguide: Option<Box<Rimguide>>,
}

impl Junction {
    /// Unwired junction at grid `coords` and physical position `pos`.
    pub fn new(topology: Topology, coords: (usize, usize), pos: Vec2) -> Self {
        Self {
            topology,
            coords,
            pos,
            neighbors: [None; MAX_PORTS],
            port_mask: 0,
            num_connections: 0,
            pressure: 0.0,
            input: 0.0,
            rimguide: None,
        }
    }

    /// Connect `port` to the junction at arena index `neighbor`.
    ///
    /// Call [`Junction::init_junction_type`] once all neighbors are added.
    pub fn add_neighbor(&mut self, port: usize, neighbor: usize) {
        debug_assert!(port < self.topology.ports(), "port {} out of range", port);
        self.neighbors[port] = Some(neighbor);
    }

    /// Recompute the port mask and connection count from the neighbor slots.
    pub fn init_junction_type(&mut self) {
        self.port_mask = 0;
        self.num_connections = 0;
        for (port, neighbor) in self.neighbors.iter().enumerate().take(self.topology.ports()) {
            if neighbor.is_some() {
                self.port_mask |= 1 << port;
                self.num_connections += 1;
            }
        }
    }

    /// Disconnect `port`, keeping mask and count consistent.
    pub fn remove_neighbor(&mut self, port: usize) {
        debug_assert!(port < self.topology.ports(), "port {} out of range", port);
        if self.neighbors[port].take().is_some() {
            self.port_mask &= !(1 << port);
            self.num_connections -= 1;
        }
    }

    /// Attach an outer-boundary rimguide. Ignored if one is already attached.
    pub fn init_boundary(&mut self, info: &RimguideInfo) {
        if self.rimguide.is_none() {
            self.rimguide = Some(Box::new(Rimguide::new(info, self.pos)));
        }
    }

    /// Attach a clamped-center rimguide. Ignored if one is already attached.
    pub fn init_inner_boundary(&mut self) {
        if self.rimguide.is_none() {
            self.rimguide = Some(Box::new(Rimguide::inner_boundary()));
        }
    }

    /// Drop the rimguide, if any.
    pub fn remove_rimguide(&mut self) {
        self.rimguide = None;
    }

    /// Zero pressure, pending input and rimguide state.
    pub fn clear(&mut self) {
        self.pressure = 0.0;
        self.input = 0.0;
        if let Some(rim) = self.rimguide.as_mut() {
            rim.clear();
        }
    }

    /// Remove all wiring and the rimguide.
    pub fn reset(&mut self) {
        self.neighbors = [None; MAX_PORTS];
        self.port_mask = 0;
        self.num_connections = 0;
        self.rimguide = None;
        self.clear();
    }

    /// Accumulate external excitation for the next scatter.
    #[inline]
    pub fn add_input(&mut self, input: f32) {
        self.input += input;
    }

    /// Scatter one tick.
    ///
    /// `incoming` holds one wave per port (zero on open ports). Writes one
    /// wave per port to `outgoing` and returns the new pressure.
    #[inline]
    pub fn scatter(&mut self, incoming: &[f32], outgoing: &mut [f32]) -> f32 {
        let ports = self.topology.ports();
        let open = (ports - self.num_connections) as f32;
        let rim_out = self.rimguide.as_ref().map_or(0.0, |rim| rim.last_out());

        let mut sum_in = 0.0;
        for port in 0..ports {
            if self.port_mask & (1 << port) != 0 {
                sum_in += incoming[port];
            }
        }
        if self.rimguide.is_some() {
            sum_in += rim_out * open;
        }

        let pressure = sum_in * self.topology.scaler() + self.input;

        let mut sum_out = 0.0;
        for port in 0..ports {
            if self.port_mask & (1 << port) != 0 {
                let out = pressure - incoming[port];
                outgoing[port] = out;
                sum_out += out;
            } else {
                outgoing[port] = 0.0;
            }
        }

        if let Some(rim) = self.rimguide.as_mut() {
            let out = pressure - rim_out;
            rim.process_scatter(out);
            sum_out += out * open;
        }

        #[cfg(debug_assertions)]
        {
            let terminated = self.rimguide.is_some() || self.num_connections == ports;
            if self.input == 0.0 && terminated && (sum_out - sum_in).abs() > ENERGY_TOLERANCE {
                tracing::debug!(
                    x = self.coords.0,
                    y = self.coords.1,
                    sum_in,
                    sum_out,
                    "energy not conserved at junction"
                );
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = sum_out;

        self.input = 0.0;
        self.pressure = pressure;
        pressure
    }

    /// Run the rimguide's boundary chain, if any.
    #[inline]
    pub fn process_rimguide_delay(&mut self) {
        if let Some(rim) = self.rimguide.as_mut() {
            rim.process_delay();
        }
    }

    /// Stored energy given this junction's incoming waves: `Σ in²`.
    pub fn energy(&self, incoming: &[f32]) -> f32 {
        incoming
            .iter()
            .take(self.topology.ports())
            .map(|w| w * w)
            .sum()
    }

    /// Topology of this junction.
    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Grid coordinates.
    #[inline]
    pub fn coords(&self) -> (usize, usize) {
        self.coords
    }

    /// Physical position in meters.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    /// Bitmask of connected ports.
    #[inline]
    pub fn port_mask(&self) -> u8 {
        self.port_mask
    }

    /// Number of connected ports.
    #[inline]
    pub fn num_connections(&self) -> usize {
        self.num_connections
    }

    /// Arena index of the neighbor behind `port`.
    #[inline]
    pub fn neighbor(&self, port: usize) -> Option<usize> {
        self.neighbors.get(port).copied().flatten()
    }

    /// True when the junction takes part in the simulation.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.port_mask != 0
    }

    /// True when some but not all ports are connected.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.num_connections > 0 && self.num_connections < self.topology.ports()
    }

    /// True when a rimguide is attached.
    #[inline]
    pub fn has_rimguide(&self) -> bool {
        self.rimguide.is_some()
    }

    /// The attached rimguide.
    pub fn rimguide(&self) -> Option<&Rimguide> {
        self.rimguide.as_deref()
    }

    /// The attached rimguide, mutably.
    pub fn rimguide_mut(&mut self) -> Option<&mut Rimguide> {
        self.rimguide.as_deref_mut()
    }

    /// Pressure computed by the last scatter.
    #[inline]
    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    /// Input waiting for the next scatter.
    #[inline]
    pub fn pending_input(&self) -> f32 {
        self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interior(topology: Topology) -> Junction {
        let mut j = Junction::new(topology, (1, 1), Vec2::ZERO);
        for port in 0..topology.ports() {
            j.add_neighbor(port, 100 + port);
        }
        j.init_junction_type();
        j
    }

    #[test]
    fn test_type_mask_tracks_neighbors() {
        let mut j = Junction::new(Topology::Triangular, (0, 0), Vec2::ZERO);
        j.add_neighbor(0, 7);
        j.add_neighbor(3, 9);
        j.init_junction_type();
        assert_eq!(j.port_mask(), 0b1001);
        assert_eq!(j.num_connections(), 2);
        assert!(j.is_boundary());

        j.remove_neighbor(0);
        assert_eq!(j.port_mask(), 0b1000);
        assert_eq!(j.num_connections(), 1);

        // removing an empty slot is a no-op
        j.remove_neighbor(0);
        assert_eq!(j.num_connections(), 1);

        j.remove_neighbor(3);
        assert!(!j.is_active());
        assert!(!j.is_boundary());
    }

    #[test]
    fn test_lossless_scatter_conserves_sum() {
        for topology in [Topology::Rectilinear, Topology::Triangular] {
            let mut j = interior(topology);
            let incoming = [0.3, -0.1, 0.7, 0.2, -0.4, 0.05];
            let mut outgoing = [0.0; MAX_PORTS];
            let p = j.scatter(&incoming[..topology.ports()], &mut outgoing[..topology.ports()]);

            let sum_in: f32 = incoming[..topology.ports()].iter().sum();
            let sum_out: f32 = outgoing[..topology.ports()].iter().sum();
            assert!((sum_in - sum_out).abs() < 1e-5, "{:?}", topology);
            assert!((p - sum_in * topology.scaler()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_scatter_reflection_law() {
        let mut j = interior(Topology::Rectilinear);
        let incoming = [1.0, 0.0, 0.0, 0.0];
        let mut outgoing = [0.0; 4];
        let p = j.scatter(&incoming, &mut outgoing);
        assert_eq!(p, 0.5);
        assert_eq!(outgoing, [-0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_input_adds_to_pressure_once() {
        let mut j = interior(Topology::Triangular);
        j.add_input(0.6);
        let mut outgoing = [0.0; MAX_PORTS];
        assert!((j.scatter(&[0.0; 6], &mut outgoing) - 0.6).abs() < 1e-7);
        assert_eq!(j.pending_input(), 0.0);
        assert_eq!(j.scatter(&[0.0; 6], &mut outgoing), 0.0);
    }

    #[test]
    fn test_open_ports_emit_nothing() {
        let mut j = Junction::new(Topology::Rectilinear, (0, 0), Vec2::ZERO);
        j.add_neighbor(0, 1);
        j.init_junction_type();
        let mut outgoing = [9.0; 4];
        j.scatter(&[1.0, 5.0, 5.0, 5.0], &mut outgoing);
        assert_eq!(&outgoing[1..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rimguide_terminates_open_ports() {
        let mut j = Junction::new(Topology::Rectilinear, (0, 0), Vec2::new(0.4, 0.0));
        j.add_neighbor(0, 1);
        j.init_junction_type();
        j.init_boundary(&RimguideInfo::default());
        assert!(j.has_rimguide());

        let mut outgoing = [0.0; 4];
        let p = j.scatter(&[1.0, 0.0, 0.0, 0.0], &mut outgoing);
        assert_eq!(p, 0.5);
        let rim = j.rimguide().unwrap();
        // the rimguide has not produced anything yet, so it receives p
        assert_eq!(rim.last_in(), 0.5);

        // second attach keeps the original
        j.init_inner_boundary();
        assert!(j.rimguide().unwrap().is_solid());
    }

    #[test]
    fn test_energy() {
        let j = interior(Topology::Rectilinear);
        assert_eq!(j.energy(&[1.0, 2.0, 0.0, 0.0]), 5.0);
    }

    #[test]
    fn test_reset() {
        let mut j = interior(Topology::Rectilinear);
        j.init_inner_boundary();
        j.add_input(1.0);
        j.reset();
        assert!(!j.is_active());
        assert!(!j.has_rimguide());
        assert_eq!(j.pending_input(), 0.0);
        assert_eq!(j.neighbor(0), None);
    }
}
