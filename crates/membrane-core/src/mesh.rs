//! The waveguide mesh: junction arena, wiring, boundaries and the tick loop.
//!
//! One [`Mesh2D`] type serves both lattices. The [`Topology`] tag supplies
//! port count, neighbor offsets and junction placement; the scattering and
//! propagation engine is shared.
//!
//! # Storage
//!
//! Junctions live in a flat row-major arena. Neighbors are arena indices,
//! never references. The arena is split into contiguous partitions, one per
//! worker thread. Each partition owns its junctions and two wave buffers of
//! `junctions × ports` floats.
//!
//! # Passes
//!
//! [`PassMode::Explicit`] runs two passes per tick:
//!
//! 1. Scatter: each junction reads its incoming waves (buffer 0) and
//!    writes its outgoing waves (buffer 1).
//! 2. Delay: each junction copies `out[neighbor][opposite(port)]` into its
//!    incoming slot for `port`, then runs its rimguide.
//!
//! [`PassMode::Fused`] runs one pass. Outgoing waves of the previous tick
//! sit in buffer `parity`; each junction gathers its incoming waves straight
//! from its neighbors' slots there, scatters into buffer `1 - parity`, and
//! runs its rimguide. The parity flips after the pass.
//!
//! Both modes perform the same arithmetic in the same order per junction
//! and produce bit-identical output.
//!
//! # Threading
//!
//! Below [`DEFAULT_MULTITHREAD_THRESHOLD`] grid cells [`Mesh2D::tick`] stays
//! on the calling thread. Above it every pass becomes one batch of partition
//! tasks on the mesh's [`ThreadPool`]; the batch barrier separates passes, so
//! a pass only ever reads buffers that no task of the same batch writes.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use crate::thread_pool::Task;
use crate::topology::MAX_PORTS;
use crate::{Grid, Junction, Rimguide, RimguideInfo, Shape, ThreadPool, Topology, Vec2};

/// Grid size at which [`Mesh2D::tick`] switches to the worker pool.
pub const DEFAULT_MULTITHREAD_THRESHOLD: usize = 2000;

/// Worker count of a mesh built with [`Mesh2D::new`].
pub const DEFAULT_THREADS: usize = 4;

/// How a tick propagates waves between junctions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassMode {
    /// Gather from the previous tick's outgoing buffer inside the scatter pass
    #[default]
    Fused,
    /// Separate scatter and delay passes
    Explicit,
}

/// Read-only copy of one junction's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionSnapshot {
    /// Arena index
    pub index: usize,
    /// Grid coordinates
    pub coords: (usize, usize),
    /// Physical position in meters
    pub position: Vec2,
    /// Bitmask of connected ports
    pub port_mask: u8,
    /// Number of connected ports
    pub num_connections: usize,
    /// Pressure after the last tick
    pub pressure: f32,
    /// A rimguide is attached
    pub has_rimguide: bool,
    /// Some but not all ports are connected
    pub is_boundary: bool,
    /// Arena index of the neighbor behind each port
    pub neighbors: [Option<usize>; MAX_PORTS],
}

impl JunctionSnapshot {
    fn of(index: usize, junction: &Junction) -> Self {
        let mut neighbors = [None; MAX_PORTS];
        for (port, slot) in neighbors.iter_mut().enumerate() {
            *slot = junction.neighbor(port);
        }
        Self {
            index,
            coords: junction.coords(),
            position: junction.position(),
            port_mask: junction.port_mask(),
            num_connections: junction.num_connections(),
            pressure: junction.pressure(),
            has_rimguide: junction.has_rimguide(),
            is_boundary: junction.is_boundary(),
            neighbors,
        }
    }

    /// Neighbor behind `port`.
    pub fn neighbor(&self, port: usize) -> Option<usize> {
        self.neighbors.get(port).copied().flatten()
    }

    /// True when the junction takes part in the simulation.
    pub fn is_active(&self) -> bool {
        self.port_mask != 0
    }
}

#[derive(Debug)]
struct Partition {
    junctions: Mutex<Vec<Junction>>,
    waves: [RwLock<Vec<f32>>; 2],
}

#[derive(Debug)]
struct MeshGrid {
    topology: Topology,
    lx: usize,
    ly: usize,
    chunk: usize,
    partitions: Vec<Partition>,
}

impl MeshGrid {
    fn new(topology: Topology, lx: usize, ly: usize, sample_distance: f32, parts: usize) -> Self {
        let len = lx * ly;
        let chunk = len.div_ceil(parts.max(1)).max(1);
        let ports = topology.ports();

        let partitions = (0..len)
            .step_by(chunk)
            .map(|start| {
                let end = (start + chunk).min(len);
                let junctions = (start..end)
                    .map(|i| {
                        let (x, y) = (i % lx, i / lx);
                        Junction::new(
                            topology,
                            (x, y),
                            topology.position(x, y, lx, ly, sample_distance),
                        )
                    })
                    .collect::<Vec<_>>();
                let waves = (end - start) * ports;
                Partition {
                    junctions: Mutex::new(junctions),
                    waves: [RwLock::new(vec![0.0; waves]), RwLock::new(vec![0.0; waves])],
                }
            })
            .collect();

        Self {
            topology,
            lx,
            ly,
            chunk,
            partitions,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.lx * self.ly
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.chunk, index % self.chunk)
    }

    fn with_junction<R>(&self, index: usize, f: impl FnOnce(&mut Junction) -> R) -> R {
        let (part, local) = self.locate(index);
        let mut junctions = self.partitions[part].junctions.lock();
        f(&mut junctions[local])
    }

    fn for_each_junction(&self, mut f: impl FnMut(usize, &mut Junction)) {
        for (part, partition) in self.partitions.iter().enumerate() {
            let base = part * self.chunk;
            for (local, junction) in partition.junctions.lock().iter_mut().enumerate() {
                f(base + local, junction);
            }
        }
    }

    fn read_waves(&self, slot: usize) -> Vec<RwLockReadGuard<'_, Vec<f32>>> {
        self.partitions.iter().map(|p| p.waves[slot].read()).collect()
    }

    /// Wave arriving at `junction` through `port`, read from the neighbor's
    /// outgoing slot in `outgoing`.
    #[inline]
    fn incoming_wave(&self, outgoing: &[RwLockReadGuard<'_, Vec<f32>>], junction: &Junction, port: usize) -> f32 {
        match junction.neighbor(port) {
            Some(neighbor) => {
                let (part, local) = self.locate(neighbor);
                let ports = self.topology.ports();
                outgoing[part][local * ports + self.topology.opposite_port(port)]
            }
            None => 0.0,
        }
    }

    fn scatter_explicit(&self, part: usize) {
        let partition = &self.partitions[part];
        let ports = self.topology.ports();
        let mut junctions = partition.junctions.lock();
        let incoming = partition.waves[0].read();
        let mut outgoing = partition.waves[1].write();

        for (local, junction) in junctions.iter_mut().enumerate() {
            if !junction.is_active() {
                continue;
            }
            let slots = local * ports..(local + 1) * ports;
            junction.scatter(&incoming[slots.clone()], &mut outgoing[slots]);
        }
    }

    fn delay_explicit(&self, part: usize) {
        let partition = &self.partitions[part];
        let ports = self.topology.ports();
        let mut junctions = partition.junctions.lock();
        let outgoing = self.read_waves(1);
        let mut incoming = partition.waves[0].write();

        for (local, junction) in junctions.iter_mut().enumerate() {
            if !junction.is_active() {
                continue;
            }
            for port in 0..ports {
                incoming[local * ports + port] = self.incoming_wave(&outgoing, junction, port);
            }
            junction.process_rimguide_delay();
        }
    }

    fn scatter_fused(&self, part: usize, parity: usize) {
        let partition = &self.partitions[part];
        let ports = self.topology.ports();
        let mut junctions = partition.junctions.lock();
        let previous = self.read_waves(parity);
        let mut outgoing = partition.waves[1 - parity].write();
        let mut incoming = [0.0; MAX_PORTS];

        for (local, junction) in junctions.iter_mut().enumerate() {
            if !junction.is_active() {
                continue;
            }
            for (port, wave) in incoming.iter_mut().enumerate().take(ports) {
                *wave = self.incoming_wave(&previous, junction, port);
            }
            junction.scatter(&incoming[..ports], &mut outgoing[local * ports..(local + 1) * ports]);
            junction.process_rimguide_delay();
        }
    }

    fn energy(&self, outgoing_slot: usize) -> f32 {
        let ports = self.topology.ports();
        let outgoing = self.read_waves(outgoing_slot);
        let mut incoming = [0.0; MAX_PORTS];
        let mut energy = 0.0;
        for partition in &self.partitions {
            for junction in partition.junctions.lock().iter() {
                if !junction.is_active() {
                    continue;
                }
                for (port, wave) in incoming.iter_mut().enumerate().take(ports) {
                    *wave = self.incoming_wave(&outgoing, junction, port);
                }
                energy += junction.energy(&incoming[..ports]);
            }
        }
        energy
    }

    fn clear_waves(&self) {
        for partition in &self.partitions {
            for buffer in &partition.waves {
                buffer.write().fill(0.0);
            }
        }
    }
}

fn partition_tasks(grid: &Arc<MeshGrid>, pass: impl Fn(&MeshGrid, usize) + Copy + Send + 'static) -> Vec<Task> {
    (0..grid.partitions.len())
        .map(|part| {
            let grid = Arc::clone(grid);
            Box::new(move || pass(&grid, part)) as Task
        })
        .collect()
}

/// A 2D digital waveguide mesh.
///
/// # Example
///
/// ```rust
/// use membrane_core::{Mesh2D, RimguideInfo, Shape};
///
/// let mut mesh = Mesh2D::triangular(21, 24, 0.0145);
/// let mask = mesh.mask_for_radius(0.14);
/// mesh.init(&mask);
/// mesh.init_boundary(&RimguideInfo {
///     shape: Shape::Circle { radius: 0.16 },
///     ..RimguideInfo::default()
/// });
/// mesh.set_input(0.5, 0.5);
/// mesh.set_output(0.5, 0.5);
///
/// let first = mesh.tick(1.0);
/// assert!(first > 0.0);
/// assert_eq!(mesh.rimguide_count(), mesh.boundary_count());
/// ```
#[derive(Debug)]
pub struct Mesh2D {
    grid: Arc<MeshGrid>,
    sample_distance: f32,
    sample_rate: f32,
    input_request: (f32, f32),
    output_request: (f32, f32),
    input: usize,
    output: usize,
    rimguides: Vec<usize>,
    pass_mode: PassMode,
    parity: usize,
    threads: usize,
    multithread_threshold: usize,
    pool: Option<ThreadPool>,
}

impl Mesh2D {
    /// Unwired `lx × ly` mesh with junctions `sample_distance` meters apart.
    pub fn new(topology: Topology, lx: usize, ly: usize, sample_distance: f32) -> Self {
        Self::with_threads(topology, lx, ly, sample_distance, DEFAULT_THREADS)
    }

    /// Unwired mesh whose arena is split for `threads` workers.
    pub fn with_threads(
        topology: Topology,
        lx: usize,
        ly: usize,
        sample_distance: f32,
        threads: usize,
    ) -> Self {
        if lx == 0 || ly == 0 {
            tracing::warn!(grid_x = lx, grid_y = ly, "empty grid requested, using 1x1");
        }
        let (lx, ly) = (lx.max(1), ly.max(1));
        let threads = threads.max(1);
        let grid = Arc::new(MeshGrid::new(topology, lx, ly, sample_distance, threads));

        tracing::debug!(?topology, grid_x = lx, grid_y = ly, threads, "mesh allocated");

        let mut mesh = Self {
            grid,
            sample_distance,
            sample_rate: 11025.0,
            input_request: (0.5, 0.5),
            output_request: (0.5, 0.5),
            input: 0,
            output: 0,
            rimguides: Vec::new(),
            pass_mode: PassMode::default(),
            parity: 0,
            threads,
            multithread_threshold: DEFAULT_MULTITHREAD_THRESHOLD,
            pool: None,
        };
        mesh.resolve_taps();
        mesh
    }

    /// Square-lattice mesh.
    pub fn rectilinear(lx: usize, ly: usize, sample_distance: f32) -> Self {
        Self::new(Topology::Rectilinear, lx, ly, sample_distance)
    }

    /// Triangular-lattice mesh.
    pub fn triangular(lx: usize, ly: usize, sample_distance: f32) -> Self {
        Self::new(Topology::Triangular, lx, ly, sample_distance)
    }

    // ------------------------------------------------------------------
    // Masks
    // ------------------------------------------------------------------

    /// Junctions within `radius` of the origin.
    pub fn mask_for_radius(&self, radius: f32) -> Grid<bool> {
        self.mask_for_shape(&Shape::Circle { radius })
    }

    /// Junctions inside a centered `length × width` rectangle.
    pub fn mask_for_rect(&self, length: f32, width: f32) -> Grid<bool> {
        self.mask_for_shape(&Shape::Rectangle { length, width })
    }

    /// Junctions inside `shape`.
    pub fn mask_for_shape(&self, shape: &Shape) -> Grid<bool> {
        let (lx, ly) = self.size();
        let topology = self.grid.topology;
        let sd = self.sample_distance;
        Grid::from_fn(lx, ly, |x, y| shape.contains(topology.position(x, y, lx, ly, sd)))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Wire every masked junction to its masked neighbors.
    ///
    /// Previous wiring, rimguides and wave state are discarded. A mask of
    /// the wrong size is logged and ignored.
    pub fn init(&mut self, mask: &Grid<bool>) {
        let (lx, ly) = self.size();
        if mask.size() != (lx, ly) {
            tracing::error!(
                mask_x = mask.size().0,
                mask_y = mask.size().1,
                grid_x = lx,
                grid_y = ly,
                "mask does not match grid size"
            );
            return;
        }

        self.grid.for_each_junction(|_, j| j.reset());
        self.grid.clear_waves();
        self.rimguides.clear();
        self.parity = 0;

        let topology = self.grid.topology;
        let inside = mask.as_slice();
        self.grid.for_each_junction(|index, junction| {
            if !inside[index] {
                return;
            }
            let (x, y) = junction.coords();
            for port in 0..topology.ports() {
                if let Some((nx, ny)) = topology.neighbor_coords(port, x, y, lx, ly) {
                    let neighbor = mask.index_of(nx, ny);
                    if inside[neighbor] {
                        junction.add_neighbor(port, neighbor);
                    }
                }
            }
            junction.init_junction_type();
        });

        self.resolve_taps();
        tracing::info!(
            junctions = self.junction_count(),
            grid_x = lx,
            grid_y = ly,
            "mesh initialized"
        );
    }

    /// Attach a rimguide to every boundary junction.
    pub fn init_boundary(&mut self, info: &RimguideInfo) {
        self.sample_rate = info.sample_rate;
        self.grid.for_each_junction(|_, j| {
            if j.is_boundary() {
                j.init_boundary(info);
            }
        });
        self.collect_rimguides();
        tracing::info!(
            rimguides = self.rimguides.len(),
            solid = info.is_solid_boundary,
            "boundary initialized"
        );
    }

    /// Disconnect the junction at the origin and terminate each former
    /// neighbor with a lossless inner rimguide.
    ///
    /// Neighbors that already carry a rimguide keep it. Without an active
    /// junction at the origin the mesh is left unchanged.
    pub fn clamp_center_with_rimguide(&mut self) {
        let center = (0..self.grid.len()).find(|&i| {
            self.grid
                .with_junction(i, |j| j.is_active() && j.position() == Vec2::ZERO)
        });
        let Some(center) = center else {
            tracing::error!("center junction not found, mesh left unclamped");
            return;
        };

        let topology = self.grid.topology;
        let neighbors: Vec<(usize, usize)> = self.grid.with_junction(center, |j| {
            (0..topology.ports())
                .filter_map(|port| j.neighbor(port).map(|n| (port, n)))
                .collect()
        });

        for &(port, neighbor) in &neighbors {
            self.grid.with_junction(neighbor, |j| {
                j.remove_neighbor(topology.opposite_port(port));
                if j.is_active() {
                    j.init_inner_boundary();
                } else {
                    j.remove_rimguide();
                }
            });
        }

        self.grid.with_junction(center, |j| {
            for &(port, _) in &neighbors {
                j.remove_neighbor(port);
            }
            j.remove_rimguide();
            j.clear();
            debug_assert!(!j.is_active(), "clamped center still wired");
        });

        self.collect_rimguides();
        self.resolve_taps();
        tracing::info!(
            center,
            inner_rimguides = neighbors.len(),
            rimguides = self.rimguides.len(),
            "center clamped"
        );
    }

    fn collect_rimguides(&mut self) {
        let mut rimguides = Vec::new();
        self.grid.for_each_junction(|index, j| {
            if j.has_rimguide() {
                rimguides.push(index);
            }
        });
        self.rimguides = rimguides;
    }

    // ------------------------------------------------------------------
    // Taps
    // ------------------------------------------------------------------

    /// Set the excitation tap from normalized `[0, 1]` grid coordinates.
    pub fn set_input(&mut self, x: f32, y: f32) {
        self.input_request = (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
        self.input = self.resolve_tap(self.input_request, "input");
    }

    /// Set the pickup tap from normalized `[0, 1]` grid coordinates.
    pub fn set_output(&mut self, x: f32, y: f32) {
        self.output_request = (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
        self.output = self.resolve_tap(self.output_request, "output");
    }

    fn resolve_taps(&mut self) {
        self.input = self.resolve_tap(self.input_request, "input");
        self.output = self.resolve_tap(self.output_request, "output");
    }

    /// Map a normalized tap to an active junction, moving to the nearest
    /// active one when the requested cell is outside the domain.
    fn resolve_tap(&self, (x, y): (f32, f32), tap: &str) -> usize {
        let (lx, ly) = self.size();
        let gx = ((x * lx as f32) as usize).min(lx - 1);
        let gy = ((y * ly as f32) as usize).min(ly - 1);
        let requested = gy * lx + gx;

        if self.grid.with_junction(requested, |j| j.is_active()) {
            return requested;
        }

        let target = self.grid.with_junction(requested, |j| j.position());
        let mut nearest: Option<(usize, f32)> = None;
        self.grid.for_each_junction(|index, j| {
            if j.is_active() {
                let d = j.position().distance(target);
                if nearest.is_none_or(|(_, best)| d < best) {
                    nearest = Some((index, d));
                }
            }
        });

        match nearest {
            Some((index, _)) => {
                tracing::warn!(
                    tap,
                    requested_x = gx,
                    requested_y = gy,
                    x = index % lx,
                    y = index / lx,
                    "tap outside the mesh, moved to nearest junction"
                );
                index
            }
            None => requested,
        }
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Advance one sample: inject `input` at the input tap and return the
    /// pressure at the output tap.
    ///
    /// Uses the worker pool when the grid has at least
    /// [`Mesh2D::multithread_threshold`] cells.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        if self.grid.len() < self.multithread_threshold {
            self.tick_st(input)
        } else {
            self.tick_mt(input)
        }
    }

    /// Advance one sample on the calling thread.
    pub fn tick_st(&mut self, input: f32) -> f32 {
        self.inject(input);
        let parts = self.grid.partitions.len();
        match self.pass_mode {
            PassMode::Fused => {
                for part in 0..parts {
                    self.grid.scatter_fused(part, self.parity);
                }
                self.parity ^= 1;
            }
            PassMode::Explicit => {
                for part in 0..parts {
                    self.grid.scatter_explicit(part);
                }
                for part in 0..parts {
                    self.grid.delay_explicit(part);
                }
            }
        }
        self.output_pressure()
    }

    /// Advance one sample with one task per partition on the worker pool.
    pub fn tick_mt(&mut self, input: f32) -> f32 {
        self.inject(input);
        let pool = self.pool.get_or_insert_with(|| ThreadPool::new(self.threads));
        match self.pass_mode {
            PassMode::Fused => {
                let parity = self.parity;
                pool.enqueue_batch_and_wait(partition_tasks(&self.grid, move |grid, part| {
                    grid.scatter_fused(part, parity);
                }));
                self.parity ^= 1;
            }
            PassMode::Explicit => {
                pool.enqueue_batch_and_wait(partition_tasks(&self.grid, MeshGrid::scatter_explicit));
                pool.enqueue_batch_and_wait(partition_tasks(&self.grid, MeshGrid::delay_explicit));
            }
        }
        self.output_pressure()
    }

    fn inject(&self, input: f32) {
        if input != 0.0 {
            self.grid.with_junction(self.input, |j| {
                if j.is_active() {
                    j.add_input(input);
                }
            });
        }
    }

    fn output_pressure(&self) -> f32 {
        self.grid.with_junction(self.output, |j| j.pressure())
    }

    /// Zero every wave, pressure and rimguide. Wiring is kept.
    pub fn clear(&mut self) {
        self.grid.for_each_junction(|_, j| j.clear());
        self.grid.clear_waves();
        self.parity = 0;
    }

    /// Choose how ticks propagate waves. Switching modes clears the mesh.
    pub fn set_pass_mode(&mut self, mode: PassMode) {
        if mode != self.pass_mode {
            self.pass_mode = mode;
            self.clear();
            tracing::debug!(?mode, "pass mode changed");
        }
    }

    /// Current pass mode.
    pub fn pass_mode(&self) -> PassMode {
        self.pass_mode
    }

    /// Buffer holding the latest outgoing waves in fused mode.
    pub fn parity(&self) -> usize {
        self.parity
    }

    /// Grid size from which [`Mesh2D::tick`] uses the worker pool.
    pub fn set_multithread_threshold(&mut self, cells: usize) {
        self.multithread_threshold = cells;
    }

    /// See [`Mesh2D::set_multithread_threshold`].
    pub fn multithread_threshold(&self) -> usize {
        self.multithread_threshold
    }

    /// Worker count used by the multithreaded tick.
    pub fn threads(&self) -> usize {
        self.threads
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Grid dimensions `(lx, ly)`.
    pub fn size(&self) -> (usize, usize) {
        (self.grid.lx, self.grid.ly)
    }

    /// Lattice of this mesh.
    pub fn topology(&self) -> Topology {
        self.grid.topology
    }

    /// Junction spacing in meters.
    pub fn sample_distance(&self) -> f32 {
        self.sample_distance
    }

    /// Sample rate set by [`Mesh2D::init_boundary`].
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of active junctions.
    pub fn junction_count(&self) -> usize {
        let mut count = 0;
        self.grid.for_each_junction(|_, j| count += usize::from(j.is_active()));
        count
    }

    /// Number of junctions with a rimguide.
    pub fn rimguide_count(&self) -> usize {
        self.rimguides.len()
    }

    /// Number of partially connected junctions.
    pub fn boundary_count(&self) -> usize {
        let mut count = 0;
        self.grid.for_each_junction(|_, j| count += usize::from(j.is_boundary()));
        count
    }

    /// Sum of squared incoming waves over all junctions. Rimguide state is
    /// not included.
    pub fn energy(&self) -> f32 {
        let slot = match self.pass_mode {
            PassMode::Fused => self.parity,
            PassMode::Explicit => 1,
        };
        self.grid.energy(slot)
    }

    /// Snapshot of junction `(x, y)`.
    pub fn junction(&self, x: usize, y: usize) -> Option<JunctionSnapshot> {
        let (lx, ly) = self.size();
        if x >= lx || y >= ly {
            return None;
        }
        let index = y * lx + x;
        Some(self.grid.with_junction(index, |j| JunctionSnapshot::of(index, j)))
    }

    /// Snapshots of every junction in arena order.
    pub fn junctions(&self) -> Vec<JunctionSnapshot> {
        let mut out = Vec::with_capacity(self.grid.len());
        self.grid
            .for_each_junction(|index, j| out.push(JunctionSnapshot::of(index, j)));
        out
    }

    /// Positions of all active junctions.
    pub fn positions(&self) -> Vec<Vec2> {
        let mut out = Vec::new();
        self.grid.for_each_junction(|_, j| {
            if j.is_active() {
                out.push(j.position());
            }
        });
        out
    }

    /// Pressure of the junction at arena `index`, or 0 outside the grid.
    pub fn pressure(&self, index: usize) -> f32 {
        if index >= self.grid.len() {
            return 0.0;
        }
        self.grid.with_junction(index, |j| j.pressure())
    }

    /// Copy the pressure of every cell, in arena order, into `out`.
    pub fn copy_pressures(&self, out: &mut [f32]) {
        self.grid.for_each_junction(|index, j| {
            if let Some(slot) = out.get_mut(index) {
                *slot = j.pressure();
            }
        });
    }

    /// Read the pressures at ascending arena `indices` into `out`.
    pub fn gather_pressures(&self, indices: &[usize], out: &mut [f32]) {
        let mut current: Option<(usize, MutexGuard<'_, Vec<Junction>>)> = None;
        for (slot, &index) in out.iter_mut().zip(indices) {
            let (part, local) = self.grid.locate(index);
            if current.as_ref().is_none_or(|(p, _)| *p != part) {
                drop(current.take());
                current = Some((part, self.grid.partitions[part].junctions.lock()));
            }
            if let Some((_, junctions)) = &current {
                *slot = junctions[local].pressure();
            }
        }
    }

    /// Outline positions of every rimguide, in arena order.
    pub fn rimguide_positions(&self) -> Vec<Vec2> {
        self.rimguides
            .iter()
            .filter_map(|&index| self.grid.with_junction(index, |j| j.rimguide().map(Rimguide::position)))
            .collect()
    }

    /// Run `f` on every rimguide in arena order with its ordinal.
    pub fn for_each_rimguide_mut(&mut self, mut f: impl FnMut(usize, &mut Rimguide)) {
        for (ordinal, &index) in self.rimguides.iter().enumerate() {
            self.grid.with_junction(index, |j| {
                if let Some(rim) = j.rimguide_mut() {
                    f(ordinal, rim);
                }
            });
        }
    }

    /// Arena index of the input tap.
    pub fn input_index(&self) -> usize {
        self.input
    }

    /// Arena index of the output tap.
    pub fn output_index(&self) -> usize {
        self.output
    }

    /// Physical position of the input tap.
    pub fn input_pos(&self) -> Vec2 {
        self.grid.with_junction(self.input, |j| j.position())
    }

    /// Physical position of the output tap.
    pub fn output_pos(&self) -> Vec2 {
        self.grid.with_junction(self.output, |j| j.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_rect(lx: usize, ly: usize) -> Mesh2D {
        let mut mesh = Mesh2D::rectilinear(lx, ly, 0.01);
        let mask = Grid::new(lx, ly, true);
        mesh.init(&mask);
        mesh
    }

    #[test]
    fn test_full_mask_wiring() {
        let mesh = full_rect(5, 4);
        assert_eq!(mesh.junction_count(), 20);
        let corner = mesh.junction(0, 0).unwrap();
        assert_eq!(corner.num_connections, 2);
        assert!(corner.is_boundary);
        let inner = mesh.junction(2, 2).unwrap();
        assert_eq!(inner.num_connections, 4);
        assert!(!inner.is_boundary);
        // 2 * 3 + 2 * 2 edge junctions plus 4 corners
        assert_eq!(mesh.boundary_count(), 14);
    }

    #[test]
    fn test_mask_size_mismatch_is_ignored() {
        let mut mesh = Mesh2D::rectilinear(5, 5, 0.01);
        mesh.init(&Grid::new(4, 5, true));
        assert_eq!(mesh.junction_count(), 0);
    }

    #[test]
    fn test_radius_mask() {
        let mesh = Mesh2D::rectilinear(9, 9, 0.1);
        let mask = mesh.mask_for_radius(0.2);
        let inside = mask.as_slice().iter().filter(|&&b| b).count();
        // (0,0), 4 at 0.1, 4 at 0.1414, 4 at 0.2
        assert_eq!(inside, 13);
        assert_eq!(mask.get(4, 4), Some(&true));
    }

    #[test]
    fn test_init_boundary_attaches_rimguides() {
        let mut mesh = full_rect(5, 5);
        mesh.init_boundary(&RimguideInfo {
            shape: Shape::Rectangle {
                length: 0.05,
                width: 0.05,
            },
            ..RimguideInfo::default()
        });
        assert_eq!(mesh.rimguide_count(), 16);
        assert_eq!(mesh.rimguide_count(), mesh.boundary_count());
        assert_eq!(mesh.rimguide_positions().len(), 16);

        // idempotent
        mesh.init_boundary(&RimguideInfo::default());
        assert_eq!(mesh.rimguide_count(), 16);
    }

    #[test]
    fn test_impulse_spreads_to_neighbors() {
        let mut mesh = full_rect(5, 5);
        mesh.set_input(0.5, 0.5);
        mesh.set_output(0.5, 0.5);
        assert_eq!(mesh.input_index(), 12);

        assert_eq!(mesh.tick(1.0), 1.0);
        assert_eq!(mesh.tick(0.0), 0.0);
        // one tick later each neighbor has received 1.0 on one port
        let north = mesh.junction(2, 3).unwrap();
        assert_eq!(north.pressure, 0.5);
    }

    #[test]
    fn test_taps_snap_to_active_junction() {
        let mut mesh = Mesh2D::rectilinear(9, 9, 0.1);
        let mask = mesh.mask_for_radius(0.2);
        mesh.init(&mask);
        mesh.set_input(0.0, 0.0);
        let snapped = mesh.junction(mesh.input_index() % 9, mesh.input_index() / 9).unwrap();
        assert!(snapped.is_active());
        mesh.set_output(1.0, 1.0);
        assert!(mesh.output_index() < 81);
    }

    #[test]
    fn test_clamp_center_rectilinear() {
        let mut mesh = full_rect(7, 7);
        mesh.clamp_center_with_rimguide();
        let center = mesh.junction(3, 3).unwrap();
        assert_eq!(center.port_mask, 0);
        for (x, y) in [(3, 4), (3, 2), (4, 3), (2, 3)] {
            let j = mesh.junction(x, y).unwrap();
            assert!(j.has_rimguide, "({}, {}) should carry an inner rimguide", x, y);
            assert_eq!(j.num_connections, 3);
        }
        // taps moved off the removed center
        assert_ne!(mesh.output_index(), 24);
    }

    #[test]
    fn test_clamp_without_center_is_noop() {
        let mut mesh = Mesh2D::rectilinear(7, 7, 0.01);
        mesh.clamp_center_with_rimguide();
        assert_eq!(mesh.rimguide_count(), 0);
        assert_eq!(mesh.junction_count(), 0);
    }

    #[test]
    fn test_energy_and_clear() {
        let mut mesh = full_rect(6, 6);
        mesh.tick(1.0);
        mesh.tick(0.0);
        assert!(mesh.energy() > 0.0);
        mesh.clear();
        assert_eq!(mesh.energy(), 0.0);
        assert_eq!(mesh.parity(), 0);
        assert_eq!(mesh.tick(0.0), 0.0);
    }

    #[test]
    fn test_pass_modes_agree() {
        let mut fused = full_rect(8, 7);
        let mut explicit = full_rect(8, 7);
        explicit.set_pass_mode(PassMode::Explicit);
        for n in 0..200 {
            let input = if n == 0 { 1.0 } else { 0.0 };
            assert_eq!(fused.tick(input), explicit.tick(input), "sample {}", n);
        }
        assert_eq!(fused.energy(), explicit.energy());
    }

    #[test]
    fn test_gather_pressures() {
        let mut mesh = full_rect(6, 6);
        mesh.tick(1.0);
        mesh.tick(0.0);
        let indices: Vec<usize> = (0..36).collect();
        let mut gathered = vec![0.0; 36];
        let mut copied = vec![0.0; 36];
        mesh.gather_pressures(&indices, &mut gathered);
        mesh.copy_pressures(&mut copied);
        assert_eq!(gathered, copied);
        assert_eq!(mesh.pressure(21), copied[21]);
        assert_eq!(mesh.pressure(1000), 0.0);
    }

    #[test]
    fn test_for_each_rimguide_mut_visits_all() {
        let mut mesh = full_rect(5, 5);
        mesh.init_boundary(&RimguideInfo::default());
        let mut visited = 0;
        mesh.for_each_rimguide_mut(|ordinal, rim| {
            assert_eq!(ordinal, visited);
            rim.clear();
            visited += 1;
        });
        assert_eq!(visited, mesh.rimguide_count());
    }
}
