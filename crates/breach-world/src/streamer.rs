//! Observer-driven region streaming.
//!
//! Regions whose origin lies within the view distance of any observer are
//! materialized nearest-first under a per-call budget: populated from the
//! baseline, overlaid with the edit log, meshed, and handed to the sink.
//! Regions beyond the view distance plus an unload margin are torn down. The
//! margin keeps an observer pacing on a boundary from thrashing loads.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use breach_config::StreamingConfig;
use breach_mesh::{MeshInvalidator, NeighborSampler, OpenBoundary, RegionMesh, RegionMeshState, RegionMesher};
use breach_voxel::{BlockPos, BlockRegistry, BlockTypeId, EditLog, REGION_SIZE, Region, RegionCoord};
use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::baseline::Baseline;
use crate::sink::{MeshHandle, RegionSink};

/// Identifies one observer (usually a player camera).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// Streaming radii and budgets.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamerConfig {
    /// Regions whose origin is within this many blocks of an observer load.
    pub view_distance: f32,
    /// Extra distance beyond `view_distance` before a region unloads.
    pub unload_margin: f32,
    /// Maximum number of region materializations per call.
    pub loads_per_tick: u32,
    /// Cull faces on region seams against neighbouring blocks.
    pub cull_region_seams: bool,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

impl From<&StreamingConfig> for StreamerConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            view_distance: config.view_distance,
            unload_margin: config.unload_margin,
            loads_per_tick: config.loads_per_tick,
            cull_region_seams: config.cull_region_seams,
        }
    }
}

/// What a streaming call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Regions materialized.
    pub loaded: u32,
    /// Regions torn down.
    pub unloaded: u32,
    /// Loaded regions re-meshed after edits.
    pub remeshed: u32,
}

#[derive(Debug)]
struct LoadedRegion {
    region: Region,
    mesh_state: RegionMeshState,
    handle: Option<MeshHandle>,
}

/// Min-heap of regions awaiting materialization, nearest first.
#[derive(Debug, Default)]
struct LoadQueue {
    queue: BinaryHeap<Reverse<(u64, RegionCoord)>>,
    pending: FxHashSet<RegionCoord>,
}

impl LoadQueue {
    fn enqueue(&mut self, coord: RegionCoord, dist_sq: u64) {
        if self.pending.insert(coord) {
            self.queue.push(Reverse((dist_sq, coord)));
        }
    }

    fn dequeue(&mut self) -> Option<RegionCoord> {
        while let Some(Reverse((_, coord))) = self.queue.pop() {
            if self.pending.remove(&coord) {
                return Some(coord);
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }
}

/// Reads blocks across region seams: loaded regions first, then the edit
/// log, then the baseline.
struct Surroundings<'a> {
    loaded: &'a FxHashMap<RegionCoord, LoadedRegion>,
    edits: &'a EditLog,
    baseline: &'a dyn Baseline,
    registry: &'a BlockRegistry,
}

impl Surroundings<'_> {
    fn block_at(&self, pos: BlockPos) -> BlockTypeId {
        if let Some(entry) = self.loaded.get(&pos.region()) {
            return entry.region.get(pos.local());
        }
        self.edits
            .get(pos)
            .unwrap_or_else(|| self.baseline.block_at(pos))
    }
}

impl NeighborSampler for Surroundings<'_> {
    fn is_solid(&self, pos: BlockPos) -> bool {
        self.registry.is_solid(self.block_at(pos))
    }
}

fn origin_distance_sq(coord: RegionCoord, position: Vec3) -> f32 {
    let origin = coord.origin();
    Vec3::new(origin.x as f32, origin.y as f32, origin.z as f32).distance_squared(position)
}

/// Materializes the regions around a set of observers.
pub struct WorldStreamer {
    config: StreamerConfig,
    registry: Arc<BlockRegistry>,
    baseline: Box<dyn Baseline>,
    sink: Box<dyn RegionSink>,
    observers: FxHashMap<ObserverId, Vec3>,
    loaded: FxHashMap<RegionCoord, LoadedRegion>,
    queue: LoadQueue,
    mesher: RegionMesher,
    scratch: RegionMesh,
}

impl WorldStreamer {
    /// Creates a streamer with nothing loaded.
    pub fn new(
        config: StreamerConfig,
        registry: Arc<BlockRegistry>,
        baseline: Box<dyn Baseline>,
        sink: Box<dyn RegionSink>,
    ) -> Self {
        Self {
            config,
            registry,
            baseline,
            sink,
            observers: FxHashMap::default(),
            loaded: FxHashMap::default(),
            queue: LoadQueue::default(),
            mesher: RegionMesher::new(),
            scratch: RegionMesh::new(),
        }
    }

    /// Moves (or adds) an observer, unloads regions that fell out of range,
    /// and materializes up to `loads_per_tick` of the nearest missing ones.
    pub fn update_observer_position(
        &mut self,
        observer: ObserverId,
        position: Vec3,
        edits: &EditLog,
    ) -> StreamReport {
        self.observers.insert(observer, position);
        self.refresh(edits)
    }

    /// Forgets an observer. Regions only it was keeping alive unload.
    pub fn remove_observer(&mut self, observer: ObserverId, edits: &EditLog) -> StreamReport {
        if self.observers.remove(&observer).is_none() {
            return StreamReport::default();
        }
        self.refresh(edits)
    }

    /// Continues pending loads and re-meshes every region whose contents
    /// changed since it was last meshed.
    pub fn tick(&mut self, edits: &EditLog) -> StreamReport {
        StreamReport {
            loaded: self.drain_queue(edits),
            unloaded: 0,
            remeshed: self.remesh_stale(edits),
        }
    }

    /// Writes through to a loaded region. Returns `true` if a loaded region
    /// changed; writes to unloaded regions are no-ops here (the edit log
    /// carries them).
    pub fn set_block(&mut self, pos: BlockPos, id: BlockTypeId) -> bool {
        let coord = pos.region();
        let local = pos.local();
        let changed = match self.loaded.get_mut(&coord) {
            Some(entry) => entry.region.set(local, id),
            None => false,
        };

        // Seam neighbours read this block through the sampler even when its
        // own region is not loaded.
        if self.config.cull_region_seams {
            for neighbor in MeshInvalidator::invalidate(coord, local).into_iter().skip(1) {
                if let Some(entry) = self.loaded.get_mut(&neighbor) {
                    entry.mesh_state.invalidate();
                }
            }
        }
        changed
    }

    /// Current block at `pos`: loaded region, else edit log, else baseline.
    pub fn block_at(&self, pos: BlockPos, edits: &EditLog) -> BlockTypeId {
        Surroundings {
            loaded: &self.loaded,
            edits,
            baseline: self.baseline.as_ref(),
            registry: &self.registry,
        }
        .block_at(pos)
    }

    /// Repopulates every loaded region from the baseline and `edits`, e.g.
    /// after a snapshot replaced the edit log. Meshes rebuild on the next tick.
    pub fn reload_all(&mut self, edits: &EditLog) {
        let Self {
            loaded, baseline, ..
        } = self;
        for (&coord, entry) in loaded.iter_mut() {
            entry.region.clear();
            populate(&**baseline, edits, coord, &mut entry.region);
            entry.mesh_state.invalidate();
        }
        tracing::debug!("reloaded {} regions", self.loaded.len());
    }

    /// Tears down every loaded region and drops pending loads.
    pub fn unload_all(&mut self) -> u32 {
        self.queue.clear();
        let coords: Vec<_> = self.loaded.keys().copied().collect();
        let count = coords.len() as u32;
        for coord in coords {
            self.unload(coord);
        }
        count
    }

    /// Returns `true` if region `coord` is materialized.
    pub fn is_loaded(&self, coord: RegionCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    /// Number of materialized regions.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Number of wanted regions still waiting for a load slot.
    pub fn pending_loads(&self) -> usize {
        self.queue.len()
    }

    /// Contents of a loaded region.
    pub fn region(&self, coord: RegionCoord) -> Option<&Region> {
        self.loaded.get(&coord).map(|entry| &entry.region)
    }

    /// Sink handle of a loaded region's mesh.
    pub fn mesh_handle(&self, coord: RegionCoord) -> Option<MeshHandle> {
        self.loaded.get(&coord).and_then(|entry| entry.handle)
    }

    /// Number of tracked observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Active configuration.
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn refresh(&mut self, edits: &EditLog) -> StreamReport {
        let unloaded = self.unload_distant();
        self.rebuild_queue();
        StreamReport {
            loaded: self.drain_queue(edits),
            unloaded,
            remeshed: 0,
        }
    }

    fn unload_distant(&mut self) -> u32 {
        let keep = self.config.view_distance + self.config.unload_margin;
        let keep_sq = keep * keep;
        let distant: Vec<_> = self
            .loaded
            .keys()
            .copied()
            .filter(|&coord| {
                self.observers
                    .values()
                    .all(|&pos| origin_distance_sq(coord, pos) > keep_sq)
            })
            .collect();
        let count = distant.len() as u32;
        for coord in distant {
            self.unload(coord);
        }
        count
    }

    fn unload(&mut self, coord: RegionCoord) {
        if let Some(entry) = self.loaded.remove(&coord) {
            if let Some(handle) = entry.handle {
                self.sink.release(coord, handle);
            }
            tracing::debug!("unloaded region {coord:?}");
        }
    }

    fn rebuild_queue(&mut self) {
        self.queue.clear();
        let view = self.config.view_distance.max(0.0);
        let view_sq = view * view;
        let size = REGION_SIZE as f32;

        let mut wanted: FxHashMap<RegionCoord, u64> = FxHashMap::default();
        for &pos in self.observers.values() {
            let min = ((pos - Vec3::splat(view)) / size).floor().as_ivec3();
            let max = ((pos + Vec3::splat(view)) / size).floor().as_ivec3();
            for x in min.x..=max.x {
                for y in min.y..=max.y {
                    for z in min.z..=max.z {
                        let coord = RegionCoord::new(x, y, z);
                        let dist_sq = origin_distance_sq(coord, pos);
                        if dist_sq > view_sq || self.loaded.contains_key(&coord) {
                            continue;
                        }
                        let key = dist_sq as u64;
                        wanted
                            .entry(coord)
                            .and_modify(|best| *best = (*best).min(key))
                            .or_insert(key);
                    }
                }
            }
        }

        for (coord, dist_sq) in wanted {
            self.queue.enqueue(coord, dist_sq);
        }
    }

    fn drain_queue(&mut self, edits: &EditLog) -> u32 {
        let mut loaded = 0;
        while loaded < self.config.loads_per_tick {
            let Some(coord) = self.queue.dequeue() else {
                break;
            };
            if self.loaded.contains_key(&coord) {
                continue;
            }
            self.materialize(coord, edits);
            loaded += 1;
        }
        loaded
    }

    fn materialize(&mut self, coord: RegionCoord, edits: &EditLog) {
        let mut region = Region::new();
        populate(self.baseline.as_ref(), edits, coord, &mut region);

        build_mesh(
            &mut self.mesher,
            self.config.cull_region_seams,
            coord,
            &region,
            &Surroundings {
                loaded: &self.loaded,
                edits,
                baseline: self.baseline.as_ref(),
                registry: &self.registry,
            },
            &mut self.scratch,
        );
        let handle = self.sink.upload_mesh(coord, &self.scratch, None);
        self.sink.assign_collision(coord, &region);

        let mut mesh_state = RegionMeshState::new();
        mesh_state.mark_meshed(region.version());
        tracing::debug!(
            "loaded region {coord:?} ({} blocks, {} faces)",
            region.len(),
            self.scratch.face_count()
        );
        self.loaded.insert(
            coord,
            LoadedRegion {
                region,
                mesh_state,
                handle: Some(handle),
            },
        );
    }

    fn remesh_stale(&mut self, edits: &EditLog) -> u32 {
        let mut stale: Vec<_> = self
            .loaded
            .iter()
            .filter(|(_, entry)| entry.mesh_state.is_stale(entry.region.version()))
            .map(|(&coord, _)| coord)
            .collect();
        stale.sort_unstable();

        let Self {
            config,
            registry,
            baseline,
            sink,
            loaded,
            mesher,
            scratch,
            ..
        } = self;

        for &coord in &stale {
            let Some(entry) = loaded.get(&coord) else {
                continue;
            };
            build_mesh(
                mesher,
                config.cull_region_seams,
                coord,
                &entry.region,
                &Surroundings {
                    loaded: &*loaded,
                    edits,
                    baseline: &**baseline,
                    registry: &**registry,
                },
                scratch,
            );
            let handle = sink.upload_mesh(coord, scratch, entry.handle);
            sink.assign_collision(coord, &entry.region);
            let version = entry.region.version();

            if let Some(entry) = loaded.get_mut(&coord) {
                entry.handle = Some(handle);
                entry.mesh_state.mark_meshed(version);
            }
        }

        if !stale.is_empty() {
            tracing::trace!("re-meshed {} regions", stale.len());
        }
        stale.len() as u32
    }
}

/// Fills `region` from the baseline, then replays every logged edit in it.
fn populate(baseline: &dyn Baseline, edits: &EditLog, coord: RegionCoord, region: &mut Region) {
    baseline.populate(coord, region);
    for record in edits.records_in(coord) {
        region.set(record.pos.local(), record.block);
    }
}

fn build_mesh(
    mesher: &mut RegionMesher,
    cull_seams: bool,
    coord: RegionCoord,
    region: &Region,
    surroundings: &Surroundings<'_>,
    mesh: &mut RegionMesh,
) {
    if cull_seams {
        mesher.build(region, coord, surroundings.registry, surroundings, mesh);
    } else {
        mesher.build(region, coord, surroundings.registry, &OpenBoundary, mesh);
    }
}
