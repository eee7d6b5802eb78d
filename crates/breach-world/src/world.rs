//! The voxel world facade: one edit path for the grid, edit log, damage
//! ledger, and streamer.

use std::sync::Arc;

use breach_config::Config;
use breach_voxel::{
    BlockPos, BlockRegistry, BlockTypeId, DamageOutcome, DamageTracker, EditLog, EditRecord,
    RegistryError,
};
use glam::Vec3;
use thiserror::Error;

use crate::baseline::{AuthoredBaseline, Baseline, BaselineError, FlatBaseline};
use crate::sink::RegionSink;
use crate::streamer::{ObserverId, StreamReport, StreamerConfig, WorldStreamer};

/// Errors raised while building a world from configuration.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The block table could not be loaded.
    #[error("block table: {0}")]
    Registry(#[from] RegistryError),
    /// The map file could not be loaded.
    #[error("map: {0}")]
    Baseline(#[from] BaselineError),
}

/// Loads the configured block table, or the built-in one.
///
/// # Errors
///
/// Returns [`WorldError::Registry`] if `world.block_table` is set and invalid.
pub fn registry_from_config(config: &Config) -> Result<BlockRegistry, WorldError> {
    match &config.world.block_table {
        Some(path) => Ok(BlockRegistry::from_ron_file(path)?),
        None => Ok(BlockRegistry::standard()),
    }
}

/// Loads the configured map, or a flat baseline at `world.ground_height`.
///
/// # Errors
///
/// Returns [`WorldError::Baseline`] if `world.map_file` is set and invalid.
pub fn baseline_from_config(
    config: &Config,
    registry: &BlockRegistry,
) -> Result<Box<dyn Baseline>, WorldError> {
    match &config.world.map_file {
        Some(path) => Ok(Box::new(AuthoredBaseline::from_ron_file(path, registry)?)),
        None => Ok(Box::new(FlatBaseline::from_registry(
            registry,
            config.world.ground_height,
        ))),
    }
}

/// Block storage, edit history, damage state, and streaming for one process.
pub struct VoxelWorld {
    registry: Arc<BlockRegistry>,
    edits: EditLog,
    damage: DamageTracker,
    streamer: WorldStreamer,
}

impl VoxelWorld {
    /// Creates a world with an empty edit log.
    pub fn new(
        registry: Arc<BlockRegistry>,
        baseline: Box<dyn Baseline>,
        sink: Box<dyn RegionSink>,
        config: StreamerConfig,
    ) -> Self {
        let streamer = WorldStreamer::new(config, Arc::clone(&registry), baseline, sink);
        Self {
            registry,
            edits: EditLog::new(),
            damage: DamageTracker::new(),
            streamer,
        }
    }

    /// Builds a world from the `world` and `streaming` config sections.
    ///
    /// # Errors
    ///
    /// Fails if a configured block table or map file cannot be loaded.
    pub fn from_config(config: &Config, sink: Box<dyn RegionSink>) -> Result<Self, WorldError> {
        let registry = Arc::new(registry_from_config(config)?);
        let baseline = baseline_from_config(config, &registry)?;
        Ok(Self::new(
            registry,
            baseline,
            sink,
            StreamerConfig::from(&config.streaming),
        ))
    }

    /// The shared block registry.
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Canonical (host) or mirrored (peer) edit history.
    pub fn edits(&self) -> &EditLog {
        &self.edits
    }

    /// The streamer, for inspection.
    pub fn streamer(&self) -> &WorldStreamer {
        &self.streamer
    }

    /// Current block at `pos`, loaded or not.
    pub fn block_at(&self, pos: BlockPos) -> BlockTypeId {
        self.streamer.block_at(pos, &self.edits)
    }

    /// Remaining health of a damaged block.
    pub fn remaining_health(&self, pos: BlockPos) -> Option<u32> {
        self.damage.remaining(pos)
    }

    /// Applies an edit: logs it, clears the damage entry if the block
    /// changes, and writes through to the loaded region. Idempotent.
    ///
    /// Returns `true` if the block at `pos` changed.
    pub fn apply_edit(&mut self, record: EditRecord) -> bool {
        let previous = self.block_at(record.pos);
        self.edits.apply(record);
        if previous == record.block {
            return false;
        }
        self.damage.forget(record.pos);
        self.streamer.set_block(record.pos, record.block);
        true
    }

    /// Hits the block at `pos`. A destroying hit writes air through
    /// [`Self::apply_edit`].
    pub fn damage_block(&mut self, pos: BlockPos, amount: u32) -> DamageOutcome {
        let id = self.block_at(pos);
        let outcome = self.damage.damage(pos, id, amount, &self.registry);
        if outcome == DamageOutcome::Destroyed {
            self.apply_edit(EditRecord::new(pos, BlockTypeId::AIR));
        }
        outcome
    }

    /// Applies a host-confirmed non-lethal damage delta. See
    /// [`DamageTracker::apply_remote`].
    pub fn apply_remote_damage(&mut self, pos: BlockPos, amount: u32) -> Option<u32> {
        let id = self.block_at(pos);
        self.damage.apply_remote(pos, id, amount, &self.registry)
    }

    /// Replaces the whole edit history (a received snapshot), clears the
    /// damage ledger, and repopulates loaded regions.
    pub fn replace_edits(&mut self, records: impl IntoIterator<Item = EditRecord>) {
        self.edits.replace(records);
        self.damage.clear();
        self.streamer.reload_all(&self.edits);
    }

    /// Moves an observer. See [`WorldStreamer::update_observer_position`].
    pub fn update_observer(&mut self, observer: ObserverId, position: Vec3) -> StreamReport {
        self.streamer
            .update_observer_position(observer, position, &self.edits)
    }

    /// Removes an observer.
    pub fn remove_observer(&mut self, observer: ObserverId) -> StreamReport {
        self.streamer.remove_observer(observer, &self.edits)
    }

    /// Continues loads and re-meshes edited regions.
    pub fn tick(&mut self) -> StreamReport {
        self.streamer.tick(&self.edits)
    }

    /// Releases every loaded region.
    pub fn shutdown(&mut self) {
        let released = self.streamer.unload_all();
        tracing::debug!("released {released} regions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::EmptyBaseline;
    use crate::sink::NullSink;
    use breach_voxel::{DamageRejection, Health, RegionCoord};

    fn flat_world() -> VoxelWorld {
        let registry = Arc::new(BlockRegistry::standard());
        let baseline = Box::new(FlatBaseline::from_registry(&registry, 8));
        VoxelWorld::new(registry, baseline, Box::new(NullSink::default()), StreamerConfig::default())
    }

    fn id(world: &VoxelWorld, name: &str) -> BlockTypeId {
        world.registry().lookup_by_name(name).unwrap()
    }

    #[test]
    fn test_unset_reads_as_air() {
        let registry = Arc::new(BlockRegistry::standard());
        let world = VoxelWorld::new(
            registry,
            Box::new(EmptyBaseline),
            Box::new(NullSink::default()),
            StreamerConfig::default(),
        );
        assert_eq!(world.block_at(BlockPos::new(-100, 5, 42)), BlockTypeId::AIR);
    }

    #[test]
    fn test_apply_edit_twice_equals_once() {
        let mut world = flat_world();
        let record = EditRecord::new(BlockPos::new(1, 20, 3), id(&world, "metal"));
        assert!(world.apply_edit(record));
        assert!(!world.apply_edit(record));
        assert_eq!(world.edits().len(), 1);
        assert_eq!(world.block_at(record.pos), record.block);
    }

    #[test]
    fn test_medium_block_destroyed_on_third_hit() {
        let mut world = flat_world();
        let pos = BlockPos::new(4, 9, 4);
        world.apply_edit(EditRecord::new(pos, id(&world, "stone")));
        assert_eq!(world.registry().get(world.block_at(pos)).health, Health::Medium);

        assert_eq!(world.damage_block(pos, 30), DamageOutcome::Damaged { remaining: 55 });
        assert_eq!(world.damage_block(pos, 30), DamageOutcome::Damaged { remaining: 25 });
        assert_eq!(world.damage_block(pos, 30), DamageOutcome::Destroyed);
        assert_eq!(world.block_at(pos), BlockTypeId::AIR);
        assert_eq!(world.remaining_health(pos), None);
        assert_eq!(world.edits().get(pos), Some(BlockTypeId::AIR));
    }

    #[test]
    fn test_low_block_destroyed_neighbours_unaffected() {
        let mut world = flat_world();
        // Subsoil dirt at y = 5.
        let pos = BlockPos::new(0, 5, 0);
        assert_eq!(world.block_at(pos), id(&world, "dirt"));
        assert_eq!(world.damage_block(pos, 60), DamageOutcome::Destroyed);
        assert_eq!(world.block_at(pos), BlockTypeId::AIR);
        for neighbor in [BlockPos::new(1, 5, 0), BlockPos::new(0, 6, 0), BlockPos::new(0, 4, 0)] {
            assert_eq!(world.block_at(neighbor), id(&world, "dirt"));
            assert_eq!(world.remaining_health(neighbor), None);
        }
    }

    #[test]
    fn test_undamageable_stays_in_grid() {
        let mut world = flat_world();
        let floor = BlockPos::new(0, 0, 0);
        assert_eq!(
            world.damage_block(floor, 1_000_000),
            DamageOutcome::Rejected(DamageRejection::Undamageable)
        );
        assert_eq!(world.block_at(floor), id(&world, "bedrock"));
        assert!(world.edits().is_empty());
    }

    #[test]
    fn test_overwrite_clears_damage() {
        let mut world = flat_world();
        let pos = BlockPos::new(2, 3, 2);
        world.damage_block(pos, 10);
        assert_eq!(world.remaining_health(pos), Some(75));
        world.apply_edit(EditRecord::new(pos, id(&world, "brick")));
        assert_eq!(world.remaining_health(pos), None);
    }

    #[test]
    fn test_remote_damage_floors_at_one() {
        let mut world = flat_world();
        let pos = BlockPos::new(2, 3, 2);
        assert_eq!(world.apply_remote_damage(pos, 500), Some(1));
        assert_eq!(world.block_at(pos), id(&world, "stone"));
    }

    #[test]
    fn test_replace_edits_reloads_regions() {
        let mut world = flat_world();
        world.update_observer(ObserverId(0), Vec3::new(8.0, 8.0, 8.0));
        let pos = BlockPos::new(3, 7, 3);
        world.apply_edit(EditRecord::new(pos, BlockTypeId::AIR));
        world.damage_block(BlockPos::new(5, 5, 5), 1);

        world.replace_edits([EditRecord::new(BlockPos::new(9, 9, 9), id(&world, "sand"))]);
        assert_eq!(world.block_at(pos), id(&world, "grass"));
        assert_eq!(world.block_at(BlockPos::new(9, 9, 9)), id(&world, "sand"));
        assert_eq!(world.remaining_health(BlockPos::new(5, 5, 5)), None);
        assert!(world.streamer().is_loaded(RegionCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_from_config_uses_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("map.ron");
        std::fs::write(&map, r#"(blocks: [(pos: (0, 40, 0), block: "glass")])"#).unwrap();

        let mut config = Config::default();
        config.world.map_file = Some(map);
        let world = VoxelWorld::from_config(&config, Box::new(NullSink::default())).unwrap();
        assert_eq!(world.block_at(BlockPos::new(0, 40, 0)), id(&world, "glass"));
        assert_eq!(world.block_at(BlockPos::new(0, 0, 0)), BlockTypeId::AIR);
    }

    #[test]
    fn test_from_config_reports_bad_block_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("blocks.ron");
        std::fs::write(&table, "not ron at all (").unwrap();

        let mut config = Config::default();
        config.world.block_table = Some(table);
        let result = VoxelWorld::from_config(&config, Box::new(NullSink::default()));
        assert!(matches!(result, Err(WorldError::Registry(_))));
    }
}
