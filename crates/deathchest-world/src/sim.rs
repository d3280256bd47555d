//! In-memory host world.
//!
//! `SimWorld` implements [`HostWorld`] against plain maps so the
//! engine can run headless: the server binary drives it for demo
//! sessions and the test suites assert against its recorded side
//! effects (drops, effects, sounds, broadcasts).

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::item::{ItemStack, CHEST_SLOTS};
use crate::position::{BlockPos, WorldId};
use crate::{FallingBlockId, FallingState, HostWorld, MarkerId, WorldError};

#[derive(Debug, Clone)]
enum Block {
    Chest(Vec<Option<ItemStack>>),
    Solid(String),
}

#[derive(Debug)]
struct FallingProxy {
    y: f64,
    target_y: f64,
    landed: bool,
}

#[derive(Debug)]
struct Marker {
    #[allow(dead_code)]
    world: WorldId,
    text: String,
}

/// An item dropped into the world, with the velocity it was given.
#[derive(Debug, Clone)]
pub struct DroppedItem {
    pub pos: BlockPos,
    pub item: ItemStack,
    pub velocity: (f64, f64, f64),
}

/// In-memory reference implementation of [`HostWorld`].
#[derive(Default)]
pub struct SimWorld {
    worlds: Vec<WorldId>,
    blocks: HashMap<BlockPos, Block>,
    falling: HashMap<FallingBlockId, FallingProxy>,
    markers: HashMap<MarkerId, Marker>,
    next_entity: u64,
    /// Every item dropped so far, in drop order.
    pub dropped: Vec<DroppedItem>,
    /// Every positional effect played: (position, effect name).
    pub effects: Vec<(BlockPos, String)>,
    /// Every positional sound played: (position, sound name).
    pub sounds: Vec<(BlockPos, String)>,
    /// Pending broadcast messages; drained by the host loop.
    pub broadcasts: Vec<String>,
    /// Marker text mutations, in call order. Lets tests observe the
    /// countdown sequence rather than only the final text.
    pub marker_updates: Vec<(MarkerId, String)>,
    /// When set, text-marker spawns fail (exercise degraded paths).
    pub fail_marker_spawns: bool,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sim world with a single named world already present.
    pub fn with_world(name: &str) -> Self {
        let mut sim = Self::default();
        sim.add_world(name);
        sim
    }

    pub fn add_world(&mut self, name: &str) -> WorldId {
        let id = WorldId::new(name);
        if !self.worlds.contains(&id) {
            self.worlds.push(id.clone());
        }
        id
    }

    fn check_world(&self, world: &WorldId) -> Result<(), WorldError> {
        if self.worlds.contains(world) {
            Ok(())
        } else {
            Err(WorldError::UnknownWorld(world.name().to_string()))
        }
    }

    fn chest_slots_mut(&mut self, pos: &BlockPos) -> Result<&mut Vec<Option<ItemStack>>, WorldError> {
        match self.blocks.get_mut(pos) {
            Some(Block::Chest(slots)) => Ok(slots),
            _ => Err(WorldError::NoContainer(pos.clone())),
        }
    }

    /// Place a solid block, for obstructing a position in tests.
    pub fn place_solid(&mut self, pos: &BlockPos, name: &str) {
        self.blocks.insert(pos.clone(), Block::Solid(name.to_string()));
    }

    /// Advance simulated physics by one tick: falling proxies descend
    /// one block until they reach their target height.
    pub fn step(&mut self) {
        for proxy in self.falling.values_mut() {
            if proxy.landed {
                continue;
            }
            proxy.y -= 1.0;
            if proxy.y <= proxy.target_y {
                proxy.y = proxy.target_y;
                proxy.landed = true;
            }
        }
    }

    /// Despawn a falling proxy out from under the engine, as a real
    /// host can (chunk unload, kill command).
    pub fn invalidate_falling(&mut self, id: FallingBlockId) {
        self.falling.remove(&id);
    }

    /// Current text of a marker, if it still exists.
    pub fn marker_text(&self, id: MarkerId) -> Option<&str> {
        self.markers.get(&id).map(|m| m.text.as_str())
    }

    /// Number of live marker entities.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Number of live falling proxies.
    pub fn falling_count(&self) -> usize {
        self.falling.len()
    }

    /// Take all pending broadcasts.
    pub fn drain_broadcasts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.broadcasts)
    }

    fn next_id(&mut self) -> u64 {
        self.next_entity += 1;
        self.next_entity
    }
}

impl HostWorld for SimWorld {
    fn place_chest(&mut self, pos: &BlockPos) -> Result<(), WorldError> {
        self.check_world(&pos.world)?;
        if self.blocks.contains_key(pos) {
            return Err(WorldError::Obstructed(pos.clone()));
        }
        self.blocks
            .insert(pos.clone(), Block::Chest(vec![None; CHEST_SLOTS]));
        debug!(%pos, "placed chest block");
        Ok(())
    }

    fn is_chest(&self, pos: &BlockPos) -> bool {
        matches!(self.blocks.get(pos), Some(Block::Chest(_)))
    }

    fn remove_block(&mut self, pos: &BlockPos) {
        self.blocks.remove(pos);
    }

    fn insert_chest_items(
        &mut self,
        pos: &BlockPos,
        items: Vec<ItemStack>,
    ) -> Result<Vec<ItemStack>, WorldError> {
        let slots = self.chest_slots_mut(pos)?;
        let mut overflow = Vec::new();
        for item in items {
            if item.is_empty() {
                continue;
            }
            match slots.iter_mut().find(|s| s.is_none()) {
                Some(slot) => *slot = Some(item),
                None => overflow.push(item),
            }
        }
        Ok(overflow)
    }

    fn take_chest_items(&mut self, pos: &BlockPos) -> Result<Vec<ItemStack>, WorldError> {
        let slots = self.chest_slots_mut(pos)?;
        Ok(slots.iter_mut().filter_map(|s| s.take()).collect())
    }

    fn spawn_falling_chest(
        &mut self,
        pos: &BlockPos,
        height: i32,
    ) -> Result<FallingBlockId, WorldError> {
        self.check_world(&pos.world)?;
        let id = FallingBlockId(self.next_id());
        self.falling.insert(
            id,
            FallingProxy {
                y: (pos.y + height) as f64,
                target_y: pos.y as f64,
                landed: false,
            },
        );
        debug!(%pos, height, "spawned falling chest proxy");
        Ok(id)
    }

    fn falling_block_state(&self, id: FallingBlockId) -> FallingState {
        match self.falling.get(&id) {
            Some(p) if p.landed => FallingState::Landed,
            Some(p) => FallingState::Falling { y: p.y },
            None => FallingState::Gone,
        }
    }

    fn remove_falling_block(&mut self, id: FallingBlockId) {
        self.falling.remove(&id);
    }

    fn spawn_text_marker(
        &mut self,
        world: &WorldId,
        _x: f64,
        _y: f64,
        _z: f64,
        text: &str,
    ) -> Result<MarkerId, WorldError> {
        self.check_world(world)?;
        if self.fail_marker_spawns {
            return Err(WorldError::SpawnFailed("marker spawns disabled".into()));
        }
        let id = MarkerId(self.next_id());
        self.markers.insert(
            id,
            Marker {
                world: world.clone(),
                text: text.to_string(),
            },
        );
        Ok(id)
    }

    fn set_marker_text(&mut self, id: MarkerId, text: &str) -> bool {
        match self.markers.get_mut(&id) {
            Some(marker) => {
                marker.text = text.to_string();
                self.marker_updates.push((id, text.to_string()));
                true
            }
            None => false,
        }
    }

    fn remove_marker(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    fn drop_item(
        &mut self,
        pos: &BlockPos,
        item: ItemStack,
        damping: f64,
    ) -> Result<(), WorldError> {
        self.check_world(&pos.world)?;
        let mut rng = rand::thread_rng();
        // Natural scatter, as a real host gives freshly dropped items.
        let velocity = (
            rng.gen_range(-0.1..0.1) * damping,
            0.2 * damping,
            rng.gen_range(-0.1..0.1) * damping,
        );
        self.dropped.push(DroppedItem {
            pos: pos.clone(),
            item,
            velocity,
        });
        Ok(())
    }

    fn play_effect(&mut self, pos: &BlockPos, effect: &str) -> Result<(), WorldError> {
        self.check_world(&pos.world)?;
        self.effects.push((pos.clone(), effect.to_string()));
        Ok(())
    }

    fn play_sound(
        &mut self,
        pos: &BlockPos,
        sound: &str,
        _volume: f32,
        _pitch: f32,
    ) -> Result<(), WorldError> {
        self.check_world(&pos.world)?;
        self.sounds.push((pos.clone(), sound.to_string()));
        Ok(())
    }

    fn broadcast(&mut self, message: &str) {
        self.broadcasts.push(message.to_string());
    }
}
