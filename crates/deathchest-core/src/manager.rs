//! Chest registry and lifecycle management.
//!
//! One `ChestManager` owns every tracked death chest: the registry
//! mapping block position to owner, the outstanding task handles per
//! chest, the optional falling phase, and the teardown paths. Three
//! triggers race to destroy the same chest — the terminal timer, a
//! manual break, and the shutdown sweep — and the discipline
//! throughout is remove-from-registry-first: whichever trigger removes
//! the record proceeds, everyone else observes absence and becomes a
//! no-op.
//!
//! Per-position lifecycle: untracked, then an optional falling phase,
//! then materialized with timers armed, then untracked again (broken
//! by timeout, interaction, or shutdown). The registry answers
//! `is_tracked` from materialization until teardown.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use deathchest_world::{BlockPos, FallingBlockId, FallingState, HostWorld, ItemStack, WorldId};

use crate::capability::{Capability, CapabilityProvider};
use crate::config::DeathChestConfig;
use crate::error::ChestError;
use crate::hologram::HologramTracker;
use crate::messages::MessageRelay;
use crate::timer::{ScheduledTask, TaskHandle, TaskKind, TimerQueue, TICKS_PER_SECOND};

/// Safety bound on the falling phase: give up and materialize in
/// place after this many poll ticks (10 seconds).
pub const MAX_FALL_TICKS: u32 = 200;

/// Ticks between materialization and hologram creation, letting the
/// host finish placing the block.
const HOLOGRAM_SPAWN_DELAY: u64 = 2;

/// Velocity damping applied to items dropped out of a broken chest.
const DROP_DAMPING: f64 = 0.5;

/// Opaque player identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub i64);

/// One tracked chest.
#[derive(Debug)]
pub struct ChestRecord {
    pub owner: OwnerId,
    pub owner_name: String,
    /// Outstanding scheduler handles: hologram spawn, countdown
    /// ticks, and the terminal break task.
    task_handles: Vec<TaskHandle>,
}

/// A chest still in its falling animation phase, not yet registered.
struct FallingChest {
    owner: OwnerId,
    owner_name: String,
    items: Vec<ItemStack>,
    entity: FallingBlockId,
    poll_handle: TaskHandle,
    ticks: u32,
}

pub struct ChestManager {
    cfg: DeathChestConfig,
    caps: Box<dyn CapabilityProvider>,
    holograms: HologramTracker,
    relay: MessageRelay,
    timers: TimerQueue,
    chests: HashMap<BlockPos, ChestRecord>,
    falling: HashMap<BlockPos, FallingChest>,
    now: u64,
    shutting_down: bool,
}

impl ChestManager {
    pub fn new(
        cfg: DeathChestConfig,
        caps: Box<dyn CapabilityProvider>,
        holograms: HologramTracker,
        relay: MessageRelay,
    ) -> Self {
        Self {
            cfg,
            caps,
            holograms,
            relay,
            timers: TimerQueue::new(),
            chests: HashMap::new(),
            falling: HashMap::new(),
            now: 0,
            shutting_down: false,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.now
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Number of currently tracked chests.
    pub fn active_count(&self) -> usize {
        self.chests.len()
    }

    /// Number of chests still in their falling phase.
    pub fn falling_count(&self) -> usize {
        self.falling.len()
    }

    /// Whether a tracked chest exists at `pos`. Pure lookup; every
    /// block-interaction event in the world funnels through this.
    pub fn is_tracked(&self, pos: &BlockPos) -> bool {
        self.chests.contains_key(pos)
    }

    pub fn owner_of(&self, pos: &BlockPos) -> Option<OwnerId> {
        self.chests.get(pos).map(|r| r.owner)
    }

    /// Iterate tracked chests as (position, owner name).
    pub fn iter(&self) -> impl Iterator<Item = (&BlockPos, &str)> {
        self.chests.iter().map(|(p, r)| (p, r.owner_name.as_str()))
    }

    pub fn allow_instant_break(&self) -> bool {
        self.cfg.chest.allow_instant_break
    }

    /// Broadcast the creation announcement for a chest.
    pub fn announce_created(&self, world: &mut dyn HostWorld, owner_name: &str) {
        self.relay
            .announce_created(world, owner_name, self.cfg.chest.break_time);
    }

    /// Create a death chest for `owner` at the block containing the
    /// given fractional coordinates. Runs the falling phase first when
    /// enabled, otherwise materializes immediately. Returns the
    /// normalized position.
    ///
    /// The caller keeps responsibility for the items on failure; this
    /// method rolls back any partial state before reporting the error.
    #[allow(clippy::too_many_arguments)]
    pub fn create_chest(
        &mut self,
        world: &mut dyn HostWorld,
        owner: OwnerId,
        owner_name: &str,
        world_id: WorldId,
        x: f64,
        y: f64,
        z: f64,
        items: Vec<ItemStack>,
    ) -> Result<BlockPos, ChestError> {
        if self.shutting_down {
            return Err(ChestError::ShuttingDown);
        }
        if owner_name.is_empty() {
            return Err(ChestError::InvalidOwner);
        }
        let pos = BlockPos::containing(world_id, x, y, z);
        if self.chests.contains_key(&pos) || self.falling.contains_key(&pos) {
            return Err(ChestError::AlreadyTracked(pos));
        }

        if self.cfg.falling.enabled && self.caps.supports(Capability::FallingBlocks) {
            match world.spawn_falling_chest(&pos, self.cfg.falling.height) {
                Ok(entity) => {
                    let poll_handle = self.timers.schedule_repeating(
                        pos.clone(),
                        TaskKind::FallPoll,
                        1,
                        1,
                        self.now,
                    );
                    self.falling.insert(
                        pos.clone(),
                        FallingChest {
                            owner,
                            owner_name: owner_name.to_string(),
                            items,
                            entity,
                            poll_handle,
                            ticks: 0,
                        },
                    );
                    debug!(%pos, "falling chest spawned");
                    return Ok(pos);
                }
                Err(err) => {
                    warn!(%pos, %err, "falling chest spawn failed, placing directly");
                }
            }
        }

        self.materialize(world, &pos, owner, owner_name, items)?;
        Ok(pos)
    }

    /// Place the chest block, move the items in, register the record,
    /// and arm the break schedule. Rolls the placed block back if item
    /// insertion fails, so a failed creation leaves nothing behind.
    fn materialize(
        &mut self,
        world: &mut dyn HostWorld,
        pos: &BlockPos,
        owner: OwnerId,
        owner_name: &str,
        items: Vec<ItemStack>,
    ) -> Result<(), ChestError> {
        world.place_chest(pos)?;

        let overflow = match world.insert_chest_items(pos, items) {
            Ok(overflow) => overflow,
            Err(err) => {
                world.remove_block(pos);
                return Err(err.into());
            }
        };
        // Overflow policy: whatever does not fit is scattered at the
        // chest, never silently discarded.
        if !overflow.is_empty() {
            warn!(%pos, count = overflow.len(), "chest full, scattering overflow items");
            for item in overflow {
                if let Err(err) = world.drop_item(pos, item, DROP_DAMPING) {
                    warn!(%pos, %err, "failed to scatter overflow item");
                }
            }
        }

        if let Some(sound) = self.caps.try_resolve(Capability::ChestOpenSound) {
            if let Err(err) = world.play_sound(pos, sound.0, 1.0, 1.0) {
                debug!(%pos, %err, "chest open sound failed");
            }
        }

        let mut record = ChestRecord {
            owner,
            owner_name: owner_name.to_string(),
            task_handles: Vec::new(),
        };
        self.arm_break_schedule(pos, &mut record);
        self.chests.insert(pos.clone(), record);

        info!(%pos, owner = owner_name, "created death chest");
        Ok(())
    }

    /// Arm the countdown and terminal tasks for a fresh record.
    ///
    /// The break timer arms whenever `break_time > 0`, independent of
    /// the hologram flag; the hologram flag gates only the cosmetic
    /// spawn and countdown tasks.
    fn arm_break_schedule(&mut self, pos: &BlockPos, record: &mut ChestRecord) {
        let break_time = self.cfg.chest.break_time;
        if break_time == 0 {
            return;
        }

        if self.holograms.is_enabled() {
            record.task_handles.push(self.timers.schedule_once(
                pos.clone(),
                TaskKind::SpawnHologram {
                    remaining: break_time,
                },
                HOLOGRAM_SPAWN_DELAY,
                self.now,
            ));
            for remaining in (1..break_time).rev() {
                let delay = u64::from(break_time - remaining) * TICKS_PER_SECOND;
                record.task_handles.push(self.timers.schedule_once(
                    pos.clone(),
                    TaskKind::CountdownTick { remaining },
                    delay,
                    self.now,
                ));
            }
        }

        record.task_handles.push(self.timers.schedule_once(
            pos.clone(),
            TaskKind::Break,
            u64::from(break_time) * TICKS_PER_SECOND,
            self.now,
        ));
    }

    /// Cancel every outstanding task for the chest at `pos`.
    /// Idempotent; no-op for untracked positions and consumed handles.
    pub fn cancel_break_tasks(&mut self, pos: &BlockPos) {
        let handles = match self.chests.get_mut(pos) {
            Some(record) => std::mem::take(&mut record.task_handles),
            None => return,
        };
        for handle in handles {
            self.timers.cancel(handle);
        }
    }

    /// Cancel the pending schedule and arm an immediate break on the
    /// next event-processing turn. Returns `false` if `pos` is not
    /// tracked.
    pub fn request_instant_break(&mut self, pos: &BlockPos) -> bool {
        if !self.chests.contains_key(pos) {
            return false;
        }
        self.cancel_break_tasks(pos);
        let handle = self
            .timers
            .schedule_once(pos.clone(), TaskKind::Break, 1, self.now);
        if let Some(record) = self.chests.get_mut(pos) {
            record.task_handles.push(handle);
        }
        true
    }

    /// Destroy the chest at `pos`: release tracked resources, remove
    /// the block, scatter the contents, notify the relay. Idempotent
    /// and safe from any trigger; an untracked position is a no-op.
    pub fn break_chest(&mut self, world: &mut dyn HostWorld, pos: &BlockPos) {
        // First trigger to remove the record wins; everyone else
        // observes absence here and returns.
        let Some(record) = self.chests.remove(pos) else {
            return;
        };

        // Release resources before any destructive world mutation, so
        // a failure below can never leave the key registered.
        for handle in record.task_handles {
            self.timers.cancel(handle);
        }
        self.holograms.remove(world, pos);

        if !world.is_chest(pos) {
            debug!(%pos, "tracked chest already gone, released resources only");
            return;
        }

        let items = match world.take_chest_items(pos) {
            Ok(items) => items,
            Err(err) => {
                warn!(%pos, %err, "could not read chest contents");
                Vec::new()
            }
        };

        // Everything from here on is best-effort: log and keep going.
        if let Some(effect) = self.caps.try_resolve(Capability::BreakEffect) {
            if let Err(err) = world.play_effect(pos, effect.0) {
                warn!(%pos, %err, "break effect failed");
            }
        }
        world.remove_block(pos);

        for item in items {
            if item.is_empty() {
                continue;
            }
            if let Err(err) = world.drop_item(pos, item, DROP_DAMPING) {
                warn!(%pos, %err, "failed to drop item from death chest");
            }
        }

        if let Some(sound) = self.caps.try_resolve(Capability::BlockBreakSound) {
            if let Err(err) = world.play_sound(pos, sound.0, 1.0, 1.0) {
                warn!(%pos, %err, "break sound failed");
            }
        }

        self.relay.announce_broken(world);
        info!(%pos, "death chest broken");
    }

    /// Advance the logical clock one tick and run every due task.
    pub fn tick(&mut self, world: &mut dyn HostWorld) {
        self.now += 1;
        if self.shutting_down {
            return;
        }
        for task in self.timers.drain_ready(self.now) {
            self.dispatch(world, task);
        }
    }

    /// Every fired task re-checks registry membership: a task that
    /// outlived its chest is a stale trigger and does nothing.
    fn dispatch(&mut self, world: &mut dyn HostWorld, task: ScheduledTask) {
        match task.kind {
            TaskKind::FallPoll => self.poll_falling(world, &task.pos),
            TaskKind::SpawnHologram { remaining } => {
                if let Some(record) = self.chests.get(&task.pos) {
                    let owner_name = record.owner_name.clone();
                    self.holograms.create(world, &task.pos, &owner_name, remaining);
                }
            }
            TaskKind::CountdownTick { remaining } => {
                if self.chests.contains_key(&task.pos) {
                    self.holograms.update_timer(world, &task.pos, remaining);
                }
            }
            TaskKind::Break => {
                if self.chests.contains_key(&task.pos) {
                    self.break_chest(world, &task.pos);
                }
            }
        }
    }

    /// One poll step of the falling phase: materialize once the proxy
    /// lands, disappears, or the safety bound elapses.
    fn poll_falling(&mut self, world: &mut dyn HostWorld, pos: &BlockPos) {
        let (entity, ticks) = match self.falling.get_mut(pos) {
            Some(fc) => {
                fc.ticks += 1;
                (fc.entity, fc.ticks)
            }
            None => return,
        };

        let landed = match world.falling_block_state(entity) {
            FallingState::Landed => {
                world.remove_falling_block(entity);
                true
            }
            FallingState::Falling { y } if (y - f64::from(pos.y)).abs() < 1.0 => {
                world.remove_falling_block(entity);
                true
            }
            FallingState::Falling { .. } if ticks > MAX_FALL_TICKS => {
                warn!(%pos, "falling chest never landed, materializing in place");
                world.remove_falling_block(entity);
                true
            }
            FallingState::Falling { .. } => false,
            FallingState::Gone => {
                debug!(%pos, "falling chest proxy disappeared, materializing");
                true
            }
        };
        if !landed {
            return;
        }

        let Some(fc) = self.falling.remove(pos) else {
            return;
        };
        self.timers.cancel(fc.poll_handle);
        if let Err(err) = self.materialize(world, pos, fc.owner, &fc.owner_name, fc.items.clone()) {
            warn!(%pos, %err, "materialization after fall failed, scattering items");
            for item in fc.items {
                if let Err(err) = world.drop_item(pos, item, DROP_DAMPING) {
                    warn!(%pos, %err, "failed to scatter salvaged item");
                }
            }
        }
    }

    /// Drain every tracked chest and release every resource. The only
    /// blocking-until-complete operation; reentrant-safe, and a timer
    /// firing concurrently sees the shutdown flag and stands down.
    pub fn shutdown(&mut self, world: &mut dyn HostWorld) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        info!(
            chests = self.chests.len(),
            falling = self.falling.len(),
            "draining death chests"
        );

        // Abort in-flight falling chests, salvaging their items.
        let airborne: Vec<BlockPos> = self.falling.keys().cloned().collect();
        for pos in airborne {
            if let Some(fc) = self.falling.remove(&pos) {
                self.timers.cancel(fc.poll_handle);
                world.remove_falling_block(fc.entity);
                for item in fc.items {
                    if let Err(err) = world.drop_item(&pos, item, DROP_DAMPING) {
                        warn!(%pos, %err, "failed to salvage item on shutdown");
                    }
                }
            }
        }

        // Snapshot keys so the sweep never iterates the live map.
        let keys: Vec<BlockPos> = self.chests.keys().cloned().collect();
        for pos in keys {
            if world.is_chest(&pos) {
                self.break_chest(world, &pos);
            } else if let Some(record) = self.chests.remove(&pos) {
                for handle in record.task_handles {
                    self.timers.cancel(handle);
                }
                self.holograms.remove(world, &pos);
            }
        }

        // Force-clear everything even if individual entries failed.
        self.chests.clear();
        self.timers.clear();
        self.holograms.shutdown(world);
        info!("death chest drain complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{PlatformCapabilities, PlatformProfile};
    use deathchest_world::SimWorld;

    const ALICE: OwnerId = OwnerId(1);

    fn engine(tweak: impl FnOnce(&mut DeathChestConfig)) -> (ChestManager, SimWorld, WorldId) {
        let mut cfg = DeathChestConfig::default();
        cfg.chest.break_time = 5;
        cfg.falling.enabled = false;
        cfg.hologram.first_line = "%player%'s Loot".into();
        cfg.hologram.second_line = "%seconds%".into();
        cfg.messages.prefix = String::new();
        tweak(&mut cfg);

        let caps = PlatformCapabilities::new(PlatformProfile::Modern);
        let holograms =
            HologramTracker::new(&cfg.hologram, caps.supports(Capability::TextMarkers));
        let relay = MessageRelay::new(&cfg.messages, cfg.chest.announce);
        let manager = ChestManager::new(cfg, Box::new(caps), holograms, relay);

        let mut sim = SimWorld::new();
        let w = sim.add_world("overworld");
        (manager, sim, w)
    }

    fn advance(manager: &mut ChestManager, sim: &mut SimWorld, ticks: u64) {
        for _ in 0..ticks {
            sim.step();
            manager.tick(sim);
        }
    }

    fn sword() -> Vec<ItemStack> {
        vec![ItemStack::new("minecraft:diamond_sword", 1)]
    }

    fn sorted_names(items: &[ItemStack]) -> Vec<String> {
        let mut names: Vec<_> = items.iter().map(|i| i.item.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn tracked_exactly_between_create_and_break() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = BlockPos::new(w.clone(), 10, 64, 10);

        assert!(!manager.is_tracked(&pos));
        manager
            .create_chest(&mut sim, ALICE, "Alice", w, 10.3, 64.9, 10.1, sword())
            .unwrap();
        assert!(manager.is_tracked(&pos));
        assert_eq!(manager.owner_of(&pos), Some(ALICE));

        manager.break_chest(&mut sim, &pos);
        assert!(!manager.is_tracked(&pos));
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn second_break_is_noop() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 10.0, 64.0, 10.0, sword())
            .unwrap();

        manager.break_chest(&mut sim, &pos);
        let dropped_after_first = sim.dropped.len();
        manager.break_chest(&mut sim, &pos);

        assert_eq!(sim.dropped.len(), dropped_after_first);
        assert_eq!(dropped_after_first, 1);
    }

    #[test]
    fn alice_five_second_scenario() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 10.5, 64.2, 10.5, sword())
            .unwrap();
        assert_eq!(pos, BlockPos::new(pos.world.clone(), 10, 64, 10));

        // 4 seconds in: countdown line reads "1".
        advance(&mut manager, &mut sim, 4 * TICKS_PER_SECOND);
        assert_eq!(manager.current_tick(), 4 * TICKS_PER_SECOND);
        let countdown_text = sim.marker_updates.last().map(|(_, t)| t.clone());
        assert_eq!(countdown_text.as_deref(), Some("1"));
        assert!(manager.is_tracked(&pos));

        // 1 more second: chest destroyed, sword dropped, registry empty.
        advance(&mut manager, &mut sim, TICKS_PER_SECOND);
        assert!(!manager.is_tracked(&pos));
        assert!(!sim.is_chest(&pos));
        assert_eq!(sim.dropped.len(), 1);
        assert_eq!(sim.dropped[0].item.item, "minecraft:diamond_sword");
        assert_eq!(sim.dropped[0].pos, pos);
        assert_eq!(sim.marker_count(), 0);
    }

    #[test]
    fn countdown_updates_exactly_t_minus_one_decreasing() {
        let (mut manager, mut sim, w) = engine(|_| {});
        manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        advance(&mut manager, &mut sim, 6 * TICKS_PER_SECOND);

        let updates: Vec<&str> = sim.marker_updates.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(updates, vec!["4", "3", "2", "1"]);
    }

    #[test]
    fn immediate_break_cancels_pending_tasks() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        // Break before any timer fires.
        manager.break_chest(&mut sim, &pos);
        advance(&mut manager, &mut sim, 10 * TICKS_PER_SECOND);

        assert!(sim.marker_updates.is_empty());
        assert_eq!(sim.marker_count(), 0);
        assert_eq!(sim.dropped.len(), 1);
    }

    #[test]
    fn cancel_then_manual_break_never_double_fires() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();
        advance(&mut manager, &mut sim, 5); // hologram is up

        manager.cancel_break_tasks(&pos);
        manager.break_chest(&mut sim, &pos);
        let updates_at_break = sim.marker_updates.len();
        let dropped_at_break = sim.dropped.len();

        advance(&mut manager, &mut sim, 20 * TICKS_PER_SECOND);

        assert_eq!(sim.marker_updates.len(), updates_at_break);
        assert_eq!(sim.dropped.len(), dropped_at_break);
        assert_eq!(dropped_at_break, 1);
    }

    #[test]
    fn instant_break_fires_on_next_turn_only() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        assert!(manager.request_instant_break(&pos));
        assert!(manager.is_tracked(&pos)); // not yet — next turn

        advance(&mut manager, &mut sim, 1);
        assert!(!manager.is_tracked(&pos));
        assert_eq!(sim.dropped.len(), 1);

        // The cancelled terminal task never fires later.
        advance(&mut manager, &mut sim, 10 * TICKS_PER_SECOND);
        assert_eq!(sim.dropped.len(), 1);
    }

    #[test]
    fn instant_break_on_untracked_position_is_refused() {
        let (mut manager, _sim, w) = engine(|_| {});
        assert!(!manager.request_instant_break(&BlockPos::new(w, 0, 0, 0)));
    }

    #[test]
    fn items_preserved_as_multiset() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let items = vec![
            ItemStack::new("minecraft:diamond_sword", 1),
            ItemStack::new("minecraft:bread", 12),
            ItemStack::new("minecraft:bread", 3),
        ];
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, items.clone())
            .unwrap();
        manager.break_chest(&mut sim, &pos);

        let dropped: Vec<ItemStack> = sim.dropped.iter().map(|d| d.item.clone()).collect();
        assert_eq!(sorted_names(&dropped), sorted_names(&items));
    }

    #[test]
    fn overflow_scattered_at_creation() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let items: Vec<_> = (0..30).map(|i| ItemStack::new(&format!("item{i}"), 1)).collect();
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, items.clone())
            .unwrap();

        // 27 fit, 3 scattered immediately.
        assert_eq!(sim.dropped.len(), 3);

        manager.break_chest(&mut sim, &pos);
        let dropped: Vec<ItemStack> = sim.dropped.iter().map(|d| d.item.clone()).collect();
        assert_eq!(sorted_names(&dropped), sorted_names(&items));
    }

    #[test]
    fn create_at_tracked_position_rejected() {
        let (mut manager, mut sim, w) = engine(|_| {});
        manager
            .create_chest(&mut sim, ALICE, "Alice", w.clone(), 0.0, 64.0, 0.0, sword())
            .unwrap();
        let err = manager
            .create_chest(&mut sim, OwnerId(2), "Bob", w, 0.9, 64.9, 0.9, sword())
            .unwrap_err();
        assert!(matches!(err, ChestError::AlreadyTracked(_)));
    }

    #[test]
    fn create_with_empty_owner_rejected() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let err = manager
            .create_chest(&mut sim, ALICE, "", w, 0.0, 64.0, 0.0, sword())
            .unwrap_err();
        assert!(matches!(err, ChestError::InvalidOwner));
    }

    #[test]
    fn failed_materialization_leaves_no_state() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = BlockPos::new(w.clone(), 0, 64, 0);
        sim.place_solid(&pos, "minecraft:bedrock");

        let err = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap_err();
        assert!(matches!(err, ChestError::World(_)));
        assert!(!manager.is_tracked(&pos));

        // No timer ever fires for the failed key.
        advance(&mut manager, &mut sim, 10 * TICKS_PER_SECOND);
        assert!(sim.dropped.is_empty());
    }

    #[test]
    fn timer_arms_even_with_hologram_disabled() {
        let (mut manager, mut sim, w) = engine(|cfg| {
            cfg.hologram.enabled = false;
            cfg.chest.break_time = 3;
        });
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        advance(&mut manager, &mut sim, 3 * TICKS_PER_SECOND);

        assert!(!manager.is_tracked(&pos));
        assert_eq!(sim.dropped.len(), 1);
        assert_eq!(sim.marker_count(), 0);
        assert!(sim.marker_updates.is_empty());
    }

    #[test]
    fn falling_phase_materializes_on_landing() {
        let (mut manager, mut sim, w) = engine(|cfg| {
            cfg.falling.enabled = true;
            cfg.falling.height = 3;
        });
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        assert_eq!(manager.falling_count(), 1);
        assert!(!manager.is_tracked(&pos));
        assert!(!sim.is_chest(&pos));

        // A few ticks for the proxy to descend and land.
        advance(&mut manager, &mut sim, 5);
        assert_eq!(manager.falling_count(), 0);
        assert_eq!(sim.falling_count(), 0);
        assert!(manager.is_tracked(&pos));
        assert!(sim.is_chest(&pos));

        // Break schedule runs from materialization as usual.
        advance(&mut manager, &mut sim, 6 * TICKS_PER_SECOND);
        assert!(!manager.is_tracked(&pos));
        assert_eq!(sim.dropped.len(), 1);
    }

    #[test]
    fn falling_proxy_gone_materializes_immediately() {
        let (mut manager, mut sim, w) = engine(|cfg| {
            cfg.falling.enabled = true;
            cfg.falling.height = 20;
        });
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        // The host despawns the proxy out from under the engine.
        advance(&mut manager, &mut sim, 1);
        sim.invalidate_falling(deathchest_world::FallingBlockId(1));

        advance(&mut manager, &mut sim, 1);
        assert!(manager.is_tracked(&pos));
        assert!(sim.is_chest(&pos));
    }

    #[test]
    fn falling_safety_bound_forces_materialization() {
        let (mut manager, mut sim, w) = engine(|cfg| {
            cfg.falling.enabled = true;
            cfg.falling.height = 20;
        });
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        // Tick the engine without stepping sim physics: the proxy
        // hangs in the air until the safety bound trips.
        for _ in 0..=u64::from(MAX_FALL_TICKS) + 1 {
            manager.tick(&mut sim);
        }

        assert_eq!(manager.falling_count(), 0);
        assert!(manager.is_tracked(&pos));
    }

    #[test]
    fn failed_materialization_after_fall_scatters_items() {
        let (mut manager, mut sim, w) = engine(|cfg| {
            cfg.falling.enabled = true;
            cfg.falling.height = 20;
        });
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();

        // Landing site gets obstructed while the proxy is airborne.
        advance(&mut manager, &mut sim, 2);
        sim.place_solid(&pos, "minecraft:bedrock");
        advance(&mut manager, &mut sim, 25);

        assert_eq!(manager.falling_count(), 0);
        assert!(!manager.is_tracked(&pos));
        assert!(!sim.is_chest(&pos));
        assert_eq!(sim.dropped.len(), 1);
        assert_eq!(sim.dropped[0].item.item, "minecraft:diamond_sword");

        // No timer was ever armed for the failed key.
        advance(&mut manager, &mut sim, 10 * TICKS_PER_SECOND);
        assert_eq!(sim.dropped.len(), 1);
    }

    #[test]
    fn create_during_shutdown_rejected() {
        let (mut manager, mut sim, w) = engine(|_| {});
        manager.shutdown(&mut sim);
        let err = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap_err();
        assert!(matches!(err, ChestError::ShuttingDown));
    }

    #[test]
    fn shutdown_drains_everything() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let a = manager
            .create_chest(&mut sim, ALICE, "Alice", w.clone(), 0.0, 64.0, 0.0, sword())
            .unwrap();
        let b = manager
            .create_chest(
                &mut sim,
                OwnerId(2),
                "Bob",
                w.clone(),
                5.0,
                64.0,
                5.0,
                vec![ItemStack::new("minecraft:bread", 4)],
            )
            .unwrap();
        let c = manager
            .create_chest(
                &mut sim,
                OwnerId(3),
                "Carol",
                w,
                9.0,
                64.0,
                9.0,
                vec![ItemStack::new("minecraft:apple", 2)],
            )
            .unwrap();
        advance(&mut manager, &mut sim, 5);

        // Carol's chest was griefed away externally.
        sim.remove_block(&c);

        manager.shutdown(&mut sim);

        assert_eq!(manager.active_count(), 0);
        assert_eq!(sim.marker_count(), 0);
        assert!(!sim.is_chest(&a));
        assert!(!sim.is_chest(&b));
        let dropped = sorted_names(&sim.dropped.iter().map(|d| d.item.clone()).collect::<Vec<_>>());
        assert_eq!(
            dropped,
            vec!["minecraft:bread", "minecraft:diamond_sword"]
        );

        // A timer that would have fired later stays silent.
        advance(&mut manager, &mut sim, 20 * TICKS_PER_SECOND);
        assert_eq!(sim.dropped.len(), 2);
    }

    #[test]
    fn shutdown_salvages_airborne_chests() {
        let (mut manager, mut sim, w) = engine(|cfg| {
            cfg.falling.enabled = true;
            cfg.falling.height = 20;
        });
        manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();
        advance(&mut manager, &mut sim, 2); // still airborne

        manager.shutdown(&mut sim);

        assert_eq!(manager.falling_count(), 0);
        assert_eq!(sim.falling_count(), 0);
        assert_eq!(sim.dropped.len(), 1);
        assert_eq!(sim.dropped[0].item.item, "minecraft:diamond_sword");
    }

    #[test]
    fn shutdown_is_reentrant() {
        let (mut manager, mut sim, w) = engine(|_| {});
        manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();
        manager.shutdown(&mut sim);
        let dropped = sim.dropped.len();
        manager.shutdown(&mut sim);
        assert_eq!(sim.dropped.len(), dropped);
    }

    #[test]
    fn break_announces_through_relay() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();
        manager.break_chest(&mut sim, &pos);
        assert!(sim
            .broadcasts
            .iter()
            .any(|m| m.contains("Death chest is breaking!")));
    }

    #[test]
    fn break_plays_effect_and_sound() {
        let (mut manager, mut sim, w) = engine(|_| {});
        let pos = manager
            .create_chest(&mut sim, ALICE, "Alice", w, 0.0, 64.0, 0.0, sword())
            .unwrap();
        manager.break_chest(&mut sim, &pos);

        assert!(sim.effects.iter().any(|(p, e)| p == &pos && e == "smoke"));
        assert!(sim
            .sounds
            .iter()
            .any(|(p, s)| p == &pos && s == "block.wood.break"));
    }
}
