//! Engine facade and host event entry points.
//!
//! `DeathChest` is what a host embeds: `enable` validates config and
//! wires the subsystems together, the `on_*` methods are called from
//! the host's event handlers, `tick` drives the scheduler, and
//! `shutdown` drains everything.

use tracing::{debug, info, warn};

use deathchest_world::{BlockPos, HostWorld, ItemStack, WorldId};

use crate::capability::{Capability, CapabilityProvider, PlatformCapabilities, PlatformProfile};
use crate::config::DeathChestConfig;
use crate::error::ChestError;
use crate::hologram::HologramTracker;
use crate::manager::{ChestManager, OwnerId};
use crate::messages::MessageRelay;

/// Outcome of a block-break attempt on some position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAttempt {
    /// Not a tracked chest; the host handles the break normally.
    Unhandled,
    /// A tracked chest: the host must cancel its own break, the
    /// engine tears the chest down on its next tick.
    Intercepted,
}

pub struct DeathChest {
    manager: ChestManager,
}

impl DeathChest {
    /// Validate the configuration and bring the engine up. A config
    /// that fails validation refuses to enable rather than running
    /// with a broken timer policy.
    pub fn enable(cfg: DeathChestConfig, profile: PlatformProfile) -> Result<Self, ChestError> {
        cfg.validate()?;
        let caps = PlatformCapabilities::new(profile);
        caps.log_platform_info();

        let holograms =
            HologramTracker::new(&cfg.hologram, caps.supports(Capability::TextMarkers));
        let relay = MessageRelay::new(&cfg.messages, cfg.chest.announce);
        let manager = ChestManager::new(cfg, Box::new(caps), holograms, relay);

        info!("death chest engine enabled");
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &ChestManager {
        &self.manager
    }

    /// A player died: move their drops into a tracked chest at the
    /// death location and announce it. Returns the chest position, or
    /// `None` when nothing was stored; on failure the drops are
    /// scattered at the death location so items are never lost.
    #[allow(clippy::too_many_arguments)]
    pub fn on_player_death(
        &mut self,
        world: &mut dyn HostWorld,
        owner: OwnerId,
        owner_name: &str,
        world_id: WorldId,
        x: f64,
        y: f64,
        z: f64,
        drops: Vec<ItemStack>,
    ) -> Option<BlockPos> {
        if drops.iter().all(ItemStack::is_empty) {
            debug!(player = owner_name, "death with no drops, skipping chest");
            return None;
        }

        match self.manager.create_chest(
            world,
            owner,
            owner_name,
            world_id.clone(),
            x,
            y,
            z,
            drops.clone(),
        ) {
            Ok(pos) => {
                self.manager.announce_created(world, owner_name);
                Some(pos)
            }
            Err(err) => {
                let pos = BlockPos::containing(world_id, x, y, z);
                warn!(player = owner_name, %pos, %err, "chest creation failed, scattering drops");
                for item in drops {
                    if let Err(err) = world.drop_item(&pos, item, 0.5) {
                        warn!(%pos, %err, "failed to scatter drop");
                    }
                }
                None
            }
        }
    }

    /// Someone is breaking the block at `pos`. Tracked chests are
    /// always intercepted (the host cancels its own break); when
    /// instant break is permitted the engine runs the full teardown
    /// on its next tick, otherwise the chest just survives the hit.
    pub fn on_block_break_attempt(&mut self, pos: &BlockPos) -> BreakAttempt {
        if !self.manager.is_tracked(pos) {
            return BreakAttempt::Unhandled;
        }
        if self.manager.allow_instant_break() {
            self.manager.request_instant_break(pos);
        }
        BreakAttempt::Intercepted
    }

    /// Someone started hitting the block at `pos`. Returns whether
    /// the host should let a single hit break it, so players need not
    /// mine through a chest to claim their loot.
    pub fn on_block_damage(&mut self, pos: &BlockPos) -> bool {
        self.manager.allow_instant_break() && self.manager.is_tracked(pos)
    }

    /// Advance the engine one tick, firing due tasks.
    pub fn tick(&mut self, world: &mut dyn HostWorld) {
        self.manager.tick(world);
    }

    /// Drain every tracked chest and release all resources.
    pub fn shutdown(&mut self, world: &mut dyn HostWorld) {
        self.manager.shutdown(world);
    }
}
