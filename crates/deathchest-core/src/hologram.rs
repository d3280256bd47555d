//! Floating-text status displays above tracked chests.
//!
//! The tracker owns every marker entity it spawns, keyed by chest
//! position. The lifecycle manager never touches marker entities
//! directly; it asks the tracker, and removal is idempotent so racing
//! teardown paths are safe.

use std::collections::HashMap;

use tracing::{debug, warn};

use deathchest_world::{BlockPos, HostWorld, MarkerId};

use crate::config::HologramSection;
use crate::messages::translate_color_codes;

/// Index of the countdown line within a display's marker list.
const TIMER_LINE: usize = 1;

pub struct HologramTracker {
    cfg: HologramSection,
    /// Config flag AND platform support; when false every call is a no-op.
    enabled: bool,
    active: HashMap<BlockPos, Vec<MarkerId>>,
}

impl HologramTracker {
    pub fn new(cfg: &HologramSection, platform_has_markers: bool) -> Self {
        Self {
            enabled: cfg.enabled && platform_has_markers,
            cfg: cfg.clone(),
            active: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of chests with a live display.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn first_line(&self, owner_name: &str) -> String {
        translate_color_codes(&self.cfg.first_line.replace("%player%", owner_name))
    }

    fn second_line(&self, seconds: u32) -> String {
        translate_color_codes(&self.cfg.second_line.replace("%seconds%", &seconds.to_string()))
    }

    /// Spawn the title and countdown lines above `pos`. Returns `true`
    /// when a display is now tracked; on spawn failure anything
    /// partially created is removed and `false` is returned.
    pub fn create(
        &mut self,
        world: &mut dyn HostWorld,
        pos: &BlockPos,
        owner_name: &str,
        seconds: u32,
    ) -> bool {
        if !self.enabled || self.active.contains_key(pos) {
            return false;
        }

        let (x, y, z) = pos.centered_above(self.cfg.height);
        let lines = [
            (y, self.first_line(owner_name)),
            (y - self.cfg.line_spacing, self.second_line(seconds)),
        ];

        let mut spawned = Vec::with_capacity(lines.len());
        for (line_y, text) in &lines {
            match world.spawn_text_marker(&pos.world, x, *line_y, z, text) {
                Ok(id) => spawned.push(id),
                Err(err) => {
                    warn!(%pos, %err, "failed to spawn hologram line");
                    for id in spawned {
                        world.remove_marker(id);
                    }
                    return false;
                }
            }
        }

        debug!(%pos, lines = spawned.len(), "created hologram");
        self.active.insert(pos.clone(), spawned);
        true
    }

    /// Update only the countdown line. Stale or missing displays are a
    /// silent no-op.
    pub fn update_timer(&mut self, world: &mut dyn HostWorld, pos: &BlockPos, seconds: u32) {
        let Some(lines) = self.active.get(pos) else {
            return;
        };
        let Some(&timer) = lines.get(TIMER_LINE) else {
            return;
        };
        let text = self.second_line(seconds);
        if !world.set_marker_text(timer, &text) {
            debug!(%pos, "countdown marker is stale");
        }
    }

    /// Destroy every line of the display at `pos`. Safe to call twice.
    pub fn remove(&mut self, world: &mut dyn HostWorld, pos: &BlockPos) -> bool {
        match self.active.remove(pos) {
            Some(lines) => {
                for id in lines {
                    world.remove_marker(id);
                }
                true
            }
            None => false,
        }
    }

    /// Remove every tracked display.
    pub fn shutdown(&mut self, world: &mut dyn HostWorld) {
        let count = self.active.len();
        for (_, lines) in self.active.drain() {
            for id in lines {
                world.remove_marker(id);
            }
        }
        if count > 0 {
            debug!(count, "removed holograms on shutdown");
        }
    }
}
