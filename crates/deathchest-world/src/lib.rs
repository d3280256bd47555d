//! Host-world interface layer for the death-chest engine.
//!
//! The engine never talks to a real server directly; everything it
//! needs from the host (block mutation, entity spawning, item physics,
//! effects, chat) goes through the [`HostWorld`] trait. [`SimWorld`]
//! is the in-memory reference host used by the headless binary and by
//! the test suites.

pub mod item;
pub mod position;
pub mod sim;

pub use item::{ItemStack, CHEST_SLOTS};
pub use position::{BlockPos, WorldId};
pub use sim::SimWorld;

use thiserror::Error;

/// Errors surfaced by host-world operations.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown world: {0}")]
    UnknownWorld(String),

    #[error("position {0} is obstructed")]
    Obstructed(BlockPos),

    #[error("no container at {0}")]
    NoContainer(BlockPos),

    #[error("entity spawn failed: {0}")]
    SpawnFailed(String),
}

/// Handle to a falling-block proxy entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FallingBlockId(pub u64);

/// Handle to a floating-text marker entity (no physics, custom name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// Observed state of a falling-block proxy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallingState {
    /// Still airborne at the given Y coordinate.
    Falling { y: f64 },
    /// Came to rest on a surface.
    Landed,
    /// Removed or otherwise invalidated by the host.
    Gone,
}

/// Everything the engine consumes from the host runtime.
///
/// All methods are fire-and-forget from the engine's point of view:
/// none of them block, and the fallible ones report errors the engine
/// either propagates (materialization) or logs and skips (best-effort
/// side effects).
pub trait HostWorld {
    /// Place a chest block. Fails if the world is unknown or the
    /// position is occupied by a block the host refuses to replace.
    fn place_chest(&mut self, pos: &BlockPos) -> Result<(), WorldError>;

    /// Whether a chest block currently exists at `pos`.
    fn is_chest(&self, pos: &BlockPos) -> bool;

    /// Remove the block at `pos`, leaving air. No-op on air.
    fn remove_block(&mut self, pos: &BlockPos);

    /// Insert items into the container at `pos`, one stack per free
    /// slot. Returns the stacks that did not fit.
    fn insert_chest_items(
        &mut self,
        pos: &BlockPos,
        items: Vec<ItemStack>,
    ) -> Result<Vec<ItemStack>, WorldError>;

    /// Remove and return the container's contents. Empty if the
    /// container was emptied externally.
    fn take_chest_items(&mut self, pos: &BlockPos) -> Result<Vec<ItemStack>, WorldError>;

    /// Spawn a falling chest proxy `height` blocks above `pos`.
    fn spawn_falling_chest(
        &mut self,
        pos: &BlockPos,
        height: i32,
    ) -> Result<FallingBlockId, WorldError>;

    /// Observe a falling proxy. `Gone` for ids the host no longer knows.
    fn falling_block_state(&self, id: FallingBlockId) -> FallingState;

    /// Despawn a falling proxy. No-op on stale ids.
    fn remove_falling_block(&mut self, id: FallingBlockId);

    /// Spawn a floating-text marker at fractional coordinates.
    fn spawn_text_marker(
        &mut self,
        world: &WorldId,
        x: f64,
        y: f64,
        z: f64,
        text: &str,
    ) -> Result<MarkerId, WorldError>;

    /// Replace a marker's text. Returns `false` for stale ids.
    fn set_marker_text(&mut self, id: MarkerId, text: &str) -> bool;

    /// Despawn a marker. Returns `false` for stale ids.
    fn remove_marker(&mut self, id: MarkerId) -> bool;

    /// Drop an item into the world near `pos` with natural scatter,
    /// its velocity scaled by `damping`.
    fn drop_item(
        &mut self,
        pos: &BlockPos,
        item: ItemStack,
        damping: f64,
    ) -> Result<(), WorldError>;

    /// Play a positional visual effect.
    fn play_effect(&mut self, pos: &BlockPos, effect: &str) -> Result<(), WorldError>;

    /// Play a positional sound.
    fn play_sound(
        &mut self,
        pos: &BlockPos,
        sound: &str,
        volume: f32,
        pitch: f32,
    ) -> Result<(), WorldError>;

    /// Broadcast a chat message to every player.
    fn broadcast(&mut self, message: &str);
}
