//! World identifiers and block positions.
//!
//! A `BlockPos` is the canonical map key for everything the engine
//! tracks: two fractional positions inside the same block always
//! normalize to an equal key, so lookups agree no matter which event
//! handler produced the coordinates.

use std::fmt;
use std::sync::Arc;

/// Identifier of a world (dimension). Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorldId(Arc<str>);

impl WorldId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer block position plus owning world. Structural equality and
/// hashing; immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// Normalize fractional coordinates to the containing block.
    ///
    /// Uses `floor`, not truncation: `-0.5` is inside block `-1`.
    pub fn containing(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            x: x.floor() as i32,
            y: y.floor() as i32,
            z: z.floor() as i32,
        }
    }

    /// Center of the block's top face in fractional coordinates,
    /// offset upward by `height`. Used for hologram placement.
    pub fn centered_above(&self, height: f64) -> (f64, f64, f64) {
        (
            self.x as f64 + 0.5,
            self.y as f64 + height,
            self.z as f64 + 0.5,
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {},{},{}", self.world, self.x, self.y, self.z)
    }
}
