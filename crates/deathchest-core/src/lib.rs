//! Death chest lifecycle engine.
//!
//! When a player dies, their drops move into a tracked chest at the
//! death location. A countdown display hovers above it, and after a
//! configurable delay (or one interaction) the chest is destroyed and
//! its contents scattered. The engine is host-agnostic: it drives any
//! [`deathchest_world::HostWorld`] implementation and runs on a
//! cooperative tick loop with no internal locking.
//!
//! Hosts embed [`plugin::DeathChest`]: wire its `on_*` methods into
//! the event system, call `tick` every game tick, and `shutdown` on
//! the way out.

pub mod capability;
pub mod config;
pub mod error;
pub mod hologram;
pub mod manager;
pub mod messages;
pub mod plugin;
pub mod timer;

pub use capability::{Capability, CapabilityProvider, PlatformCapabilities, PlatformProfile};
pub use config::{ConfigError, DeathChestConfig};
pub use error::ChestError;
pub use manager::{ChestManager, OwnerId, MAX_FALL_TICKS};
pub use plugin::{BreakAttempt, DeathChest};
pub use timer::{TaskHandle, TaskKind, TimerQueue, TICKS_PER_SECOND};
