//! Platform capability detection.
//!
//! Hosts differ in which sounds, effects, and entity kinds exist. The
//! engine never fails when a capability is missing; it asks the
//! provider and degrades by skipping the effect or feature.

use tracing::info;

/// A platform resource the engine would like to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ChestOpenSound,
    ChestCloseSound,
    BlockBreakSound,
    BreakEffect,
    /// Floating-text marker entities (holograms).
    TextMarkers,
    /// Falling-block proxy entities.
    FallingBlocks,
}

/// A resolved platform resource identifier (sound or effect name).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceId(pub &'static str);

/// Best-effort resource resolution. `None` means "not on this
/// platform"; callers skip the effect rather than erroring.
pub trait CapabilityProvider {
    fn try_resolve(&self, cap: Capability) -> Option<ResourceId>;

    /// Whether a feature-shaped capability is available at all.
    fn supports(&self, cap: Capability) -> bool;
}

/// Host platform generations with materially different resource sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformProfile {
    /// Current platforms: namespaced sounds, full entity support.
    #[default]
    Modern,
    /// Older platforms: flat sound names, full entity support.
    Legacy,
    /// Oldest supported platforms: click-only sounds, no text markers.
    Minimal,
}

/// Capability provider backed by a static per-profile table.
#[derive(Debug, Default)]
pub struct PlatformCapabilities {
    profile: PlatformProfile,
}

impl PlatformCapabilities {
    pub fn new(profile: PlatformProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> PlatformProfile {
        self.profile
    }

    /// Log what this platform can and cannot do.
    pub fn log_platform_info(&self) {
        info!(
            profile = ?self.profile,
            text_markers = self.supports(Capability::TextMarkers),
            falling_blocks = self.supports(Capability::FallingBlocks),
            break_effect = self.supports(Capability::BreakEffect),
            "platform capabilities"
        );
    }
}

impl CapabilityProvider for PlatformCapabilities {
    fn try_resolve(&self, cap: Capability) -> Option<ResourceId> {
        use Capability::*;
        use PlatformProfile::*;
        let name = match (self.profile, cap) {
            (Modern, ChestOpenSound) => "block.chest.open",
            (Modern, ChestCloseSound) => "block.chest.close",
            (Modern, BlockBreakSound) => "block.wood.break",
            (Modern, BreakEffect) => "smoke",
            (Legacy, ChestOpenSound) => "chest.open",
            (Legacy, ChestCloseSound) => "chest.close",
            (Legacy, BlockBreakSound) => "dig.wood",
            (Legacy, BreakEffect) => "smoke",
            (Minimal, ChestOpenSound | ChestCloseSound | BlockBreakSound) => "random.click",
            (Minimal, BreakEffect) => return None,
            (_, TextMarkers | FallingBlocks) => return None,
        };
        Some(ResourceId(name))
    }

    fn supports(&self, cap: Capability) -> bool {
        use Capability::*;
        match cap {
            TextMarkers => self.profile != PlatformProfile::Minimal,
            FallingBlocks => true,
            _ => self.try_resolve(cap).is_some(),
        }
    }
}
