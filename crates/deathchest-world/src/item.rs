//! Item stacks as seen by the death-chest engine.
//!
//! The engine only moves item collections in and out of a container;
//! it never inspects them beyond emptiness, so a stack is a name plus
//! a count.

/// Number of slots in a single chest.
pub const CHEST_SLOTS: usize = 27;

/// A stack of one item type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemStack {
    pub item: String,
    pub count: u16,
}

impl ItemStack {
    pub fn new(item: &str, count: u16) -> Self {
        Self {
            item: item.to_string(),
            count,
        }
    }

    /// A stack with zero count or an empty name carries nothing.
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.item.is_empty()
    }
}
