//! Lifecycle chat announcements.
//!
//! The engine notifies players at exactly two points: when a chest is
//! created and when one breaks. Templates come from `[messages]` and
//! use legacy `&`-style color codes.

use tracing::debug;

use deathchest_world::HostWorld;

use crate::config::MessagesSection;

/// Translate `&`-style color codes to the section-sign codes the host
/// chat layer understands. An `&` not followed by a valid code is kept
/// as-is.
pub fn translate_color_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' {
            match chars.peek() {
                Some(&next) if "0123456789abcdefklmnor".contains(next.to_ascii_lowercase()) => {
                    out.push('\u{00a7}');
                    out.push(next);
                    chars.next();
                }
                _ => out.push('&'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Formats and broadcasts lifecycle messages.
pub struct MessageRelay {
    prefix: String,
    created: String,
    broken: String,
    announce: bool,
}

impl MessageRelay {
    pub fn new(messages: &MessagesSection, announce: bool) -> Self {
        Self {
            prefix: messages.prefix.clone(),
            created: messages.created.clone(),
            broken: messages.broken.clone(),
            announce,
        }
    }

    /// Announce a freshly created chest. Gated by the announce flag.
    pub fn announce_created(&self, world: &mut dyn HostWorld, player_name: &str, break_time: u32) {
        if !self.announce {
            return;
        }
        let message = self
            .created
            .replace("%player%", player_name)
            .replace("%time%", &break_time.to_string());
        self.broadcast(world, &message);
    }

    /// Announce a chest breaking. An empty template disables this.
    pub fn announce_broken(&self, world: &mut dyn HostWorld) {
        if self.broken.is_empty() {
            return;
        }
        let message = self.broken.clone();
        self.broadcast(world, &message);
    }

    fn broadcast(&self, world: &mut dyn HostWorld, message: &str) {
        let full = translate_color_codes(&format!("{}{}", self.prefix, message));
        debug!(message = %full, "broadcasting lifecycle message");
        world.broadcast(&full);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deathchest_world::SimWorld;

    fn relay(announce: bool) -> MessageRelay {
        let messages = MessagesSection {
            prefix: "&7[DC] ".into(),
            created: "&c%player% died, chest breaks in %time%s".into(),
            broken: "chest broke".into(),
        };
        MessageRelay::new(&messages, announce)
    }

    #[test]
    fn translates_color_codes() {
        assert_eq!(translate_color_codes("&cred &ltext"), "\u{00a7}cred \u{00a7}ltext");
        assert_eq!(translate_color_codes("a && b"), "a && b");
        assert_eq!(translate_color_codes("trailing &"), "trailing &");
        assert_eq!(translate_color_codes("plain"), "plain");
    }

    #[test]
    fn created_message_substitutes() {
        let mut sim = SimWorld::with_world("overworld");
        relay(true).announce_created(&mut sim, "Alice", 10);
        assert_eq!(
            sim.broadcasts,
            vec!["\u{00a7}7[DC] \u{00a7}cAlice died, chest breaks in 10s"]
        );
    }

    #[test]
    fn announce_flag_silences_created() {
        let mut sim = SimWorld::with_world("overworld");
        relay(false).announce_created(&mut sim, "Alice", 10);
        assert!(sim.broadcasts.is_empty());
    }

    #[test]
    fn broken_message_sent_with_prefix() {
        let mut sim = SimWorld::with_world("overworld");
        relay(true).announce_broken(&mut sim);
        assert_eq!(sim.broadcasts, vec!["\u{00a7}7[DC] chest broke"]);
    }

    #[test]
    fn empty_broken_template_is_silent() {
        let mut sim = SimWorld::with_world("overworld");
        let messages = MessagesSection {
            prefix: "[DC] ".into(),
            created: "x".into(),
            broken: String::new(),
        };
        MessageRelay::new(&messages, true).announce_broken(&mut sim);
        assert!(sim.broadcasts.is_empty());
    }
}
