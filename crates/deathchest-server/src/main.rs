//! Headless demo server.
//!
//! Runs the death chest engine against the in-memory world on a 50ms
//! tick loop, with a console for simulating deaths and block breaks.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use deathchest_core::{BreakAttempt, DeathChest, DeathChestConfig, OwnerId, PlatformProfile};
use deathchest_world::{BlockPos, ItemStack, SimWorld, WorldId};

const CONFIG_PATH: &str = "deathchest.toml";

struct Session {
    plugin: DeathChest,
    sim: SimWorld,
    world: WorldId,
    next_owner: i64,
}

impl Session {
    fn new(plugin: DeathChest) -> Self {
        let mut sim = SimWorld::new();
        let world = sim.add_world("overworld");
        Self {
            plugin,
            sim,
            world,
            next_owner: 0,
        }
    }

    fn tick(&mut self) {
        self.sim.step();
        self.plugin.tick(&mut self.sim);
        for message in self.sim.drain_broadcasts() {
            info!(target: "chat", "{message}");
        }
    }

    fn simulate_death(&mut self, name: &str) {
        let mut rng = rand::thread_rng();
        let x = rng.gen_range(-32.0..32.0);
        let z = rng.gen_range(-32.0..32.0);
        self.next_owner += 1;
        let drops = vec![
            ItemStack::new("minecraft:diamond_sword", 1),
            ItemStack::new("minecraft:bread", rng.gen_range(1..=12)),
        ];
        let created = self.plugin.on_player_death(
            &mut self.sim,
            OwnerId(self.next_owner),
            name,
            self.world.clone(),
            x,
            64.0,
            z,
            drops,
        );
        match created {
            Some(pos) => info!("{name} died at {pos}"),
            None => warn!("no chest created for {name}"),
        }
    }

    fn attempt_break(&mut self, x: i32, y: i32, z: i32) {
        let pos = BlockPos::new(self.world.clone(), x, y, z);
        match self.plugin.on_block_break_attempt(&pos) {
            BreakAttempt::Intercepted => info!("break intercepted at {pos}"),
            BreakAttempt::Unhandled => info!("nothing tracked at {pos}"),
        }
    }

    fn list(&self) {
        let tracked: Vec<_> = self.plugin.manager().iter().collect();
        if tracked.is_empty() {
            info!("no tracked chests");
            return;
        }
        for (pos, owner) in tracked {
            info!("{pos} owned by {owner}");
        }
    }

    /// Returns `true` when the session should stop.
    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("die") => {
                let name = parts.next().unwrap_or("Steve").to_string();
                self.simulate_death(&name);
            }
            Some("break") => {
                let coords: Vec<i32> = parts.filter_map(|p| p.parse().ok()).collect();
                match coords[..] {
                    [x, y, z] => self.attempt_break(x, y, z),
                    _ => warn!("usage: break <x> <y> <z>"),
                }
            }
            Some("list") => self.list(),
            Some("stop") => return true,
            Some(other) => warn!("unknown command: {other} (die, break, list, stop)"),
            None => {}
        }
        false
    }

    fn shutdown(&mut self) {
        self.plugin.shutdown(&mut self.sim);
        for message in self.sim.drain_broadcasts() {
            info!(target: "chat", "{message}");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = if Path::new(CONFIG_PATH).exists() {
        match DeathChestConfig::load(CONFIG_PATH) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load {CONFIG_PATH}: {e}");
                std::process::exit(1);
            }
        }
    } else {
        DeathChestConfig::default()
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "DeathChest demo server v{} starting",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "Break time: {}s, falling: {}, holograms: {}",
        config.chest.break_time, config.falling.enabled, config.hologram.enabled
    );

    let plugin = match DeathChest::enable(config, PlatformProfile::Modern) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to enable engine: {e}");
            std::process::exit(1);
        }
    };
    let mut session = Session::new(plugin);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Console: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    info!("Console ready (die [name], break <x> <y> <z>, list, stop)");

    let mut tick_interval = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                session.tick();
            }
            Some(line) = console_rx.recv() => {
                if session.handle_command(&line) {
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Draining tracked chests before shutdown...");
    session.shutdown();
    info!("Server shut down.");
}
