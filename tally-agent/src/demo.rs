//! Example host: a simulated fighter.
//!
//! Fights one target at a time, eats when health runs low, levels up as
//! experience accumulates, and reports through a `SessionSync`. The operator
//! can switch food from the dashboard.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_core::{per_hour, MetricValue, SessionState, Severity, SharedValue};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::host::{Host, SessionSetup};
use crate::session::SessionSync;

pub const FOOD_OPTIONS: [&str; 3] = ["Lobster", "Salmon", "Orange"];

const CYCLES_PER_KILL: u64 = 3;
const XP_PER_KILL: u64 = 40;
const XP_PER_LEVEL: u64 = 200;
const DAMAGE_PER_CYCLE: u32 = 15;
const EAT_BELOW: u32 = 50;

fn heal_amount(food: &str) -> u32 {
    match food {
        "Lobster" => 12,
        "Salmon" => 9,
        _ => 4,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUp {
    pub skill: &'static str,
    pub level: u32,
}

pub struct FighterDemo {
    alias: String,
    started: Instant,
    food: SharedValue<String>,
    status: SharedValue<String>,
    cycles: AtomicU64,
    kills: AtomicU64,
    experience: AtomicU64,
    health: AtomicU32,
    level: AtomicU32,
    in_combat: AtomicBool,
}

impl FighterDemo {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            started: Instant::now(),
            food: SharedValue::new(FOOD_OPTIONS[0].to_string()),
            status: SharedValue::new("Starting".to_string()),
            cycles: AtomicU64::new(0),
            kills: AtomicU64::new(0),
            experience: AtomicU64::new(0),
            health: AtomicU32::new(100),
            level: AtomicU32::new(1),
            in_combat: AtomicBool::new(false),
        }
    }

    /// Metric producers and the "Food" action for this host.
    pub fn setup(self: &Arc<Self>) -> SessionSetup {
        let food = self.food.clone();
        let health = Arc::clone(self);
        let experience = Arc::clone(self);
        let experience_rate = Arc::clone(self);
        let kills = Arc::clone(self);
        let kill_rate = Arc::clone(self);
        let selected = self.food.clone();

        SessionSetup::new()
            .action("Food", "Select", &FOOD_OPTIONS, move |choice| {
                selected.set(choice.to_string());
                tracing::info!(food = choice, "Operator selected food");
            })
            .metric("Current food", move || food.get())
            .metric("Health", move || {
                MetricValue::Percent(health.health.load(Ordering::SeqCst).into())
            })
            .metric("Experience", move || {
                experience.experience.load(Ordering::SeqCst)
            })
            .metric("Experience p/h", move || {
                let xp = experience_rate.experience.load(Ordering::SeqCst) as f64;
                per_hour(xp, experience_rate.elapsed_ms())
            })
            .metric("Kills", move || kills.kills.load(Ordering::SeqCst))
            .metric("Kills p/h", move || {
                let n = kill_rate.kills.load(Ordering::SeqCst) as f64;
                per_hour(n, kill_rate.elapsed_ms())
            })
    }

    /// Never stop in the middle of a fight.
    pub fn is_safe_to_stop(&self) -> bool {
        !self.in_combat.load(Ordering::SeqCst)
    }

    pub fn current_food(&self) -> String {
        self.food.get()
    }

    pub fn kills(&self) -> u64 {
        self.kills.load(Ordering::SeqCst)
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Advance the simulation by one game cycle.
    pub fn step(&self) -> Option<LevelUp> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;

        if self.health.load(Ordering::SeqCst) < EAT_BELOW {
            let food = self.food.get();
            let healed = heal_amount(&food);
            let health = (self.health.load(Ordering::SeqCst) + healed).min(100);
            self.health.store(health, Ordering::SeqCst);
            self.status.set(format!("Eating {}", food));
            return None;
        }

        if cycle % CYCLES_PER_KILL != 0 {
            self.in_combat.store(true, Ordering::SeqCst);
            let health = self.health.load(Ordering::SeqCst).saturating_sub(DAMAGE_PER_CYCLE);
            self.health.store(health, Ordering::SeqCst);
            self.status.set("Fighting".to_string());
            return None;
        }

        self.in_combat.store(false, Ordering::SeqCst);
        self.kills.fetch_add(1, Ordering::SeqCst);
        let xp = self.experience.fetch_add(XP_PER_KILL, Ordering::SeqCst) + XP_PER_KILL;
        self.status.set("Looking for a target".to_string());

        let level = u32::try_from(xp / XP_PER_LEVEL + 1).unwrap_or(u32::MAX);
        if level > self.level.swap(level, Ordering::SeqCst) {
            return Some(LevelUp {
                skill: "Attack",
                level,
            });
        }
        None
    }

    /// Drive the simulation until the session stops or shutdown fires.
    pub async fn run(
        self: Arc<Self>,
        session: SessionSync,
        cycle: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = interval(cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match session.state() {
                        Some(SessionState::Running) => {}
                        Some(SessionState::Paused) => continue,
                        Some(SessionState::Stopped) | None => break,
                    }
                    if let Some(LevelUp { skill, level }) = self.step() {
                        session.send_notification(
                            "Level up!",
                            format!("{} is now {}!", skill, level),
                            Severity::Information,
                        );
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!(kills = self.kills(), "Fighter demo finished");
    }
}

impl Host for FighterDemo {
    fn account_alias(&self) -> String {
        self.alias.clone()
    }

    fn status(&self) -> String {
        self.status.get()
    }

    fn on_remote_pause(&self) {
        self.status.set("Paused from the dashboard".to_string());
    }

    fn on_remote_stop(&self, reason: &str) {
        self.status.set(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fighter_levels_up_and_reports_it_once() {
        let demo = FighterDemo::new("alias");
        let mut level_ups = Vec::new();
        for _ in 0..60 {
            if let Some(up) = demo.step() {
                level_ups.push(up);
            }
        }

        assert!(demo.kills() > 0);
        assert!(!level_ups.is_empty());
        let levels: Vec<u32> = level_ups.iter().map(|u| u.level).collect();
        let mut sorted = levels.clone();
        sorted.dedup();
        assert_eq!(levels, sorted, "each level is announced once");
        assert_eq!(level_ups[0].level, 2);
    }

    #[test]
    fn test_not_safe_to_stop_mid_fight() {
        let demo = FighterDemo::new("alias");
        demo.step();
        assert!(!demo.is_safe_to_stop(), "first cycle starts a fight");
        demo.step();
        demo.step();
        assert!(demo.is_safe_to_stop(), "third cycle lands a kill");
    }

    #[test]
    fn test_food_action_updates_next_snapshot() {
        let demo = Arc::new(FighterDemo::new("alias"));
        let setup = demo.setup();

        assert_eq!(
            setup.metrics.snapshot().get("Current food"),
            Some(&MetricValue::Text("Lobster".to_string()))
        );

        setup.actions.select("Food", "Salmon").unwrap();

        assert_eq!(demo.current_food(), "Salmon");
        assert_eq!(
            setup.metrics.snapshot().get("Current food"),
            Some(&MetricValue::Text("Salmon".to_string()))
        );
    }

    #[test]
    fn test_rates_are_zero_without_kills() {
        let demo = Arc::new(FighterDemo::new("alias"));
        let snapshot = demo.setup().metrics.snapshot();
        assert_eq!(snapshot.get("Kills p/h"), Some(&MetricValue::Number(0.0)));
        assert_eq!(snapshot.get("Health"), Some(&MetricValue::Percent(100.0)));
    }
}
