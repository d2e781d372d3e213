use log::{info, warn};
use std::time::Duration;

/// Restart bookkeeping for a component that is rebuilt after every fault.
///
/// Restarts are never refused; consecutive faults only stretch the pause
/// before the next attempt.
#[derive(Clone, Debug)]
pub struct RestartState {
    pub name: String,
    pub attempts: u32,
    pub base_cooldown: Duration,
    pub current_cooldown: Duration,
    pub max_cooldown: Duration,
    /// A run lasting at least this long counts as recovered
    pub stable_after: Duration,
}

impl RestartState {
    pub fn new(name: &str, base_cooldown: Duration, max_cooldown: Duration, stable_after: Duration) -> Self {
        RestartState {
            name: name.to_string(),
            attempts: 0,
            base_cooldown,
            current_cooldown: base_cooldown,
            max_cooldown,
            stable_after,
        }
    }

    /// Record a fault after `uptime` of running; returns how long to wait
    /// before restarting.
    pub fn record_failed_attempt(&mut self, uptime: Duration) -> Duration {
        if uptime >= self.stable_after && self.attempts > 0 {
            self.record_success();
        }

        let delay = self.current_cooldown;
        self.attempts += 1;

        // Exponential backoff: multiply cooldown by 1.5 each time, capped
        self.current_cooldown = Duration::from_secs_f64(
            (self.current_cooldown.as_secs_f64() * 1.5).min(self.max_cooldown.as_secs_f64()),
        );

        warn!(
            "[RESTART] {} fault #{}, restarting in {:.1}s",
            self.name,
            self.attempts,
            delay.as_secs_f64()
        );
        delay
    }

    /// Reset after a stable run
    pub fn record_success(&mut self) {
        info!(
            "[RESTART] {} stable again after {} restart(s)",
            self.name, self.attempts
        );
        self.attempts = 0;
        self.current_cooldown = self.base_cooldown;
    }

    pub fn status(&self) -> String {
        if self.attempts == 0 {
            return format!("{}: OK", self.name);
        }
        format!(
            "{}: RESTARTED {} time(s), next cooldown {:.1}s",
            self.name,
            self.attempts,
            self.current_cooldown.as_secs_f64()
        )
    }
}

impl Default for RestartState {
    fn default() -> Self {
        // 1 s base, backing off to 30 s; a minute of clean sampling resets it
        Self::new(
            "Scheduler",
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_secs(60),
        )
    }
}
