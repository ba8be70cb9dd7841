use tracing::info;

/// Remaining-seconds thresholds that emit a warning on the way down.
const WARN_AT: [u32; 2] = [60, 30];

/// What a one-second tick observed. The caller turns warnings and expiry
/// into notifications and playback changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Idle,
    Running { remaining: u32 },
    Warning { remaining: u32 },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub is_active: bool,
    pub remaining_seconds: u32,
}

/// Single process-wide countdown: Idle until armed, then driven by the
/// caller's one-second ticks until expiry or cancellation. Arming always
/// replaces a previous countdown, never stacks on it.
#[derive(Debug, Default)]
pub struct SleepTimer {
    remaining: Option<u32>,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining.unwrap_or(0)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            is_active: self.is_armed(),
            remaining_seconds: self.remaining_seconds(),
        }
    }

    pub fn set(&mut self, minutes: u32) {
        self.remaining = Some(minutes.saturating_mul(60));
        info!(minutes, "sleep timer armed");
    }

    /// Returns whether a countdown was actually running, so the caller can
    /// skip the cancellation notice when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.remaining.take().is_some();
        if was_armed {
            info!("sleep timer cancelled");
        }
        was_armed
    }

    /// Adds to a running countdown; returns false while Idle.
    pub fn extend(&mut self, minutes: u32) -> bool {
        match &mut self.remaining {
            Some(remaining) => {
                *remaining = remaining.saturating_add(minutes.saturating_mul(60));
                info!(minutes, "sleep timer extended");
                true
            }
            None => false,
        }
    }

    pub fn tick_second(&mut self) -> TimerTick {
        let Some(remaining) = &mut self.remaining else {
            return TimerTick::Idle;
        };

        *remaining = remaining.saturating_sub(1);
        let now = *remaining;

        if now == 0 {
            self.remaining = None;
            info!("sleep timer expired");
            return TimerTick::Expired;
        }

        if WARN_AT.contains(&now) {
            return TimerTick::Warning { remaining: now };
        }

        TimerTick::Running { remaining: now }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_replaces_a_previous_countdown() {
        let mut timer = SleepTimer::new();
        timer.set(30);
        timer.set(5);
        assert_eq!(timer.remaining_seconds(), 5 * 60);
    }

    #[test]
    fn extend_adds_to_a_running_countdown() {
        let mut timer = SleepTimer::new();
        timer.set(5);
        assert!(timer.extend(2));
        assert_eq!(timer.remaining_seconds(), 7 * 60);
    }

    #[test]
    fn extend_while_idle_returns_false() {
        let mut timer = SleepTimer::new();
        assert!(!timer.extend(2));
        assert!(!timer.is_armed());
    }

    #[test]
    fn cancel_reports_whether_a_countdown_ran() {
        let mut timer = SleepTimer::new();
        assert!(!timer.cancel());

        timer.set(1);
        assert!(timer.cancel());
        assert!(!timer.is_armed());
    }

    #[test]
    fn countdown_warns_at_sixty_and_thirty_seconds() {
        let mut timer = SleepTimer::new();
        timer.set(2);

        let mut warnings = Vec::new();
        for _ in 0..119 {
            if let TimerTick::Warning { remaining } = timer.tick_second() {
                warnings.push(remaining);
            }
        }

        assert_eq!(warnings, vec![60, 30]);
        assert!(timer.is_armed());
    }

    #[test]
    fn countdown_expires_and_returns_to_idle() {
        let mut timer = SleepTimer::new();
        timer.set(1);

        for _ in 0..59 {
            assert_ne!(timer.tick_second(), TimerTick::Expired);
        }
        assert_eq!(timer.tick_second(), TimerTick::Expired);
        assert!(!timer.is_armed());
        assert_eq!(timer.tick_second(), TimerTick::Idle);
    }
}
