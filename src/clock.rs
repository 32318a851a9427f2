//! Wall-clock tracking with pause support.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Running,
    Paused,
}

/// Turns host wall-clock readings into simulated time steps.
///
/// Pausing freezes the step that was pending, and resuming continues from
/// that frozen point, so real time spent paused never reaches the simulation.
#[derive(Clone, Debug)]
pub struct SimulationClock {
    state: ClockState,
    current_ms: u64,
    last_ms: u64,
    frozen_step_ms: u64,
    simulated_ms: u64,
    started: bool,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Running,
            current_ms: 0,
            last_ms: 0,
            frozen_step_ms: 0,
            simulated_ms: 0,
            started: false,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == ClockState::Paused
    }

    /// Records a wall-clock reading. No-op while paused.
    ///
    /// The first reading only anchors the clock and yields a zero step.
    /// Readings that go backwards also yield a zero step.
    pub fn update(&mut self, now_ms: u64) {
        if self.is_paused() {
            return;
        }
        if !self.started {
            self.started = true;
            self.current_ms = now_ms;
        }
        self.last_ms = self.current_ms;
        self.current_ms = now_ms.max(self.last_ms);
        self.simulated_ms += self.time_step_ms();
    }

    /// Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if self.is_paused() {
            return false;
        }
        self.state = ClockState::Paused;
        self.frozen_step_ms = self.time_step_ms();
        true
    }

    /// Resumes as if the pause began at `now_ms`. Returns whether the state
    /// changed.
    pub fn resume(&mut self, now_ms: u64) -> bool {
        if !self.is_paused() {
            return false;
        }
        self.state = ClockState::Running;
        self.current_ms = now_ms;
        self.last_ms = now_ms.saturating_sub(self.frozen_step_ms);
        true
    }

    pub fn toggle(&mut self, now_ms: u64) -> ClockState {
        match self.state {
            ClockState::Running => self.pause(),
            ClockState::Paused => self.resume(now_ms),
        };
        self.state
    }

    pub fn time_step_ms(&self) -> u64 {
        self.current_ms - self.last_ms
    }

    /// Seconds.
    pub fn time_step(&self) -> f32 {
        self.time_step_ms() as f32 / 1000.0
    }

    /// Simulated seconds so far, excluding paused spans.
    pub fn elapsed(&self) -> f64 {
        self.simulated_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_follow_wall_clock() {
        let mut clock = SimulationClock::new();
        clock.update(5_000);
        assert_eq!(clock.time_step_ms(), 0);

        clock.update(5_016);
        assert_eq!(clock.time_step_ms(), 16);
        assert_eq!(clock.time_step(), 0.016);

        clock.update(5_050);
        assert_eq!(clock.time_step_ms(), 34);
        assert_eq!(clock.elapsed(), 0.05);
    }

    #[test]
    fn pause_freezes_time() {
        let mut clock = SimulationClock::new();
        clock.update(0);
        clock.update(20);

        assert!(clock.pause());
        assert!(!clock.pause());
        clock.update(10_000);
        assert_eq!(clock.time_step_ms(), 20);
        assert_eq!(clock.elapsed(), 0.02);

        // A minute away contributes nothing.
        assert!(clock.resume(60_000));
        assert_eq!(clock.time_step_ms(), 20);
        clock.update(60_016);
        assert_eq!(clock.time_step_ms(), 16);
        assert_eq!(clock.elapsed(), 0.036);
    }

    #[test]
    fn toggle_and_backwards_readings() {
        let mut clock = SimulationClock::new();
        clock.update(100);
        assert_eq!(clock.toggle(100), ClockState::Paused);
        assert_eq!(clock.toggle(200), ClockState::Running);

        clock.update(150);
        assert_eq!(clock.time_step_ms(), 0);
    }
}
