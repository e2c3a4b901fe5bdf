//! Per-wheel stepper controller
//!
//! Streams a velocity profile through a pulse emitter one segment at a
//! time and counts the pulses that were actually emitted.
//!
//! # Notification protocol
//!
//! The emitter raises "ready" each time it latches a command. Because a
//! command is only latched once the previous one has emitted all of its
//! pulses, each notification after the first means the previously latched
//! segment is complete. The stepper keeps exactly one command armed ahead
//! of the hardware: the next segment, or the terminal (count 0) command
//! after the last one. The terminal command's notification marks the
//! wheel idle.

use embedded_hal::digital::{OutputPin, PinState};
use heapless::Deque;
use portable_atomic::{AtomicU64, Ordering};

use crate::error::StepperError;
use crate::motion::{VelocityProfile, VelocitySegment, MAX_SEGMENTS};
use crate::pulse::{ChannelId, PulseCommand};
use crate::traits::PulseEmitter;

/// Wheel rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Drives the robot forward
    Forward,
    /// Drives the robot backward
    Reverse,
}

impl Direction {
    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// +1 for forward, -1 for reverse
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Executed step counter
///
/// Written only from the ready-notification handler, read from anywhere.
#[derive(Debug, Default)]
pub struct StepCounter(AtomicU64);

impl StepCounter {
    /// Create a zeroed counter
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Current count
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn add(&self, steps: u64) {
        self.0.fetch_add(steps, Ordering::AcqRel);
    }
}

/// Stepper controller for one wheel
///
/// Owns the wheel's pulse emitter and direction output.
pub struct Stepper<E, D> {
    emitter: E,
    dir_pin: D,
    /// Motor is mounted mirrored: forward drives the pin the other way
    inverted: bool,
    direction: Direction,
    /// Segments not yet handed to the emitter
    queue: Deque<VelocitySegment, MAX_SEGMENTS>,
    /// Accepted by the emitter, not yet latched
    armed: Option<PulseCommand>,
    /// Latched and emitting
    running: Option<PulseCommand>,
    busy: bool,
    executed: StepCounter,
    target_steps: u64,
}

impl<E: PulseEmitter, D: OutputPin> Stepper<E, D> {
    /// Create a stepper, driving the direction output to forward
    pub fn new(emitter: E, dir_pin: D, inverted: bool) -> Result<Self, StepperError> {
        let mut stepper = Self {
            emitter,
            dir_pin,
            inverted,
            direction: Direction::Forward,
            queue: Deque::new(),
            armed: None,
            running: None,
            busy: false,
            executed: StepCounter::new(),
            target_steps: 0,
        };
        stepper.write_direction(Direction::Forward)?;
        Ok(stepper)
    }

    /// Channel of the underlying emitter
    pub fn channel(&self) -> ChannelId {
        self.emitter.channel()
    }

    /// Set the direction output
    ///
    /// Rejected while a profile is running.
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), StepperError> {
        if self.busy {
            return Err(StepperError::Busy);
        }
        self.write_direction(direction)
    }

    fn write_direction(&mut self, direction: Direction) -> Result<(), StepperError> {
        let high = (direction == Direction::Forward) != self.inverted;
        self.dir_pin
            .set_state(PinState::from(high))
            .map_err(|_| StepperError::DirectionPin)?;
        self.direction = direction;
        Ok(())
    }

    /// Get the current direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Start streaming a profile in the given direction
    ///
    /// An empty profile is a no-op and leaves the stepper idle.
    pub fn run(&mut self, direction: Direction, profile: VelocityProfile) -> Result<(), StepperError> {
        if self.busy {
            return Err(StepperError::Busy);
        }
        self.write_direction(direction)?;
        if profile.is_empty() {
            return Ok(());
        }

        self.queue.clear();
        for segment in profile.segments() {
            let queued = self.queue.push_back(*segment);
            debug_assert!(queued.is_ok(), "profile longer than the segment queue");
        }

        let first = self.next_command();
        if let Err(e) = self.emitter.arm(first) {
            self.queue.clear();
            return Err(e.into());
        }

        self.target_steps = self.executed.get() + profile.total_pulses() as u64;
        self.armed = Some(first);
        self.busy = true;
        Ok(())
    }

    fn next_command(&mut self) -> PulseCommand {
        self.queue
            .pop_front()
            .map(|s| PulseCommand::new(s.rate_pps, s.count))
            .unwrap_or(PulseCommand::TERMINAL)
    }

    /// Handle one ready notification from the emitter
    ///
    /// Credits the segment that just finished, then arms the next one.
    pub fn on_ready(&mut self) -> Result<(), StepperError> {
        if let Some(done) = self.running.take() {
            self.executed.add(done.count as u64);
        }

        let Some(latched) = self.armed.take() else {
            return Ok(());
        };

        if latched.is_terminal() {
            self.busy = false;
            return Ok(());
        }
        self.running = Some(latched);

        let next = self.next_command();
        if let Err(e) = self.emitter.arm(next) {
            // Latched pulses always complete; anything not yet armed is dropped
            if let Some(done) = self.running.take() {
                self.executed.add(done.count as u64);
            }
            self.queue.clear();
            self.busy = false;
            return Err(e.into());
        }
        self.armed = Some(next);
        Ok(())
    }

    /// Handle every notification that is already pending
    ///
    /// Returns true if any notification was handled.
    pub fn service(&mut self) -> Result<bool, StepperError> {
        let mut handled = false;
        while self.busy && self.emitter.take_ready() {
            self.on_ready()?;
            handled = true;
        }
        Ok(handled)
    }

    /// Wait for the next notification and handle it
    ///
    /// Never resolves while the stepper is idle.
    pub async fn next_ready(&mut self) -> Result<(), StepperError> {
        if !self.busy {
            core::future::pending::<()>().await;
        }
        self.emitter.wait_ready().await;
        self.on_ready()
    }

    /// Check if a profile is running
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Total pulses emitted since start-up
    pub fn executed_steps(&self) -> u64 {
        self.executed.get()
    }

    /// Executed step count at which the current profile completes
    pub fn target_steps(&self) -> u64 {
        self.target_steps
    }

    /// Pulses emitted since an earlier `executed_steps` reading
    pub fn steps_since(&self, mark: u64) -> u64 {
        self.executed.get().saturating_sub(mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmitterError;
    use core::convert::Infallible;
    use core::task::Poll;
    use embedded_hal::digital::ErrorType;

    /// Emitter that latches queued commands whenever it is polled
    struct TestEmitter {
        fifo: Deque<PulseCommand, 2>,
        latched: Option<PulseCommand>,
        emitted: u64,
        arm_count: usize,
        reject_after: Option<usize>,
    }

    impl TestEmitter {
        fn new() -> Self {
            Self {
                fifo: Deque::new(),
                latched: None,
                emitted: 0,
                arm_count: 0,
                reject_after: None,
            }
        }
    }

    impl PulseEmitter for TestEmitter {
        fn channel(&self) -> ChannelId {
            ChannelId::new(0, 0).unwrap()
        }

        fn arm(&mut self, command: PulseCommand) -> Result<(), EmitterError> {
            if self.reject_after == Some(self.arm_count) {
                return Err(EmitterError::FifoFull);
            }
            self.arm_count += 1;
            self.fifo.push_back(command).map_err(|_| EmitterError::FifoFull)
        }

        fn take_ready(&mut self) -> bool {
            match self.fifo.pop_front() {
                Some(command) => {
                    if let Some(prev) = self.latched.replace(command) {
                        self.emitted += prev.count as u64;
                    }
                    true
                }
                None => false,
            }
        }

        async fn wait_ready(&mut self) {
            core::future::poll_fn(|_| {
                if self.take_ready() {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            })
            .await
        }
    }

    #[derive(Default)]
    struct TestPin {
        high: bool,
    }

    impl ErrorType for TestPin {
        type Error = Infallible;
    }

    impl OutputPin for TestPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    fn stepper() -> Stepper<TestEmitter, TestPin> {
        Stepper::new(TestEmitter::new(), TestPin::default(), false).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let s = stepper();
        assert!(!s.is_busy());
        assert_eq!(s.executed_steps(), 0);
        assert_eq!(s.direction(), Direction::Forward);
        assert!(s.dir_pin.high);
    }

    #[test]
    fn test_inverted_direction_pin() {
        let mut s = Stepper::new(TestEmitter::new(), TestPin::default(), true).unwrap();
        assert!(!s.dir_pin.high);
        s.set_direction(Direction::Reverse).unwrap();
        assert!(s.dir_pin.high);
    }

    #[test]
    fn test_run_counts_only_on_notification() {
        let mut s = stepper();
        s.run(Direction::Forward, VelocityProfile::plan(600, 1000, 0)).unwrap();

        // Arming does not move the counter
        assert!(s.is_busy());
        assert_eq!(s.executed_steps(), 0);
        assert_eq!(s.target_steps(), 600);

        // First latch: segment running, nothing complete yet
        assert!(s.emitter.take_ready());
        s.on_ready().unwrap();
        assert_eq!(s.executed_steps(), 0);
        assert!(s.is_busy());

        // Terminal latch: the segment has finished
        assert!(s.emitter.take_ready());
        s.on_ready().unwrap();
        assert_eq!(s.executed_steps(), 600);
        assert!(!s.is_busy());
        assert_eq!(s.emitter.emitted, 600);
    }

    #[test]
    fn test_service_streams_whole_profile() {
        let mut s = stepper();
        let profile = VelocityProfile::plan(10_000, 5000, 20_000);
        let segments = profile.segments().len();
        s.run(Direction::Reverse, profile).unwrap();

        assert!(s.service().unwrap());
        assert!(!s.is_busy());
        assert_eq!(s.executed_steps(), 10_000);
        assert_eq!(s.steps_since(4000), 6000);
        // One arm per segment plus the terminal command
        assert_eq!(s.emitter.arm_count, segments + 1);
        assert_eq!(s.direction(), Direction::Reverse);
        assert!(!s.dir_pin.high);
    }

    #[test]
    fn test_busy_rejects_run_and_direction() {
        let mut s = stepper();
        s.run(Direction::Forward, VelocityProfile::plan(100, 1000, 0)).unwrap();

        assert_eq!(
            s.run(Direction::Forward, VelocityProfile::plan(100, 1000, 0)),
            Err(StepperError::Busy)
        );
        assert_eq!(s.set_direction(Direction::Reverse), Err(StepperError::Busy));
        assert_eq!(s.direction(), Direction::Forward);
    }

    #[test]
    fn test_empty_profile_is_noop() {
        let mut s = stepper();
        s.run(Direction::Forward, VelocityProfile::empty()).unwrap();
        assert!(!s.is_busy());
        assert_eq!(s.emitter.arm_count, 0);
    }

    #[test]
    fn test_consecutive_runs_accumulate() {
        let mut s = stepper();
        s.run(Direction::Forward, VelocityProfile::plan(300, 1000, 0)).unwrap();
        s.service().unwrap();
        let mark = s.executed_steps();

        s.run(Direction::Forward, VelocityProfile::plan(200, 1000, 0)).unwrap();
        s.service().unwrap();
        assert_eq!(s.executed_steps(), 500);
        assert_eq!(s.steps_since(mark), 200);
    }

    #[test]
    fn test_arm_failure_on_start_leaves_idle() {
        let mut s = stepper();
        s.emitter.reject_after = Some(0);
        assert_eq!(
            s.run(Direction::Forward, VelocityProfile::plan(100, 1000, 0)),
            Err(StepperError::Emitter(EmitterError::FifoFull))
        );
        assert!(!s.is_busy());
    }

    #[test]
    fn test_arm_failure_mid_stream_credits_latched_segment() {
        let mut s = stepper();
        s.emitter.reject_after = Some(1);
        s.run(Direction::Forward, VelocityProfile::plan(100, 1000, 0)).unwrap();

        assert!(s.emitter.take_ready());
        assert_eq!(s.on_ready(), Err(StepperError::Emitter(EmitterError::FifoFull)));
        assert!(!s.is_busy());
        assert_eq!(s.executed_steps(), 100);
    }

    #[test]
    fn test_next_ready_event_path() {
        let mut s = stepper();
        s.run(Direction::Forward, VelocityProfile::plan(50, 1000, 0)).unwrap();

        embassy_futures::block_on(async {
            while s.is_busy() {
                s.next_ready().await.unwrap();
            }
        });
        assert_eq!(s.executed_steps(), 50);
    }
}
