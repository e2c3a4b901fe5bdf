//! Simulated pulse channels and pins for driving `DiffDrive` on the host

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::task::Poll;

use embedded_hal::digital::{ErrorType, OutputPin};
use turtle_core::config::DriveSettings;
use turtle_core::drive::{DiffDrive, DriveConfig};
use turtle_core::error::EmitterError;
use turtle_core::pulse::{ChannelId, PulseCommand};
use turtle_core::stepper::Stepper;
use turtle_core::traits::PulseEmitter;

/// Observable state of one simulated channel
#[derive(Default)]
pub struct SimChannel {
    fifo: VecDeque<PulseCommand>,
    latched: Option<PulseCommand>,
    /// Pulses fully emitted
    pub emitted: u64,
    /// Every command accepted, in order
    pub history: Vec<PulseCommand>,
    /// Latches still allowed; `None` latches freely
    pub budget: Option<usize>,
    /// Reject every arm as if the FIFO were full
    pub reject_arms: bool,
}

impl SimChannel {
    /// Pulses armed, terminal commands excluded
    pub fn armed_pulses(&self) -> u64 {
        self.history.iter().map(|c| c.count as u64).sum()
    }

    pub fn peak_rate(&self) -> u32 {
        self.history
            .iter()
            .filter(|c| !c.is_terminal())
            .map(|c| c.rate_pps)
            .max()
            .unwrap_or(0)
    }
}

/// Test-side handle onto a simulated channel
#[derive(Clone, Default)]
pub struct SimHandle(Rc<RefCell<SimChannel>>);

impl SimHandle {
    pub fn get(&self) -> std::cell::Ref<'_, SimChannel> {
        self.0.borrow()
    }

    /// Allow `n` more latches
    pub fn release(&self, n: usize) {
        let mut channel = self.0.borrow_mut();
        channel.budget = Some(channel.budget.unwrap_or(0) + n);
    }

    /// Stop limiting latches
    pub fn run_free(&self) {
        self.0.borrow_mut().budget = None;
    }

    pub fn set_reject_arms(&self, reject: bool) {
        self.0.borrow_mut().reject_arms = reject;
    }
}

/// Emitter whose hardware latches a queued command whenever it is asked
pub struct SimEmitter {
    channel: ChannelId,
    state: SimHandle,
}

impl SimEmitter {
    pub fn new(state_machine: u8, state: SimHandle) -> Self {
        Self {
            channel: ChannelId::new(0, state_machine).unwrap(),
            state,
        }
    }
}

impl PulseEmitter for SimEmitter {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn arm(&mut self, command: PulseCommand) -> Result<(), EmitterError> {
        let mut channel = self.state.0.borrow_mut();
        // Four FIFO words hold two commands
        if channel.reject_arms || channel.fifo.len() >= 2 {
            return Err(EmitterError::FifoFull);
        }
        channel.fifo.push_back(command);
        channel.history.push(command);
        Ok(())
    }

    fn take_ready(&mut self) -> bool {
        let mut channel = self.state.0.borrow_mut();
        if channel.budget == Some(0) || channel.fifo.is_empty() {
            return false;
        }
        if let Some(budget) = channel.budget.as_mut() {
            *budget -= 1;
        }
        let next = channel.fifo.pop_front();
        if let Some(done) = std::mem::replace(&mut channel.latched, next) {
            channel.emitted += done.count as u64;
        }
        true
    }

    async fn wait_ready(&mut self) {
        std::future::poll_fn(|_| {
            if self.take_ready() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

/// Output pin recording its level
#[derive(Clone, Default)]
pub struct SimPin(Rc<Cell<bool>>);

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.0.get()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

pub type SimDrive = DiffDrive<SimEmitter, SimEmitter, SimPin>;

/// A drive on simulated hardware with the default turtle settings
pub struct Rig {
    pub drive: SimDrive,
    pub left: SimHandle,
    pub right: SimHandle,
    pub enable: SimPin,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_settings(&DriveSettings::default())
    }

    pub fn with_settings(settings: &DriveSettings) -> Self {
        let left = SimHandle::default();
        let right = SimHandle::default();
        let enable = SimPin::default();

        let left_stepper =
            Stepper::new(SimEmitter::new(0, left.clone()), SimPin::default(), true).unwrap();
        let right_stepper =
            Stepper::new(SimEmitter::new(1, right.clone()), SimPin::default(), false).unwrap();
        let drive = DiffDrive::new(
            left_stepper,
            right_stepper,
            enable.clone(),
            DriveConfig::default(),
            settings,
        )
        .unwrap();

        Self {
            drive,
            left,
            right,
            enable,
        }
    }

    /// Hold both channels until latches are released
    pub fn throttled() -> Self {
        let rig = Self::new();
        rig.left.release(0);
        rig.right.release(0);
        rig
    }

    /// Release latches one at a time, the left channel always one ahead
    pub fn finish_staggered(&mut self) -> turtle_core::drive::PoseReport {
        let mut rounds = 0;
        while self.drive.is_moving() {
            self.left.release(1);
            self.drive.poll().unwrap();
            self.right.release(1);
            self.drive.poll().unwrap();
            rounds += 1;
            assert!(rounds < 1000, "drive never went idle");
        }
        self.drive.pose_report()
    }

    /// Let both channels run and wait for the drive to go idle
    pub fn finish(&mut self) -> turtle_core::drive::PoseReport {
        self.left.run_free();
        self.right.run_free();
        embassy_futures::block_on(self.drive.wait_idle()).unwrap()
    }
}
