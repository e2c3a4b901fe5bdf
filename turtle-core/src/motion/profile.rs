//! Velocity profiles for step pulse trains
//!
//! Approximates bounded acceleration by stepping the pulse rate through a
//! fixed number of ramp levels. The time spent at each level is the rate
//! increment divided by the acceleration, so a level's pulse count is its
//! rate multiplied by that time. Deceleration mirrors acceleration.

use heapless::Vec;

use crate::pulse::clamp_rate;

/// Number of rate levels in a full ramp
pub const RAMP_LEVELS: usize = 16;

/// Maximum segments in a profile (ramp up, cruise, ramp down)
pub const MAX_SEGMENTS: usize = 2 * RAMP_LEVELS + 1;

/// One element of a velocity profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VelocitySegment {
    /// Pulse rate for this segment (never zero)
    pub rate_pps: u32,
    /// Number of pulses in this segment
    pub count: u32,
}

/// An ordered sequence of velocity segments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VelocityProfile {
    segments: Vec<VelocitySegment, MAX_SEGMENTS>,
    total_pulses: u32,
}

impl VelocityProfile {
    /// Create an empty profile
    pub const fn empty() -> Self {
        Self {
            segments: Vec::new(),
            total_pulses: 0,
        }
    }

    /// Plan a trapezoidal (or triangular) profile
    ///
    /// # Arguments
    /// - `total_pulses`: Exact number of pulses to emit
    /// - `cruise_rate_pps`: Target cruise rate, clamped to the hardware ceiling
    /// - `accel_pps_per_s`: Rate change per second; 0 disables ramping
    ///
    /// The segment counts always sum to `total_pulses`.
    pub fn plan(total_pulses: u32, cruise_rate_pps: u32, accel_pps_per_s: u32) -> Self {
        let mut profile = Self::empty();
        if total_pulses == 0 {
            return profile;
        }

        let cruise = clamp_rate(cruise_rate_pps);
        let level_step = cruise / (RAMP_LEVELS as u32 + 1);

        if accel_pps_per_s == 0 || level_step == 0 {
            profile.push(cruise, total_pulses);
            return profile;
        }

        // Pulses spent at each ramp level on the way up
        let mut ramp: Vec<VelocitySegment, RAMP_LEVELS> = Vec::new();
        for level in 1..=RAMP_LEVELS as u32 {
            let rate = level_step * level;
            let accel = accel_pps_per_s as u64;
            let pulses = (rate as u64 * level_step as u64 + accel / 2) / accel;
            let count = pulses.clamp(1, u32::MAX as u64) as u32;
            let pushed = ramp.push(VelocitySegment {
                rate_pps: rate,
                count,
            });
            debug_assert!(pushed.is_ok(), "more ramp levels than capacity");
        }

        // Keep as many levels as fit twice (up and down) in the total
        let mut levels = 0;
        let mut ramp_pulses: u64 = 0;
        for segment in &ramp {
            let next = ramp_pulses + segment.count as u64;
            if 2 * next > total_pulses as u64 {
                break;
            }
            ramp_pulses = next;
            levels += 1;
        }

        // Full trapezoid cruises at the target; otherwise peak at the first
        // level that could not be completed
        let peak = if levels == RAMP_LEVELS {
            cruise
        } else {
            ramp[levels].rate_pps
        };
        let plateau = total_pulses - 2 * ramp_pulses as u32;

        for segment in &ramp[..levels] {
            profile.push(segment.rate_pps, segment.count);
        }
        profile.push(peak, plateau);
        for segment in ramp[..levels].iter().rev() {
            profile.push(segment.rate_pps, segment.count);
        }

        profile
    }

    /// Append a segment, skipping empty ones
    fn push(&mut self, rate_pps: u32, count: u32) {
        if count == 0 {
            return;
        }
        // Capacity covers the largest plan
        if self.segments.push(VelocitySegment { rate_pps, count }).is_ok() {
            self.total_pulses += count;
        }
    }

    /// Segments in emission order
    pub fn segments(&self) -> &[VelocitySegment] {
        &self.segments
    }

    /// Sum of all segment counts
    pub fn total_pulses(&self) -> u32 {
        self.total_pulses
    }

    /// Highest rate in the profile
    pub fn peak_rate(&self) -> u32 {
        self.segments.iter().map(|s| s.rate_pps).max().unwrap_or(0)
    }

    /// Check if the profile has no pulses
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::MAX_RATE_PPS;
    use proptest::prelude::*;

    fn is_ramp_shaped(profile: &VelocityProfile) -> bool {
        let rates: heapless::Vec<u32, MAX_SEGMENTS> =
            profile.segments().iter().map(|s| s.rate_pps).collect();
        let peak = rates.iter().position(|&r| r == profile.peak_rate()).unwrap_or(0);
        rates[..=peak].windows(2).all(|w| w[0] <= w[1])
            && rates[peak..].windows(2).all(|w| w[0] >= w[1])
    }

    #[test]
    fn test_empty_profile() {
        let profile = VelocityProfile::plan(0, 1000, 500);
        assert!(profile.is_empty());
        assert_eq!(profile.total_pulses(), 0);
    }

    #[test]
    fn test_no_acceleration_is_constant() {
        let profile = VelocityProfile::plan(606, 1600, 0);
        assert_eq!(
            profile.segments(),
            &[VelocitySegment {
                rate_pps: 1600,
                count: 606
            }]
        );
    }

    #[test]
    fn test_full_trapezoid() {
        let profile = VelocityProfile::plan(100_000, 1700, 1700);
        assert_eq!(profile.segments().len(), MAX_SEGMENTS);
        assert_eq!(profile.total_pulses(), 100_000);
        assert_eq!(profile.peak_rate(), 1700);
        // Cruise sits in the middle
        assert_eq!(profile.segments()[RAMP_LEVELS].rate_pps, 1700);
        // First level: rate 100, time 100/1700 s -> 6 pulses
        assert_eq!(profile.segments()[0], VelocitySegment { rate_pps: 100, count: 6 });
        assert!(is_ramp_shaped(&profile));
    }

    #[test]
    fn test_triangular_profile() {
        let full = VelocityProfile::plan(1_000_000, 17_000, 1000);
        let short = VelocityProfile::plan(500, 17_000, 1000);

        assert_eq!(short.total_pulses(), 500);
        assert!(short.peak_rate() < 17_000);
        assert!(short.segments().len() < full.segments().len());
        assert!(is_ramp_shaped(&short));
    }

    #[test]
    fn test_single_pulse() {
        let profile = VelocityProfile::plan(1, 10_000, 10_000);
        assert_eq!(profile.total_pulses(), 1);
        assert_eq!(profile.segments().len(), 1);
    }

    #[test]
    fn test_slow_cruise_skips_ramp() {
        // Below one pps per ramp level there is nothing to ramp through
        let profile = VelocityProfile::plan(50, 10, 5);
        assert_eq!(profile.segments(), &[VelocitySegment { rate_pps: 10, count: 50 }]);
    }

    #[test]
    fn test_rate_clamp_matches_ceiling() {
        assert_eq!(
            VelocityProfile::plan(20_000, 1_000_000, 50_000),
            VelocityProfile::plan(20_000, MAX_RATE_PPS, 50_000)
        );
    }

    proptest! {
        #[test]
        fn prop_counts_sum_to_total(
            total in 0u32..2_000_000,
            cruise in 1u32..1_000_000,
            accel in 0u32..2_000_000,
        ) {
            let profile = VelocityProfile::plan(total, cruise, accel);
            let sum: u64 = profile.segments().iter().map(|s| s.count as u64).sum();
            prop_assert_eq!(sum, total as u64);
            prop_assert_eq!(profile.total_pulses(), total);
        }

        #[test]
        fn prop_rates_positive_and_bounded(
            total in 1u32..500_000,
            cruise in 1u32..1_000_000,
            accel in 0u32..500_000,
        ) {
            let profile = VelocityProfile::plan(total, cruise, accel);
            let ceiling = cruise.min(MAX_RATE_PPS);
            for segment in profile.segments() {
                prop_assert!(segment.rate_pps > 0);
                prop_assert!(segment.rate_pps <= ceiling);
                prop_assert!(segment.count > 0);
            }
            prop_assert!(is_ramp_shaped(&profile));
        }

        #[test]
        fn prop_clamp_is_transparent(
            total in 0u32..200_000,
            accel in 0u32..500_000,
        ) {
            prop_assert_eq!(
                VelocityProfile::plan(total, 1_000_000, accel),
                VelocityProfile::plan(total, MAX_RATE_PPS, accel)
            );
        }
    }
}
