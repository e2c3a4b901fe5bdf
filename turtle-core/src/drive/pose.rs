//! Odometry pose
//!
//! Heading 0° points along +y and grows clockwise. Position is kept in
//! whole micrometres with a fractional carry so that many small
//! increments do not drift.

use libm::{cosf, fmodf, roundf, sinf};

/// Robot pose tracked from executed wheel steps
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    x_um: i64,
    y_um: i64,
    heading_deg: f32,
    carry_x: f32,
    carry_y: f32,
}

/// Pose rounded for reporting (millimetres and degrees, two decimals)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoseReport {
    pub x_mm: f32,
    pub y_mm: f32,
    pub heading_deg: f32,
}

impl Pose {
    /// East-west position in micrometres
    pub fn x_um(&self) -> i64 {
        self.x_um
    }

    /// North-south position in micrometres
    pub fn y_um(&self) -> i64 {
        self.y_um
    }

    /// Heading in `[0, 360)`
    pub fn heading_deg(&self) -> f32 {
        self.heading_deg
    }

    /// Move the origin to the current position, keeping the heading
    pub fn reset_origin(&mut self) {
        self.x_um = 0;
        self.y_um = 0;
        self.carry_x = 0.0;
        self.carry_y = 0.0;
    }

    /// Integrate one pair of signed wheel travels
    ///
    /// The increment is treated as a constant-curvature arc: the robot
    /// moves along the chord at the mid-arc heading.
    pub fn integrate(&mut self, left_um: f32, right_um: f32, axel_um: f32) {
        let linear = (left_um + right_um) / 2.0;
        let rotation = (left_um - right_um) / axel_um;
        let half = rotation / 2.0;

        let chord = if libm::fabsf(half) < 1e-6 {
            linear
        } else {
            linear * sinf(half) / half
        };
        let bearing = self.heading_deg.to_radians() + half;

        let dx = chord * sinf(bearing) + self.carry_x;
        let dy = chord * cosf(bearing) + self.carry_y;
        let whole_x = roundf(dx);
        let whole_y = roundf(dy);
        self.carry_x = dx - whole_x;
        self.carry_y = dy - whole_y;
        self.x_um += whole_x as i64;
        self.y_um += whole_y as i64;

        self.heading_deg = wrap_degrees(self.heading_deg + rotation.to_degrees());
    }

    /// Pose rounded for reporting
    pub fn report(&self) -> PoseReport {
        let x_mm = (self.x_um as f64 / 1000.0) as f32;
        let y_mm = (self.y_um as f64 / 1000.0) as f32;
        let mut heading = round_centi(self.heading_deg);
        if heading >= 360.0 {
            heading = 0.0;
        }
        PoseReport {
            x_mm: round_centi(x_mm),
            y_mm: round_centi(y_mm),
            heading_deg: heading,
        }
    }
}

/// Wrap an angle into `[0, 360)`
pub fn wrap_degrees(deg: f32) -> f32 {
    let mut wrapped = fmodf(deg, 360.0);
    if wrapped < 0.0 {
        wrapped += 360.0;
    }
    if wrapped >= 360.0 {
        wrapped -= 360.0;
    }
    wrapped
}

/// Signed shortest turn from one heading to another, in `(-180, 180]`
///
/// Positive is clockwise.
pub fn shortest_turn(from_deg: f32, to_deg: f32) -> f32 {
    let delta = wrap_degrees(to_deg - from_deg);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

/// Compass bearing of a displacement, in `[0, 360)`
pub fn bearing_deg(dx: f32, dy: f32) -> f32 {
    wrap_degrees(libm::atan2f(dx, dy).to_degrees())
}

fn round_centi(value: f32) -> f32 {
    let rounded = roundf(value * 100.0) / 100.0;
    // Avoid reporting -0.00
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    const AXEL: f32 = 100_000.0;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        libm::fabsf(a - b) <= tol
    }

    #[test]
    fn test_straight_line_along_heading() {
        let mut pose = Pose::default();
        pose.integrate(100_000.0, 100_000.0, AXEL);
        assert_eq!(pose.x_um(), 0);
        assert_eq!(pose.y_um(), 100_000);
        assert_eq!(pose.report(), PoseReport { x_mm: 0.0, y_mm: 100.0, heading_deg: 0.0 });
    }

    #[test]
    fn test_in_place_rotation() {
        let mut pose = Pose::default();
        let arc = AXEL / 2.0 * PI / 2.0;

        // Right turn: left wheel forward
        pose.integrate(arc, -arc, AXEL);
        assert!(close(pose.heading_deg(), 90.0, 1e-3));
        assert_eq!((pose.x_um(), pose.y_um()), (0, 0));

        // Two left turns
        pose.integrate(-arc, arc, AXEL);
        pose.integrate(-arc, arc, AXEL);
        assert!(close(pose.heading_deg(), 270.0, 1e-3));
    }

    #[test]
    fn test_facing_east_moves_x() {
        let mut pose = Pose::default();
        let arc = AXEL / 2.0 * PI / 2.0;
        pose.integrate(arc, -arc, AXEL);
        pose.integrate(50_000.0, 50_000.0, AXEL);
        assert!((pose.x_um() - 50_000).abs() <= 1);
        assert!(pose.y_um().abs() <= 1);
    }

    #[test]
    fn test_full_circle_closes() {
        let mut pose = Pose::default();
        let radius = 200_000.0;
        let theta = 2.0 * PI;
        // Left-curving circle: right wheel on the outside
        pose.integrate((radius - AXEL / 2.0) * theta, (radius + AXEL / 2.0) * theta, AXEL);
        assert!(pose.x_um().abs() <= 2);
        assert!(pose.y_um().abs() <= 2);
        let heading = pose.heading_deg();
        assert!(heading < 0.01 || heading > 359.99);
    }

    #[test]
    fn test_quarter_circle_ends_left() {
        let mut pose = Pose::default();
        let radius = 200_000.0;
        let theta = PI / 2.0;
        pose.integrate((radius - AXEL / 2.0) * theta, (radius + AXEL / 2.0) * theta, AXEL);
        // Centre is at (-r, 0): a quarter turn lands at (-r, r) facing west
        assert!((pose.x_um() + 200_000).abs() <= 2);
        assert!((pose.y_um() - 200_000).abs() <= 2);
        assert!(close(pose.heading_deg(), 270.0, 1e-3));
    }

    #[test]
    fn test_carry_prevents_drift() {
        let mut pose = Pose::default();
        // 0.4 µm increments would round away without the carry
        for _ in 0..1000 {
            pose.integrate(0.4, 0.4, AXEL);
        }
        assert_eq!(pose.y_um(), 400);
    }

    #[test]
    fn test_reset_origin_keeps_heading() {
        let mut pose = Pose::default();
        pose.integrate(10_000.0, 0.0, AXEL);
        let heading = pose.heading_deg();
        pose.reset_origin();
        assert_eq!((pose.x_um(), pose.y_um()), (0, 0));
        assert_eq!(pose.heading_deg(), heading);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
    }

    #[test]
    fn test_shortest_turn() {
        assert_eq!(shortest_turn(0.0, 90.0), 90.0);
        assert_eq!(shortest_turn(0.0, 270.0), -90.0);
        assert_eq!(shortest_turn(350.0, 10.0), 20.0);
        assert_eq!(shortest_turn(0.0, 180.0), 180.0);
        assert_eq!(shortest_turn(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_bearing() {
        assert!(close(bearing_deg(0.0, 1.0), 0.0, 1e-4));
        assert!(close(bearing_deg(1.0, 0.0), 90.0, 1e-4));
        assert!(close(bearing_deg(0.0, -1.0), 180.0, 1e-4));
        assert!(close(bearing_deg(-1.0, 0.0), 270.0, 1e-4));
    }

    #[test]
    fn test_report_rounding() {
        let mut pose = Pose::default();
        pose.integrate(12_345.0, 12_345.0, AXEL);
        assert_eq!(pose.report().y_mm, 12.35);
        assert_eq!(pose.report().x_mm, 0.0);
    }
}
