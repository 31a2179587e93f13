use std::f32::consts::{PI, TAU};

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use eframe::egui::{Color32, Pos2, Rect, Vec2, pos2, vec2};

pub const DEFAULT_CLOCK_SIZE: f32 = 100.0;

pub const MAIN_SCALE: [Color32; 5] = [
    Color32::from_rgb(188, 204, 228),
    Color32::from_rgb(78, 118, 176),
    Color32::from_rgb(28, 77, 150),
    Color32::from_rgb(8, 43, 94),
    Color32::from_rgb(1, 17, 40),
];
pub const COMPLEMENT_SCALE: [Color32; 5] = [
    Color32::from_rgb(255, 237, 205),
    Color32::from_rgb(255, 197, 99),
    Color32::from_rgb(227, 152, 24),
    Color32::from_rgb(142, 90, 0),
    Color32::from_rgb(61, 38, 0),
];
pub const SHADOW_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 51);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub blur: f32,
    pub offset: Vec2,
    pub color: Color32,
}

impl Shadow {
    /// Blur equal to the shape width, offset half of it down and right.
    pub fn for_width(width: f32) -> Self {
        Self {
            blur: width,
            offset: vec2(width / 2.0, width / 2.0),
            color: SHADOW_COLOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub width: f32,
    pub color: Color32,
}

/// Minimal 2D drawing target, in clock-local coordinates (`0..size` on both
/// axes, y pointing down).
pub trait Surface {
    fn clear(&mut self, size: f32);

    fn fill_circle(
        &mut self,
        center: Pos2,
        radius: f32,
        fill: Color32,
        outline: Option<Outline>,
        shadow: Option<Shadow>,
    );

    /// Fills `rect`, expressed relative to `pivot`, after rotating it
    /// clockwise by `angle` radians around `pivot`.
    fn fill_rotated_rect(
        &mut self,
        pivot: Pos2,
        angle: f32,
        rect: Rect,
        fill: Color32,
        shadow: Option<Shadow>,
    );
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear {
        size: f32,
    },
    Circle {
        center: Pos2,
        radius: f32,
        fill: Color32,
        outline: Option<Outline>,
        shadow: Option<Shadow>,
    },
    RotatedRect {
        pivot: Pos2,
        angle: f32,
        rect: Rect,
        fill: Color32,
        shadow: Option<Shadow>,
    },
}

/// Records draw calls instead of painting them.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub ops: Vec<DrawOp>,
}

impl Surface for DisplayList {
    fn clear(&mut self, size: f32) {
        self.ops.push(DrawOp::Clear { size });
    }

    fn fill_circle(
        &mut self,
        center: Pos2,
        radius: f32,
        fill: Color32,
        outline: Option<Outline>,
        shadow: Option<Shadow>,
    ) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            fill,
            outline,
            shadow,
        });
    }

    fn fill_rotated_rect(
        &mut self,
        pivot: Pos2,
        angle: f32,
        rect: Rect,
        fill: Color32,
        shadow: Option<Shadow>,
    ) {
        self.ops.push(DrawOp::RotatedRect {
            pivot,
            angle,
            rect,
            fill,
            shadow,
        });
    }
}

/// Corners of `rect` (relative to `pivot`) after a clockwise rotation by
/// `angle`, in surface coordinates.
pub fn rotated_corners(pivot: Pos2, angle: f32, rect: Rect) -> [Pos2; 4] {
    let (sin, cos) = angle.sin_cos();
    let rotate = |corner: Pos2| {
        pos2(
            pivot.x + corner.x * cos - corner.y * sin,
            pivot.y + corner.x * sin + corner.y * cos,
        )
    };
    [
        rotate(rect.left_top()),
        rotate(rect.right_top()),
        rotate(rect.right_bottom()),
        rotate(rect.left_bottom()),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockTime {
    EpochMillis(i64),
    Wall(NaiveTime),
}

impl ClockTime {
    /// Epoch values are read in the machine's local timezone.
    pub fn wall_time(self) -> Option<NaiveTime> {
        match self {
            ClockTime::EpochMillis(ms) => Local
                .timestamp_millis_opt(ms)
                .single()
                .map(|dt| dt.time()),
            ClockTime::Wall(time) => Some(time),
        }
    }
}

impl From<i64> for ClockTime {
    fn from(ms: i64) -> Self {
        ClockTime::EpochMillis(ms)
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(time: NaiveTime) -> Self {
        ClockTime::Wall(time)
    }
}

impl From<NaiveDateTime> for ClockTime {
    fn from(value: NaiveDateTime) -> Self {
        ClockTime::Wall(value.time())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for ClockTime {
    fn from(value: DateTime<Tz>) -> Self {
        ClockTime::Wall(value.time())
    }
}

/// Hand angles in radians, clockwise from 12 o'clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandAngles {
    pub hour: f32,
    pub minute: f32,
    pub second: f32,
}

impl HandAngles {
    pub fn at(time: NaiveTime) -> Self {
        let hour = (time.hour() % 12) as f32;
        let minute = time.minute() as f32;
        let second = time.second() as f32;
        Self {
            hour: (hour + minute / 60.0) * TAU / 12.0,
            minute: (minute + second / 60.0) * TAU / 60.0,
            second: second * TAU / 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnalogClock {
    size: f32,
}

impl AnalogClock {
    pub fn new(size: f32) -> Self {
        Self {
            size: size.max(1.0),
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    fn center(&self) -> Pos2 {
        pos2(self.size / 2.0, self.size / 2.0)
    }

    /// Redraws the whole face for `time`. `None`, or an epoch the local
    /// timezone cannot represent, leaves the surface untouched.
    pub fn tick<S: Surface>(&self, surface: &mut S, time: Option<ClockTime>) -> Option<HandAngles> {
        let wall = time?.wall_time()?;
        let angles = HandAngles::at(wall);
        surface.clear(self.size);
        self.draw_base(surface);
        self.draw_time(surface, angles);
        Some(angles)
    }

    fn draw_base<S: Surface>(&self, surface: &mut S) {
        let line_width = self.size / 30.0;
        surface.fill_circle(
            self.center(),
            self.size / 2.0 - 2.0 * line_width,
            MAIN_SCALE[0],
            Some(Outline {
                width: line_width,
                color: MAIN_SCALE[4],
            }),
            Some(Shadow::for_width(line_width)),
        );
        self.draw_markers(surface);
    }

    fn draw_markers<S: Surface>(&self, surface: &mut S) {
        let width = self.size / 60.0;
        let marker = Rect::from_min_size(
            pos2(-width / 2.0, -self.size * 0.40),
            vec2(width, self.size / 12.0),
        );
        for index in 0..12 {
            surface.fill_rotated_rect(
                self.center(),
                index as f32 * PI / 6.0,
                marker,
                MAIN_SCALE[1],
                Some(Shadow::for_width(width)),
            );
        }
    }

    fn draw_time<S: Surface>(&self, surface: &mut S, angles: HandAngles) {
        let size = self.size;
        self.draw_hand(surface, angles.minute, size / 40.0, size / 3.0, MAIN_SCALE[1]);
        self.draw_hand(surface, angles.hour, size / 25.0, size / 3.5, MAIN_SCALE[3]);
        self.draw_hand(surface, angles.second, size / 100.0, size / 2.5, COMPLEMENT_SCALE[2]);
        surface.fill_circle(self.center(), size / 40.0, COMPLEMENT_SCALE[2], None, None);
    }

    fn draw_hand<S: Surface>(&self, surface: &mut S, angle: f32, width: f32, length: f32, fill: Color32) {
        surface.fill_rotated_rect(
            self.center(),
            angle,
            Rect::from_min_size(pos2(-width / 2.0, -length), vec2(width, length)),
            fill,
            Some(Shadow::for_width(width)),
        );
    }
}

impl Default for AnalogClock {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn wall(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    fn hand_ops(list: &DisplayList) -> Vec<(f32, Rect)> {
        list.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::RotatedRect { angle, rect, .. } => Some((*angle, *rect)),
                _ => None,
            })
            .skip(12)
            .collect()
    }

    #[test]
    fn three_oclock_angles() {
        let angles = HandAngles::at(wall(15, 0, 0));
        assert!(angles.minute.abs() < EPSILON);
        assert!(angles.second.abs() < EPSILON);
        assert!((angles.hour - PI / 2.0).abs() < EPSILON);
    }

    #[test]
    fn minute_and_second_hands_follow_seconds() {
        let angles = HandAngles::at(wall(10, 30, 45));
        assert!((angles.second - 1.5 * PI).abs() < EPSILON);
        assert!((angles.minute - (30.75 * TAU / 60.0)).abs() < EPSILON);
        assert!((angles.hour - (10.5 * TAU / 12.0)).abs() < EPSILON);
    }

    #[test]
    fn on_the_hour_the_hour_hand_depends_only_on_the_hour() {
        for hour in 0..24 {
            let angles = HandAngles::at(wall(hour, 0, 0));
            let expected = (hour % 12) as f32 * TAU / 12.0;
            assert!((angles.hour - expected).abs() < EPSILON, "hour {hour}");
        }
        assert_eq!(HandAngles::at(wall(0, 0, 0)), HandAngles::at(wall(12, 0, 0)));
    }

    #[test]
    fn missing_time_draws_nothing() {
        let mut list = DisplayList::default();
        assert_eq!(AnalogClock::default().tick(&mut list, None), None);
        assert!(list.ops.is_empty());
    }

    #[test]
    fn frame_is_a_full_redraw_in_order() {
        let mut list = DisplayList::default();
        let clock = AnalogClock::new(100.0);
        clock.tick(&mut list, Some(wall(3, 0, 0).into())).expect("drawn");

        assert_eq!(list.ops[0], DrawOp::Clear { size: 100.0 });
        match &list.ops[1] {
            DrawOp::Circle {
                center,
                radius,
                outline,
                ..
            } => {
                assert_eq!(*center, pos2(50.0, 50.0));
                assert!((radius - (50.0 - 2.0 * 100.0 / 30.0)).abs() < EPSILON);
                assert!(outline.is_some());
            }
            other => panic!("expected face, got {other:?}"),
        }
        // face, 12 markers, 3 hands, cover
        assert_eq!(list.ops.len(), 1 + 1 + 12 + 3 + 1);
        assert!(matches!(
            list.ops.last(),
            Some(DrawOp::Circle { outline: None, .. })
        ));

        let markers = list.ops[2..14]
            .iter()
            .map(|op| match op {
                DrawOp::RotatedRect { angle, .. } => *angle,
                other => panic!("expected marker, got {other:?}"),
            })
            .collect::<Vec<_>>();
        for (index, angle) in markers.iter().enumerate() {
            assert!((angle - index as f32 * PI / 6.0).abs() < EPSILON);
        }
    }

    #[test]
    fn hands_shrink_in_width_and_hour_is_shortest() {
        let mut list = DisplayList::default();
        AnalogClock::new(100.0)
            .tick(&mut list, Some(wall(9, 15, 30).into()))
            .expect("drawn");
        let hands = hand_ops(&list);
        assert_eq!(hands.len(), 3);
        let (minute, hour, second) = (hands[0].1, hands[1].1, hands[2].1);
        assert!(second.width() < minute.width());
        assert!(hour.height() < minute.height());
        assert!(hour.height() < second.height());
        assert!(minute.height() < second.height());
    }

    #[test]
    fn rotation_is_clockwise_with_y_down() {
        let pivot = pos2(50.0, 50.0);
        let hand = Rect::from_min_size(pos2(-1.0, -30.0), vec2(2.0, 30.0));

        let up = rotated_corners(pivot, 0.0, hand);
        assert!((up[0].y - 20.0).abs() < EPSILON);

        let right = rotated_corners(pivot, PI / 2.0, hand);
        let tip_x = right.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert!((tip_x - 80.0).abs() < 1e-3);
    }

    #[test]
    fn epoch_and_datetime_inputs_are_accepted() {
        let now = Local::now();
        let from_epoch = ClockTime::from(now.timestamp_millis())
            .wall_time()
            .expect("local time");
        assert_eq!(from_epoch.hour(), now.hour());
        assert_eq!(ClockTime::from(now).wall_time(), Some(now.time()));
    }

    #[test]
    fn timezone_a_day_ahead_still_gets_a_full_clock() {
        use crate::timezone::delta::{parse_delta, wall_clock_at};

        // 2024-01-01T00:00:00Z at GMT +30
        let delta = parse_delta("+30").expect("parses");
        let wall = wall_clock_at(1_704_067_200_000, delta).map(ClockTime::from);
        let mut frame = DisplayList::default();
        let angles = AnalogClock::default()
            .tick(&mut frame, wall)
            .expect("clock drawn");
        assert_eq!(frame.ops.len(), 18);
        assert!((angles.hour - PI).abs() < EPSILON);
    }
}
