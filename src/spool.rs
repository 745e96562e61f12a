use std::{f32::consts::TAU, fmt::Write};

use eframe::egui::{Pos2, Vec2};

use crate::config::SpoolConfig;

pub const PROGRESS_MIN: f32 = 0.0;
pub const PROGRESS_MAX: f32 = 100.0;

const TAPE_FILL: &str = "#3b2a20";
const TAPE_EDGE: &str = "#1c130e";
const RIM_FILL: &str = "#f3efe6";
const RIM_EDGE: &str = "#b7ae9f";

/// Clamp a progress value into `[0, 100]`. NaN counts as the start of the tape.
pub fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        PROGRESS_MIN
    } else {
        progress.clamp(PROGRESS_MIN, PROGRESS_MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpoolSide {
    Left,
    Right,
}

impl SpoolSide {
    pub const BOTH: [SpoolSide; 2] = [SpoolSide::Left, SpoolSide::Right];

    /// Share of the tape wound on this spool, in `[0, 1]`.
    ///
    /// Tape runs from the left reel to the right reel as progress grows.
    pub fn fill_fraction(self, progress: f32) -> f32 {
        let t = clamp_progress(progress) / PROGRESS_MAX;
        match self {
            SpoolSide::Left => 1.0 - t,
            SpoolSide::Right => t,
        }
    }

    fn id(self) -> &'static str {
        match self {
            SpoolSide::Left => "left",
            SpoolSide::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpoolGeometry {
    pub min_radius: f32,
    pub max_radius: f32,
    pub rim_radius: f32,
    pub hole_radius: f32,
    pub edge_width: f32,
    pub left_center: Pos2,
    pub right_center: Pos2,
    pub canvas: Vec2,
}

impl Default for SpoolGeometry {
    fn default() -> Self {
        Self::from_config(&SpoolConfig::default())
    }
}

impl SpoolGeometry {
    pub fn from_config(config: &SpoolConfig) -> Self {
        Self {
            min_radius: config.min_radius(),
            max_radius: config.max_radius(),
            rim_radius: config.rim_radius(),
            hole_radius: config.hole_radius(),
            edge_width: 2.0,
            left_center: Pos2::new(190.0, 190.0),
            right_center: Pos2::new(510.0, 190.0),
            canvas: Vec2::new(700.0, 380.0),
        }
    }

    pub fn center(&self, side: SpoolSide) -> Pos2 {
        match side {
            SpoolSide::Left => self.left_center,
            SpoolSide::Right => self.right_center,
        }
    }

    /// Linear in progress; exactly `max_radius` when the spool is full.
    pub fn tape_radius(&self, side: SpoolSide, progress: f32) -> f32 {
        let fill = side.fill_fraction(progress);
        if fill >= 1.0 {
            return self.max_radius;
        }
        let span = (self.max_radius - self.min_radius).max(0.0);
        (self.min_radius + span * fill).min(self.max_radius)
    }

    pub fn spool(&self, side: SpoolSide, progress: f32) -> Spool {
        Spool {
            side,
            center: self.center(side),
            tape_radius: self.tape_radius(side, progress),
            rim_radius: self.rim_radius,
            hole_radius: self.hole_radius,
            edge_width: self.edge_width,
        }
    }

    pub fn scene(&self, progress: f32) -> SpoolScene {
        let progress = clamp_progress(progress);
        SpoolScene {
            progress,
            canvas: self.canvas,
            left: self.spool(SpoolSide::Left, progress),
            right: self.spool(SpoolSide::Right, progress),
        }
    }
}

/// One reel: tape disc with an outer edge, a fixed rim disc and a punched hole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spool {
    pub side: SpoolSide,
    pub center: Pos2,
    pub tape_radius: f32,
    pub rim_radius: f32,
    pub hole_radius: f32,
    pub edge_width: f32,
}

impl Spool {
    /// Radius of the stroke drawn just inside the rim disc.
    pub fn rim_edge_radius(&self) -> f32 {
        (self.rim_radius - self.edge_width).max(self.hole_radius)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpoolScene {
    pub progress: f32,
    pub canvas: Vec2,
    pub left: Spool,
    pub right: Spool,
}

impl SpoolScene {
    pub fn spool(&self, side: SpoolSide) -> &Spool {
        match side {
            SpoolSide::Left => &self.left,
            SpoolSide::Right => &self.right,
        }
    }

    pub fn spools(&self) -> [&Spool; 2] {
        [&self.left, &self.right]
    }

    /// Standalone SVG document; each spool is masked so the hole shows through.
    pub fn to_svg(&self) -> String {
        let width = self.canvas.x;
        let height = self.canvas.y;
        let mut svg = String::with_capacity(2048);

        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}">"#
        );
        svg.push_str("<defs>");
        for spool in self.spools() {
            let _ = write!(
                svg,
                r#"<mask id="spool-{id}-hole"><rect x="0" y="0" width="{width:.0}" height="{height:.0}" fill="white"/><circle cx="{cx:.2}" cy="{cy:.2}" r="{hole:.2}" fill="black"/></mask>"#,
                id = spool.side.id(),
                cx = spool.center.x,
                cy = spool.center.y,
                hole = spool.hole_radius,
            );
        }
        svg.push_str("</defs>");

        for spool in self.spools() {
            let cx = spool.center.x;
            let cy = spool.center.y;
            let edge = spool.edge_width;
            let _ = write!(
                svg,
                r#"<g class="spool spool-{id}" mask="url(#spool-{id}-hole)">"#,
                id = spool.side.id(),
            );
            let _ = write!(
                svg,
                r#"<circle class="tape" cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="{TAPE_FILL}" stroke="{TAPE_EDGE}" stroke-width="{edge:.2}"/>"#,
                r = spool.tape_radius,
            );
            let _ = write!(
                svg,
                r#"<circle class="rim" cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="{RIM_FILL}"/>"#,
                r = spool.rim_radius,
            );
            let _ = write!(
                svg,
                r#"<circle class="rim-edge" cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="none" stroke="{RIM_EDGE}" stroke-width="{edge:.2}"/>"#,
                r = spool.rim_edge_radius(),
            );
            svg.push_str("</g>");
        }

        svg.push_str("</svg>");
        svg
    }
}

/// Scene for the default reel geometry.
pub fn generate_spool_scene(progress: f32) -> SpoolScene {
    SpoolGeometry::default().scene(progress)
}

/// Reel rotation. Tape moves at constant linear speed, so the emptier reel turns faster.
#[derive(Debug, Clone)]
pub struct ReelSpin {
    left: f32,
    right: f32,
    tape_speed: f32,
}

impl Default for ReelSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl ReelSpin {
    pub fn new() -> Self {
        // Scene units per second; about 1.5 rad/s on an empty reel.
        Self {
            left: 0.0,
            right: 0.0,
            tape_speed: 90.0,
        }
    }

    pub fn advance(&mut self, dt: f32, spinning: bool, scene: &SpoolScene) {
        if !spinning || dt <= 0.0 {
            return;
        }
        for spool in scene.spools() {
            let radius = spool.tape_radius.max(1.0);
            let delta = self.tape_speed / radius * dt;
            let angle = match spool.side {
                SpoolSide::Left => &mut self.left,
                SpoolSide::Right => &mut self.right,
            };
            *angle = (*angle + delta).rem_euclid(TAU);
        }
    }

    pub fn reset(&mut self) {
        self.left = 0.0;
        self.right = 0.0;
    }

    pub fn angle(&self, side: SpoolSide) -> f32 {
        match side {
            SpoolSide::Left => self.left,
            SpoolSide::Right => self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_exact() {
        let geometry = SpoolGeometry::default();
        let start = generate_spool_scene(0.0);
        let end = generate_spool_scene(100.0);
        assert_eq!(start.left.tape_radius, geometry.max_radius);
        assert_eq!(start.right.tape_radius, geometry.min_radius);
        assert_eq!(end.left.tape_radius, geometry.min_radius);
        assert_eq!(end.right.tape_radius, geometry.max_radius);
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        assert_eq!(generate_spool_scene(-10.0), generate_spool_scene(0.0));
        assert_eq!(generate_spool_scene(150.0), generate_spool_scene(100.0));
        assert_eq!(generate_spool_scene(f32::NAN), generate_spool_scene(0.0));
    }

    #[test]
    fn midpoint_is_linear() {
        let geometry = SpoolGeometry::default();
        let mid = geometry.scene(50.0);
        let expected = (geometry.min_radius + geometry.max_radius) / 2.0;
        assert!((mid.left.tape_radius - expected).abs() < 1e-4);
        assert!((mid.right.tape_radius - expected).abs() < 1e-4);
    }

    #[test]
    fn rim_and_hole_ignore_progress() {
        let a = generate_spool_scene(3.0);
        let b = generate_spool_scene(97.0);
        for side in SpoolSide::BOTH {
            assert_eq!(a.spool(side).rim_radius, b.spool(side).rim_radius);
            assert_eq!(a.spool(side).hole_radius, b.spool(side).hole_radius);
            assert_eq!(a.spool(side).center, b.spool(side).center);
        }
    }

    #[test]
    fn svg_masks_both_holes() {
        let svg = generate_spool_scene(25.0).to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"<mask id="spool-left-hole">"#));
        assert!(svg.contains(r#"mask="url(#spool-right-hole)""#));
        assert_eq!(svg.matches(r#"class="tape""#).count(), 2);
    }

    #[test]
    fn spin_respects_toggle() {
        let scene = generate_spool_scene(10.0);
        let mut spin = ReelSpin::new();
        spin.advance(1.0, true, &scene);
        let angle = spin.angle(SpoolSide::Left);
        spin.advance(1.0, false, &scene);
        assert_eq!(spin.angle(SpoolSide::Left), angle);
        spin.reset();
        assert_eq!(spin.angle(SpoolSide::Right), 0.0);
    }

    #[test]
    fn emptier_reel_turns_faster() {
        let scene = generate_spool_scene(10.0);
        let mut spin = ReelSpin::new();
        spin.advance(0.5, true, &scene);
        assert!(spin.angle(SpoolSide::Right) > spin.angle(SpoolSide::Left));
    }
}
