//! Radar chart geometry and SVG rendering for a score report.
//!
//! Axes start at 12 o'clock and run clockwise in category order. Each
//! vertex sits at `score / scale_max` of the radius, clamped to `[0, 1]`.

use std::f64::consts::PI;
use std::fmt::Write;

use serde::Serialize;

use crate::models::ScoreReport;
use crate::services::mail_relay::escape_html;

pub const RING_FRACTIONS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];
pub const DEFAULT_CHART_SIZE: u32 = 400;

const MIN_CHART_SIZE: u32 = 160;
const MAX_CHART_SIZE: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadarAxis {
    pub label: String,
    pub score: u32,
    /// Radians, measured clockwise from 12 o'clock.
    pub angle: f64,
    pub ratio: f64,
    pub tip: Point,
    pub vertex: Point,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadarChart {
    pub size: u32,
    pub center: Point,
    pub radius: f64,
    pub scale_max: u32,
    pub axes: Vec<RadarAxis>,
}

impl RadarChart {
    pub fn from_report(report: &ScoreReport, size: u32) -> Self {
        let size = size.clamp(MIN_CHART_SIZE, MAX_CHART_SIZE);
        let center = Point {
            x: f64::from(size) / 2.0,
            y: f64::from(size) / 2.0,
        };
        // room for labels outside the outer ring
        let radius = f64::from(size) * 0.34;
        let count = report.categories.len().max(1) as f64;

        let axes = report
            .categories
            .iter()
            .enumerate()
            .map(|(i, category)| {
                let angle = 2.0 * PI * i as f64 / count;
                let ratio = if report.scale_max == 0 {
                    0.0
                } else {
                    (f64::from(category.score) / f64::from(report.scale_max)).clamp(0.0, 1.0)
                };
                RadarAxis {
                    label: category.label.clone(),
                    score: category.score,
                    angle,
                    ratio,
                    tip: polar(center, radius, angle),
                    vertex: polar(center, radius * ratio, angle),
                }
            })
            .collect();

        Self {
            size,
            center,
            radius,
            scale_max: report.scale_max,
            axes,
        }
    }

    fn ring(&self, fraction: f64) -> Vec<Point> {
        self.axes
            .iter()
            .map(|axis| polar(self.center, self.radius * fraction, axis.angle))
            .collect()
    }

    pub fn render_svg(&self) -> String {
        let mut svg = String::new();
        let size = self.size;

        // Writing into a String cannot fail.
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}" font-family="sans-serif" font-size="12">"#
        );
        svg.push_str(r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);

        for fraction in RING_FRACTIONS {
            let _ = write!(
                svg,
                r##"<polygon class="ring" points="{}" fill="none" stroke="#d0d5dd" stroke-width="1"/>"##,
                points_attr(&self.ring(fraction))
            );
        }

        for axis in &self.axes {
            let _ = write!(
                svg,
                r##"<line class="axis" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="#98a2b3" stroke-width="1"/>"##,
                self.center.x, self.center.y, axis.tip.x, axis.tip.y
            );
        }

        let vertices: Vec<Point> = self.axes.iter().map(|axis| axis.vertex).collect();
        let _ = write!(
            svg,
            r##"<polygon class="score" points="{}" fill="#2e90fa" fill-opacity="0.35" stroke="#1570ef" stroke-width="2"/>"##,
            points_attr(&vertices)
        );
        for vertex in &vertices {
            let _ = write!(
                svg,
                r##"<circle cx="{:.2}" cy="{:.2}" r="3" fill="#1570ef"/>"##,
                vertex.x, vertex.y
            );
        }

        for axis in &self.axes {
            let label_at = polar(self.center, self.radius + 18.0, axis.angle);
            let anchor = if (label_at.x - self.center.x).abs() < 1.0 {
                "middle"
            } else if label_at.x > self.center.x {
                "start"
            } else {
                "end"
            };
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="{}" dominant-baseline="middle">{} ({}/{})</text>"#,
                label_at.x,
                label_at.y,
                anchor,
                escape_html(&axis.label),
                axis.score,
                self.scale_max
            );
        }

        svg.push_str("</svg>");
        svg
    }
}

fn polar(center: Point, distance: f64, angle: f64) -> Point {
    Point {
        x: center.x + distance * angle.sin(),
        y: center.y - distance * angle.cos(),
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}
