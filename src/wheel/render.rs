use serde::Serialize;
use std::fmt::Write as _;

use crate::places::Place;

const WHEEL_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#FFD93D", "#6C5CE7", "#A8E6CF",
    "#FF8B94", "#3D5A80", "#F4A261", "#2A9D8F", "#E76F51",
];

const LABEL_MAX_CHARS: usize = 20;
const LABEL_KEEP_CHARS: usize = 17;
const LABEL_SPAN: f64 = 0.8;
const LABEL_START: f64 = 0.15;
const CONTRAST_THRESHOLD: f64 = 0.6;
const RIM_MARGIN_PX: f64 = 12.0;

pub const TEXT_LIGHT: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
pub const TEXT_DARK: Rgb = Rgb::new(0x22, 0x22, 0x22);
const BACKGROUND: Rgb = Rgb::new(0xF7, 0xF7, 0xF7);
const EMPTY_WHEEL: Rgb = Rgb::new(0xDD, 0xDD, 0xDD);
const HUB: Rgb = Rgb::new(0x33, 0x33, 0x33);
const POINTER: Rgb = Rgb::new(0xE6, 0x39, 0x46);

lazy_static::lazy_static! {
    /// Segment fill colors, cycled in order.
    pub static ref PALETTE: Vec<Rgb> = WHEEL_COLORS.iter().filter_map(|hex| Rgb::from_hex(hex)).collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Perceived brightness in 0..=1.
    pub fn luminance(&self) -> f64 {
        (0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64) / 255.0
    }
}

pub fn segment_color(index: usize) -> Rgb {
    PALETTE.get(index % PALETTE.len().max(1)).copied().unwrap_or(EMPTY_WHEEL)
}

/// White text on dark fills, dark text on light ones.
pub fn text_color_for(fill: Rgb) -> Rgb {
    if fill.luminance() < CONTRAST_THRESHOLD {
        TEXT_LIGHT
    } else {
        TEXT_DARK
    }
}

pub fn segment_label(name: &str) -> String {
    if name.chars().count() > LABEL_MAX_CHARS {
        let kept: String = name.chars().take(LABEL_KEEP_CHARS).collect();
        format!("{}...", kept)
    } else {
        name.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Wheel angles start at the downward direction and grow clockwise on screen.
pub fn point_on_circle(center: Point, radius: f64, degrees: f64) -> Point {
    let screen = (degrees + 90.0).to_radians();
    Point::new(center.x + radius * screen.cos(), center.y + radius * screen.sin())
}

/// The drawing surface the wheel renders onto.
pub trait Canvas {
    fn clear(&mut self, width: f64, height: f64, color: Rgb);
    fn fill_sector(&mut self, center: Point, radius: f64, start_deg: f64, end_deg: f64, color: Rgb);
    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb);
    fn fill_polygon(&mut self, points: &[Point], color: Rgb);
    fn fill_glyph(&mut self, at: Point, rotation_deg: f64, glyph: char, size_px: f64, color: Rgb);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear { width: f64, height: f64, color: Rgb },
    Sector { center: Point, radius: f64, start_deg: f64, end_deg: f64, color: Rgb },
    Circle { center: Point, radius: f64, color: Rgb },
    Polygon { points: Vec<Point>, color: Rgb },
    Glyph { at: Point, rotation_deg: f64, glyph: char, size_px: f64, color: Rgb },
}

/// A canvas that records what was drawn. Serialises to SVG.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn sectors(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Sector { .. }))
    }

    pub fn to_svg(&self) -> String {
        let (width, height) = self
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Clear { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .unwrap_or((0.0, 0.0));

        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}">"#,
            w = width,
            h = height
        );
        for command in &self.commands {
            // writing into a String cannot fail
            let _ = write_svg_element(&mut svg, command);
        }
        svg.push_str("</svg>");
        svg
    }
}

fn write_svg_element(svg: &mut String, command: &DrawCommand) -> std::fmt::Result {
    match command {
        DrawCommand::Clear { width, height, color } => write!(
            svg,
            r#"<rect x="0" y="0" width="{:.0}" height="{:.0}" fill="{}"/>"#,
            width,
            height,
            color.to_hex()
        ),
        DrawCommand::Sector { center, radius, start_deg, end_deg, color } => {
            if end_deg - start_deg >= 360.0 {
                return write!(
                    svg,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"#,
                    center.x,
                    center.y,
                    radius,
                    color.to_hex()
                );
            }
            let from = point_on_circle(*center, *radius, *start_deg);
            let to = point_on_circle(*center, *radius, *end_deg);
            let large_arc = if end_deg - start_deg > 180.0 { 1 } else { 0 };
            write!(
                svg,
                r#"<path d="M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z" fill="{}"/>"#,
                center.x,
                center.y,
                from.x,
                from.y,
                radius,
                radius,
                large_arc,
                to.x,
                to.y,
                color.to_hex()
            )
        }
        DrawCommand::Circle { center, radius, color } => write!(
            svg,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"#,
            center.x,
            center.y,
            radius,
            color.to_hex()
        ),
        DrawCommand::Polygon { points, color } => {
            let points: Vec<String> = points.iter().map(|p| format!("{:.2},{:.2}", p.x, p.y)).collect();
            write!(svg, r#"<polygon points="{}" fill="{}"/>"#, points.join(" "), color.to_hex())
        }
        DrawCommand::Glyph { at, rotation_deg, glyph, size_px, color } => write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" font-size="{:.1}" font-family="sans-serif" font-weight="bold" fill="{}" text-anchor="middle" dominant-baseline="central" transform="rotate({:.2} {x:.2} {y:.2})">{}</text>"#,
            size_px,
            color.to_hex(),
            rotation_deg,
            escape_xml(*glyph),
            x = at.x,
            y = at.y
        ),
    }
}

fn escape_xml(glyph: char) -> String {
    match glyph {
        '&' => "&amp;".to_string(),
        '<' => "&lt;".to_string(),
        '>' => "&gt;".to_string(),
        '"' => "&quot;".to_string(),
        '\'' => "&apos;".to_string(),
        other => other.to_string(),
    }
}

impl Canvas for DrawList {
    fn clear(&mut self, width: f64, height: f64, color: Rgb) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear { width, height, color });
    }

    fn fill_sector(&mut self, center: Point, radius: f64, start_deg: f64, end_deg: f64, color: Rgb) {
        self.commands.push(DrawCommand::Sector { center, radius, start_deg, end_deg, color });
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb) {
        self.commands.push(DrawCommand::Circle { center, radius, color });
    }

    fn fill_polygon(&mut self, points: &[Point], color: Rgb) {
        self.commands.push(DrawCommand::Polygon {
            points: points.to_vec(),
            color,
        });
    }

    fn fill_glyph(&mut self, at: Point, rotation_deg: f64, glyph: char, size_px: f64, color: Rgb) {
        self.commands.push(DrawCommand::Glyph { at, rotation_deg, glyph, size_px, color });
    }
}

/// Paints the whole wheel at `rotation_deg` onto a square canvas of `size_px`.
pub fn draw_wheel<C: Canvas>(canvas: &mut C, items: &[Place], rotation_deg: f64, size_px: f64) {
    let center = Point::new(size_px / 2.0, size_px / 2.0);
    let radius = (size_px / 2.0 - RIM_MARGIN_PX).max(1.0);
    canvas.clear(size_px, size_px, BACKGROUND);

    if items.is_empty() {
        canvas.fill_circle(center, radius, EMPTY_WHEEL);
    } else {
        let arc = 360.0 / items.len() as f64;
        for (i, item) in items.iter().enumerate() {
            let start = rotation_deg + i as f64 * arc;
            let fill = segment_color(i);
            canvas.fill_sector(center, radius, start, start + arc, fill);
            draw_label(canvas, center, radius, start + arc / 2.0, arc, &item.name, text_color_for(fill));
        }
    }

    canvas.fill_circle(center, radius * 0.08, HUB);
    draw_pointer(canvas, center, radius);
}

fn draw_label<C: Canvas>(
    canvas: &mut C,
    center: Point,
    radius: f64,
    bisector_deg: f64,
    arc_deg: f64,
    name: &str,
    color: Rgb,
) {
    let label = segment_label(name);
    let len = label.chars().count();
    if len == 0 {
        return;
    }
    let spacing = radius * LABEL_SPAN / len as f64;
    let arc_width = arc_deg.to_radians() * radius * 0.5;
    let size_px = (spacing * 1.2).min(arc_width).clamp(6.0, 16.0);
    let glyph_rotation = bisector_deg + 90.0;

    for (j, glyph) in label.chars().enumerate() {
        let distance = radius * LABEL_START + spacing * (j as f64 + 0.5);
        let at = point_on_circle(center, distance, bisector_deg);
        canvas.fill_glyph(at, glyph_rotation, glyph, size_px, color);
    }
}

fn draw_pointer<C: Canvas>(canvas: &mut C, center: Point, radius: f64) {
    let tip = point_on_circle(center, radius - 18.0, 0.0);
    let left = point_on_circle(center, radius + 10.0, -4.0);
    let right = point_on_circle(center, radius + 10.0, 4.0);
    canvas.fill_polygon(&[tip, left, right], POINTER);
}
