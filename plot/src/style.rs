//! Colors and colormaps

use std::fmt;

/// Color representation (RGB, 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(r, g, b)
    }

    pub fn hex(hex: &str) -> Self {
        let hex = hex.trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0)
        };
        Color(channel(0), channel(2), channel(4))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    pub fn to_array(&self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }

    pub fn green() -> Self {
        Color(0, 255, 0)
    }
    pub fn red() -> Self {
        Color(255, 0, 0)
    }
    pub fn black() -> Self {
        Color(0, 0, 0)
    }
    pub fn white() -> Self {
        Color(255, 255, 255)
    }

    /// Rec. 601 luma in [0, 1].
    pub fn luminance(&self) -> f64 {
        (0.299 * self.0 as f64 + 0.587 * self.1 as f64 + 0.114 * self.2 as f64) / 255.0
    }

    /// Text color that stays readable on top of `self`.
    pub fn contrasting(&self) -> Self {
        if self.luminance() > 0.5 {
            Color::black()
        } else {
            Color::white()
        }
    }

    /// Linear mix, `t = 0` gives `self`.
    pub fn lerp(&self, other: &Color, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    /// Viridis colormap sampled at `t ∈ [0, 1]`.
    pub fn viridis(t: f64) -> Self {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (VIRIDIS.len() - 1) as f64;
        let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
        VIRIDIS[i].lerp(&VIRIDIS[i + 1], scaled - i as f64)
    }

    /// Cycling palette entry.
    pub fn palette(index: usize) -> Self {
        Color::hex(COLORS[index % COLORS.len()])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.0, self.1, self.2)
    }
}

/// Predefined color palette (matplotlib/seaborn inspired)
pub const COLORS: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Viridis control points at t = 0, 0.125, ..., 1 (matplotlib).
const VIRIDIS: [Color; 9] = [
    Color(68, 1, 84),
    Color(71, 44, 122),
    Color(59, 81, 139),
    Color(44, 113, 142),
    Color(33, 144, 141),
    Color(39, 173, 129),
    Color(92, 200, 99),
    Color(170, 220, 50),
    Color(253, 231, 37),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let c = Color::hex("#1f77b4");
        assert_eq!(c, Color(0x1f, 0x77, 0xb4));
        assert_eq!(c.to_hex(), "#1f77b4");
        assert_eq!(Color::hex("#12"), Color(0x12, 0, 0));
    }

    #[test]
    fn viridis_endpoints() {
        assert_eq!(Color::viridis(0.0), Color(68, 1, 84));
        assert_eq!(Color::viridis(1.0), Color(253, 231, 37));
        assert_eq!(Color::viridis(f64::NAN), Color(68, 1, 84));
        assert_eq!(Color::viridis(0.5), Color(33, 144, 141));
    }

    #[test]
    fn contrasting_text() {
        assert_eq!(Color::viridis(0.0).contrasting(), Color::white());
        assert_eq!(Color::viridis(1.0).contrasting(), Color::black());
    }
}
