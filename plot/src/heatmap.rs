//! Homography heat maps.
//!
//! Renders the nine matrix entries as a 3×3 grid of viridis-colored cells
//! with the value printed in each one.

use crate::style::Color;
use cv_core::Homography;
use std::fmt::Write;

const CELL: f64 = 110.0;
const MARGIN: f64 = 20.0;
const TITLE_HEIGHT: f64 = 36.0;
const LEGEND_HEIGHT: f64 = 40.0;

/// SVG document for `h`, cells colored by each entry's position between the
/// matrix minimum and maximum.
pub fn homography_heatmap_svg(h: &Homography, title: &str) -> String {
    let rows = h.to_rows();
    let values: Vec<f64> = rows.iter().flatten().copied().collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    let width = 2.0 * MARGIN + 3.0 * CELL;
    let height = TITLE_HEIGHT + 3.0 * CELL + LEGEND_HEIGHT + MARGIN;
    let mut svg = String::new();

    // writing to a String cannot fail
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">
  <style>
    .title {{ font-family: Arial, sans-serif; font-size: 16px; font-weight: bold; fill: #333; }}
    .value {{ font-family: monospace; font-size: 13px; }}
    .legend {{ font-family: Arial, sans-serif; font-size: 11px; fill: #333; }}
  </style>
  <rect width="{w}" height="{h}" fill="white"/>
  <text x="{cx}" y="24" class="title" text-anchor="middle">{title}</text>
"#,
        w = width,
        h = height,
        cx = width / 2.0,
        title = escape(title),
    );

    for (r, row) in rows.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            let t = if span > 0.0 { (v - min) / span } else { 0.5 };
            let fill = Color::viridis(t);
            let x = MARGIN + c as f64 * CELL;
            let y = TITLE_HEIGHT + r as f64 * CELL;
            let _ = write!(
                svg,
                r#"  <rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" fill="{fill}" stroke="white" stroke-width="2"/>
  <text x="{tx}" y="{ty}" class="value" fill="{text}" text-anchor="middle" dominant-baseline="middle">{value}</text>
"#,
                fill = fill.to_hex(),
                tx = x + CELL / 2.0,
                ty = y + CELL / 2.0,
                text = fill.contrasting().to_hex(),
                value = format_value(v),
            );
        }
    }

    // colorbar
    let bar_y = TITLE_HEIGHT + 3.0 * CELL + 10.0;
    let bar_w = 3.0 * CELL;
    let steps = 32;
    for i in 0..steps {
        let t = i as f64 / (steps - 1) as f64;
        let _ = write!(
            svg,
            r#"  <rect x="{x:.2}" y="{bar_y}" width="{w:.2}" height="10" fill="{fill}"/>
"#,
            x = MARGIN + bar_w * i as f64 / steps as f64,
            w = bar_w / steps as f64 + 0.5,
            fill = Color::viridis(t).to_hex(),
        );
    }
    let _ = write!(
        svg,
        r#"  <text x="{MARGIN}" y="{ly}" class="legend">{lo}</text>
  <text x="{rx}" y="{ly}" class="legend" text-anchor="end">{hi}</text>
</svg>
"#,
        ly = bar_y + 24.0,
        rx = MARGIN + bar_w,
        lo = format_value(min),
        hi = format_value(max),
    );

    svg
}

/// Four significant digits, switching to scientific notation for tiny or
/// huge magnitudes (perspective terms are often around 1e-4).
fn format_value(v: f64) -> String {
    let a = v.abs();
    if v == 0.0 {
        "0".to_string()
    } else if !(1e-3..1e5).contains(&a) {
        format!("{:.3e}", v)
    } else {
        let decimals = (3 - a.log10().floor() as i32).max(0) as usize;
        format!("{:.*}", decimals, v)
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
