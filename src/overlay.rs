//! HUD compositing onto RGB frames.
//!
//! Text uses a compact 3x5 bitmap font scaled by an integer factor, so no font
//! files are needed on the onboard computer. All drawing clips at the frame edges.

use crate::hud::HudSnapshot;
use image::{Rgb, RgbImage};

pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LINE_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const WAITING_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        'A' => [0x2, 0x5, 0x7, 0x5, 0x5],
        'B' => [0x6, 0x5, 0x6, 0x5, 0x6],
        'C' => [0x3, 0x4, 0x4, 0x4, 0x3],
        'D' => [0x6, 0x5, 0x5, 0x5, 0x6],
        'E' => [0x7, 0x4, 0x6, 0x4, 0x7],
        'F' => [0x7, 0x4, 0x6, 0x4, 0x4],
        'G' => [0x3, 0x4, 0x5, 0x5, 0x3],
        'H' => [0x5, 0x5, 0x7, 0x5, 0x5],
        'I' => [0x7, 0x2, 0x2, 0x2, 0x7],
        'J' => [0x1, 0x1, 0x1, 0x5, 0x2],
        'K' => [0x5, 0x5, 0x6, 0x5, 0x5],
        'L' => [0x4, 0x4, 0x4, 0x4, 0x7],
        'M' => [0x5, 0x7, 0x7, 0x5, 0x5],
        'N' => [0x6, 0x5, 0x5, 0x5, 0x5],
        'O' => [0x2, 0x5, 0x5, 0x5, 0x2],
        'P' => [0x6, 0x5, 0x6, 0x4, 0x4],
        'Q' => [0x2, 0x5, 0x5, 0x6, 0x3],
        'R' => [0x6, 0x5, 0x6, 0x5, 0x5],
        'S' => [0x3, 0x4, 0x2, 0x1, 0x6],
        'T' => [0x7, 0x2, 0x2, 0x2, 0x2],
        'U' => [0x5, 0x5, 0x5, 0x5, 0x7],
        'V' => [0x5, 0x5, 0x5, 0x5, 0x2],
        'W' => [0x5, 0x5, 0x7, 0x7, 0x5],
        'X' => [0x5, 0x5, 0x2, 0x5, 0x5],
        'Y' => [0x5, 0x5, 0x2, 0x2, 0x2],
        'Z' => [0x7, 0x1, 0x2, 0x4, 0x7],
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        ' ' => [0x0, 0x0, 0x0, 0x0, 0x0],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        ',' => [0x0, 0x0, 0x0, 0x2, 0x4],
        ':' => [0x0, 0x2, 0x0, 0x2, 0x0],
        '-' => [0x0, 0x0, 0x7, 0x0, 0x0],
        '+' => [0x0, 0x2, 0x7, 0x2, 0x0],
        '=' => [0x0, 0x7, 0x0, 0x7, 0x0],
        '/' => [0x1, 0x1, 0x2, 0x4, 0x4],
        '(' => [0x2, 0x4, 0x4, 0x4, 0x2],
        ')' => [0x2, 0x1, 0x1, 0x1, 0x2],
        '%' => [0x5, 0x1, 0x2, 0x4, 0x5],
        '_' => [0x0, 0x0, 0x0, 0x0, 0x7],
        '?' => [0x7, 0x1, 0x2, 0x0, 0x2],
        '!' => [0x2, 0x2, 0x2, 0x0, 0x2],
        '|' => [0x2, 0x2, 0x2, 0x2, 0x2],
        _ => [0x7, 0x7, 0x7, 0x7, 0x7],
    }
}

fn put(frame: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

/// Width in pixels of `text` drawn at `scale`
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * (GLYPH_W + 1) * scale - scale
}

/// Draw `text` with its top-left corner at (`x`, `y`)
pub fn draw_text(frame: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>, scale: u32) {
    let scale = scale.max(1) as i64;
    let mut cx = x;
    for c in text.chars() {
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W as i64 {
                if (bits >> (GLYPH_W as i64 - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        put(frame, cx + col * scale + dx, y + row as i64 * scale + dy, color);
                    }
                }
            }
        }
        cx += (GLYPH_W as i64 + 1) * scale;
    }
}

/// Horizontal line from `x0` to `x1` (inclusive), `thickness` rows centred on `y`
pub fn draw_hline(frame: &mut RgbImage, x0: i64, x1: i64, y: i64, thickness: u32, color: Rgb<u8>) {
    let half = thickness as i64 / 2;
    for yy in (y - half)..(y - half + thickness.max(1) as i64) {
        for xx in x0.min(x1)..=x0.max(x1) {
            put(frame, xx, yy, color);
        }
    }
}

pub fn fill_circle(frame: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

fn or_placeholder(value: &str) -> &str {
    if value.trim().is_empty() {
        "---"
    } else {
        value.trim()
    }
}

/// Composite the HUD onto `frame`.
///
/// Without a snapshot, shows `waiting` if given, otherwise a "no data yet" screen.
/// With a snapshot, draws the full HUD and, if `waiting` is given, a banner above
/// the horizon.
pub fn draw_overlay(frame: &mut RgbImage, hud: Option<&HudSnapshot>, waiting: Option<&str>) {
    let w = frame.width() as i64;
    let h = frame.height() as i64;
    let cx = w / 2;
    let cy = h / 2;

    let hud = match hud {
        Some(hud) => hud,
        None => {
            match waiting {
                Some(text) => {
                    let tw = text_width(text, 2) as i64;
                    draw_text(frame, cx - tw / 2, cy - 20, text, WAITING_COLOR, 2);
                }
                None => {
                    let msg1 = "AWAITING DATA";
                    let msg2 = "CONNECT THE DEVICE AND WAIT";
                    let tw1 = text_width(msg1, 3) as i64;
                    let tw2 = text_width(msg2, 2) as i64;
                    draw_text(frame, cx - tw1 / 2, cy - 30, msg1, TEXT_COLOR, 3);
                    draw_text(frame, cx - tw2 / 2, cy + 10, msg2, TEXT_COLOR, 2);
                }
            }
            return;
        }
    };

    // Device time, top centre
    let time = or_placeholder(&hud.time);
    let tw = text_width(time, 4) as i64;
    draw_text(frame, cx - tw / 2, 20, time, TEXT_COLOR, 4);

    // Altitude, left
    draw_text(frame, 20, cy - 40, "ALT", TEXT_COLOR, 2);
    draw_text(frame, 20, cy - 20, or_placeholder(&hud.altitude), TEXT_COLOR, 4);
    draw_text(frame, 30, cy + 20, "M", TEXT_COLOR, 2);

    // Airspeed, right aligned
    let vel = or_placeholder(&hud.velocity);
    let vel_x = w - 20 - (text_width(vel, 4).max(text_width("M/S", 2)) as i64);
    draw_text(frame, vel_x, cy - 40, "CAS", TEXT_COLOR, 2);
    draw_text(frame, vel_x, cy - 20, vel, TEXT_COLOR, 4);
    draw_text(frame, vel_x, cy + 20, "M/S", TEXT_COLOR, 2);

    // Vertical g, lower left
    draw_text(frame, 20, h - 110, "G-Z", TEXT_COLOR, 2);
    draw_text(frame, 20, h - 90, or_placeholder(&hud.g_z), TEXT_COLOR, 4);
    draw_text(frame, 30, h - 50, "G", TEXT_COLOR, 2);

    // Status, lower right
    let status = if hud.status.trim().is_empty() {
        "N/A"
    } else {
        hud.status.trim()
    };
    let sw = text_width(status, 2) as i64;
    draw_text(frame, w - 20 - sw, h - 35, status, TEXT_COLOR, 2);

    // Horizon bars
    draw_hline(frame, cx - 80, cx - 30, cy, 3, LINE_COLOR);
    draw_hline(frame, cx + 30, cx + 80, cy, 3, LINE_COLOR);
    fill_circle(frame, cx, cy, 4, TEXT_COLOR);

    // Pitch ladder
    for i in [-2i64, -1, 1, 2] {
        let y = cy + i * 40;
        if y > 50 && y < h - 50 {
            draw_hline(frame, cx - 100, cx - 85, y, 2, LINE_COLOR);
            draw_hline(frame, cx + 85, cx + 100, y, 2, LINE_COLOR);
        }
    }

    if let Some(text) = waiting {
        let tw = text_width(text, 2) as i64;
        draw_text(frame, cx - tw / 2, cy - 110, text, WAITING_COLOR, 2);
    }
}
