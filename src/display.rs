//! Terminal display of a finished frame. The frame buffer stores rows
//! bottom-up, so every mode here walks rows from the top down.

use crate::renderer::FrameBuffer;
use crossterm::style::{self, Stylize};
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DisplayMode {
    /// Half-block characters (▀) with separate fg/bg colors — two vertical
    /// pixels per terminal cell.
    HalfBlock,
    /// ANSI 24-bit true-color full blocks, one pixel per cell.
    TrueColor,
    /// ASCII grayscale density ramp.
    Ascii,
}

pub fn print_frame(frame: &FrameBuffer, mode: DisplayMode) {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    match mode {
        DisplayMode::HalfBlock => half_block(&mut out, frame),
        DisplayMode::TrueColor => true_color(&mut out, frame),
        DisplayMode::Ascii => ascii(&mut out, frame),
    }
    let _ = out.flush();
}

/// Image row `row` counted from the top maps to buffer row `height-1-row`.
fn rgb_at(frame: &FrameBuffer, x: u32, row_from_top: u32) -> (u8, u8, u8) {
    let [r, g, b, _] = frame.pixel(x, frame.height() - 1 - row_from_top);
    (r, g, b)
}

fn true_color(out: &mut impl Write, frame: &FrameBuffer) {
    for row in 0..frame.height() {
        for x in 0..frame.width() {
            let (r, g, b) = rgb_at(frame, x, row);
            let _ = write!(out, "{}", "█".with(style::Color::Rgb { r, g, b }));
        }
        let _ = writeln!(out);
    }
}

fn half_block(out: &mut impl Write, frame: &FrameBuffer) {
    let rows = frame.height() / 2;
    for row in 0..rows {
        for x in 0..frame.width() {
            let (tr, tg, tb) = rgb_at(frame, x, row * 2);
            let (br, bg, bb) = rgb_at(frame, x, row * 2 + 1);
            let _ = write!(
                out,
                "{}",
                "▀".with(style::Color::Rgb {
                    r: tr,
                    g: tg,
                    b: tb
                })
                .on(style::Color::Rgb {
                    r: br,
                    g: bg,
                    b: bb
                })
            );
        }
        let _ = writeln!(out);
    }
}

fn ascii(out: &mut impl Write, frame: &FrameBuffer) {
    const RAMP: &[u8] = b" .:-=+*#%@";
    for row in 0..frame.height() {
        for x in 0..frame.width() {
            let (r, g, b) = rgb_at(frame, x, row);
            let lum =
                (0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64) / 255.0;
            let idx = (lum.clamp(0.0, 0.999) * RAMP.len() as f64) as usize;
            let _ = write!(out, "{}", RAMP[idx] as char);
        }
        let _ = writeln!(out);
    }
}
