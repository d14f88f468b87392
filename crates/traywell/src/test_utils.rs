//! Shared synthetic scenes for image-based unit tests.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::config::AnalyzeConfig;
use crate::tray_layout::TrayLayout;
use crate::well::PixelPos;

pub(crate) const NEGATIVE_COLOR: Rgb<u8> = Rgb([255, 235, 255]);
pub(crate) const POSITIVE_COLOR: Rgb<u8> = Rgb([255, 235, 80]);
pub(crate) const OVERFLOW_COLOR: Rgb<u8> = Rgb([150, 150, 150]);
const TRAY_BODY_COLOR: Rgb<u8> = Rgb([20, 20, 20]);

/// Render a filled disk of `fg` on `bg` (all channels equal) and return the
/// disk pixels sorted by (row, col).
pub(crate) fn disk_scene(
    w: u32,
    h: u32,
    center: PixelPos,
    radius: f64,
    fg: u8,
    bg: u8,
) -> (RgbImage, Vec<PixelPos>) {
    let mut img = RgbImage::from_pixel(w, h, Rgb([bg, bg, bg]));
    let mut disk = Vec::new();
    for row in 0..h as i32 {
        for col in 0..w as i32 {
            if PixelPos::new(row, col).distance(center) <= radius {
                img.put_pixel(col as u32, row as u32, Rgb([fg, fg, fg]));
                disk.push(PixelPos::new(row, col));
            }
        }
    }
    (img, disk)
}

/// Square blocks laid out on a regular grid.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockGrid {
    /// Top-left corner `(y, x)` of the first block.
    pub first: (i32, i32),
    pub block: u32,
    pub pitch: i32,
    pub rows: usize,
    pub cols: usize,
}

impl BlockGrid {
    /// 5×10 grid of 32 px blocks at a 49 px pitch.
    pub(crate) fn standard() -> Self {
        Self {
            first: (110, 50),
            block: 32,
            pitch: 49,
            rows: 5,
            cols: 10,
        }
    }

    pub(crate) fn top_left(&self, row: usize, col: usize) -> (i32, i32) {
        (
            self.first.0 + row as i32 * self.pitch,
            self.first.1 + col as i32 * self.pitch,
        )
    }

    /// Exact block center `(y, x)`.
    pub(crate) fn center(&self, row: usize, col: usize) -> (f64, f64) {
        let (y, x) = self.top_left(row, col);
        let half = (self.block as f64 - 1.0) / 2.0;
        (y as f64 + half, x as f64 + half)
    }

    pub(crate) fn draw(&self, img: &mut RgbImage, color: impl Fn(usize, usize) -> Rgb<u8>) {
        for r in 0..self.rows {
            for c in 0..self.cols {
                let (y, x) = self.top_left(r, c);
                draw_filled_rect_mut(
                    img,
                    Rect::at(x, y).of_size(self.block, self.block),
                    color(r, c),
                );
            }
        }
    }
}

/// A 640×480 photograph-like tray: black surroundings, a dim tray body, a
/// 5×10 block grid and an overflow reservoir to the right.
pub(crate) struct SyntheticTray {
    pub image: RgbImage,
    pub grid: BlockGrid,
    pub n_positive: usize,
}

pub(crate) fn synthetic_tray(positive: impl Fn(usize, usize) -> bool) -> SyntheticTray {
    let mut image = RgbImage::new(640, 480);
    draw_filled_rect_mut(&mut image, Rect::at(20, 85).of_size(600, 395), TRAY_BODY_COLOR);
    draw_filled_rect_mut(&mut image, Rect::at(560, 230).of_size(53, 250), OVERFLOW_COLOR);

    let grid = BlockGrid::standard();
    grid.draw(&mut image, |r, c| {
        if positive(r, c) {
            POSITIVE_COLOR
        } else {
            NEGATIVE_COLOR
        }
    });
    let n_positive = count_hits(grid.rows, grid.cols, &positive);

    SyntheticTray {
        image,
        grid,
        n_positive,
    }
}

fn count_hits(rows: usize, cols: usize, hit: impl Fn(usize, usize) -> bool) -> usize {
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .filter(|&(r, c)| hit(r, c))
        .count()
}

/// Small-well companion of [`SyntheticTray`].
pub(crate) struct SyntheticSmallWellTray {
    pub image: RgbImage,
    pub big: BlockGrid,
    pub small: BlockGrid,
    pub n_big_positive: usize,
    pub n_small_positive: usize,
}

/// A 640×480 tray with 6×8 big wells and the ragged 10×5 small-well block
/// to their left, drawn at about 2.3 px/mm.
pub(crate) fn synthetic_small_well_tray(
    big_positive: impl Fn(usize, usize) -> bool,
    small_positive: impl Fn(usize, usize) -> bool,
) -> SyntheticSmallWellTray {
    let mut image = RgbImage::new(640, 480);
    draw_filled_rect_mut(&mut image, Rect::at(15, 85).of_size(625, 395), TRAY_BODY_COLOR);
    draw_filled_rect_mut(&mut image, Rect::at(582, 230).of_size(53, 250), OVERFLOW_COLOR);

    let big = BlockGrid {
        first: (110, 170),
        block: 32,
        pitch: 49,
        rows: 6,
        cols: 8,
    };
    let small = BlockGrid {
        first: (120, 30),
        block: 14,
        pitch: 27,
        rows: 10,
        cols: 5,
    };
    let small_shape = TrayLayout::with_small_wells().small_shape();
    let color = |positive: bool| if positive { POSITIVE_COLOR } else { NEGATIVE_COLOR };
    big.draw(&mut image, |r, c| color(big_positive(r, c)));
    small.draw(&mut image, |r, c| {
        if small_shape.contains(r, c) {
            color(small_positive(r, c))
        } else {
            TRAY_BODY_COLOR
        }
    });

    let n_big_positive = count_hits(big.rows, big.cols, &big_positive);
    let n_small_positive = count_hits(small.rows, small.cols, |r, c| {
        small_shape.contains(r, c) && small_positive(r, c)
    });

    SyntheticSmallWellTray {
        image,
        big,
        small,
        n_big_positive,
        n_small_positive,
    }
}

/// Defaults without lens distortion and with a fixed sampler seed, so the
/// working frame is the input shifted by the padding.
pub(crate) fn undistorted_config() -> AnalyzeConfig {
    let mut cfg = AnalyzeConfig::default();
    cfg.unwarp.k = 0.0;
    cfg.grow.rng_seed = Some(7);
    cfg
}
