//! Frame-to-color reductions.
//!
//! Every reduction is deterministic and linear in the pixel count. Channel
//! means use floor division, and an empty buffer reduces to black.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

use super::Rgb;
use crate::capture::{Bgra, PixelBuffer};

/// Color extraction strategy, chosen at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionAlgorithm {
    /// Mean of every pixel
    #[default]
    Average,
    /// Most frequent exact BGRA value
    Dominant,
    /// Mean over every `grid`-th pixel in both directions
    SpatialAverage { grid: u32 },
    /// Most frequent RGB value, alpha ignored
    Histogram,
    /// Mean weighted by per-pixel brightness
    BrightnessWeighted,
    /// Mean of the top band when the frame is split into `regions` bands
    RegionSplit { regions: u32 },
    /// Mean of pixels on strong color edges
    EdgeWeighted,
}

impl ExtractionAlgorithm {
    /// The standard set, with the grid and band counts used for comparisons.
    pub const CATALOG: [ExtractionAlgorithm; 7] = [
        ExtractionAlgorithm::Average,
        ExtractionAlgorithm::Dominant,
        ExtractionAlgorithm::SpatialAverage { grid: 10 },
        ExtractionAlgorithm::Histogram,
        ExtractionAlgorithm::BrightnessWeighted,
        ExtractionAlgorithm::RegionSplit { regions: 2 },
        ExtractionAlgorithm::EdgeWeighted,
    ];

    /// Reduce `buffer` to a single color.
    pub fn extract(&self, buffer: &PixelBuffer) -> Rgb {
        match *self {
            ExtractionAlgorithm::Average => average(buffer),
            ExtractionAlgorithm::Dominant => dominant(buffer),
            ExtractionAlgorithm::SpatialAverage { grid } => spatial_average(buffer, grid),
            ExtractionAlgorithm::Histogram => histogram(buffer),
            ExtractionAlgorithm::BrightnessWeighted => brightness_weighted(buffer),
            ExtractionAlgorithm::RegionSplit { regions } => region_split(buffer, regions)
                .first()
                .copied()
                .unwrap_or_else(|| average(buffer)),
            ExtractionAlgorithm::EdgeWeighted => edge_weighted(buffer),
        }
    }

    /// Run every catalog algorithm over the same frame.
    pub fn compare(buffer: &PixelBuffer) -> Vec<(ExtractionAlgorithm, Rgb)> {
        Self::CATALOG.iter().map(|algorithm| (*algorithm, algorithm.extract(buffer))).collect()
    }
}

impl fmt::Display for ExtractionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionAlgorithm::Average => f.write_str("average"),
            ExtractionAlgorithm::Dominant => f.write_str("dominant"),
            ExtractionAlgorithm::SpatialAverage { grid } => write!(f, "spatial average (grid {grid})"),
            ExtractionAlgorithm::Histogram => f.write_str("histogram"),
            ExtractionAlgorithm::BrightnessWeighted => f.write_str("brightness weighted"),
            ExtractionAlgorithm::RegionSplit { regions } => write!(f, "region split ({regions} bands)"),
            ExtractionAlgorithm::EdgeWeighted => f.write_str("edge weighted"),
        }
    }
}

#[derive(Default)]
struct ChannelSums {
    r: u64,
    g: u64,
    b: u64,
    weight: u64,
}

impl ChannelSums {
    fn add(&mut self, pixel: Bgra, weight: u64) {
        self.r += u64::from(pixel.r) * weight;
        self.g += u64::from(pixel.g) * weight;
        self.b += u64::from(pixel.b) * weight;
        self.weight += weight;
    }

    fn mean(&self) -> Option<Rgb> {
        if self.weight == 0 {
            return None;
        }
        // Each quotient is bounded by the largest channel value
        Some(Rgb::new(
            (self.r / self.weight) as u8,
            (self.g / self.weight) as u8,
            (self.b / self.weight) as u8,
        ))
    }
}

fn mean_of(pixels: impl Iterator<Item = Bgra>) -> Option<Rgb> {
    let mut sums = ChannelSums::default();
    pixels.for_each(|p| sums.add(p, 1));
    sums.mean()
}

/// Most frequent key; ties go to the key seen first.
fn mode_of<K: Eq + Hash + Copy>(keys: impl Iterator<Item = K>) -> Option<K> {
    let mut counts: HashMap<K, (usize, usize)> = HashMap::new();
    for (index, key) in keys.enumerate() {
        match counts.entry(key) {
            Entry::Occupied(mut e) => e.get_mut().0 += 1,
            Entry::Vacant(e) => {
                e.insert((1, index));
            }
        }
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(key, _)| key)
}

pub fn average(buffer: &PixelBuffer) -> Rgb {
    mean_of(buffer.pixels()).unwrap_or(Rgb::BLACK)
}

pub fn dominant(buffer: &PixelBuffer) -> Rgb {
    mode_of(buffer.pixels()).map(Rgb::from).unwrap_or(Rgb::BLACK)
}

/// Mean over the pixels at `(i * grid, j * grid)`, or [`average`] when `grid` is 0.
pub fn spatial_average(buffer: &PixelBuffer, grid: u32) -> Rgb {
    if grid == 0 {
        return average(buffer);
    }
    let step = grid as usize;
    let samples = (0..buffer.height())
        .step_by(step)
        .flat_map(|y| (0..buffer.width()).step_by(step).map(move |x| (x, y)))
        .map(|(x, y)| buffer.pixel(x, y));
    mean_of(samples).unwrap_or_else(|| average(buffer))
}

pub fn histogram(buffer: &PixelBuffer) -> Rgb {
    mode_of(buffer.pixels().map(Rgb::from)).unwrap_or(Rgb::BLACK)
}

/// Mean weighted by `(r + g + b) / 3`, or [`average`] when every pixel is black.
pub fn brightness_weighted(buffer: &PixelBuffer) -> Rgb {
    let mut sums = ChannelSums::default();
    for pixel in buffer.pixels() {
        let brightness = (u64::from(pixel.r) + u64::from(pixel.g) + u64::from(pixel.b)) / 3;
        sums.add(pixel, brightness);
    }
    sums.mean().unwrap_or_else(|| average(buffer))
}

/// Mean of each of `regions` horizontal bands of `height / regions` rows.
///
/// Rows left over by the division belong to no band. When the bands would
/// be empty every band reports the whole-frame average.
pub fn region_split(buffer: &PixelBuffer, regions: u32) -> Vec<Rgb> {
    if regions == 0 {
        return Vec::new();
    }
    let band_height = buffer.height() / regions;
    if band_height == 0 {
        return vec![average(buffer); regions as usize];
    }

    (0..regions)
        .map(|band| {
            let rows = band * band_height..(band + 1) * band_height;
            mean_of(rows.flat_map(|y| buffer.row(y))).unwrap_or(Rgb::BLACK)
        })
        .collect()
}

fn channel_distance(a: Bgra, b: Bgra) -> u32 {
    u32::from(a.r.abs_diff(b.r)) + u32::from(a.g.abs_diff(b.g)) + u32::from(a.b.abs_diff(b.b))
}

/// Pixels whose summed difference to the right and lower neighbours exceeds this are edges.
const EDGE_THRESHOLD: u32 = 128;

/// Mean of the interior pixels that sit on an edge, or [`average`] if none do.
pub fn edge_weighted(buffer: &PixelBuffer) -> Rgb {
    let (width, height) = (buffer.width(), buffer.height());
    let mut sums = ChannelSums::default();

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let pixel = buffer.pixel(x, y);
            let dx = channel_distance(pixel, buffer.pixel(x + 1, y));
            let dy = channel_distance(pixel, buffer.pixel(x, y + 1));
            if dx + dy > EDGE_THRESHOLD {
                sums.add(pixel, 1);
            }
        }
    }

    sums.mean().unwrap_or_else(|| average(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn px(r: u8, g: u8, b: u8) -> Bgra {
        Bgra::opaque(r, g, b)
    }

    fn buffer(width: u32, height: u32, pixels: &[Bgra]) -> PixelBuffer {
        PixelBuffer::from_pixels(width, height, pixels).unwrap()
    }

    fn all_single_color() -> impl Iterator<Item = ExtractionAlgorithm> {
        ExtractionAlgorithm::CATALOG.into_iter().chain([
            ExtractionAlgorithm::SpatialAverage { grid: 0 },
            ExtractionAlgorithm::SpatialAverage { grid: 3 },
            ExtractionAlgorithm::RegionSplit { regions: 0 },
            ExtractionAlgorithm::RegionSplit { regions: 7 },
        ])
    }

    #[test]
    fn average_floors_each_channel() {
        let image = buffer(2, 1, &[px(10, 0, 255), px(11, 1, 0)]);
        assert_eq!(average(&image), Rgb::new(10, 0, 127));
    }

    #[test]
    fn dominant_picks_the_majority() {
        // 3x3 where 5 pixels are red, 4 blue
        let mut pixels = vec![px(255, 0, 0); 5];
        pixels.extend(vec![px(0, 0, 255); 4]);
        let image = buffer(3, 3, &pixels);

        assert_eq!(dominant(&image), Rgb::RED);
        assert_eq!(histogram(&image), Rgb::RED);
    }

    #[test]
    fn ties_go_to_first_seen() {
        let image = buffer(4, 1, &[px(0, 255, 0), px(9, 9, 9), px(9, 9, 9), px(0, 255, 0)]);
        assert_eq!(dominant(&image), Rgb::new(0, 255, 0));
        assert_eq!(histogram(&image), Rgb::new(0, 255, 0));
    }

    #[test]
    fn dominant_distinguishes_alpha_histogram_does_not() {
        let translucent = Bgra { a: 10, ..px(1, 2, 3) };
        let image = buffer(3, 1, &[px(7, 7, 7), translucent, px(1, 2, 3)]);

        assert_eq!(dominant(&image), Rgb::new(7, 7, 7));
        assert_eq!(histogram(&image), Rgb::new(1, 2, 3));
    }

    #[test]
    fn spatial_average_samples_the_grid() {
        // Only (0,0) and (2,0) are sampled with grid 2 on a 3x1 image
        let image = buffer(3, 1, &[px(100, 0, 0), px(255, 255, 255), px(50, 0, 0)]);
        assert_eq!(spatial_average(&image, 2), Rgb::new(75, 0, 0));
        assert_eq!(spatial_average(&image, 0), average(&image));
    }

    #[test]
    fn brightness_weighting_favours_bright_pixels() {
        let image = buffer(2, 1, &[px(30, 30, 30), px(240, 240, 240)]);
        // weights 30 and 240: (30*30 + 240*240) / 270 = 216
        assert_eq!(brightness_weighted(&image), Rgb::new(216, 216, 216));

        let black = PixelBuffer::filled(2, 2, px(0, 0, 0));
        assert_eq!(brightness_weighted(&black), Rgb::BLACK);
    }

    #[test]
    fn region_split_averages_each_band() {
        let mut pixels = vec![px(200, 0, 0); 4];
        pixels.extend(vec![px(0, 0, 200); 4]);
        pixels.extend(vec![px(0, 255, 0); 2]);
        let image = buffer(2, 5, &pixels);

        // 5 rows into 2 bands of 2 rows; the fifth row is ignored
        assert_eq!(region_split(&image, 2), vec![Rgb::new(200, 0, 0), Rgb::new(0, 0, 200)]);
        assert!(region_split(&image, 0).is_empty());
        assert_eq!(region_split(&image, 6), vec![average(&image); 6]);
    }

    #[test]
    fn edge_weighting_uses_interior_edges() {
        // 4x3 with a bright column at x=2; the edge at (1,1) compares against it
        let dark = px(0, 0, 0);
        let bright = px(200, 100, 0);
        #[rustfmt::skip]
        let image = buffer(4, 3, &[
            dark, dark, bright, dark,
            dark, dark, bright, dark,
            dark, dark, bright, dark,
        ]);

        // (1,1): dx = 300 > 128, counted (black). (2,1): dx = 300, counted (bright).
        assert_eq!(edge_weighted(&image), Rgb::new(100, 50, 0));
    }

    #[test]
    fn edge_weighting_without_edges_falls_back() {
        let image = PixelBuffer::filled(5, 5, px(10, 20, 30));
        assert_eq!(edge_weighted(&image), Rgb::new(10, 20, 30));

        let thin = buffer(2, 1, &[px(0, 0, 0), px(255, 255, 255)]);
        assert_eq!(edge_weighted(&thin), average(&thin));
    }

    #[test]
    fn empty_buffer_is_black() {
        let empty = PixelBuffer::default();
        for algorithm in all_single_color() {
            assert_eq!(algorithm.extract(&empty), Rgb::BLACK, "{algorithm}");
        }
    }

    #[test]
    fn compare_reports_every_catalog_entry() {
        let image = PixelBuffer::filled(4, 4, px(1, 2, 3));
        let results = ExtractionAlgorithm::compare(&image);
        assert_eq!(results.len(), ExtractionAlgorithm::CATALOG.len());
        assert!(results.iter().all(|(_, color)| *color == Rgb::new(1, 2, 3)));
    }

    #[test]
    fn algorithm_deserializes_from_tagged_yaml() {
        let algorithm: ExtractionAlgorithm =
            serde_yaml_ng::from_str("kind: spatial_average\ngrid: 4\n").unwrap();
        assert_eq!(algorithm, ExtractionAlgorithm::SpatialAverage { grid: 4 });

        let algorithm: ExtractionAlgorithm = serde_yaml_ng::from_str("kind: dominant\n").unwrap();
        assert_eq!(algorithm, ExtractionAlgorithm::Dominant);
    }

    proptest! {
        #[test]
        fn uniform_frames_reduce_to_their_color(
            width in 1u32..12,
            height in 1u32..12,
            r in any::<u8>(),
            g in any::<u8>(),
            b in any::<u8>(),
        ) {
            let image = PixelBuffer::filled(width, height, px(r, g, b));
            for algorithm in all_single_color() {
                prop_assert_eq!(algorithm.extract(&image), Rgb::new(r, g, b), "{}", algorithm);
            }
        }

        #[test]
        fn averages_ignore_pixel_order(
            (width, height, pixels, shuffled) in (1u32..9, 1u32..9)
                .prop_flat_map(|(width, height)| {
                    let pixels = prop::collection::vec(any::<(u8, u8, u8)>(), (width * height) as usize);
                    (Just(width), Just(height), pixels)
                })
                .prop_flat_map(|(width, height, pixels)| {
                    let shuffled = Just(pixels.clone()).prop_shuffle();
                    (Just(width), Just(height), Just(pixels), shuffled)
                }),
        ) {
            let to_bgra = |v: &[(u8, u8, u8)]| v.iter().map(|&(r, g, b)| px(r, g, b)).collect::<Vec<_>>();
            let a = buffer(width, height, &to_bgra(&pixels));
            let b = buffer(width, height, &to_bgra(&shuffled));
            prop_assert_eq!(average(&a), average(&b));
            prop_assert_eq!(brightness_weighted(&a), brightness_weighted(&b));
        }

        #[test]
        fn strict_majority_wins_the_mode(
            (width, height, majority, pixels) in (1u32..9, 1u32..9, any::<(u8, u8, u8)>())
                .prop_flat_map(|(width, height, majority)| {
                    let total = (width * height) as usize;
                    let others = prop::collection::vec(any::<(u8, u8, u8)>(), (total - 1) / 2);
                    (Just(width), Just(height), Just(majority), others)
                })
                .prop_flat_map(|(width, height, majority, others)| {
                    let total = (width * height) as usize;
                    let mut pixels = vec![majority; total - others.len()];
                    pixels.extend(others);
                    (Just(width), Just(height), Just(majority), Just(pixels).prop_shuffle())
                }),
        ) {
            let pixels: Vec<Bgra> = pixels.iter().map(|&(r, g, b)| px(r, g, b)).collect();
            let image = buffer(width, height, &pixels);
            let (r, g, b) = majority;
            prop_assert_eq!(dominant(&image), Rgb::new(r, g, b));
            prop_assert_eq!(histogram(&image), Rgb::new(r, g, b));
        }
    }
}
