//! Nearest-ratio matching from a requested pixel size.
//!
//! The generation endpoint takes one of a small set of aspect ratios, while
//! the SDK contract lets callers ask for an arbitrary "WIDTHxHEIGHT" size.

const RATIO_TOLERANCE: f64 = 0.1;
const DEFAULT_ASPECT_RATIO: &str = "1:1";

fn supported_ratios() -> [(&'static str, f64); 7] {
    [
        ("1:1", 1.0),
        ("16:9", 16.0 / 9.0),
        ("9:16", 9.0 / 16.0),
        ("4:3", 4.0 / 3.0),
        ("3:4", 3.0 / 4.0),
        ("3:2", 3.0 / 2.0),
        ("2:3", 2.0 / 3.0),
    ]
}

/// Pixel sizes that map exactly onto a supported ratio; anything else gets a
/// size-unsupported warning before falling back to nearest-ratio matching.
const SUPPORTED_SIZES: [&str; 7] = [
    "1024x1024",
    "1920x1080",
    "1080x1920",
    "1280x960",
    "960x1280",
    "1440x960",
    "960x1440",
];

pub fn is_supported_ratio(ratio: &str) -> bool {
    supported_ratios().iter().any(|(name, _)| *name == ratio)
}

pub fn is_supported_size(size: &str) -> bool {
    SUPPORTED_SIZES.contains(&size)
}

fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.trim().split_once(['x', 'X'])?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

/// Map an arbitrary "WIDTHxHEIGHT" size onto the nearest supported aspect
/// ratio. Falls back to 1:1 when the size is unparseable or no candidate is
/// within tolerance of the width/height ratio.
pub fn nearest_aspect_ratio(size: &str) -> &'static str {
    let Some((width, height)) = parse_size(size) else {
        return DEFAULT_ASPECT_RATIO;
    };
    let ratio = f64::from(width) / f64::from(height);

    let mut best: Option<(&'static str, f64)> = None;
    for (name, value) in supported_ratios() {
        let distance = (ratio - value).abs();
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((name, distance));
        }
    }

    match best {
        Some((name, distance)) if distance <= RATIO_TOLERANCE => name,
        _ => DEFAULT_ASPECT_RATIO,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_supported_size, nearest_aspect_ratio};

    #[test]
    fn exact_sizes_map_to_their_ratio() {
        assert_eq!(nearest_aspect_ratio("1920x1080"), "16:9");
        assert_eq!(nearest_aspect_ratio("1080x1920"), "9:16");
        assert_eq!(nearest_aspect_ratio("800x800"), "1:1");
    }

    #[test]
    fn near_misses_snap_to_the_closest_ratio_within_tolerance() {
        // 500/333 = 1.502, closest to 3:2 = 1.5
        assert_eq!(nearest_aspect_ratio("500x333"), "3:2");
    }

    #[test]
    fn extreme_ratios_fall_back_to_square() {
        assert_eq!(nearest_aspect_ratio("2000x100"), "1:1");
    }

    #[test]
    fn unparseable_sizes_fall_back_to_square() {
        assert_eq!(nearest_aspect_ratio("banana"), "1:1");
        assert_eq!(nearest_aspect_ratio("1024x"), "1:1");
        assert_eq!(nearest_aspect_ratio("0x100"), "1:1");
    }

    #[test]
    fn allow_list_membership() {
        assert!(is_supported_size("1024x1024"));
        assert!(!is_supported_size("500x333"));
    }
}
