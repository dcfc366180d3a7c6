use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;
use tracing::debug;

use crate::errors::PoetryError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSettings {
    /// Side length of the square sample the statistics are computed on.
    pub analysis_size: u32,
    pub brightness_high: f64,
    pub brightness_low: f64,
    pub saturation_high: f64,
    pub dominance: f64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            analysis_size: 256,
            brightness_high: 0.62,
            brightness_low: 0.38,
            saturation_high: 0.28,
            dominance: 1.05,
        }
    }
}

const GREEN_OVER_BLUE: f64 = 1.05;
const DIM_BLUE_BRIGHTNESS: f64 = 0.5;
const CONTRAST_STD: f64 = 0.18;
const SERENE_BRIGHTNESS: f64 = 0.42;
const LEISURE_BRIGHTNESS: f64 = 0.5;

/// Colour statistics over the normalised analysis sample, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub channel_std_mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleHint {
    GentleLyrical,
    BoldGrandeur,
    PastoralSeclusion,
    ZenEthereal,
    FrontierDesolation,
}

impl StyleHint {
    /// Catalog id of the matching style entry.
    pub const fn id(self) -> &'static str {
        match self {
            StyleHint::GentleLyrical => "gentle-lyrical",
            StyleHint::BoldGrandeur => "bold-grandeur",
            StyleHint::PastoralSeclusion => "pastoral-seclusion",
            StyleHint::ZenEthereal => "zen-ethereal",
            StyleHint::FrontierDesolation => "frontier-desolation",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            StyleHint::GentleLyrical => "婉约抒情风",
            StyleHint::BoldGrandeur => "豪放壮阔风",
            StyleHint::PastoralSeclusion => "田园归隐风",
            StyleHint::ZenEthereal => "禅意空灵风",
            StyleHint::FrontierDesolation => "边塞苍茫风",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    WarmBright,
    SomberVast,
    CoolDistant,
    SoftMellow,
}

impl Tone {
    pub const fn id(self) -> &'static str {
        match self {
            Tone::WarmBright => "warm-bright",
            Tone::SomberVast => "somber-vast",
            Tone::CoolDistant => "cool-distant",
            Tone::SoftMellow => "soft-mellow",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Tone::WarmBright => "明丽暖意",
            Tone::SomberVast => "沉郁苍茫",
            Tone::CoolDistant => "清冷高远",
            Tone::SoftMellow => "柔和恬淡",
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            Tone::WarmBright => "🍑",
            Tone::SomberVast => "🌫️",
            Tone::CoolDistant => "❄️",
            Tone::SoftMellow => "🍂",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scene {
    Countryside,
    Landscape,
    SunsetSky,
    Cultural,
}

impl Scene {
    pub const fn id(self) -> &'static str {
        match self {
            Scene::Countryside => "countryside",
            Scene::Landscape => "landscape",
            Scene::SunsetSky => "sunset-sky",
            Scene::Cultural => "cultural",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Scene::Countryside => "田园乡野",
            Scene::Landscape => "山水景观",
            Scene::SunsetSky => "霞染天际",
            Scene::Cultural => "人文意境",
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            Scene::Countryside => "🌾",
            Scene::Landscape => "🏔️",
            Scene::SunsetSky => "🌅",
            Scene::Cultural => "🏛️",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mood {
    Heroic,
    Serene,
    Leisurely,
    Tender,
}

impl Mood {
    pub const fn id(self) -> &'static str {
        match self {
            Mood::Heroic => "heroic",
            Mood::Serene => "serene",
            Mood::Leisurely => "leisurely",
            Mood::Tender => "tender",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Mood::Heroic => "壮阔豪迈",
            Mood::Serene => "沉静空灵",
            Mood::Leisurely => "闲适恬淡",
            Mood::Tender => "温润抒情",
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            Mood::Heroic => "⚡",
            Mood::Serene => "🧘",
            Mood::Leisurely => "☕",
            Mood::Tender => "💐",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageProfile {
    pub style: StyleHint,
    pub tone: Tone,
    pub scene: Scene,
    pub mood: Mood,
}

type Predicate = fn(&ImageStats, &ProfileSettings) -> bool;

/// One entry of a decision list; the first matching rule wins.
struct Rule<T> {
    matches: Predicate,
    outcome: T,
}

fn first_match<T: Copy>(
    rules: &[Rule<T>],
    fallback: T,
    stats: &ImageStats,
    settings: &ProfileSettings,
) -> T {
    rules
        .iter()
        .find(|rule| (rule.matches)(stats, settings))
        .map(|rule| rule.outcome)
        .unwrap_or(fallback)
}

const STYLE_RULES: [Rule<StyleHint>; 4] = [
    Rule {
        matches: |s, t| s.green >= s.red * t.dominance && s.green >= s.blue * GREEN_OVER_BLUE,
        outcome: StyleHint::PastoralSeclusion,
    },
    Rule {
        matches: |s, t| {
            s.blue >= s.red.max(s.green) * t.dominance
                || (s.brightness < DIM_BLUE_BRIGHTNESS && s.blue >= s.red && s.blue >= s.green)
        },
        outcome: StyleHint::ZenEthereal,
    },
    Rule {
        matches: |s, t| {
            s.red >= s.green.max(s.blue) * t.dominance
                || (s.saturation > t.saturation_high && s.red > s.blue)
        },
        outcome: StyleHint::BoldGrandeur,
    },
    Rule {
        matches: |s, t| {
            s.brightness < t.brightness_low
                || (s.channel_std_mean > CONTRAST_STD && s.red > s.green && s.red > s.blue)
        },
        outcome: StyleHint::FrontierDesolation,
    },
];

const TONE_RULES: [Rule<Tone>; 3] = [
    Rule {
        matches: |s, t| s.brightness > t.brightness_high && s.red >= s.blue,
        outcome: Tone::WarmBright,
    },
    Rule {
        matches: |s, t| s.brightness < t.brightness_low,
        outcome: Tone::SomberVast,
    },
    Rule {
        matches: |s, t| s.blue >= s.red * t.dominance,
        outcome: Tone::CoolDistant,
    },
];

const SCENE_RULES: [Rule<Scene>; 3] = [
    Rule {
        matches: |s, _| s.green >= s.red.max(s.blue),
        outcome: Scene::Countryside,
    },
    Rule {
        matches: |s, _| s.blue >= s.red.max(s.green),
        outcome: Scene::Landscape,
    },
    Rule {
        matches: |s, _| s.red >= s.green.max(s.blue),
        outcome: Scene::SunsetSky,
    },
];

const MOOD_RULES: [Rule<Mood>; 3] = [
    Rule {
        matches: |s, t| s.saturation > t.saturation_high,
        outcome: Mood::Heroic,
    },
    Rule {
        matches: |s, _| s.brightness < SERENE_BRIGHTNESS,
        outcome: Mood::Serene,
    },
    Rule {
        matches: |s, _| s.green > s.red && s.brightness > LEISURE_BRIGHTNESS,
        outcome: Mood::Leisurely,
    },
];

pub fn compute_stats(sample: &RgbImage) -> Result<ImageStats, PoetryError> {
    let pixel_count = sample.width() as usize * sample.height() as usize;
    if pixel_count == 0 {
        return Err(PoetryError::InvalidImage("image has no pixels".to_string()));
    }

    let mut sums = [0.0f64; 3];
    let mut squares = [0.0f64; 3];
    let mut spread_sum = 0.0f64;

    for pixel in sample.pixels() {
        let channels = [
            f64::from(pixel[0]) / 255.0,
            f64::from(pixel[1]) / 255.0,
            f64::from(pixel[2]) / 255.0,
        ];
        let pixel_mean = (channels[0] + channels[1] + channels[2]) / 3.0;
        let mut deviation = 0.0;
        for (idx, value) in channels.iter().enumerate() {
            sums[idx] += value;
            squares[idx] += value * value;
            deviation += (value - pixel_mean).powi(2);
        }
        spread_sum += (deviation / 3.0).sqrt();
    }

    let n = pixel_count as f64;
    let means = sums.map(|sum| sum / n);
    let mut std_total = 0.0;
    for idx in 0..3 {
        let variance = (squares[idx] / n - means[idx] * means[idx]).max(0.0);
        std_total += variance.sqrt();
    }

    Ok(ImageStats {
        red: means[0],
        green: means[1],
        blue: means[2],
        brightness: (means[0] + means[1] + means[2]) / 3.0,
        saturation: spread_sum / n,
        channel_std_mean: std_total / 3.0,
    })
}

pub fn profile_from_stats(stats: &ImageStats, settings: &ProfileSettings) -> ImageProfile {
    ImageProfile {
        style: first_match(&STYLE_RULES, StyleHint::GentleLyrical, stats, settings),
        tone: first_match(&TONE_RULES, Tone::SoftMellow, stats, settings),
        // one channel always ties the maximum, so only NaN means reach the fallback
        scene: first_match(&SCENE_RULES, Scene::Cultural, stats, settings),
        mood: first_match(&MOOD_RULES, Mood::Tender, stats, settings),
    }
}

/// Downscales to the analysis size and classifies the sample.
pub fn analyze_image(
    image: &RgbImage,
    settings: &ProfileSettings,
) -> Result<ImageProfile, PoetryError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PoetryError::InvalidImage("image has no pixels".to_string()));
    }
    let size = settings.analysis_size.max(1);
    let sample = imageops::resize(image, size, size, FilterType::Triangle);
    let stats = compute_stats(&sample)?;
    let profile = profile_from_stats(&stats, settings);
    debug!(
        "Image profile: r={:.3} g={:.3} b={:.3} brightness={:.3} saturation={:.3} std={:.3} -> style={} tone={} scene={} mood={}",
        stats.red,
        stats.green,
        stats.blue,
        stats.brightness,
        stats.saturation,
        stats.channel_std_mean,
        profile.style.id(),
        profile.tone.id(),
        profile.scene.id(),
        profile.mood.id()
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb([r, g, b]))
    }

    fn profile_of(r: u8, g: u8, b: u8) -> ImageProfile {
        analyze_image(&solid(r, g, b), &ProfileSettings::default()).unwrap()
    }

    #[test]
    fn green_dominant_images_are_pastoral() {
        for red in (0u32..=200).step_by(25) {
            for blue in (0u32..=200).step_by(25) {
                let green = ((red.max(blue) as f64) * 1.1 + 2.0).min(255.0) as u32;
                if (green as f64) < red as f64 * 1.05 || (green as f64) < blue as f64 * 1.05 {
                    continue;
                }
                let profile = profile_of(red as u8, green as u8, blue as u8);
                assert_eq!(
                    profile.style,
                    StyleHint::PastoralSeclusion,
                    "rgb=({red},{green},{blue})"
                );
            }
        }
    }

    #[test]
    fn blue_dominant_image_is_zen() {
        assert_eq!(profile_of(40, 60, 200).style, StyleHint::ZenEthereal);
    }

    #[test]
    fn dim_neutral_image_leans_zen_before_frontier() {
        // blue ties the other channels and the image is dim
        assert_eq!(profile_of(40, 40, 40).style, StyleHint::ZenEthereal);
    }

    #[test]
    fn red_dominant_image_is_bold() {
        let profile = profile_of(220, 50, 30);
        assert_eq!(profile.style, StyleHint::BoldGrandeur);
        assert_eq!(profile.scene, Scene::SunsetSky);
        assert_eq!(profile.mood, Mood::Heroic);
    }

    #[test]
    fn dark_warm_image_is_frontier() {
        let profile = profile_of(60, 58, 55);
        assert_eq!(profile.style, StyleHint::FrontierDesolation);
        assert_eq!(profile.tone, Tone::SomberVast);
        assert_eq!(profile.mood, Mood::Serene);
    }

    #[test]
    fn bright_neutral_image_falls_back_to_gentle() {
        let profile = profile_of(200, 198, 195);
        assert_eq!(profile.style, StyleHint::GentleLyrical);
        assert_eq!(profile.tone, Tone::WarmBright);
        assert_eq!(profile.scene, Scene::SunsetSky);
        assert_eq!(profile.mood, Mood::Tender);
    }

    #[test]
    fn labels_are_independent_of_style() {
        // bold style while the tone bucket stays soft-mellow
        let stats = ImageStats {
            red: 0.55,
            green: 0.45,
            blue: 0.5,
            brightness: 0.5,
            saturation: 0.3,
            channel_std_mean: 0.1,
        };
        let profile = profile_from_stats(&stats, &ProfileSettings::default());
        assert_eq!(profile.style, StyleHint::BoldGrandeur);
        assert_eq!(profile.tone, Tone::SoftMellow);
    }

    #[test]
    fn bright_green_image_is_leisurely_countryside() {
        let stats = ImageStats {
            red: 0.5,
            green: 0.8,
            blue: 0.5,
            brightness: 0.6,
            saturation: 0.1,
            channel_std_mean: 0.1,
        };
        let profile = profile_from_stats(&stats, &ProfileSettings::default());
        assert_eq!(profile.style, StyleHint::PastoralSeclusion);
        assert_eq!(profile.tone, Tone::SoftMellow);
        assert_eq!(profile.scene, Scene::Countryside);
        assert_eq!(profile.mood, Mood::Leisurely);
    }

    #[test]
    fn mid_blue_image_is_cool_landscape() {
        let stats = ImageStats {
            red: 0.35,
            green: 0.45,
            blue: 0.7,
            brightness: 0.5,
            saturation: 0.1,
            channel_std_mean: 0.1,
        };
        let profile = profile_from_stats(&stats, &ProfileSettings::default());
        assert_eq!(profile.style, StyleHint::ZenEthereal);
        assert_eq!(profile.tone, Tone::CoolDistant);
        assert_eq!(profile.scene, Scene::Landscape);
        // brightness must exceed 0.5 for leisurely
        assert_eq!(profile.mood, Mood::Tender);
    }

    #[test]
    fn cultural_scene_needs_undefined_means() {
        let settings = ProfileSettings::default();
        let steps: Vec<f64> = (0..=10).map(|step| step as f64 / 10.0).collect();
        for &red in &steps {
            for &green in &steps {
                for &blue in &steps {
                    let stats = ImageStats {
                        red,
                        green,
                        blue,
                        brightness: (red + green + blue) / 3.0,
                        saturation: 0.0,
                        channel_std_mean: 0.0,
                    };
                    assert_ne!(
                        profile_from_stats(&stats, &settings).scene,
                        Scene::Cultural,
                        "rgb=({red},{green},{blue})"
                    );
                }
            }
        }

        let undefined = ImageStats {
            red: f64::NAN,
            green: f64::NAN,
            blue: f64::NAN,
            brightness: f64::NAN,
            saturation: f64::NAN,
            channel_std_mean: f64::NAN,
        };
        assert_eq!(
            profile_from_stats(&undefined, &settings).scene,
            Scene::Cultural
        );
    }

    #[test]
    fn high_contrast_warm_image_is_frontier() {
        let stats = ImageStats {
            red: 0.5,
            green: 0.49,
            blue: 0.48,
            brightness: 0.49,
            saturation: 0.05,
            channel_std_mean: 0.25,
        };
        let profile = profile_from_stats(&stats, &ProfileSettings::default());
        assert_eq!(profile.style, StyleHint::FrontierDesolation);
    }

    #[test]
    fn stats_on_split_image_are_exact() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 0, 255]));
        let stats = compute_stats(&image).unwrap();
        assert!((stats.red - 0.5).abs() < 1e-9);
        assert!((stats.green - 0.0).abs() < 1e-9);
        assert!((stats.blue - 0.5).abs() < 1e-9);
        assert!((stats.brightness - 1.0 / 3.0).abs() < 1e-9);
        // each pixel is (1,0,0) around mean 1/3: rms deviation sqrt(2)/3
        assert!((stats.saturation - 2f64.sqrt() / 3.0).abs() < 1e-9);
        assert!((stats.channel_std_mean - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn analysis_is_reproducible() {
        let mut image = RgbImage::new(300, 200);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
        let settings = ProfileSettings::default();
        let first = analyze_image(&image, &settings).unwrap();
        let second = analyze_image(&image, &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let image = RgbImage::new(0, 0);
        let err = analyze_image(&image, &ProfileSettings::default()).unwrap_err();
        assert!(matches!(err, PoetryError::InvalidImage(_)));
    }

    #[test]
    fn thresholds_come_from_settings() {
        let stats = ImageStats {
            red: 0.5,
            green: 0.5,
            blue: 0.5,
            brightness: 0.5,
            saturation: 0.0,
            channel_std_mean: 0.0,
        };
        let strict = ProfileSettings {
            brightness_low: 0.6,
            ..ProfileSettings::default()
        };
        // blue ties red and green but the image is not dim enough for zen
        assert_eq!(
            profile_from_stats(&stats, &ProfileSettings::default()).style,
            StyleHint::GentleLyrical
        );
        assert_eq!(
            profile_from_stats(&stats, &strict).style,
            StyleHint::FrontierDesolation
        );
    }
}
