use std::env;
use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::imaging::profile::ProfileSettings;
use crate::llm::gateway::SamplingParams;
use crate::session::state::SessionSettings;

pub const MAX_TOKENS_MIN: u32 = 128;
pub const MAX_TOKENS_MAX: u32 = 1024;
pub const TOP_P_MIN: f32 = 0.1;
pub const TOP_P_MAX: f32 = 1.0;
pub const TEMPERATURE_MIN: f32 = 0.1;
pub const TEMPERATURE_MAX: f32 = 2.0;

/// Snapshot turns kept inside each gallery entry.
pub const ENTRY_HISTORY_LIMIT: usize = 10;

pub const FOLLOW_UP_SUGGESTIONS: [(&str, &str); 5] = [
    (
        "强化画面意象",
        "请丰富图中主要物象的质感与动态描写，让画面更鲜活。",
    ),
    (
        "增强情绪张力",
        "请增强整首诗的情绪起伏，加入更具感染力的情感表达。",
    ),
    (
        "融入文化典故",
        "请引入恰当的经典诗句或典故，让作品更具文化厚度。",
    ),
    (
        "突出时间气息",
        "请点明画面的季节、时辰或天气变化，增强现场感。",
    ),
    (
        "调整节奏结构",
        "请在诗句之间增加转折或对比，让节奏更富层次。",
    ),
];

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub poetry_model: String,
    pub generation_timeout_seconds: u64,
    pub default_max_tokens: u32,
    pub default_top_p: f32,
    pub default_temperature: f32,
    pub default_format: String,
    pub default_style: String,
    pub max_recent_entries: usize,
    pub image_analysis_size: u32,
    pub image_save_quality: u8,
    pub brightness_high_threshold: f64,
    pub brightness_low_threshold: f64,
    pub saturation_high_threshold: f64,
    pub color_dominance_threshold: f64,
    pub catalog_path: Option<PathBuf>,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_optional_path(name: &str) -> Option<PathBuf> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn normalize_quality(value: u32) -> u8 {
    if (1..=100).contains(&value) {
        return value as u8;
    }
    warn!("IMAGE_SAVE_QUALITY={} is outside 1..=100; using 85.", value);
    85
}

impl Config {
    pub fn load() -> Result<Self> {
        let max_recent_entries = env_usize("MAX_RECENT_ENTRIES", 6).max(1);
        let image_analysis_size = env_u32("IMAGE_ANALYSIS_SIZE", 256).max(1);

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_optional_path("LOG_DIR").unwrap_or_else(|| PathBuf::from("logs")),
            openrouter_api_key: env_string("OPENROUTER_API_KEY", ""),
            openrouter_base_url: env_string("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            poetry_model: env_string("POETRY_MODEL", "qwen/qwen3-vl-8b-instruct"),
            generation_timeout_seconds: env_u64("GENERATION_TIMEOUT_SECONDS", 0),
            default_max_tokens: env_u32("DEFAULT_MAX_TOKENS", 512),
            default_top_p: env_f32("DEFAULT_TOP_P", 0.8),
            default_temperature: env_f32("DEFAULT_TEMPERATURE", 0.7),
            default_format: env_string("DEFAULT_FORMAT", "five-character quatrain"),
            default_style: env_string("DEFAULT_STYLE", "gentle-lyrical"),
            max_recent_entries,
            image_analysis_size,
            image_save_quality: normalize_quality(env_u32("IMAGE_SAVE_QUALITY", 85)),
            brightness_high_threshold: env_f64("BRIGHTNESS_HIGH_THRESHOLD", 0.62),
            brightness_low_threshold: env_f64("BRIGHTNESS_LOW_THRESHOLD", 0.38),
            saturation_high_threshold: env_f64("SATURATION_HIGH_THRESHOLD", 0.28),
            color_dominance_threshold: env_f64("COLOR_DOMINANCE_THRESHOLD", 1.05),
            catalog_path: env_optional_path("CATALOG_PATH"),
        })
    }

    pub fn profile_settings(&self) -> ProfileSettings {
        ProfileSettings {
            analysis_size: self.image_analysis_size,
            brightness_high: self.brightness_high_threshold,
            brightness_low: self.brightness_low_threshold,
            saturation_high: self.saturation_high_threshold,
            dominance: self.color_dominance_threshold,
        }
    }

    pub fn default_sampling(&self) -> SamplingParams {
        SamplingParams::new(
            self.default_max_tokens,
            self.default_top_p,
            self.default_temperature,
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_recent_entries: self.max_recent_entries,
            image_quality: self.image_save_quality,
            sampling: self.default_sampling(),
        }
    }
}
