//! Pipeline configuration: generation mode, deck length, theme, resolution,
//! and the knobs that govern chunking, concurrency, and retries.
//!
//! Configuration is assembled through [`PipelineConfig::builder`] and is
//! read-only for the duration of a run. [`PipelineConfig::from_env`] layers
//! `DECKSMITH_*` environment variables (loaded via `dotenvy`) over the
//! defaults for headless deployments.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Mode / length / theme / resolution tags ────────────────────────────

/// Generation mode: trades fidelity for latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideMode {
    /// Fewer tokens, draft-quality images.
    Fast,
    /// Full-quality generation.
    #[default]
    Normal,
}

/// Target deck length bucket. Scales the planner's slide-count estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthBucket {
    /// 5–10 slides.
    Short,
    /// 10–15 slides.
    #[default]
    Medium,
    /// 15–25 slides.
    Long,
}

/// Visual theme tag. Each theme maps to a fixed style phrase appended to
/// every image prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Professional,
    Creative,
    Minimal,
    Academic,
    Dark,
}

impl Theme {
    /// The fixed style descriptor appended to image prompts for this theme.
    #[must_use]
    pub fn style_phrase(&self) -> &'static str {
        match self {
            Theme::Professional => "corporate color palette, polished and professional",
            Theme::Creative => "vibrant colors, playful illustrative style",
            Theme::Minimal => "flat minimalist design, generous whitespace",
            Theme::Academic => "muted tones, precise diagrammatic style",
            Theme::Dark => "dark background, high-contrast accent colors",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Professional => write!(f, "professional"),
            Theme::Creative => write!(f, "creative"),
            Theme::Minimal => write!(f, "minimal"),
            Theme::Academic => write!(f, "academic"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Output resolution tag. All resolutions use a fixed 16:9 aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1K")]
    OneK,
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    /// Pixel dimensions (width, height) for this tag.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::OneK => (1280, 720),
            Resolution::TwoK => (2560, 1440),
            Resolution::FourK => (3840, 2160),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::OneK => write!(f, "1K"),
            Resolution::TwoK => write!(f, "2K"),
            Resolution::FourK => write!(f, "4K"),
        }
    }
}

// ── PipelineConfig ─────────────────────────────────────────────────────

/// Read-only configuration threaded through every pipeline stage.
///
/// ```rust
/// use decksmith::config::{LengthBucket, PipelineConfig, Theme};
///
/// let config = PipelineConfig::builder()
///     .length(LengthBucket::Short)
///     .theme(Theme::Minimal)
///     .worker_count(4)
///     .build();
///
/// assert_eq!(config.worker_count, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Generation mode.
    pub mode: SlideMode,
    /// Target deck length bucket.
    pub length: LengthBucket,
    /// Visual theme tag.
    pub theme: Theme,
    /// Image resolution tag.
    pub resolution: Resolution,
    /// Concurrent image requests per batch.
    pub worker_count: usize,
    /// Whether images are embedded into the produced source document.
    pub embed_images: bool,
    /// Whether the image synthesis stage runs at all.
    pub generate_images: bool,
    /// Retry budget shared by per-image and per-stage retry loops.
    pub max_retries: u32,
    /// Chunk window size in lines.
    pub chunk_size: usize,
    /// Fraction of `chunk_size` shared between adjacent chunks.
    pub overlap_ratio: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: SlideMode::default(),
            length: LengthBucket::default(),
            theme: Theme::default(),
            resolution: Resolution::default(),
            worker_count: 3,
            embed_images: true,
            generate_images: true,
            max_retries: 3,
            chunk_size: 40,
            overlap_ratio: 0.2,
        }
    }
}

impl PipelineConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Build a configuration from `DECKSMITH_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    ///
    /// A `.env` file in the working directory is honored via `dotenvy`.
    /// Recognized variables: `DECKSMITH_MODE`, `DECKSMITH_LENGTH`,
    /// `DECKSMITH_THEME`, `DECKSMITH_RESOLUTION`, `DECKSMITH_WORKERS`,
    /// `DECKSMITH_MAX_RETRIES`, `DECKSMITH_CHUNK_SIZE`,
    /// `DECKSMITH_OVERLAP_RATIO`, `DECKSMITH_GENERATE_IMAGES`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut builder = Self::builder();

        if let Some(mode) = env_tag("DECKSMITH_MODE") {
            builder = match mode.as_str() {
                "fast" => builder.mode(SlideMode::Fast),
                "normal" => builder.mode(SlideMode::Normal),
                _ => builder,
            };
        }
        if let Some(length) = env_tag("DECKSMITH_LENGTH") {
            builder = match length.as_str() {
                "short" => builder.length(LengthBucket::Short),
                "medium" => builder.length(LengthBucket::Medium),
                "long" => builder.length(LengthBucket::Long),
                _ => builder,
            };
        }
        if let Some(theme) = env_tag("DECKSMITH_THEME") {
            builder = match theme.as_str() {
                "professional" => builder.theme(Theme::Professional),
                "creative" => builder.theme(Theme::Creative),
                "minimal" => builder.theme(Theme::Minimal),
                "academic" => builder.theme(Theme::Academic),
                "dark" => builder.theme(Theme::Dark),
                _ => builder,
            };
        }
        if let Some(res) = env_tag("DECKSMITH_RESOLUTION") {
            builder = match res.as_str() {
                "1k" => builder.resolution(Resolution::OneK),
                "2k" => builder.resolution(Resolution::TwoK),
                "4k" => builder.resolution(Resolution::FourK),
                _ => builder,
            };
        }
        if let Some(workers) = env_parse::<usize>("DECKSMITH_WORKERS") {
            builder = builder.worker_count(workers.max(1));
        }
        if let Some(retries) = env_parse::<u32>("DECKSMITH_MAX_RETRIES") {
            builder = builder.max_retries(retries);
        }
        if let Some(size) = env_parse::<usize>("DECKSMITH_CHUNK_SIZE") {
            builder = builder.chunk_size(size.max(1));
        }
        if let Some(ratio) = env_parse::<f32>("DECKSMITH_OVERLAP_RATIO") {
            if (0.0..1.0).contains(&ratio) {
                builder = builder.overlap_ratio(ratio);
            }
        }
        if let Some(flag) = env_parse::<bool>("DECKSMITH_GENERATE_IMAGES") {
            builder = builder.generate_images(flag);
        }

        builder.build()
    }
}

fn env_tag(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_lowercase())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

// ── PipelineConfigBuilder ──────────────────────────────────────────────

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: Option<PipelineConfig>,
}

impl PipelineConfigBuilder {
    fn config(&mut self) -> &mut PipelineConfig {
        self.config.get_or_insert_with(PipelineConfig::default)
    }

    /// Set the generation mode.
    #[must_use]
    pub fn mode(mut self, mode: SlideMode) -> Self {
        self.config().mode = mode;
        self
    }

    /// Set the deck length bucket.
    #[must_use]
    pub fn length(mut self, length: LengthBucket) -> Self {
        self.config().length = length;
        self
    }

    /// Set the visual theme.
    #[must_use]
    pub fn theme(mut self, theme: Theme) -> Self {
        self.config().theme = theme;
        self
    }

    /// Set the image resolution tag.
    #[must_use]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.config().resolution = resolution;
        self
    }

    /// Set the concurrent image requests per batch.
    ///
    /// # Panics (debug only)
    ///
    /// Debug-asserts that `count` is at least 1.
    #[must_use]
    pub fn worker_count(mut self, count: usize) -> Self {
        debug_assert!(count >= 1, "worker_count must be >= 1, got {count}");
        self.config().worker_count = count;
        self
    }

    /// Set whether images are embedded into the produced source document.
    #[must_use]
    pub fn embed_images(mut self, embed: bool) -> Self {
        self.config().embed_images = embed;
        self
    }

    /// Enable or disable the image synthesis stage.
    #[must_use]
    pub fn generate_images(mut self, enabled: bool) -> Self {
        self.config().generate_images = enabled;
        self
    }

    /// Set the retry budget for per-image and per-stage retry loops.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config().max_retries = retries;
        self
    }

    /// Set the chunk window size in lines.
    ///
    /// # Panics (debug only)
    ///
    /// Debug-asserts that `size` is at least 1.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        debug_assert!(size >= 1, "chunk_size must be >= 1, got {size}");
        self.config().chunk_size = size;
        self
    }

    /// Set the overlap ratio between adjacent chunks.
    ///
    /// # Panics (debug only)
    ///
    /// Debug-asserts that `ratio` is in \[0.0, 1.0).
    #[must_use]
    pub fn overlap_ratio(mut self, ratio: f32) -> Self {
        debug_assert!(
            (0.0..1.0).contains(&ratio),
            "overlap_ratio must be in [0.0, 1.0), got {ratio}",
        );
        self.config().overlap_ratio = ratio;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(mut self) -> PipelineConfig {
        self.config.take().unwrap_or_default()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
