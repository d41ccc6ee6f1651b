use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Render quality tier, mapped to the renderer's `-q?` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// 480p15
    #[default]
    #[value(alias = "ql")]
    Low,
    /// 720p30
    #[value(alias = "qm")]
    Medium,
    /// 1080p60
    #[value(alias = "qh")]
    High,
    /// 1440p60
    #[value(alias = "qp")]
    Production,
    /// 2160p60
    #[value(alias = "qk")]
    FourK,
}

impl QualityTier {
    /// Short tier code as accepted on the wire ("ql", "qm", ...)
    pub fn code(&self) -> &'static str {
        match self {
            QualityTier::Low => "ql",
            QualityTier::Medium => "qm",
            QualityTier::High => "qh",
            QualityTier::Production => "qp",
            QualityTier::FourK => "qk",
        }
    }

    /// Renderer flag ("-ql", "-qh", ...)
    pub fn flag(&self) -> String {
        format!("-{}", self.code())
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for QualityTier {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('-').to_lowercase().as_str() {
            "ql" | "l" | "low" => Ok(QualityTier::Low),
            "qm" | "m" | "medium" => Ok(QualityTier::Medium),
            "qh" | "h" | "high" => Ok(QualityTier::High),
            "qp" | "p" | "production" => Ok(QualityTier::Production),
            "qk" | "k" | "4k" | "fourk" => Ok(QualityTier::FourK),
            _ => Err(RequestError::InvalidQuality(s.to_string())),
        }
    }
}

/// Output container/format passed to the renderer's `--format`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mov,
    Webm,
    Gif,
    Png,
}

impl OutputFormat {
    /// File extension of the rendered artifact
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::Webm => "webm",
            OutputFormat::Gif => "gif",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "mov" => Ok(OutputFormat::Mov),
            "webm" => Ok(OutputFormat::Webm),
            "gif" => Ok(OutputFormat::Gif),
            "png" => Ok(OutputFormat::Png),
            _ => Err(RequestError::InvalidFormat(s.to_string())),
        }
    }
}

/// Output geometry in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Value for the renderer's `-r` flag ("1920,1080")
    pub fn render_arg(&self) -> String {
        format!("{},{}", self.width, self.height)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = RequestError;

    /// Accepts "1920x1080", "1920X1080" and "1920,1080"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RequestError::InvalidResolution(s.to_string());
        let (w, h) = s
            .trim()
            .split_once(|c| c == 'x' || c == 'X' || c == ',')
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// Immutable input to one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Free-text animation request
    pub query: String,
    pub quality: QualityTier,
    pub format: OutputFormat,
    pub resolution: Resolution,
    /// Identifier of a prior conversation this request continues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_conversation_id: Option<String>,
}

impl PipelineRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            quality: QualityTier::default(),
            format: OutputFormat::default(),
            resolution: Resolution::default(),
            prior_conversation_id: None,
        }
    }

    /// Build a request from the loosely-typed strings accepted at the entry point
    pub fn parse(
        query: &str,
        quality: &str,
        format: &str,
        resolution: &str,
        prior_conversation_id: Option<String>,
    ) -> Result<Self, RequestError> {
        if query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        Ok(Self {
            query: query.trim().to_string(),
            quality: quality.parse()?,
            format: format.parse()?,
            resolution: resolution.parse()?,
            prior_conversation_id,
        })
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Query must not be empty")]
    EmptyQuery,
    #[error("Invalid quality tier '{0}' (expected ql, qm, qh, qp or qk)")]
    InvalidQuality(String),
    #[error("Invalid output format '{0}' (expected mp4, mov, webm, gif or png)")]
    InvalidFormat(String),
    #[error("Invalid resolution '{0}' (expected WIDTHxHEIGHT, e.g. 1920x1080)")]
    InvalidResolution(String),
}
