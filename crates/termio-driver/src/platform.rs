#![forbid(unsafe_code)]

//! Platform selection and driver configuration.

use termio_core::decoder::DecoderConfig;
use termio_core::terminal_session::SessionOptions;
use termio_render::color::ColorMode;

/// Which input adapter the driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    /// `WindowsConsole` on Windows, `Ansi` on other unix systems,
    /// `LineBuffered` elsewhere.
    #[default]
    Auto,
    /// Raw bytes from the controlling terminal.
    Ansi,
    /// Structured console records with separate key down and up.
    WindowsConsole,
    /// One opaque event per keystroke.
    LineBuffered,
    /// No terminal; nothing is read or written.
    Headless,
}

impl Platform {
    /// Parse a `TERMIO_PLATFORM` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "ansi" | "unix" => Some(Self::Ansi),
            "windows" | "console" => Some(Self::WindowsConsole),
            "line" | "net" => Some(Self::LineBuffered),
            "headless" | "none" => Some(Self::Headless),
            _ => None,
        }
    }

    /// Replace `Auto` with the platform's native adapter.
    #[must_use]
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(windows) => Self::WindowsConsole,
            Self::Auto if cfg!(unix) => Self::Ansi,
            Self::Auto => Self::LineBuffered,
            other => other,
        }
    }
}

/// Everything needed to bring a driver up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub platform: Platform,
    pub session: SessionOptions,
    pub decoder: DecoderConfig,
    /// `None` detects the mode from the environment.
    pub color_mode: Option<ColorMode>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Auto,
            session: SessionOptions::fullscreen(),
            decoder: DecoderConfig::default(),
            color_mode: None,
        }
    }
}

impl DriverConfig {
    /// Defaults, with the platform taken from `TERMIO_PLATFORM` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("TERMIO_PLATFORM") {
            match Platform::parse(&value) {
                Some(platform) => config.platform = platform,
                None => tracing::warn!(value = %value, "unknown TERMIO_PLATFORM, using auto"),
            }
        }
        config
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    #[must_use]
    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = Some(mode);
        self
    }
}
