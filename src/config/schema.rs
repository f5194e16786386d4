use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub kiosk: KioskConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub resize: ResizeConfig,
}

/// Which presentation layer drives the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Serve a browser client over HTTP + WebSocket.
    Server,
    /// Render frames directly to a framebuffer.
    Local,
}

/// Global kiosk settings.
#[derive(Debug, Clone, Deserialize)]
pub struct KioskConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Directory scanned for media (relative to the config dir or absolute).
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// File extensions that qualify as media, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            media_dir: default_media_dir(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Keyboard,
    Gpio,
    None,
}

/// Control button wiring.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_source")]
    pub source: SourceKind,

    /// Key name simulating the POWER button.
    #[serde(default = "default_power_key")]
    pub power_key: String,

    /// Key name simulating the TOGGLE button.
    #[serde(default = "default_toggle_key")]
    pub toggle_key: String,

    /// BCM pin number of the POWER button.
    #[serde(default = "default_power_pin")]
    pub power_pin: u8,

    /// BCM pin number of the TOGGLE button.
    #[serde(default = "default_toggle_pin")]
    pub toggle_pin: u8,

    /// Enable the internal pull-up; a pressed button then reads low.
    #[serde(default = "default_true")]
    pub pull_up: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            power_key: default_power_key(),
            toggle_key: default_toggle_key(),
            power_pin: default_power_pin(),
            toggle_pin: default_toggle_pin(),
            pull_up: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Bgra,
    Rgba,
}

/// Screen geometry and local rendering settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Frame timer rate for local rendering.
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,

    /// Hex color, e.g. "#000000".
    #[serde(default = "default_background")]
    pub background: String,

    /// Hex color for the "no media" message.
    #[serde(default = "default_text_color")]
    pub text_color: String,

    /// Framebuffer device. Frames are discarded when unset.
    #[serde(default)]
    pub framebuffer: Option<PathBuf>,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: PixelFormat,

    /// TTF/OTF font used for on-screen messages.
    #[serde(default)]
    pub font: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            refresh_hz: default_refresh_hz(),
            background: default_background(),
            text_color: default_text_color(),
            framebuffer: None,
            pixel_format: default_pixel_format(),
            font: None,
        }
    }
}

/// HTTP/WebSocket surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Browser launched in kiosk mode once the server is listening.
    #[serde(default)]
    pub browser: Option<BrowserConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            browser: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Background resize pass.
#[derive(Debug, Clone, Deserialize)]
pub struct ResizeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Worker count; 0 means one per available CPU.
    #[serde(default)]
    pub workers: usize,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 0,
        }
    }
}

// --- Defaults ---

fn default_mode() -> Mode {
    Mode::Server
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("gifs")
}

fn default_extensions() -> Vec<String> {
    vec!["gif".to_string()]
}

fn default_source() -> SourceKind {
    SourceKind::Keyboard
}

fn default_power_key() -> String {
    "space".to_string()
}

fn default_toggle_key() -> String {
    "right".to_string()
}

fn default_power_pin() -> u8 {
    20
}

fn default_toggle_pin() -> u8 {
    21
}

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    1040
}

fn default_refresh_hz() -> u32 {
    30
}

fn default_background() -> String {
    "#000000".to_string()
}

fn default_text_color() -> String {
    "#e0e0e0".to_string()
}

fn default_pixel_format() -> PixelFormat {
    PixelFormat::Bgra
}

fn default_bind() -> String {
    "0.0.0.0:42069".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.kiosk.mode, Mode::Server);
        assert_eq!(config.kiosk.extensions, vec!["gif"]);
        assert_eq!(config.input.power_pin, 20);
        assert_eq!(config.input.toggle_pin, 21);
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.display.height, 1040);
        assert_eq!(config.server.bind, "0.0.0.0:42069");
        assert!(config.resize.enabled);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r##"
[kiosk]
mode = "local"
media_dir = "/srv/gifs"
extensions = ["gif", "GIF"]

[input]
source = "gpio"
power_pin = 5
toggle_pin = 6
pull_up = false

[display]
width = 800
height = 480
refresh_hz = 25
background = "#101010"
framebuffer = "/dev/fb1"
pixel_format = "rgba"

[server]
bind = "127.0.0.1:8080"
browser = { command = "/usr/bin/chromium-browser", args = ["--start-fullscreen"] }

[resize]
enabled = false
workers = 2
"##;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.kiosk.mode, Mode::Local);
        assert_eq!(config.kiosk.media_dir, PathBuf::from("/srv/gifs"));
        assert_eq!(config.input.source, SourceKind::Gpio);
        assert!(!config.input.pull_up);
        assert_eq!(config.display.pixel_format, PixelFormat::Rgba);
        assert_eq!(config.display.framebuffer, Some(PathBuf::from("/dev/fb1")));
        let browser = config.server.browser.unwrap();
        assert_eq!(browser.args, vec!["--start-fullscreen"]);
        assert!(!config.resize.enabled);
        assert_eq!(config.resize.workers, 2);
    }

    #[test]
    fn reject_unknown_mode() {
        let toml_str = r#"
[kiosk]
mode = "hologram"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }
}
