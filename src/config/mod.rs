pub mod schema;

use crate::error::{KioskError, Result};
use schema::AppConfig;
use std::path::Path;

/// Load and parse configuration from a TOML file.
///
/// Relative paths inside the file are resolved against the file's directory.
///
/// # Errors
/// Returns `KioskError::ConfigNotFound` if the file doesn't exist,
/// `KioskError::Io` on read errors, `KioskError::TomlParse` on syntax errors,
/// or `KioskError::Config` on validation failures.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(KioskError::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let content = expand_env_vars(&content);
    let mut config: AppConfig = toml::from_str(&content)?;

    if let Some(dir) = path.parent() {
        resolve_paths(&mut config, dir);
    }

    validate(&config)?;
    Ok(config)
}

/// Expand `${VAR}` and `$VAR` patterns in the config string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if let Ok(val) = std::env::var(&var_name) {
                    result.push_str(&val);
                } else {
                    // Keep original if env var not found
                    use std::fmt::Write;
                    let _ = write!(result, "${{{var_name}}}");
                }
            } else {
                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        var_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    result.push('$');
                } else if let Ok(val) = std::env::var(&var_name) {
                    result.push_str(&val);
                } else {
                    result.push('$');
                    result.push_str(&var_name);
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_paths(config: &mut AppConfig, base: &Path) {
    let resolve = |p: &Path| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            base.join(p)
        }
    };

    config.kiosk.media_dir = resolve(&config.kiosk.media_dir);
    if let Some(font) = config.display.font.as_deref() {
        config.display.font = Some(resolve(font));
    }
}

/// Validate config constraints.
fn validate(config: &AppConfig) -> Result<()> {
    if config.kiosk.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(KioskError::Config(
            "at least one media extension is required".to_string(),
        ));
    }

    let display = &config.display;
    if display.width == 0 || display.height == 0 {
        return Err(KioskError::Config(
            "display width and height must be non-zero".to_string(),
        ));
    }
    if !(1..=120).contains(&display.refresh_hz) {
        return Err(KioskError::Config("refresh_hz must be 1-120".to_string()));
    }
    crate::render::canvas::parse_hex_color(&display.background)
        .map_err(|e| KioskError::Config(format!("display.background: {e}")))?;
    crate::render::canvas::parse_hex_color(&display.text_color)
        .map_err(|e| KioskError::Config(format!("display.text_color: {e}")))?;

    let input = &config.input;
    if input.power_pin == input.toggle_pin {
        return Err(KioskError::Config(format!(
            "power_pin and toggle_pin are both {}",
            input.power_pin
        )));
    }

    let power_key = crate::input::keyboard::parse_key_name(&input.power_key)
        .ok_or_else(|| KioskError::Config(format!("unknown key name: {}", input.power_key)))?;
    let toggle_key = crate::input::keyboard::parse_key_name(&input.toggle_key)
        .ok_or_else(|| KioskError::Config(format!("unknown key name: {}", input.toggle_key)))?;
    if power_key == toggle_key {
        return Err(KioskError::Config(format!(
            "power_key and toggle_key are both '{}'",
            input.power_key
        )));
    }

    Ok(())
}
