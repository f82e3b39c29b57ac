use std::path::Path;

use anyhow::{Context, Result};

use super::{validate_config, DisplayConfig};

/// Load and validate a display configuration from a TOML file.
///
/// Expected structure:
///
/// ```toml
/// [canvas]
/// width = 56
/// height = 7
///
/// [[panels]]
/// id = "left"
/// address = 0
/// origin = { x = 0, y = 0 }
/// size = { w = 28, h = 7 }
/// orientation = "normal"
///
/// [serial]
/// port = "/dev/ttyUSB0"
/// baud = 9600
/// mock = true
///
/// [runtime]
/// fps = 20
/// buffer_ms = 500
/// ```
pub fn load_from_toml(path: impl AsRef<Path>) -> Result<DisplayConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: DisplayConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}
