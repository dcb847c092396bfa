//! Builtin colormaps and opacity maps
//!
//! Map files are plain text: a `[name]` header opens a map, following lines
//! hold space separated floats appended to it. Blank lines and `#` comments
//! are ignored.
//!
//! ```text
//! # viridis, RGB triples
//! [viridis]
//! 0.267 0.004 0.329
//! 0.993 0.906 0.144
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::{Error, Result};

/// File holding the builtin colormaps
pub const COLORMAPS_FILE: &str = "colormaps.txt";

/// File holding the builtin opacity maps
pub const OPACITYMAPS_FILE: &str = "opacitymaps.txt";

/// Map name to its flat list of values
pub type BuiltinMaps = BTreeMap<String, Vec<f32>>;

/// Parse map text.
///
/// A header that appears twice starts its map over.
pub fn parse_builtin_data(text: &str) -> Result<BuiltinMaps> {
    let mut maps = BuiltinMaps::new();
    let mut current: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            maps.insert(name.to_string(), Vec::new());
            current = Some(name.to_string());
            continue;
        }

        let values = match current.as_ref().and_then(|name| maps.get_mut(name)) {
            Some(values) => values,
            None => {
                return Err(Error::BuiltinData {
                    line: line_no,
                    reason: "values before any [header]".to_string(),
                })
            }
        };
        for token in line.split_whitespace() {
            let value = token.parse::<f32>().map_err(|e| Error::BuiltinData {
                line: line_no,
                reason: format!("{:?}: {}", token, e),
            })?;
            values.push(value);
        }
    }

    tracing::debug!(maps = maps.len(), "parsed builtin data");
    Ok(maps)
}

/// Read and parse a map file.
pub fn load_builtin_data<P: AsRef<Path>>(path: P) -> Result<BuiltinMaps> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_builtin_data(&text)
}

/// Load `colormaps.txt` from `dir`.
pub fn load_colormaps<P: AsRef<Path>>(dir: P) -> Result<BuiltinMaps> {
    load_builtin_data(dir.as_ref().join(COLORMAPS_FILE))
}

/// Load `opacitymaps.txt` from `dir`.
pub fn load_opacitymaps<P: AsRef<Path>>(dir: P) -> Result<BuiltinMaps> {
    load_builtin_data(dir.as_ref().join(OPACITYMAPS_FILE))
}
