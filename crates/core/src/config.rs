//! Binding configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) is valid.
//!
//! ```toml
//! log_filter = "pyospray=debug"
//! default_format = "rgba"
//!
//! [device]
//! args = ["--osp:debug"]
//! ```

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::framebuffer::PixelFormat;
use crate::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "PYOSPRAY_CONFIG";

/// Top-level binding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Output layout used when the caller names none
    #[serde(default)]
    pub default_format: PixelFormat,

    /// Library initialisation
    #[serde(default)]
    pub device: DeviceConfig,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            default_format: PixelFormat::default(),
            device: DeviceConfig::default(),
        }
    }
}

/// Rendering library initialisation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Command-line style arguments passed to library init
    #[serde(default)]
    pub args: Vec<String>,
}

impl DeviceConfig {
    /// Native argument vector for library init
    pub fn init_args(&self) -> Result<InitArgs> {
        InitArgs::new(&self.args)
    }
}

impl BindingConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded binding configuration");
        Ok(config)
    }

    /// Load the file named by `PYOSPRAY_CONFIG`, or defaults when it is unset
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }
}

/// `argc`/`argv` pair for the library's init call.
///
/// The pointer array is null-terminated and points into strings owned by
/// this value.
#[derive(Debug)]
pub struct InitArgs {
    args: Vec<CString>,
    ptrs: Vec<*mut c_char>,
}

impl InitArgs {
    /// Convert arguments, rejecting any with an interior NUL
    pub fn new<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = args
            .into_iter()
            .map(|arg| {
                CString::new(arg.as_ref()).map_err(|e| {
                    Error::InvalidArgument(format!(
                        "init argument contains NUL at byte {}",
                        e.nul_position()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // CString heap storage does not move with the Vec, so these stay valid
        let ptrs = args
            .iter()
            .map(|arg| arg.as_ptr() as *mut c_char)
            .chain(std::iter::once(std::ptr::null_mut()))
            .collect();

        Ok(Self { args, ptrs })
    }

    /// Number of arguments
    pub fn argc(&self) -> c_int {
        self.args.len() as c_int
    }

    /// Null-terminated argument pointer array
    pub fn argv(&mut self) -> *mut *mut c_char {
        self.ptrs.as_mut_ptr()
    }

    /// Iterate the arguments
    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.args.iter().map(CString::as_c_str)
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether there are no arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}
