//! Board settings: shared password, upload folder and page size.

use std::fmt;

use serde::Serialize;

use crate::{Error, Result};

/// Password written when the settings table is first created.
pub const DEFAULT_PASSWORD: &str = "9999";

/// Upload folder name written when the settings table is first created.
pub const DEFAULT_STORAGE_FOLDER: &str = "bbs_files";

/// Number of posts per page, restricted to the values the page offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PageSize(u32);

impl PageSize {
    /// Page sizes the board accepts.
    pub const ALLOWED: [u32; 4] = [5, 10, 20, 30];

    pub const DEFAULT: PageSize = PageSize(5);

    pub fn get(self) -> u32 {
        self.0
    }

    /// Interpret a stored settings cell, falling back to the default.
    pub fn from_cell(value: &str) -> Self {
        match value.trim().parse::<f64>() {
            Ok(n) if n.fract() == 0.0 && n >= 0.0 => {
                PageSize::try_from(n as u32).unwrap_or_else(|_| {
                    tracing::warn!(value = %value, "stored page size not allowed, using default");
                    PageSize::DEFAULT
                })
            }
            _ => {
                tracing::warn!(value = %value, "stored page size is not a number, using default");
                PageSize::DEFAULT
            }
        }
    }
}

impl TryFrom<u32> for PageSize {
    type Error = Error;

    fn try_from(n: u32) -> Result<Self> {
        if Self::ALLOWED.contains(&n) {
            Ok(Self(n))
        } else {
            Err(Error::Validation(format!(
                "page size {n} is not allowed (expected one of 5, 10, 20, 30)"
            )))
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Singleton board settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub password: String,
    pub storage_folder: String,
    pub page_size: PageSize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD.to_string(),
            storage_folder: DEFAULT_STORAGE_FOLDER.to_string(),
            page_size: PageSize::DEFAULT,
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("password", &"<redacted>")
            .field("storage_folder", &self.storage_folder)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Persistent settings cells.
pub trait SettingsStore: Send + Sync {
    /// Read all settings, writing the defaults first if the table is empty.
    fn load(&self) -> Result<Settings>;

    /// Overwrite the page-size cell.
    fn write_page_size(&self, page_size: PageSize) -> Result<()>;
}
