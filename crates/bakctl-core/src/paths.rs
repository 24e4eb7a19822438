//! Default locations for the database and archives

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Environment variable that relocates the whole bakctl data root
pub const HOME_ENV: &str = "BAKCTL_HOME";

/// Database file name inside the data root
pub const DB_FILENAME: &str = "bakctl.db3";

/// Directory name for archives inside the data root
pub const STORAGE_DIRNAME: &str = "bak";

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that
/// scripts and containers overriding HOME see the same data root.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    dirs::home_dir().ok_or_else(|| Error::invalid_config("Could not determine home directory"))
}

/// Get the bakctl data root (~/.bakctl, or $BAKCTL_HOME)
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var(HOME_ENV) {
        if !custom.trim().is_empty() {
            return Ok(PathBuf::from(custom));
        }
    }

    Ok(get_home_dir()?.join(".bakctl"))
}

/// Get the database path (~/.bakctl/bakctl.db3)
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILENAME))
}

/// Get the default archive storage root (~/.bakctl/bak)
pub fn get_default_storage_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(STORAGE_DIRNAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_data_dir_override() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var(HOME_ENV, tmp.path());

        assert_eq!(get_data_dir().unwrap(), tmp.path());
        assert_eq!(get_db_path().unwrap(), tmp.path().join("bakctl.db3"));
        assert_eq!(get_default_storage_dir().unwrap(), tmp.path().join("bak"));

        std::env::remove_var(HOME_ENV);
    }

    #[test]
    #[serial]
    fn test_data_dir_defaults_to_home() {
        std::env::remove_var(HOME_ENV);
        let home = get_home_dir().unwrap();
        assert_eq!(get_data_dir().unwrap(), home.join(".bakctl"));
    }
}
