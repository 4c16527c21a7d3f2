use std::{
    env,
    io::{Error, ErrorKind},
    path::PathBuf,
};

/// Locates the settings directory following the XDG Base Directory layout.
pub struct SettingsPaths;

impl SettingsPaths {
    /// Returns `$XDG_CONFIG_HOME/props`, falling back to
    /// `$HOME/.config/props`.
    ///
    /// # Errors
    /// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set.
    pub fn config_dir() -> Result<PathBuf, Error> {
        let config_home = env::var("XDG_CONFIG_HOME")
            .or_else(|_| env::var("HOME").map(|home| format!("{home}/.config")))
            .map_err(|_| {
                Error::new(
                    ErrorKind::NotFound,
                    "Neither XDG_CONFIG_HOME nor HOME environment variable found",
                )
            })?;

        Ok(PathBuf::from(config_home).join("props"))
    }

    /// Returns the default settings file path.
    ///
    /// # Errors
    /// Returns an error if the configuration directory cannot be determined.
    pub fn settings_file() -> Result<PathBuf, Error> {
        Ok(Self::config_dir()?.join("settings.toml"))
    }
}
