/// Application name, used for the config directory.
pub const APP_NAME: &str = "yadt";

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "YADT_CONFIG";

/// File name of the config inside the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Directory, relative to a build output, whose entries are linked into the profile.
pub const BIN_DIR: &str = "bin";
