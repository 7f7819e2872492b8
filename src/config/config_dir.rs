use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use super::error::{ConfigError, ConfigResult};

/// Explicit path to the configuration file, bypassing discovery.
pub const CONFIG_PATH_ENV: &str = "ASTROHUB_CONFIG";

const LOCAL_CONFIG: &str = "./config.toml";

/// Places a configuration file is looked for, most specific first.
fn candidates(explicit: Option<OsString>, home: Option<OsString>, use_local: bool) -> Vec<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return vec![PathBuf::from(path)];
    }

    let mut paths = Vec::with_capacity(2);
    if !use_local {
        if let Some(home) = home {
            let mut dir = PathBuf::from(home);
            if cfg!(unix) {
                dir.push(".config");
            }
            paths.push(dir.join(crate::APPLICATION_NAME).join("config.toml"));
        }
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

fn home_dir() -> Option<OsString> {
    if cfg!(windows) {
        std::env::var_os("APPDATA")
    } else {
        std::env::var_os("HOME")
    }
}

/// First existing candidate, or the local path when nothing exists.
pub fn find_config_file(use_local: bool) -> PathBuf {
    let paths = candidates(std::env::var_os(CONFIG_PATH_ENV), home_dir(), use_local);
    paths
        .iter()
        .find(|p| p.exists())
        .or(paths.last())
        .cloned()
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG))
}

pub fn read_config(use_local: bool) -> ConfigResult<Vec<u8>> {
    read_config_file(&find_config_file(use_local))
}

fn read_config_file(path: &Path) -> ConfigResult<Vec<u8>> {
    if !path.exists() {
        tracing::warn!("no configuration at {}", path.display());
        return Err(ConfigError::ConfigNotFound);
    }

    let path = path.canonicalize()?;
    tracing::debug!("using {} as configuration file", path.display());
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn local_builds_only_look_in_the_working_directory() {
        let paths = candidates(None, Some(OsString::from("/home/vega")), true);
        assert_eq!(paths, vec![PathBuf::from(LOCAL_CONFIG)]);
    }

    #[test]
    fn home_config_comes_before_local() {
        let paths = candidates(None, Some(OsString::from("/home/vega")), false);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with(format!("{}/config.toml", crate::APPLICATION_NAME)));
        assert_eq!(paths[1], PathBuf::from(LOCAL_CONFIG));
    }

    #[test]
    fn explicit_path_wins() {
        let paths = candidates(
            Some(OsString::from("/etc/astrohub.toml")),
            Some(OsString::from("/home/vega")),
            false,
        );
        assert_eq!(paths, vec![PathBuf::from("/etc/astrohub.toml")]);

        let paths = candidates(Some(OsString::new()), None, true);
        assert_eq!(paths, vec![PathBuf::from(LOCAL_CONFIG)]);
    }

    #[test]
    fn reads_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("config.toml");
        fs::write(&file_path, b"foo = 'bar'").unwrap();

        assert_eq!(read_config_file(&file_path).unwrap(), b"foo = 'bar'");
    }

    #[test]
    fn missing_file_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = read_config_file(&temp_dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound)));
    }
}
