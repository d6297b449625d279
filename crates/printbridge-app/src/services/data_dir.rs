// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "printbridge";

/// Return the application data directory, creating it if needed.
///
/// Windows uses `%APPDATA%\printbridge`; everything else follows XDG with
/// `~/.local/share/printbridge` as the fallback.
pub fn data_dir() -> PathBuf {
    let dir = base_dir(|key| std::env::var_os(key).map(PathBuf::from)).join(APP_DIR);
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Return a subdirectory inside `data_dir` (e.g. "logs"), creating it.
pub fn data_subdir(data_dir: &Path, name: &str) -> PathBuf {
    let dir = data_dir.join(name);
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn base_dir(env: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    let non_empty = |key: &str| env(key).filter(|p| !p.as_os_str().is_empty());

    if cfg!(windows) {
        if let Some(appdata) = non_empty("APPDATA") {
            return appdata;
        }
    }
    if let Some(xdg) = non_empty("XDG_DATA_HOME") {
        return xdg;
    }
    if let Some(home) = non_empty("HOME") {
        return home.join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<PathBuf> {
        let vars: HashMap<String, PathBuf> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), PathBuf::from(v)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[cfg(not(windows))]
    #[test]
    fn xdg_data_home_wins_over_home() {
        let base = base_dir(env(&[("XDG_DATA_HOME", "/xdg"), ("HOME", "/home/u")]));
        assert_eq!(base, PathBuf::from("/xdg"));
    }

    #[cfg(not(windows))]
    #[test]
    fn home_fallback_uses_local_share() {
        let base = base_dir(env(&[("XDG_DATA_HOME", ""), ("HOME", "/home/u")]));
        assert_eq!(base, PathBuf::from("/home/u/.local/share"));
    }

    #[test]
    fn nothing_set_falls_back_to_temp() {
        assert_eq!(base_dir(env(&[])), std::env::temp_dir());
    }

    #[test]
    fn subdir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let logs = data_subdir(dir.path(), "logs");
        assert!(logs.is_dir());
    }
}
