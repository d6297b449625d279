// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Login-item registration.
//
//   - Linux:   XDG autostart entry `~/.config/autostart/<name>.desktop`
//   - macOS:   LaunchAgent `~/Library/LaunchAgents/<id>.plist`
//   - Windows: `HKCU\Software\Microsoft\Windows\CurrentVersion\Run` value

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use printbridge_core::error::{PrintBridgeError, Result};

use crate::Platform;
use crate::traits::Autostart;

const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

/// How the application is registered with the user session.
#[derive(Debug, Clone)]
pub enum DesktopAutostart {
    /// A file whose presence enables autostart.
    EntryFile { path: PathBuf, contents: String },
    /// A value under the per-user Run key.
    RunKey { name: String, exec: PathBuf },
}

impl DesktopAutostart {
    /// Registration for `exec` under `name` on `platform`, using the
    /// current user's directories.
    pub fn for_platform(platform: Platform, name: &str, exec: &Path) -> Result<Self> {
        match platform {
            Platform::Linux => {
                let dir = xdg_config_home()?.join("autostart");
                Ok(Self::EntryFile {
                    path: dir.join(format!("{name}.desktop")),
                    contents: desktop_entry(name, exec),
                })
            }
            Platform::MacOs => {
                let label = format!("org.{}.agent", name.to_ascii_lowercase());
                let dir = home_dir()?.join("Library").join("LaunchAgents");
                Ok(Self::EntryFile {
                    path: dir.join(format!("{label}.plist")),
                    contents: launch_agent(&label, exec),
                })
            }
            Platform::Windows => Ok(Self::RunKey {
                name: name.to_string(),
                exec: exec.to_path_buf(),
            }),
        }
    }

    /// Registration for the running executable.
    pub fn for_current_exe(platform: Platform, name: &str) -> Result<Self> {
        let exec = std::env::current_exe()
            .map_err(|e| PrintBridgeError::Autostart(format!("cannot locate executable: {e}")))?;
        Self::for_platform(platform, name, &exec)
    }
}

impl Autostart for DesktopAutostart {
    fn is_enabled(&self) -> bool {
        match self {
            Self::EntryFile { path, .. } => path.exists(),
            Self::RunKey { name, .. } => Command::new("reg")
                .args(["query", RUN_KEY, "/v", name])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false),
        }
    }

    fn toggle(&self, enabled: bool) -> Result<()> {
        match self {
            Self::EntryFile { path, contents } => {
                if enabled {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, contents)?;
                    info!(path = %path.display(), "autostart entry written");
                } else {
                    match std::fs::remove_file(path) {
                        Ok(()) => info!(path = %path.display(), "autostart entry removed"),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            debug!(path = %path.display(), "autostart entry already absent");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            }
            Self::RunKey { name, exec } => {
                if !enabled && !self.is_enabled() {
                    return Ok(());
                }
                let quoted = format!("\"{}\"", exec.display());
                let mut cmd = Command::new("reg");
                if enabled {
                    cmd.args(["add", RUN_KEY, "/v", name, "/t", "REG_SZ", "/d", &quoted, "/f"]);
                } else {
                    cmd.args(["delete", RUN_KEY, "/v", name, "/f"]);
                }
                let output = cmd
                    .stdin(Stdio::null())
                    .output()
                    .map_err(|e| PrintBridgeError::Autostart(format!("reg: {e}")))?;
                if !output.status.success() {
                    return Err(PrintBridgeError::Autostart(format!(
                        "reg exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                info!(name, enabled, "autostart Run key updated");
                Ok(())
            }
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| PrintBridgeError::Autostart("HOME is not set".into()))
}

fn xdg_config_home() -> Result<PathBuf> {
    match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(home_dir()?.join(".config")),
    }
}

fn desktop_entry(name: &str, exec: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Exec=\"{}\"\n\
         X-GNOME-Autostart-enabled=true\n",
        exec.display()
    )
}

fn launch_agent(label: &str, exec: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
    <string>{}</string>
  </array>
  <key>RunAtLoad</key>
  <true/>
</dict>
</plist>
"#,
        exec.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_file_toggles_on_and_off() {
        let dir = tempfile::tempdir().unwrap();
        let autostart = DesktopAutostart::EntryFile {
            path: dir.path().join("autostart").join("printbridge.desktop"),
            contents: desktop_entry("printbridge", Path::new("/usr/bin/printbridge")),
        };

        assert!(!autostart.is_enabled());
        autostart.toggle(true).unwrap();
        assert!(autostart.is_enabled());

        autostart.toggle(false).unwrap();
        assert!(!autostart.is_enabled());
        // Disabling twice is fine.
        autostart.toggle(false).unwrap();
    }

    #[test]
    fn desktop_entry_points_at_executable() {
        let entry = desktop_entry("printbridge", Path::new("/opt/printbridge/bin/printbridge"));
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Exec=\"/opt/printbridge/bin/printbridge\"\n"));
    }

    #[test]
    fn launch_agent_runs_at_load() {
        let plist = launch_agent("org.printbridge.agent", Path::new("/Applications/printbridge"));
        assert!(plist.contains("<string>org.printbridge.agent</string>"));
        assert!(plist.contains("<key>RunAtLoad</key>\n  <true/>"));
    }

    #[test]
    fn windows_uses_run_key() {
        let autostart =
            DesktopAutostart::for_platform(Platform::Windows, "printbridge", Path::new("C:\\pb.exe"))
                .unwrap();
        assert!(matches!(autostart, DesktopAutostart::RunKey { ref name, .. } if name == "printbridge"));
    }
}
