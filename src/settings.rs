//! Application settings, stored in a plain `key=value` file.
//!
//! Missing or corrupt files silently fall back to defaults — settings are
//! never worth failing startup over.

use std::path::PathBuf;

use crate::history::DEFAULT_UNDO_LIMIT;

#[derive(Clone, Debug)]
pub struct AppSettings {
    /// Maximum number of undo snapshots (clamped by the undo manager).
    pub undo_limit: usize,
    /// Trade alignment-preview quality for latency.
    pub speed_priority: bool,
    /// Let the engine estimate an initial alignment offset at load.
    pub auto_align: bool,
    /// Anti-alias lasso fills per target mode.
    pub trash_anti_alias: bool,
    pub solid_anti_alias: bool,
    /// Solid backdrop color used when the checker backdrop is off.
    pub backdrop_color: [u8; 3],
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            speed_priority: false,
            auto_align: true,
            trash_anti_alias: false,
            solid_anti_alias: true,
            backdrop_color: [0, 0, 0],
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/mattefe/mattefe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MatteFE\mattefe_settings.cfg
    /// On macOS:   ~/Library/Application Support/MatteFE/mattefe_settings.cfg
    fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("mattefe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("mattefe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            let config_dir = PathBuf::from(appdata).join("MatteFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("mattefe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("MatteFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("mattefe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("mattefe_settings.cfg")))
        }
    }

    /// Save settings to disk.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        let content = format!(
            "undo_limit={}\n\
             speed_priority={}\n\
             auto_align={}\n\
             trash_anti_alias={}\n\
             solid_anti_alias={}\n\
             backdrop_color={},{},{}\n",
            self.undo_limit,
            self.speed_priority,
            self.auto_align,
            self.trash_anti_alias,
            self.solid_anti_alias,
            self.backdrop_color[0],
            self.backdrop_color[1],
            self.backdrop_color[2],
        );
        let _ = std::fs::write(path, content);
    }

    /// Load settings from disk (returns default if file missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };

        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "undo_limit" => {
                    if let Ok(v) = val.parse() {
                        s.undo_limit = v;
                    }
                }
                "speed_priority" => s.speed_priority = val == "true",
                "auto_align" => s.auto_align = val == "true",
                "trash_anti_alias" => s.trash_anti_alias = val == "true",
                "solid_anti_alias" => s.solid_anti_alias = val == "true",
                "backdrop_color" => {
                    let parts: Vec<_> = val.split(',').collect();
                    if parts.len() == 3
                        && let (Ok(r), Ok(g), Ok(b)) = (
                            parts[0].trim().parse(),
                            parts[1].trim().parse(),
                            parts[2].trim().parse(),
                        )
                    {
                        s.backdrop_color = [r, g, b];
                    }
                }
                _ => {}
            }
        }
        s
    }
}
