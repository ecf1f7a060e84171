//! Configuration management for menush.
//!
//! Settings are read from `~/.menush/config.toml`. Every field is optional;
//! anything missing falls back to the built-in default.
//!
//! ```toml
//! # Shell started on the console (default: $SHELL, then /bin/bash)
//! shell = "/bin/bash"
//! shell_args = ["-i"]
//!
//! # TERM exported to the shell
//! term = "xterm"
//!
//! # Log level when MENUSH_LOG is not set
//! log_level = "info"
//!
//! [keys]
//! quit = "Q"      # menu item with this shortcut quits
//! toggle = "["    # menu item with this shortcut opens the console
//! refresh = "L"   # Ctrl+L in the console clears the view
//!
//! [[menu]]
//! title = "L list files"
//! command = "ls"
//! shortcut = "L"
//! ```
//!
//! Without any `[[menu]]` tables the built-in menu is used.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use crate::ui::menu::MenuItem;
use crate::ui::router::Shortcuts;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command
    pub shell: String,
    /// Arguments passed to the shell
    pub shell_args: Vec<String>,
    /// TERM value for the shell
    pub term: String,
    /// Default log filter
    pub log_level: String,
    /// Shortcut keys
    pub keys: KeysConfig,
    /// Menu items; empty means the built-in menu
    pub menu: Vec<MenuItemConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_args: vec!["-i".to_string()],
            term: "xterm".to_string(),
            log_level: "info".to_string(),
            keys: KeysConfig::default(),
            menu: Vec::new(),
        }
    }
}

/// Shortcut key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub quit: char,
    pub toggle: char,
    pub refresh: char,
}

impl Default for KeysConfig {
    fn default() -> Self {
        let shortcuts = Shortcuts::default();
        Self {
            quit: shortcuts.quit,
            toggle: shortcuts.toggle,
            refresh: shortcuts.refresh,
        }
    }
}

/// A menu entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuItemConfig {
    pub title: String,
    pub command: String,
    pub shortcut: Option<char>,
}

impl Config {
    /// Load from `path`, or from `~/.menush/config.toml` when `path` is None.
    ///
    /// Loading happens before logging is set up, so a file that could not be
    /// used is reported back to the caller instead of logged here.
    pub fn load(path: Option<&Path>) -> (Self, Option<String>) {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::get_config_path() {
                Some(path) => path,
                None => return (Self::default(), None),
            },
        };
        match Self::load_from(&path) {
            Ok(config) => (config, None),
            Err(problem) => (Self::default(), Some(problem)),
        }
    }

    /// Load from `path`. A missing file gives the defaults; an unreadable or
    /// invalid one is an error describing what went wrong.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Menu items to show
    pub fn menu_items(&self) -> Vec<MenuItem> {
        if self.menu.is_empty() {
            return default_menu();
        }
        self.menu
            .iter()
            .map(|item| MenuItem::new(item.title.clone(), item.command.clone(), item.shortcut))
            .collect()
    }

    pub fn shortcuts(&self) -> Shortcuts {
        Shortcuts {
            quit: self.keys.quit,
            toggle: self.keys.toggle,
            refresh: self.keys.refresh,
        }
    }
}

/// Wider than most screens, for exercising line wrap in the console.
const LONG_COMMAND: &str = concat!(
    "abcdefghi1abcdefghi2abcdefghi3abcdefghi4abcdefghi5",
    "abcdefghi6abcdefghi7abcdefghi8abcdefghi9abcdefgh10",
);

/// The built-in menu
pub fn default_menu() -> Vec<MenuItem> {
    vec![
        MenuItem::new("T メニュー先頭", "", Some('T')),
        MenuItem::new("L ファイル一覧", "ls", Some('L')),
        MenuItem::new(" ファイル詳細一覧", "ls -l", None),
        MenuItem::new("C 作業フォルダ変更", "cd <<フォルダ名>>", Some('C')),
        MenuItem::new(" ホーム", "cd ~", None),
        MenuItem::new(" 上のフォルダ", "cd ..", None),
        MenuItem::new("M メニュー操作類", "", None),
        MenuItem::new("[ モード切替", "", Some('[')),
        MenuItem::new("J コマンド実行", "", None),
        MenuItem::new("↓ 下に移動", "", None),
        MenuItem::new("↑ 上に移動", "", None),
        MenuItem::new("Q メニュー終了", "", Some('Q')),
        MenuItem::new(" 異常に長いコマンド", LONG_COMMAND, None),
    ]
}

/// `~/.menush`
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".menush"))
}

fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| "/bin/bash".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("shell = \"/bin/sh\"\n[keys]\nquit = \"X\"\n");
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.shell, "/bin/sh");
        assert_eq!(config.shell_args, vec!["-i".to_string()]);
        assert_eq!(config.term, "xterm");
        assert_eq!(config.keys.quit, 'X');
        assert_eq!(config.keys.toggle, '[');
        assert_eq!(config.menu_items(), default_menu());
    }

    #[test]
    fn test_menu_tables() {
        let file = write_config(
            r#"
[[menu]]
title = "D disk usage"
command = "df -h"
shortcut = "D"

[[menu]]
title = " uptime"
command = "uptime"
"#,
        );
        let items = Config::load_from(file.path()).unwrap().menu_items();
        assert_eq!(
            items,
            vec![
                MenuItem::new("D disk usage", "df -h", Some('D')),
                MenuItem::new(" uptime", "uptime", None),
            ]
        );
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let file = write_config("shell = [not toml");
        let problem = Config::load_from(file.path()).unwrap_err();
        assert!(problem.starts_with("Invalid config"), "got {:?}", problem);

        let (config, problem) = Config::load(Some(file.path()));
        assert_eq!(config.term, "xterm");
        assert_eq!(config.shortcuts(), Shortcuts::default());
        let problem = problem.unwrap();
        assert!(problem.contains(&file.path().display().to_string()), "got {:?}", problem);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (config, problem) = Config::load(Some(&dir.path().join("absent.toml")));
        assert_eq!(config.log_level, "info");
        assert!(problem.is_none());
    }

    #[test]
    fn test_default_menu_long_command() {
        let menu = default_menu();
        assert_eq!(menu.len(), 13);
        assert_eq!(menu[12].command.len(), 100);
        assert!(menu[12].command.starts_with("abcdefghi1abcdefghi2"));
        assert!(menu[12].command.ends_with("abcdefghi9abcdefgh10"));
    }
}
