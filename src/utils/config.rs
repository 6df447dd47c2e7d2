use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub theme: String,
    pub config_dir: PathBuf,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("zako"),
            theme: String::from("default"),
            history_file: config_dir.join(".zako_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            config_dir,
        }
    }
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/zako")
        } else {
            env::temp_dir().join("zako")
        }
    }

    pub fn new() -> Self {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("ZAKO_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("ZAKO_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("ZAKO_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Ok(level) = env::var("ZAKO_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("ZAKO_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        // 历史文件目录建不出来时只是读写历史失败，不影响启动
        if let Some(parent) = config.history_file.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                eprintln!("无法创建历史记录目录 {}: {}", parent.display(), err);
            }
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_edit_mode() {
        let mut config = Config::default();
        assert_eq!(config.get_edit_mode(), EditMode::Vi);
        config.editor_mode = String::from("Emacs");
        assert_eq!(config.get_edit_mode(), EditMode::Emacs);
    }

    #[test]
    #[serial]
    fn test_defaults_live_under_config_dir() {
        let config = Config::default();
        assert_eq!(config.name, "zako");
        assert_eq!(config.logger_level, "warn");
        assert!(config.history_file.starts_with(&config.config_dir));
        assert!(config.logger_dir.starts_with(&config.config_dir));
    }
}
