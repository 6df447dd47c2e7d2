use colored::Colorize;

type Style = Box<dyn Fn(String) -> String>;

pub struct Theme {
    pub prompt: String,
    /// here-document 续行时的提示符
    pub continuation_prompt: String,
    pub success_symbol: String,
    pub error_symbol: String,
    // 以下文案不带颜色，打印时再套 style
    pub welcome_message: String,
    pub exit_message: String,
    pub eof_message: String,
    pub interrupt_message: String,
    pub error_style: Style,
    pub success_style: Style,
    pub warning_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt: "雑魚> ".bright_cyan().to_string(),
            continuation_prompt: "> ".bright_cyan().to_string(),
            success_symbol: "♡".bright_magenta().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "哼～又来找人家玩了吗？真是个变态呢～".to_string(),
            exit_message: "哼！这就走了吗？真是个没用的废物呢！".to_string(),
            eof_message: "连 exit 都不会打吗？笨蛋～".to_string(),
            interrupt_message: "想逃？输入 exit 才能走哦～".to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
            success_style: Box::new(|s| s.bright_magenta().to_string()),
            warning_style: Box::new(|s| s.bright_yellow().to_string()),
        }
    }
}

impl Theme {
    /// 非零退出状态的提示行，例如 `✗ exit 2`
    pub fn status_line(&self, status: i32) -> String {
        format!(
            "{} {}",
            self.error_symbol,
            (self.error_style)(format!("exit {}", status))
        )
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "default" => Theme::default(),
        "dark" => Theme {
            prompt: "雑魚～➤ ".bright_purple().to_string(),
            continuation_prompt: "～➤ ".bright_purple().to_string(),
            success_symbol: "♡".bright_magenta().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "啊啦～这不是变态先生吗？又来了呢～".to_string(),
            exit_message: "切～这就受不了了吗？真是个废物呢！".to_string(),
            eof_message: "Ctrl-D？真是没礼貌呢～".to_string(),
            interrupt_message: "按 Ctrl-C 也没用的哦～".to_string(),
            error_style: Box::new(|s| s.red().to_string()),
            success_style: Box::new(|s| s.magenta().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
        },
        _ => Theme::default(),
    }
}
