use log::{debug, error, warn};
use std::error::Error;
use std::io::Write;

use crate::shell::executor::Executor;
use crate::shell::parser::ast::CommandNode;
use crate::shell::parser::{ParseError, Parser};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::{self, Theme};

/// 语法错误时的退出状态，命令本身没有执行
pub const SYNTAX_ERROR_STATUS: i32 = 2;

pub struct Shell<'a> {
    theme: Theme,
    readline: ReadlineManager<'a>,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        Ok(Self {
            theme: theme::load_theme(&config.theme),
            readline: ReadlineManager::new(config)?,
            executor: Executor::new(),
        })
    }

    /// 交互模式
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 ZakoShell...");

        // shell 自己不跟着前台命令被 Ctrl-C 打断
        signals::ignore_interactive_signals();
        self.readline.load_history();

        println!("{}", (self.theme.success_style)(self.theme.welcome_message.clone()));
        debug!("ZakoShell 准备就绪...");

        self.run_loop()?;
        self.readline.save_history();

        if !self.executor.jobs().is_empty() {
            for job in self.executor.jobs().get_jobs() {
                warn!("退出时后台任务仍在运行: {}", job);
            }
        }
        if !self.executor.dir_stack().is_empty() {
            debug!("目录栈剩余 {} 项", self.executor.dir_stack().len());
        }
        debug!("最后的退出状态: {}", self.executor.last_status());

        debug!("退出 ZakoShell...");
        Ok(())
    }

    /// `zako -c '<line>'`：执行一行后返回它的退出状态
    pub fn run_command(&mut self, line: &str) -> i32 {
        match Parser::new(line).parse_command() {
            Ok(node) => self.executor.dispatch(node.as_ref()),
            Err(err) => {
                error!("解析失败: {}", err);
                eprintln!("{}", err);
                SYNTAX_ERROR_STATUS
            }
        }
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            std::io::stdout().flush()?;

            match self.readline.readline(&self.theme.prompt) {
                Ok(line) => {
                    if line.trim() == "exit" {
                        debug!("退出 ZakoShell...");
                        println!(
                            "{} {}",
                            self.theme.success_symbol,
                            (self.theme.success_style)(self.theme.exit_message.clone())
                        );
                        break;
                    }
                    self.handle_input(line)?;
                }
                Err(ReadlineError::Eof) => {
                    warn!("接收到 EOF 信号，退出 ZakoShell...");
                    println!("\n{}", (self.theme.warning_style)(self.theme.eof_message.clone()));
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("接收到中断信号...");
                    println!(
                        "\n{}",
                        (self.theme.warning_style)(self.theme.interrupt_message.clone())
                    );
                }
                Err(err) => {
                    error!("发生错误: {}", err);
                    eprintln!("{} {}", self.theme.error_symbol, (self.theme.error_style)(err.to_string()));
                }
            }
        }
        Ok(())
    }

    /// here-document 没写完时继续读行；读行被打断则放弃这条命令
    fn read_complete(&mut self, mut text: String) -> Result<(String, Option<CommandNode>), ParseError> {
        loop {
            let parsed = Parser::new(&text).parse_command();
            match parsed {
                Err(ParseError::Incomplete(delimiter)) => {
                    debug!("here-document 未结束，等待 {}", delimiter);
                    match self.readline.readline(&self.theme.continuation_prompt) {
                        Ok(more) => {
                            text.push('\n');
                            text.push_str(&more);
                        }
                        Err(err) => {
                            warn!("续行读取中断: {}", err);
                            return Err(ParseError::Incomplete(delimiter));
                        }
                    }
                }
                Err(err) => return Err(err),
                Ok(node) => return Ok((text, node)),
            }
        }
    }

    fn handle_input(&mut self, line: String) -> Result<(), Box<dyn Error>> {
        if line.trim().is_empty() {
            // 空行也顺便回收后台任务
            self.executor.dispatch(None);
            return Ok(());
        }

        let (text, node) = match self.read_complete(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("解析失败: {}", err);
                eprintln!("{} {}", self.theme.error_symbol, (self.theme.error_style)(err.to_string()));
                return Ok(());
            }
        };
        self.readline.add_history(&text)?;

        let status = self.executor.dispatch(node.as_ref());
        if status != 0 {
            eprintln!("{}", self.theme.status_line(status));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_run_command_returns_status() {
        let config = Config::default();
        let mut shell = Shell::new(&config).unwrap();
        assert_eq!(shell.run_command("true && false"), 1);
        assert_eq!(shell.run_command("true"), 0);
    }

    #[test]
    #[serial]
    fn test_run_command_syntax_error() {
        let config = Config::default();
        let mut shell = Shell::new(&config).unwrap();
        assert_eq!(shell.run_command("true |"), SYNTAX_ERROR_STATUS);
        assert_eq!(shell.run_command("cat << EOF"), SYNTAX_ERROR_STATUS);
    }
}
