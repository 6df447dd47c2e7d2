use log::warn;
use nix::sys::signal::{self, SigHandler, Signal};

const INTERACTIVE_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

fn set_handler(handler: SigHandler) {
    for sig in INTERACTIVE_SIGNALS {
        // SigIgn/SigDfl 不涉及任何 Rust 侧的处理函数
        if let Err(err) = unsafe { signal::signal(sig, handler) } {
            warn!("设置信号 {} 失败: {}", sig, err);
        }
    }
}

/// 交互模式下 shell 自身忽略 Ctrl-C / Ctrl-\，避免跟着前台命令一起退出
pub fn ignore_interactive_signals() {
    set_handler(SigHandler::SigIgn);
}

/// 忽略状态会跨 exec 继承，子进程一开始就要恢复默认处理
pub fn restore_default_signals() {
    set_handler(SigHandler::SigDfl);
}
