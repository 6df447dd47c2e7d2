use std::io::{self, Write};

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use super::error::ExecError;
use crate::shell::signals;

/// 把 wait 状态折算成退出码：正常退出取退出码，被信号杀死取 128 + 信号值。
/// 停止/继续等非终止状态返回 `None`。
pub fn decode_status(status: WaitStatus) -> Option<(Pid, i32)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid, code)),
        WaitStatus::Signaled(pid, sig, _core_dumped) => Some((pid, 128 + sig as i32)),
        _ => None,
    }
}

/// 子进程的唯一出口。
///
/// `process::exit` 退出前会尝试刷新 stdout 缓冲，这里不再手动加锁刷新：
/// fork 时若别的线程正持有 stdout 锁，子进程里加锁会永远等下去。
pub fn exit_child(status: i32) -> ! {
    std::process::exit(status)
}

/// fork 一个子进程执行 `body`，子进程用 `body` 的返回值退出，父进程拿到 pid。
pub fn fork_child<F>(body: F) -> Result<Pid, ExecError>
where
    F: FnOnce() -> i32,
{
    // 父进程里缓冲的输出不能被子进程再写一遍
    let _ = io::stdout().flush();

    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            signals::restore_default_signals();
            exit_child(body())
        }
        Ok(ForkResult::Parent { child }) => {
            debug!("创建子进程: {}", child);
            Ok(child)
        }
        Err(errno) => Err(ExecError::sys("fork", errno)),
    }
}

/// 阻塞等待指定子进程结束并返回退出码
pub fn wait_child(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some((_, code)) = decode_status(status) {
                    debug!("子进程 {} 结束: {}", pid, code);
                    return code;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                let err = ExecError::sys("waitpid", errno);
                error!("等待子进程 {} 失败: {}", pid, err);
                eprintln!("{}", err);
                return err.status();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use serial_test::serial;

    #[test]
    fn test_decode_exit_and_signal() {
        let pid = Pid::from_raw(42);
        assert_eq!(decode_status(WaitStatus::Exited(pid, 3)), Some((pid, 3)));
        assert_eq!(
            decode_status(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some((pid, 137))
        );
        assert_eq!(decode_status(WaitStatus::StillAlive), None);
        assert_eq!(decode_status(WaitStatus::Continued(pid)), None);
    }

    #[test]
    #[serial]
    fn test_fork_child_exit_code_reaches_parent() {
        let pid = fork_child(|| 7);
        assert!(pid.is_ok());
        if let Ok(pid) = pid {
            assert_eq!(wait_child(pid), 7);
        }
    }

    #[test]
    #[serial]
    fn test_wait_on_unknown_child_is_echild() {
        assert_eq!(wait_child(Pid::from_raw(999_999)), libc::ECHILD);
    }
}
