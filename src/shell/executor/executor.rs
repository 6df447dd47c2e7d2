use std::convert::Infallible;
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, RawFd};

use libc::{STDIN_FILENO, STDOUT_FILENO};
use log::{debug, warn};
use nix::errno::Errno;
use nix::unistd::{close, dup2, execvp, pipe};

use super::chain::{self, Separator};
use super::dirstack::{Builtin, DirStack};
use super::error::ExecError;
use super::job_manager::JobManager;
use super::process::{fork_child, wait_child};
use super::redirect::{apply_redirection, StdioGuard};
use super::variable::{apply_local_assignments, publish_status, ScopedEnv};
use crate::shell::parser::ast::{CommandNode, SimpleCommand, Subshell};

/// 执行引擎：目录栈、后台任务表和最近一次退出状态都放在这里，
/// 由 REPL 持有，整个会话只有一个实例。
pub struct Executor {
    dirs: DirStack,
    jobs: JobManager,
    last_status: i32,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            dirs: DirStack::new(),
            jobs: JobManager::new(),
            last_status: 0,
        }
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    pub fn dir_stack(&self) -> &DirStack {
        &self.dirs
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// 执行一棵命令树并返回退出状态。
    ///
    /// 每次进入都会先回收已结束的后台任务；传入 `None` 时只做回收，
    /// 返回上一次的状态。返回前把状态写进 `?`。
    pub fn dispatch<'a>(&mut self, node: impl Into<Option<&'a CommandNode>>) -> i32 {
        self.jobs.reap_zombies();

        let Some(node) = node.into() else {
            return self.last_status;
        };

        let status = match node {
            CommandNode::Simple(cmd) => self.run_simple(cmd),
            CommandNode::Pipe { left, right } => self.run_pipe(left, right),
            CommandNode::And { left, right } => self.run_and(left, right),
            CommandNode::Or { left, right } => self.run_or(left, right),
            CommandNode::Sequence { .. } | CommandNode::Background { .. } => self.run_chain(node),
            CommandNode::Subshell(sub) => self.run_subshell(sub),
        };
        self.set_status(status);
        status
    }

    fn set_status(&mut self, status: i32) {
        self.last_status = status;
        publish_status(status);
    }

    fn report(&self, err: ExecError) -> i32 {
        warn!("{}", err);
        eprintln!("{}", err);
        err.status()
    }

    fn run_simple(&mut self, cmd: &SimpleCommand) -> i32 {
        let Some(name) = cmd.argv.first() else {
            warn!("空命令");
            return 0;
        };

        let status = match Builtin::from_name(name) {
            Some(builtin) => {
                debug!("执行内建命令: {}", name);
                match self.run_builtin(builtin, cmd) {
                    Ok(()) => 0,
                    Err(err) => self.report(err),
                }
            }
            None => {
                debug!("执行外部命令: {:?}", cmd.argv);
                match fork_child(|| exec_program(cmd)) {
                    Ok(pid) => wait_child(pid),
                    Err(err) => self.report(err),
                }
            }
        };
        self.set_status(status);
        status
    }

    /// 内建命令在当前进程里执行一次。
    /// 局部赋值和重定向只在这次调用里生效，返回时由 guard 恢复。
    fn run_builtin(&mut self, builtin: Builtin, cmd: &SimpleCommand) -> Result<(), ExecError> {
        let _stdio = StdioGuard::save(&cmd.redirect)?;
        let _env = ScopedEnv::apply(&cmd.locals)?;
        apply_redirection(&cmd.redirect)?;
        let args = cmd.argv.get(1..).unwrap_or_default();
        self.dirs.run(builtin, args, &mut io::stdout())
    }

    fn run_pipe(&mut self, left: &CommandNode, right: &CommandNode) -> i32 {
        let (read_end, write_end) = match pipe() {
            Ok(ends) => ends,
            Err(errno) => return self.report(ExecError::sys("pipe", errno)),
        };
        let read_fd = read_end.as_raw_fd();
        let write_fd = write_end.as_raw_fd();

        let left_pid = match fork_child(|| match attach_pipe_end(write_fd, STDOUT_FILENO, read_fd) {
            Ok(()) => self.dispatch(left),
            Err(err) => child_failure(err),
        }) {
            Ok(pid) => pid,
            Err(err) => return self.report(err),
        };

        let right_pid = match fork_child(|| match attach_pipe_end(read_fd, STDIN_FILENO, write_fd) {
            Ok(()) => self.dispatch(right),
            Err(err) => child_failure(err),
        }) {
            Ok(pid) => pid,
            Err(err) => {
                // 先关掉两端，左边才能因为 EPIPE 或读到 EOF 结束
                drop(read_end);
                drop(write_end);
                wait_child(left_pid);
                return self.report(err);
            }
        };

        // 父进程必须关闭两端，否则右边永远等不到 EOF
        drop(read_end);
        drop(write_end);

        let left_status = wait_child(left_pid);
        let right_status = wait_child(right_pid);
        debug!("管道结束: 左 {} 右 {}", left_status, right_status);
        if right_status != 0 {
            right_status
        } else {
            left_status
        }
    }

    fn run_and(&mut self, left: &CommandNode, right: &CommandNode) -> i32 {
        let status = self.dispatch(left);
        if status != 0 {
            return status;
        }
        self.dispatch(right)
    }

    fn run_or(&mut self, left: &CommandNode, right: &CommandNode) -> i32 {
        let status = self.dispatch(left);
        if status == 0 {
            return status;
        }
        self.dispatch(right)
    }

    /// 按书写顺序执行 `;`/`&` 链。
    ///
    /// 有链尾时返回链尾的状态；否则最后一条若是后台则为 0，
    /// 同步则为它的状态。后台 fork 失败的处理见 [`chain::run_links`]。
    fn run_chain(&mut self, node: &CommandNode) -> i32 {
        let links = chain::flatten(node);
        chain::run_links(&links, |link| match link.separator {
            Some(Separator::Background) => match self.spawn_background(link.command) {
                Ok(()) => Ok(0),
                Err(err) => Err(self.report(err)),
            },
            Some(Separator::Sequence) | None => Ok(self.dispatch(link.command)),
        })
    }

    fn spawn_background(&mut self, command: &CommandNode) -> Result<(), ExecError> {
        let pid = fork_child(|| self.dispatch(command))?;
        eprintln!("Backgrounded: {}", pid);
        let index = self.jobs.add_job(pid, command.to_string());
        debug!("后台任务 [{}] {}: {}", index, pid, command);
        Ok(())
    }

    fn run_subshell(&mut self, sub: &Subshell) -> i32 {
        let forked = fork_child(|| {
            let setup = apply_local_assignments(&sub.locals)
                .and_then(|()| apply_redirection(&sub.redirect));
            match setup {
                Ok(()) => self.dispatch(&*sub.body),
                Err(err) => child_failure(err),
            }
        });
        match forked {
            Ok(pid) => wait_child(pid),
            Err(err) => self.report(err),
        }
    }
}

/// 子进程里准备阶段失败：打印错误，用对应的状态退出
fn child_failure(err: ExecError) -> i32 {
    eprintln!("{}", err);
    err.status()
}

/// 子进程里把管道的一端接到 `target` 上，然后关掉两端的原始描述符。
/// 子进程不会回到持有 `OwnedFd` 的栈帧，这里关闭不会造成二次关闭。
fn attach_pipe_end(fd: RawFd, target: RawFd, other: RawFd) -> Result<(), ExecError> {
    dup2(fd, target).map_err(|errno| ExecError::sys("dup2", errno))?;
    let _ = close(fd);
    let _ = close(other);
    Ok(())
}

fn exec(argv: &[String]) -> Result<Infallible, ExecError> {
    let args = argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ExecError::sys("execvp", Errno::EINVAL))?;
    let program = args
        .first()
        .ok_or(ExecError::sys("execvp", Errno::EINVAL))?;
    execvp(program, &args).map_err(|errno| ExecError::sys("execvp", errno))
}

/// fork 出来的子进程执行外部程序：先局部赋值，再重定向，最后 exec。
/// 只有失败时才会返回。
fn exec_program(cmd: &SimpleCommand) -> i32 {
    let result = apply_local_assignments(&cmd.locals)
        .and_then(|()| apply_redirection(&cmd.redirect))
        .and_then(|()| exec(&cmd.argv));
    match result {
        Ok(never) => match never {},
        Err(err) => child_failure(err),
    }
}
