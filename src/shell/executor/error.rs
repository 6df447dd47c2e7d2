use std::io;

use nix::errno::Errno;

/// 引擎内部的错误，最终都会折算成一个退出状态
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// 系统调用失败，显示格式与 perror 一致
    #[error("{op}: {}", .errno.desc())]
    Sys { op: &'static str, errno: Errno },

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("dir stack empty")]
    EmptyDirStack,

    #[error("cd: HOME not set")]
    HomeNotSet,
}

impl ExecError {
    pub fn sys(op: &'static str, errno: Errno) -> Self {
        ExecError::Sys { op, errno }
    }

    pub fn io(op: &'static str, err: io::Error) -> Self {
        let errno = err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO);
        ExecError::Sys { op, errno }
    }

    /// OS 错误返回 errno，内建命令的用法类错误固定返回 1
    pub fn status(&self) -> i32 {
        match self {
            ExecError::Sys { errno, .. } => *errno as i32,
            ExecError::Usage(_) | ExecError::EmptyDirStack | ExecError::HomeNotSet => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sys_error_reads_like_perror() {
        let err = ExecError::sys("chdir", Errno::ENOENT);
        assert_eq!(err.to_string(), "chdir: No such file or directory");
        assert_eq!(err.status(), libc::ENOENT);
    }

    #[test]
    fn test_usage_errors_are_status_one() {
        assert_eq!(ExecError::Usage("popd").to_string(), "usage: popd");
        assert_eq!(ExecError::Usage("popd").status(), 1);
        assert_eq!(ExecError::EmptyDirStack.status(), 1);
    }

    #[test]
    fn test_io_error_keeps_errno() {
        let err = ExecError::io("write", io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(err.status(), libc::ENOSPC);
    }
}
