use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use libc::{STDIN_FILENO, STDOUT_FILENO};
use log::{debug, error};
use nix::unistd::{dup, dup2, mkstemp, unlink};

use super::error::ExecError;
use crate::shell::parser::ast::{InputRedirect, OutputRedirect, Redirect};

const CREATE_MODE: u32 = 0o644;

/// 把 `file` 复制到 `target` 上，原描述符随 `file` 一起关闭。
/// 0/1 原本就是关闭的时候 open 会直接拿到 `target`，这时只交出所有权、不关闭。
fn replace_fd(file: File, target: RawFd) -> Result<(), ExecError> {
    if file.as_raw_fd() == target {
        let _ = file.into_raw_fd();
        return Ok(());
    }
    dup2(file.as_raw_fd(), target).map_err(|errno| ExecError::sys("dup2", errno))?;
    Ok(())
}

/// 把 here-document 正文写进一个已经 unlink 的临时文件，并倒回开头
fn heredoc_file(text: &str) -> Result<File, ExecError> {
    let template = env::temp_dir().join("zako-heredoc-XXXXXX");
    let (fd, path) = mkstemp(template.as_path()).map_err(|errno| ExecError::sys("mkstemp", errno))?;
    // mkstemp 刚返回的描述符只归这里所有
    let mut file = File::from(unsafe { OwnedFd::from_raw_fd(fd) });
    // 先 unlink，之后任何失败路径都只需要关闭描述符
    unlink(path.as_path()).map_err(|errno| ExecError::sys("unlink", errno))?;

    file.write_all(text.as_bytes())
        .map_err(|err| ExecError::io("write", err))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|err| ExecError::io("lseek", err))?;
    Ok(file)
}

fn open_input(input: &InputRedirect) -> Result<Option<File>, ExecError> {
    match input {
        InputRedirect::None => Ok(None),
        InputRedirect::FromFile(path) => File::open(path)
            .map(Some)
            .map_err(|err| ExecError::io("open", err)),
        InputRedirect::HereDoc(text) => heredoc_file(text).map(Some),
    }
}

fn open_output(output: &OutputRedirect) -> Result<Option<File>, ExecError> {
    let (path, append) = match output {
        OutputRedirect::None => return Ok(None),
        OutputRedirect::Truncate(path) => (path, false),
        OutputRedirect::Append(path) => (path, true),
    };
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(!append)
        .append(append)
        .mode(CREATE_MODE)
        .open(path)
        .map(Some)
        .map_err(|err| ExecError::io("open", err))
}

/// 把命令的输入/输出重定向应用到当前进程的 0/1 号描述符上。
///
/// 先处理输入再处理输出；任何一步失败都会立即返回，中间打开的描述符已关闭。
pub fn apply_redirection(redirect: &Redirect) -> Result<(), ExecError> {
    if let Some(file) = open_input(&redirect.input)? {
        debug!("重定向 stdin: {:?}", redirect.input);
        replace_fd(file, STDIN_FILENO)?;
    }
    if let Some(file) = open_output(&redirect.output)? {
        debug!("重定向 stdout: {:?}", redirect.output);
        replace_fd(file, STDOUT_FILENO)?;
    }
    Ok(())
}

/// 在不 fork 的情况下给内建命令做重定向：先 dup 保存将被覆盖的描述符，
/// drop 时刷新 stdout 并 dup2 回去。
pub struct StdioGuard {
    saved: Vec<(RawFd, OwnedFd)>,
}

impl StdioGuard {
    pub fn save(redirect: &Redirect) -> Result<Self, ExecError> {
        let mut guard = StdioGuard { saved: Vec::new() };
        if redirect.is_empty() {
            return Ok(guard);
        }
        if redirect.input != InputRedirect::None {
            guard.save_fd(STDIN_FILENO)?;
        }
        if redirect.output != OutputRedirect::None {
            guard.save_fd(STDOUT_FILENO)?;
        }
        Ok(guard)
    }

    fn save_fd(&mut self, target: RawFd) -> Result<(), ExecError> {
        let fd = dup(target).map_err(|errno| ExecError::sys("dup", errno))?;
        self.saved
            .push((target, unsafe { OwnedFd::from_raw_fd(fd) }));
        Ok(())
    }
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        if self.saved.is_empty() {
            return;
        }
        let _ = io::stdout().flush();
        while let Some((target, saved)) = self.saved.pop() {
            if let Err(errno) = dup2(saved.as_raw_fd(), target) {
                error!("恢复描述符 {} 失败: {}", target, errno);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use nix::sys::stat::fstat;
    use nix::unistd::close;
    use serial_test::serial;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    #[allow(clippy::unwrap_used)]
    #[test]
    #[serial]
    fn test_heredoc_file_is_rewound_and_unlinked() {
        let mut file = heredoc_file("line one\nline two\n").unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "line one\nline two\n");
        assert_eq!(file.metadata().unwrap().nlink(), 0);
    }

    #[test]
    fn test_missing_input_file_reports_enoent() {
        let input = InputRedirect::FromFile("/nonexistent/zako/input".to_string());
        assert_eq!(
            open_input(&input).map(|_| ()).map_err(|e| e.status()),
            Err(libc::ENOENT)
        );
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    #[serial]
    fn test_output_truncate_then_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let path_str = path.to_string_lossy().to_string();

        let mut file = open_output(&OutputRedirect::Truncate(path_str.clone()))
            .unwrap()
            .unwrap();
        file.write_all(b"first\n").unwrap();
        drop(file);

        let mut file = open_output(&OutputRedirect::Append(path_str.clone()))
            .unwrap()
            .unwrap();
        file.write_all(b"second\n").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");

        let file = open_output(&OutputRedirect::Truncate(path_str)).unwrap();
        drop(file);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_output_into_missing_directory_fails() {
        let output = OutputRedirect::Truncate("/nonexistent/zako/out".to_string());
        assert!(open_output(&output).is_err());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_empty_redirect_saves_nothing() {
        let guard = StdioGuard::save(&Redirect::default()).unwrap();
        assert!(guard.saved.is_empty());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    #[serial]
    fn test_replace_fd_onto_itself_keeps_descriptor_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("self.txt");
        let file = File::create(&path).unwrap();
        let fd = file.as_raw_fd();

        replace_fd(file, fd).unwrap();

        let stat = fstat(fd).unwrap();
        assert_eq!(stat.st_ino, std::fs::metadata(&path).unwrap().ino());
        close(fd).unwrap();
    }
}
