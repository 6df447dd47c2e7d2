use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use nix::unistd::{chdir, getcwd};

use super::error::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pushd,
    Popd,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "pushd" => Some(Builtin::Pushd),
            "popd" => Some(Builtin::Popd),
            _ => None,
        }
    }
}

fn change_dir(path: &Path) -> Result<(), ExecError> {
    chdir(path).map_err(|errno| ExecError::sys("chdir", errno))?;
    debug!("切换目录: {}", path.display());
    Ok(())
}

fn current_dir() -> Result<PathBuf, ExecError> {
    getcwd().map_err(|errno| ExecError::sys("getcwd", errno))
}

/// pushd/popd 用的目录栈，进程内有效，不落盘
#[derive(Debug, Default)]
pub struct DirStack {
    // 末尾是栈顶
    entries: Vec<PathBuf>,
}

impl DirStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 从最近压入的开始遍历
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter().rev()
    }

    /// `args` 不含命令名本身
    pub fn run<W: Write>(
        &mut self,
        builtin: Builtin,
        args: &[String],
        out: &mut W,
    ) -> Result<(), ExecError> {
        match builtin {
            Builtin::Cd => Self::cd(args),
            Builtin::Pushd => self.pushd(args, out),
            Builtin::Popd => self.popd(args, out),
        }
    }

    /// 无参数时切换到 `$HOME`
    pub fn cd(args: &[String]) -> Result<(), ExecError> {
        let path = match args {
            [] => PathBuf::from(env::var_os("HOME").ok_or(ExecError::HomeNotSet)?),
            [path] => PathBuf::from(path),
            _ => return Err(ExecError::Usage("cd OR cd <dirName>")),
        };
        change_dir(&path)
    }

    /// 只有成功切进新目录后才把原目录压栈
    pub fn pushd<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<(), ExecError> {
        let [target] = args else {
            return Err(ExecError::Usage("pushd: <dirName>"));
        };

        let cwd = current_dir()?;
        change_dir(Path::new(target))?;
        self.entries.push(cwd);
        self.print_stack(out)
    }

    /// 栈顶出栈后再切换目录；切换失败时条目同样已经移除
    pub fn popd<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<(), ExecError> {
        if !args.is_empty() {
            return Err(ExecError::Usage("popd"));
        }

        let path = self.entries.pop().ok_or(ExecError::EmptyDirStack)?;
        change_dir(&path)?;
        self.print_stack(out)
    }

    pub fn format_stack(&self, cwd: &Path) -> String {
        let mut line = cwd.to_string_lossy().into_owned();
        for entry in self.iter() {
            line.push(' ');
            line.push_str(&entry.to_string_lossy());
        }
        line
    }

    /// 打印 `<cwd> <栈顶> ... <栈底>`
    pub fn print_stack<W: Write>(&self, out: &mut W) -> Result<(), ExecError> {
        let cwd = current_dir()?;
        writeln!(out, "{}", self.format_stack(&cwd)).map_err(|err| ExecError::io("write", err))?;
        out.flush().map_err(|err| ExecError::io("write", err))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    // 测试会改动进程的工作目录，结束时切回去
    struct CwdGuard(PathBuf);

    impl CwdGuard {
        fn new() -> Self {
            CwdGuard(env::current_dir().unwrap())
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = env::set_current_dir(&self.0);
        }
    }

    fn args(items: &[&Path]) -> Vec<String> {
        items.iter().map(|p| p.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(Builtin::from_name("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::from_name("pushd"), Some(Builtin::Pushd));
        assert_eq!(Builtin::from_name("popd"), Some(Builtin::Popd));
        assert_eq!(Builtin::from_name("ls"), None);
    }

    #[test]
    fn test_format_stack_most_recent_first() {
        let mut stack = DirStack::new();
        stack.entries.push(PathBuf::from("/a"));
        stack.entries.push(PathBuf::from("/b"));
        assert_eq!(stack.format_stack(Path::new("/c")), "/c /b /a");
        assert_eq!(DirStack::new().format_stack(Path::new("/c")), "/c");
    }

    #[test]
    #[serial]
    fn test_pushd_then_popd_restores_cwd_and_stack() {
        let _guard = CwdGuard::new();
        let dir = TempDir::new().unwrap();
        let target = dir.path().canonicalize().unwrap();
        let before = env::current_dir().unwrap();
        let mut stack = DirStack::new();
        let mut out = Vec::new();

        stack.pushd(&args(&[&target]), &mut out).unwrap();
        assert_eq!(env::current_dir().unwrap(), target);
        assert_eq!(stack.len(), 1);
        assert_eq!(
            String::from_utf8(out.clone()).unwrap(),
            format!("{} {}\n", target.display(), before.display())
        );

        out.clear();
        stack.popd(&[], &mut out).unwrap();
        assert_eq!(env::current_dir().unwrap(), before);
        assert!(stack.is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", before.display()));
    }

    #[test]
    #[serial]
    fn test_popd_on_empty_stack() {
        let _guard = CwdGuard::new();
        let before = env::current_dir().unwrap();
        let mut stack = DirStack::new();
        let err = stack.popd(&[], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ExecError::EmptyDirStack));
        assert_eq!(err.status(), 1);
        assert_eq!(env::current_dir().unwrap(), before);
    }

    #[test]
    #[serial]
    fn test_failed_pushd_leaves_stack_untouched() {
        let _guard = CwdGuard::new();
        let before = env::current_dir().unwrap();
        let mut stack = DirStack::new();
        let err = stack
            .pushd(&["/nonexistent/zako/dir".to_string()], &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.status(), libc::ENOENT);
        assert!(stack.is_empty());
        assert_eq!(env::current_dir().unwrap(), before);
    }

    #[test]
    #[serial]
    fn test_popd_removes_entry_even_if_chdir_fails() {
        let _guard = CwdGuard::new();
        let mut stack = DirStack::new();
        stack.entries.push(PathBuf::from("/nonexistent/zako/dir"));
        let err = stack.popd(&[], &mut Vec::new()).unwrap_err();
        assert_eq!(err.status(), libc::ENOENT);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_usage_errors() {
        let mut stack = DirStack::new();
        let mut out = Vec::new();
        assert!(matches!(
            stack.pushd(&[], &mut out),
            Err(ExecError::Usage(_))
        ));
        assert!(matches!(
            stack.popd(&["x".to_string()], &mut out),
            Err(ExecError::Usage(_))
        ));
        assert!(matches!(
            DirStack::cd(&["a".to_string(), "b".to_string()]),
            Err(ExecError::Usage(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    #[serial]
    fn test_cd_without_args_goes_home() {
        let _guard = CwdGuard::new();
        let dir = TempDir::new().unwrap();
        let home = dir.path().canonicalize().unwrap();
        let old_home = env::var_os("HOME");
        env::set_var("HOME", &home);

        let result = DirStack::cd(&[]);

        match old_home {
            Some(value) => env::set_var("HOME", value),
            None => env::remove_var("HOME"),
        }
        assert!(result.is_ok());
        assert_eq!(env::current_dir().unwrap(), home);
    }
}
