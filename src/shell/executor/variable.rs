use std::env;
use std::ffi::OsString;

use log::debug;
use nix::errno::Errno;

use super::error::ExecError;
use crate::shell::parser::ast::Assignment;

/// 保存最近一次退出状态的环境变量名，供 `$?` 展开
pub const STATUS_VAR: &str = "?";

// std::env::set_var 遇到非法名字会直接 panic，这里先按 setenv(3) 的规则检查
fn set_local(assignment: &Assignment) -> Result<(), ExecError> {
    let name = &assignment.name;
    if name.is_empty()
        || name.contains('=')
        || name.contains('\0')
        || assignment.value.contains('\0')
    {
        return Err(ExecError::sys("setenv", Errno::EINVAL));
    }
    debug!("设置局部变量: {}={}", name, assignment.value);
    env::set_var(name, &assignment.value);
    Ok(())
}

/// 按顺序把局部赋值写进当前进程环境，遇到第一个失败就停下，已写入的不回滚。
/// 用在 fork 出来、马上要 exec 的子进程里。
pub fn apply_local_assignments(locals: &[Assignment]) -> Result<(), ExecError> {
    for assignment in locals {
        set_local(assignment)?;
    }
    Ok(())
}

/// 在当前进程里临时生效的局部赋值，drop 时恢复原值。
/// 内建命令不 fork，靠它把 `HOME=/x cd` 这类赋值限制在命令范围内。
pub struct ScopedEnv {
    saved: Vec<(String, Option<OsString>)>,
}

impl ScopedEnv {
    pub fn apply(locals: &[Assignment]) -> Result<Self, ExecError> {
        let mut scope = ScopedEnv { saved: Vec::new() };
        for assignment in locals {
            let previous = env::var_os(&assignment.name);
            set_local(assignment)?;
            scope.saved.push((assignment.name.clone(), previous));
        }
        Ok(scope)
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        while let Some((name, previous)) = self.saved.pop() {
            match previous {
                Some(value) => env::set_var(&name, value),
                None => env::remove_var(&name),
            }
        }
    }
}

/// 把退出状态以十进制写进 `?`
pub fn publish_status(status: i32) {
    env::set_var(STATUS_VAR, status.to_string());
}
