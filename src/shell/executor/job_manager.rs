use std::fmt;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use super::process::decode_status;

/// 一条后台任务记录，只用于日志和回收时对账，不支持 fg/bg
#[derive(Debug, Clone)]
pub struct Job {
    pub pid: Pid,
    pub index: usize,
    pub command: String,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.index, self.pid, self.command)
    }
}

#[derive(Debug, Default)]
pub struct JobManager {
    jobs: Vec<Job>,
}

impl JobManager {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn get_jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn find_available_index(&self) -> usize {
        let mut index = 1;
        while self.jobs.iter().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    pub fn add_job(&mut self, pid: Pid, command: String) -> usize {
        let index = self.find_available_index();
        self.jobs.push(Job {
            pid,
            index,
            command,
        });
        index
    }

    pub fn remove_job(&mut self, pid: Pid) -> Option<Job> {
        let pos = self.jobs.iter().position(|job| job.pid == pid)?;
        Some(self.jobs.remove(pos))
    }

    /// 非阻塞地回收所有已经结束的子进程，返回回收的个数。
    ///
    /// 不区分前台和后台：前台子进程总是先被显式 wait，轮不到这里。
    pub fn reap_zombies(&mut self) -> usize {
        let mut reaped = 0;
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => {
                    let Some((pid, code)) = decode_status(status) else {
                        continue;
                    };
                    eprintln!("Completed: {} ({})", pid, code);
                    match self.remove_job(pid) {
                        Some(job) => debug!("后台任务完成: {} -> {}", job, code),
                        None => debug!("回收子进程: {} -> {}", pid, code),
                    }
                    reaped += 1;
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break,
                Err(errno) => {
                    warn!("回收子进程失败: {}", errno);
                    break;
                }
            }
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_are_reused() {
        let mut jobs = JobManager::new();
        assert_eq!(jobs.add_job(Pid::from_raw(100), "sleep 1".to_string()), 1);
        assert_eq!(jobs.add_job(Pid::from_raw(200), "sleep 2".to_string()), 2);

        let removed = jobs.remove_job(Pid::from_raw(100));
        assert_eq!(removed.map(|job| job.index), Some(1));
        assert_eq!(jobs.add_job(Pid::from_raw(300), "sleep 3".to_string()), 1);
        assert_eq!(jobs.get_jobs().len(), 2);
    }

    #[test]
    fn test_remove_unknown_job() {
        let mut jobs = JobManager::new();
        assert!(jobs.remove_job(Pid::from_raw(1)).is_none());
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_job_display() {
        let job = Job {
            pid: Pid::from_raw(42),
            index: 3,
            command: "sleep 5".to_string(),
        };
        assert_eq!(job.to_string(), "[3] 42 sleep 5");
    }
}
