mod chain;
mod dirstack;
mod error;
#[allow(clippy::module_inception)]
mod executor;
mod job_manager;
mod process;
mod redirect;
mod variable;

pub use executor::Executor;
