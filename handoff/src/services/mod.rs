pub(crate) mod lifecycle;
mod timeout_sweeper;

pub use lifecycle::LifecycleService;
pub use timeout_sweeper::TimeoutSweeper;
