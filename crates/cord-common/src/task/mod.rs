//! Background task supervision

mod supervisor;

pub use supervisor::TaskSupervisor;
