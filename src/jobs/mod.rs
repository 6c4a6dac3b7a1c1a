pub mod purge_worker;
pub mod scheduler;
