pub mod db;
pub mod memory;
pub mod postgres;
pub mod queue;
pub mod repo;
pub mod storage;
