pub mod config;
pub mod document_mapper;
pub mod error;
pub mod local_cache;
pub mod notifier;
pub mod storage;
pub mod task_remote;
