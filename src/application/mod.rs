pub mod bootstrap;
pub mod commands;
pub mod countdown;
pub mod session_log;
pub mod task_store;
