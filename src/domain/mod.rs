pub mod day_index;
pub mod models;
pub mod projector;
pub mod session_history;
pub mod timer;
