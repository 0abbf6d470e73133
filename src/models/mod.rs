pub mod release;
pub mod settings;
pub mod task;
