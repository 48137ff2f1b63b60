pub mod cache;
pub mod completions;
pub mod exec;

pub use cache::CacheCommand;
pub use completions::CompletionsCommand;
pub use exec::ExecCommand;
