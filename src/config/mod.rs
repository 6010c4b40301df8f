pub mod app;

pub use app::{AppConfig, SummarizerKind, TelegramConfig};
