mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod camera;
pub mod client;
pub mod codec;
pub mod config;
pub mod image_source;
pub mod interpreter;
pub mod request;
pub mod translator;

pub use app::start_app;
pub use translator::{TranslationResult, Translator};
