pub mod config;
pub mod error;
pub mod extract;
pub mod gradio;
pub mod handlers;
pub mod image_processing;
pub mod search;
pub mod server;
pub mod state;
pub mod storage;
pub mod stylist;
pub mod tryon;
pub mod uploads;
pub mod validation;
