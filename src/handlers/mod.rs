pub mod ai;
pub mod clothing;
pub mod hairstyles;
pub mod health;
pub mod results;
pub mod search;

use serde::Serialize;

/// Body returned by both try-on endpoints.
#[derive(Debug, Serialize)]
pub struct TryOnResponse {
    pub success: bool,
    pub result: String,
    pub message: String,
}
