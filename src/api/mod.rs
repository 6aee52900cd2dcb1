pub mod handlers;
pub mod routes;

use serde::Serialize;

use crate::assistant::Exchange;

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub text_input: String,
    pub text_response: String,
    pub audio_response: String,
}

impl From<Exchange> for ProcessResponse {
    fn from(exchange: Exchange) -> Self {
        Self {
            text_input: exchange.text_input,
            text_response: exchange.text_response,
            audio_response: exchange.audio_response,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
