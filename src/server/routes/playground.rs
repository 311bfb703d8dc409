use axum::{body::Bytes, response::Html};
use serde::Deserialize;

use super::parse_body;
use crate::playground::{default_tests, script_harness, web_document, ScriptTest, WebSnippet};
use crate::server::ApiError;

#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub code: String,
    pub tests: Option<Vec<ScriptTest>>,
}

pub async fn web(body: Bytes) -> Result<Html<String>, ApiError> {
    let snippet: WebSnippet = parse_body(&body)?;
    Ok(Html(web_document(&snippet)))
}

pub async fn script(body: Bytes) -> Result<Html<String>, ApiError> {
    let request: ScriptRequest = parse_body(&body)?;
    let tests = request.tests.unwrap_or_else(default_tests);
    Ok(Html(script_harness(&request.code, &tests)))
}
