use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::models::{AnalysisReport, AnalysisRequest};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_text: String,
    pub job_description: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub page_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub report: AnalysisReport,
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut request = AnalysisRequest::new(req.resume_text, req.job_description);
    if let Some(filename) = req.filename {
        request = request.with_filename(filename);
    }
    if let Some(page_count) = req.page_count {
        request = request.with_page_count(page_count);
    }
    run_analysis(&state, request).await
}

/// POST /api/v1/analyze/upload
/// Multipart fields: `file` (PDF resume) and `job_description`.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut pdf: Option<(Option<String>, Vec<u8>)> = None;
    let mut job_description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file: {e}")))?;
                pdf = Some((filename, bytes.to_vec()));
            }
            "job_description" => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read job_description: {e}"))
                })?;
                job_description = Some(text);
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        pdf.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let job_description = job_description
        .ok_or_else(|| AppError::Validation("Missing 'job_description' field".to_string()))?;

    let (resume_text, page_count) = extract_pdf_text(bytes).await?;
    let mut request =
        AnalysisRequest::new(resume_text, job_description).with_page_count(page_count);
    if let Some(filename) = filename {
        request = request.with_filename(filename);
    }
    run_analysis(&state, request).await
}

async fn run_analysis(
    state: &AppState,
    request: AnalysisRequest,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let analysis_id = Uuid::new_v4();
    let report = state
        .coordinator
        .analyze_request(analysis_id, request)
        .await?;
    Ok(Json(AnalyzeResponse {
        analysis_id,
        generated_at: Utc::now(),
        report,
    }))
}

/// Returns the PDF's text and page count. Parsing is CPU-bound, so it runs on the
/// blocking pool.
async fn extract_pdf_text(bytes: Vec<u8>) -> Result<(String, usize), AppError> {
    let size = bytes.len();
    let pages =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
            .map_err(|e| AppError::UnprocessableEntity(format!("Could not read PDF: {e}")))?;

    let page_count = pages.len();
    let text = pages.join("\n");
    if text.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(
            "PDF contains no extractable text".to_string(),
        ));
    }
    info!(
        "Extracted {} chars across {page_count} page(s) from {size}-byte PDF",
        text.len()
    );
    Ok((text, page_count))
}
