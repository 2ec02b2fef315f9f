//! Turns raw file bytes into something the oracle can read.
//!
//! The adapter is chosen from the file extension alone; see [`adapter_for`].

use crate::config::{PdfMode, PipelineConfig};
use crate::error::ClassificationError;
use providers::{ImagePart, OracleInput};
use std::path::Path;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAdapter {
    /// Lossy UTF-8, truncated.
    Text,
    /// Whole file as one image.
    Image,
    /// PDF rendered page by page.
    MultiPageVisual,
    /// PDF text layer, truncated like plain text.
    PdfText,
}

#[derive(Debug, Clone)]
pub struct AdaptLimits {
    pub max_text_chars: usize,
    pub pdf_max_pages: u32,
}

impl From<&PipelineConfig> for AdaptLimits {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            max_text_chars: cfg.max_text_chars,
            pdf_max_pages: cfg.pdf_max_pages,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn image_mime(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// The PDF mode this build can honour. Text extraction needs the `pdf`
/// feature; without it PDFs are rendered instead of failing on every run.
pub fn supported_pdf_mode(requested: PdfMode) -> PdfMode {
    if requested == PdfMode::Text && !cfg!(feature = "pdf") {
        warn!("pdf_mode \"text\" needs the `pdf` feature, rendering pages instead");
        return PdfMode::Visual;
    }
    requested
}

pub fn adapter_for(path: &Path, pdf_mode: PdfMode) -> ContentAdapter {
    match extension(path).as_deref() {
        Some("pdf") => match pdf_mode {
            PdfMode::Visual => ContentAdapter::MultiPageVisual,
            PdfMode::Text => ContentAdapter::PdfText,
        },
        Some(ext) if image_mime(ext).is_some() => ContentAdapter::Image,
        _ => ContentAdapter::Text,
    }
}

impl ContentAdapter {
    pub async fn adapt(
        &self,
        path: &Path,
        bytes: Vec<u8>,
        limits: &AdaptLimits,
    ) -> Result<OracleInput, ClassificationError> {
        match self {
            ContentAdapter::Text => Ok(OracleInput::Text(truncate_chars(
                &String::from_utf8_lossy(&bytes),
                limits.max_text_chars,
            ))),
            ContentAdapter::Image => {
                let mime = sniff_image_mime(path, &bytes)?;
                Ok(OracleInput::Image(ImagePart { mime, data: bytes }))
            }
            ContentAdapter::MultiPageVisual => {
                let pages = render_pdf_pages(&bytes, limits.pdf_max_pages).await?;
                Ok(OracleInput::Pages(pages))
            }
            ContentAdapter::PdfText => {
                let text = pdf_text(bytes).await?;
                Ok(OracleInput::Text(truncate_chars(&text, limits.max_text_chars)))
            }
        }
    }
}

/// Keeps the first `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn sniff_image_mime(path: &Path, bytes: &[u8]) -> Result<String, ClassificationError> {
    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() == infer::MatcherType::Image {
            return Ok(kind.mime_type().to_string());
        }
        return Err(ClassificationError::Adapt(format!(
            "expected an image, content looks like {}",
            kind.mime_type()
        )));
    }
    extension(path)
        .as_deref()
        .and_then(image_mime)
        .map(str::to_string)
        .ok_or_else(|| ClassificationError::Adapt("unrecognised image data".into()))
}

async fn render_pdf_pages(
    bytes: &[u8],
    max_pages: u32,
) -> Result<Vec<ImagePart>, ClassificationError> {
    let scratch = tempfile::tempdir()
        .map_err(|e| ClassificationError::Adapt(format!("scratch dir: {e}")))?;
    let source = scratch.path().join("input.pdf");
    tokio::fs::write(&source, bytes)
        .await
        .map_err(|e| ClassificationError::Adapt(format!("stage pdf: {e}")))?;

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg("100")
        .arg("-l")
        .arg(max_pages.max(1).to_string())
        .arg(&source)
        .arg(scratch.path().join("page"))
        .output()
        .await
        .map_err(|e| ClassificationError::Adapt(format!("failed to run pdftoppm: {e}")))?;
    if !output.status.success() {
        return Err(ClassificationError::Adapt(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut rendered: Vec<_> = std::fs::read_dir(scratch.path())
        .map_err(|e| ClassificationError::Adapt(format!("list rendered pages: {e}")))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("png")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("page"))
                    .unwrap_or(false)
        })
        .collect();
    // pdftoppm pads page numbers to a common width, so name order is page order.
    rendered.sort();

    let mut pages = Vec::with_capacity(rendered.len());
    for page in rendered {
        let data = tokio::fs::read(&page)
            .await
            .map_err(|e| ClassificationError::Adapt(format!("read rendered page: {e}")))?;
        pages.push(ImagePart {
            mime: "image/png".to_string(),
            data,
        });
    }
    if pages.is_empty() {
        return Err(ClassificationError::Adapt("pdf rendered no pages".into()));
    }
    Ok(pages)
}

#[cfg(feature = "pdf")]
async fn pdf_text(bytes: Vec<u8>) -> Result<String, ClassificationError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ClassificationError::Adapt(format!("pdf text task: {e}")))?
        .map_err(|e| ClassificationError::Adapt(format!("pdf text: {e}")))
}

#[cfg(not(feature = "pdf"))]
async fn pdf_text(_bytes: Vec<u8>) -> Result<String, ClassificationError> {
    Err(ClassificationError::Adapt(
        "pdf text extraction requires the `pdf` feature".into(),
    ))
}
