//! Image references returned by the image lookup.
//!
//! The server answers with `data:` URIs; plain URLs are accepted too.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Longest remote URL shown before truncation.
const MAX_URL_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Inline { mime: String, data: Vec<u8> },
    Remote(String),
}

impl ImageRef {
    pub fn parse(src: &str) -> Self {
        parse_data_uri(src).unwrap_or_else(|| ImageRef::Remote(src.to_string()))
    }

    /// One-line description for the transcript.
    pub fn label(&self) -> String {
        match self {
            ImageRef::Inline { mime, data } => format!("{}, {}", mime, format_size(data.len())),
            ImageRef::Remote(url) => {
                if url.chars().count() > MAX_URL_CHARS {
                    let truncated: String = url.chars().take(MAX_URL_CHARS).collect();
                    format!("{}...", truncated)
                } else {
                    url.clone()
                }
            }
        }
    }

    /// File extension for an inline image.
    pub fn extension(&self) -> Option<&str> {
        match self {
            ImageRef::Inline { mime, .. } => Some(match mime.as_str() {
                "image/png" => "png",
                "image/jpeg" | "image/jpg" => "jpg",
                "image/gif" => "gif",
                "image/webp" => "webp",
                "image/svg+xml" => "svg",
                _ => "bin",
            }),
            ImageRef::Remote(_) => None,
        }
    }
}

fn parse_data_uri(src: &str) -> Option<ImageRef> {
    let rest = src.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let data = STANDARD.decode(payload.trim()).ok()?;

    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Some(ImageRef::Inline {
        mime: mime.to_string(),
        data,
    })
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Write every inline image to `dir/<stem>-<n>.<ext>`, numbering from 1.
///
/// Remote URLs are skipped. Returns the paths written.
pub fn export_images(images: &[String], dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let mut written = Vec::new();
    for (i, src) in images.iter().enumerate() {
        let image = ImageRef::parse(src);
        let (ImageRef::Inline { data, .. }, Some(ext)) = (&image, image.extension()) else {
            continue;
        };

        let path = dir.join(format!("{}-{}.{}", stem, i + 1, ext));
        fs::write(&path, data).with_context(|| format!("Failed to write {:?}", path))?;
        written.push(path);
    }

    Ok(written)
}
