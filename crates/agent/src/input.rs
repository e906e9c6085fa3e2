//! User payload formatting — turning the caller's query, images, and
//! tabular data into the new user turn.
//!
//! These rules are deployment policy, not loop logic, which is why they
//! live in one module: image strings are normalized to inline data URIs,
//! and tabular payloads are written under the data directory and referenced
//! by an instructional text part so generated code can read the file.

use sandloop_core::message::{Content, ContentPart, ImageSource};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// The raw inputs of one user turn.
#[derive(Debug, Clone, Default)]
pub struct UserPayload {
    pub query: String,
    /// Base64 image strings, with or without a `data:image` prefix.
    pub images: Vec<String>,
    /// Raw CSV text.
    pub csv_data: Option<String>,
}

impl UserPayload {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Build the user turn's content. Plain queries stay plain text; images and
/// tabular payloads upgrade the content to multi-part.
pub fn format_user_content(payload: &UserPayload, data_dir: &Path) -> Content {
    if payload.images.is_empty() && payload.csv_data.is_none() {
        return Content::Text(payload.query.clone());
    }

    let mut parts = vec![ContentPart::Text {
        text: payload.query.clone(),
    }];

    for image in &payload.images {
        let url = if image.starts_with("data:image") {
            image.clone()
        } else {
            format!("data:image/jpeg;base64,{image}")
        };
        parts.push(ContentPart::ImageUrl {
            image_url: ImageSource { url },
        });
    }

    if let Some(csv) = &payload.csv_data {
        parts.push(ContentPart::Text {
            text: save_csv(csv, data_dir),
        });
    }

    Content::Parts(parts)
}

/// Write the CSV under the data directory and produce the instructional
/// text referencing it. A write failure becomes an explanatory part rather
/// than failing the turn.
fn save_csv(csv: &str, data_dir: &Path) -> String {
    let filename = format!("data_{}.csv", &Uuid::new_v4().simple().to_string()[..8]);
    let filepath = data_dir.join(filename);

    let write = std::fs::create_dir_all(data_dir)
        .and_then(|_| std::fs::write(&filepath, csv));

    match write {
        Ok(()) => format!(
            "\n\nI have provided a CSV file at '{}' containing the data. \
             You can write code to read and analyze it.",
            filepath.display()
        ),
        Err(e) => {
            warn!(error = %e, "Failed to save CSV payload");
            format!("\n\nFailed to save CSV file: {e}")
        }
    }
}
