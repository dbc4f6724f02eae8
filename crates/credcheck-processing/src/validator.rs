use std::path::Path;

use credcheck_core::{
    Candidate, CandidateState, ErrorKind, FailureRecord, LocalFile, Origin, PreviewRegistry,
    ValidationConfig,
};

/// Why an input was refused at intake
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectionReason {
    #[error("Unsupported file type: {content_type} (allowed: {allowed:?})")]
    UnsupportedType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    Empty,

    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
}

/// Candidate validator
///
/// Checks local files against the configured type allow-list and size ceiling
/// and remote URLs for syntax only. Never touches the network.
#[derive(Clone, Debug)]
pub struct CandidateValidator {
    max_file_size: u64,
    allowed_content_types: Vec<String>,
    previews: PreviewRegistry,
}

impl CandidateValidator {
    pub fn new(config: &ValidationConfig, previews: PreviewRegistry) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes,
            allowed_content_types: config
                .allowed_content_types
                .iter()
                .map(|ct| ct.to_lowercase())
                .collect(),
            previews,
        }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: u64) -> Result<(), RejectionReason> {
        if size == 0 {
            return Err(RejectionReason::Empty);
        }

        if size > self.max_file_size {
            return Err(RejectionReason::TooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), RejectionReason> {
        let normalized = content_type.trim().to_lowercase();

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(self.unsupported(content_type));
        }

        Ok(())
    }

    /// Refuse a file whose extension says one thing and whose declared
    /// content type says another. Unknown or missing extensions pass.
    pub fn validate_extension_content_type_match(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), RejectionReason> {
        let Some(extension) = extension_of(filename) else {
            return Ok(());
        };
        let normalized = content_type.trim().to_lowercase();

        let Some(expected) = expected_content_types(&extension) else {
            tracing::debug!(
                extension = %extension,
                content_type = %content_type,
                "Unknown extension, skipping Content-Type/extension cross-validation"
            );
            return Ok(());
        };

        if !expected.iter().any(|ct| *ct == normalized) {
            return Err(RejectionReason::UnsupportedType {
                content_type: format!(
                    "{} (does not match extension '{}'. Expected one of: {})",
                    content_type,
                    extension,
                    expected.join(", ")
                ),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    pub fn validate_file(&self, file: &LocalFile) -> Result<(), RejectionReason> {
        self.validate_content_type(&file.content_type)?;
        self.validate_extension_content_type_match(&file.name, &file.content_type)?;
        self.validate_file_size(file.size)?;
        Ok(())
    }

    /// Syntactic check: absolute http(s) URL with a host.
    pub fn validate_url(&self, url: &str) -> Result<(), RejectionReason> {
        let trimmed = url.trim();
        let parsed = reqwest::Url::parse(trimmed)
            .map_err(|e| RejectionReason::MalformedUrl(format!("{}: {}", trimmed, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RejectionReason::MalformedUrl(format!(
                "{}: unsupported scheme '{}'",
                trimmed,
                parsed.scheme()
            )));
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(RejectionReason::MalformedUrl(format!(
                "{}: missing host",
                trimmed
            )));
        }

        Ok(())
    }

    pub fn check(&self, origin: &Origin) -> Result<(), RejectionReason> {
        match origin {
            Origin::LocalFile(file) => self.validate_file(file),
            Origin::RemoteUrl(url) => self.validate_url(url),
        }
    }

    /// Validate `origin` and build an accepted candidate, left in
    /// `Validating` until it is dispatched. Image files get a preview handle.
    pub fn validate(&self, origin: Origin) -> Result<Candidate, RejectionReason> {
        self.check(&origin)?;
        Ok(self.accept(origin))
    }

    /// Like [`validate`](Self::validate), but a refused input still becomes a
    /// candidate, terminal in `Rejected` with a failure record and no preview.
    pub fn admit(&self, origin: Origin) -> (Candidate, Option<RejectionReason>) {
        if let Err(reason) = self.check(&origin) {
            let mut candidate = Candidate::new(origin);
            let recorded = candidate
                .advance(CandidateState::Validating)
                .and_then(|()| {
                    candidate.fail(
                        CandidateState::Rejected,
                        FailureRecord::new(ErrorKind::ValidationRejection, reason.to_string()),
                    )
                });
            if let Err(e) = recorded {
                tracing::error!(
                    candidate_id = %candidate.id(),
                    error = %e,
                    "Could not record rejection"
                );
            }
            tracing::info!(
                candidate_id = %candidate.id(),
                reason = %reason,
                "Input rejected"
            );
            return (candidate, Some(reason));
        }

        (self.accept(origin), None)
    }

    fn accept(&self, origin: Origin) -> Candidate {
        let preview = match &origin {
            Origin::LocalFile(file) if file.is_image() => Some(
                self.previews
                    .acquire(&file.content_type, file.data.clone()),
            ),
            _ => None,
        };

        let mut candidate = Candidate::new(origin);
        if let Err(e) = candidate.advance(CandidateState::Validating) {
            tracing::error!(candidate_id = %candidate.id(), error = %e, "Could not accept candidate");
        }
        if let Some(handle) = preview {
            candidate.attach_preview(handle);
        }
        candidate
    }

    fn unsupported(&self, content_type: &str) -> RejectionReason {
        RejectionReason::UnsupportedType {
            content_type: content_type.to_string(),
            allowed: self.allowed_content_types.clone(),
        }
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Content types a file extension may legitimately carry.
pub fn expected_content_types(extension: &str) -> Option<&'static [&'static str]> {
    let types: &'static [&'static str] = match extension.to_lowercase().as_str() {
        // Images
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "bmp" => &["image/bmp"],
        "tif" | "tiff" => &["image/tiff"],
        "heic" => &["image/heic"],
        // Documents
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword"],
        "docx" => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        "txt" => &["text/plain"],
        _ => return None,
    };
    Some(types)
}

/// Best-effort content type for a file name, from its extension.
pub fn content_type_for_filename(filename: &str) -> Option<&'static str> {
    extension_of(filename)
        .and_then(|ext| expected_content_types(&ext))
        .and_then(|types| types.first().copied())
}
