//! # Media Resource Resolver
//!
//! Maps a catalog media reference onto a fetchable URL.
//!
//! - Absolute references (`scheme://...`) are returned unchanged.
//! - Bare file names are joined onto the configured base URL under the
//!   category's bucket segment, with percent-encoding applied per segment.
//! - A missing reference yields nothing for audio and documents, and the
//!   placeholder artwork URL for images and thumbnails.
//!
//! Resolution is pure: no network access, no shared state.

use core_runtime::config::MediaEndpoints;
use tracing::trace;
use url::Url;

use crate::error::Result;
use crate::types::{is_absolute_url, MediaCategory};

/// Resolves media references against a fixed set of [`MediaEndpoints`].
#[derive(Debug, Clone)]
pub struct MediaResolver {
    endpoints: MediaEndpoints,
    base: Url,
}

impl MediaResolver {
    /// Fails when the endpoints carry an invalid base URL.
    pub fn new(endpoints: MediaEndpoints) -> Result<Self> {
        endpoints.validate()?;
        let base = endpoints.base()?;
        Ok(Self { endpoints, base })
    }

    pub fn endpoints(&self) -> &MediaEndpoints {
        &self.endpoints
    }

    /// Resolve `reference` for `category`.
    ///
    /// Whitespace-only references are treated as missing.
    pub fn resolve(&self, category: MediaCategory, reference: Option<&str>) -> Option<String> {
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());

        let resolved = match reference {
            None => self.placeholder(category),
            Some(r) if is_absolute_url(r) => Some(r.to_string()),
            Some(r) => Some(self.compose(self.segment(category), r)),
        };

        trace!(%category, ?reference, ?resolved, "Resolved media reference");
        resolved
    }

    /// Placeholder artwork for `category`, if it has one.
    pub fn placeholder(&self, category: MediaCategory) -> Option<String> {
        let override_url = match category {
            MediaCategory::Image => self.endpoints.image_placeholder.as_deref(),
            MediaCategory::Thumbnail => self.endpoints.thumbnail_placeholder.as_deref(),
            MediaCategory::Audio | MediaCategory::Document => return None,
        };

        match override_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Some(url.to_string()),
            None => Some(self.compose(self.segment(category), &self.endpoints.placeholder_file)),
        }
    }

    fn segment(&self, category: MediaCategory) -> &str {
        match category {
            MediaCategory::Audio => &self.endpoints.audio_segment,
            MediaCategory::Image => &self.endpoints.image_segment,
            MediaCategory::Thumbnail => &self.endpoints.thumbnail_segment,
            MediaCategory::Document => &self.endpoints.document_segment,
        }
    }

    fn compose(&self, segment: &str, file: &str) -> String {
        let mut url = self.base.clone();
        // `base()` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segment.split('/').filter(|part| !part.is_empty()));
            path.extend(file.split('/').filter(|part| !part.is_empty()));
        }
        url.into()
    }
}
