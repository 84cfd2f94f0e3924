//! Domain models for the book catalog
//!
//! Field names serialize in camelCase to match the catalog backend's records
//! (`thumbnailUrl`, `audioUrl`, ...). Media fields hold references as stored:
//! either an absolute URL or a bare file name that the media resolver turns
//! into one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{LibraryError, Result};

// =============================================================================
// Chapter
// =============================================================================

/// One chapter of a book, optionally with its own narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Position within the book; lower plays first.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub audio_url: Option<String>,
}

impl Chapter {
    pub fn new(id: impl Into<String>, title: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: None,
            order,
            audio_url: None,
        }
    }

    pub fn with_audio(mut self, reference: impl Into<String>) -> Self {
        self.audio_url = Some(reference.into());
        self
    }

    /// Whether the chapter carries a non-blank audio reference.
    pub fn has_audio(&self) -> bool {
        has_reference(&self.audio_url)
    }
}

// =============================================================================
// Book
// =============================================================================

/// A catalog entry with optional narration and artwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Book {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            content: None,
            thumbnail_url: None,
            image_url: None,
            audio_url: None,
            chapters: Vec::new(),
            tags: Vec::new(),
            category: None,
        }
    }

    pub fn with_audio(mut self, reference: impl Into<String>) -> Self {
        self.audio_url = Some(reference.into());
        self
    }

    pub fn with_thumbnail(mut self, reference: impl Into<String>) -> Self {
        self.thumbnail_url = Some(reference.into());
        self
    }

    pub fn with_chapter(mut self, chapter: Chapter) -> Self {
        self.chapters.push(chapter);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Chapters ordered by `order`, ties kept in catalog order.
    pub fn sorted_chapters(&self) -> Vec<&Chapter> {
        let mut chapters: Vec<&Chapter> = self.chapters.iter().collect();
        chapters.sort_by_key(|chapter| chapter.order);
        chapters
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.id == chapter_id)
    }

    /// Whether the book or any chapter has narration.
    pub fn has_audio(&self) -> bool {
        has_reference(&self.audio_url) || self.chapters.iter().any(Chapter::has_audio)
    }

    /// Case-insensitive tag match.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }

    /// Case-insensitive category match.
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category.trim()))
    }

    /// Validate required fields and chapter identity.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(invalid("id", "Book id cannot be empty"));
        }

        if self.title.trim().is_empty() {
            return Err(invalid("title", "Book title cannot be empty"));
        }

        let mut seen = HashSet::new();
        for chapter in &self.chapters {
            if chapter.id.trim().is_empty() {
                return Err(invalid("chapters", "Chapter id cannot be empty"));
            }
            if !seen.insert(chapter.id.as_str()) {
                return Err(invalid(
                    "chapters",
                    &format!("Duplicate chapter id {}", chapter.id),
                ));
            }
        }

        Ok(())
    }
}

fn has_reference(reference: &Option<String>) -> bool {
    reference
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty())
}

fn invalid(field: &str, message: &str) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message: message.to_string(),
    }
}
