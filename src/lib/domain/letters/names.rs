//! Recipient name formatting

use std::fmt;

/// Strategy used to shorten a recipient name before a title is appended
pub trait NameShortener: fmt::Debug + Send + Sync {
    /// Returns the shortened form of `name`
    fn shorten(&self, name: &str) -> String;
}

/// Keeps only the first character.
///
/// Only correct for names written family name first with a single-character
/// family name, e.g. `王小明` becomes `王`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeadingCharacter;

impl NameShortener for LeadingCharacter {
    fn shorten(&self, name: &str) -> String {
        name.chars().next().map(String::from).unwrap_or_default()
    }
}

/// Keeps only the last whitespace-separated word, e.g. `Jane Doe` becomes `Doe`
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWord;

impl NameShortener for LastWord {
    fn shorten(&self, name: &str) -> String {
        name.split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string()
    }
}

/// How recipient names are presented in the rendered body
#[derive(Debug, Default)]
pub struct RecipientNameFormat {
    title: Option<String>,
    shortener: Option<Box<dyn NameShortener>>,
}

impl RecipientNameFormat {
    /// Create a format appending `title`, optionally shortening the name first
    pub fn new(title: Option<String>, shortener: Option<Box<dyn NameShortener>>) -> Self {
        Self { title, shortener }
    }

    /// Replace the shortening strategy
    pub fn with_shortener(mut self, shortener: Box<dyn NameShortener>) -> Self {
        self.shortener = Some(shortener);
        self
    }

    /// Formats a name. Names are only touched when a title is configured.
    pub fn format(&self, name: &str) -> String {
        let Some(title) = &self.title else {
            return name.to_string();
        };

        let name = match &self.shortener {
            Some(shortener) => shortener.shorten(name),
            None => name.to_string(),
        };

        format!("{name}{title}")
    }
}
