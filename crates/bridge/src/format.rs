//! Feed entry → [`FormattedMessage`].

use std::sync::Arc;

use {
    regex::Regex,
    tgbridge_common::types::{FormattedMessage, MessageFooter, TELEGRAM_ICON_URL},
    tgbridge_telegram::MediaResolver,
};

use crate::{
    Error, Result,
    feed::FeedEntry,
    normalize::{ImageRef, Normalized, Normalizer, is_spaced_text, remove_whitespace},
};

pub struct PostFormatter {
    normalizer: Normalizer,
    resolver: Option<Arc<MediaResolver>>,
    forward: Regex,
    forward_header: Regex,
}

impl PostFormatter {
    /// `resolver` handles placeholder media; without one, placeholders are
    /// dropped.
    pub fn new(resolver: Option<Arc<MediaResolver>>) -> Result<Self> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| Error::external(format!("invalid pattern {p}"), e))
        };
        Ok(Self {
            normalizer: Normalizer::new()?,
            resolver,
            forward: compile(
                r#"Forwarded From <b><a href="([^"]+)">([^<]+)</a></b> \(([^)]+)\)"#,
            )?,
            forward_header: compile(r"(?s)Forwarded From.*?\)")?,
        })
    }

    pub async fn format(&self, entry: &FeedEntry, source_channel: &str) -> FormattedMessage {
        let content = entry.content.as_str();
        let mut message = FormattedMessage::new(format!("Telegram | {}", capitalize(source_channel)));

        if let Some(author) = self
            .forward
            .captures(content)
            .and_then(|c| c.get(3))
            .map(|m| m.as_str().to_string())
        {
            message.footer = Some(MessageFooter {
                text: format!("Forwarded from {author}"),
                icon_url: Some(TELEGRAM_ICON_URL.to_string()),
            });
        }

        let body = self.forward_header.replace(content, "");
        let Normalized { mut text, images } = self.normalizer.normalize(&body);
        // Letter-spaced bodies lose all whitespace. Images come from the
        // untouched markup.
        if is_spaced_text(&body) {
            text = self.normalizer.clean_text(&remove_whitespace(&body));
        }
        if !text.is_empty() {
            message.description = Some(text);
        }

        let images = self.resolve_images(images, source_channel).await;
        if let Some(first) = images.first() {
            message.image_url = Some(first.clone());
        }
        if images.len() > 1 {
            let more = images.len() - 1;
            let plural = if more > 1 {
                "s"
            } else {
                ""
            };
            let note = format!("*+{more} more image{plural}*");
            message.description = Some(match message.description.take() {
                Some(text) => format!("{text}\n\n{note}"),
                None => note,
            });
        }

        message.timestamp = entry.published;
        message
    }

    /// Hosted image URLs in document order. Placeholders that fail to
    /// resolve are dropped.
    async fn resolve_images(&self, images: Vec<ImageRef>, source_channel: &str) -> Vec<String> {
        let mut urls = Vec::with_capacity(images.len());
        for image in images {
            match image {
                ImageRef::Direct(url) => urls.push(url),
                ImageRef::Placeholder(url) => {
                    if let Some(resolver) = &self.resolver
                        && let Some(hosted) = resolver.resolve(&url, source_channel).await
                    {
                        urls.push(hosted);
                    }
                },
            }
        }
        urls
    }
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
