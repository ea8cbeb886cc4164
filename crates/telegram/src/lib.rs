//! Telegram source platform: the long-lived session used to re-fetch post
//! media, the imgbb re-hosting client, and the placeholder media resolver.

pub mod error;
pub mod imgbb;
pub mod placeholder;
pub mod resolver;
pub mod session;

pub use {
    error::{Error, Result},
    imgbb::{ImageHost, ImgbbClient},
    placeholder::{PlaceholderRef, is_placeholder, parse_placeholder},
    resolver::MediaResolver,
    session::{MediaSource, TelegramSession},
};
