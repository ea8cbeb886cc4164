use {
    serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, Timestamp},
    tgbridge_common::types::FormattedMessage,
};

/// Render a bridged post as a Discord embed.
pub fn to_embed(message: &FormattedMessage) -> CreateEmbed {
    let author = CreateEmbedAuthor::new(&message.author_name).icon_url(&message.author_icon_url);
    let mut embed = CreateEmbed::new().author(author).colour(message.color);

    if let Some(description) = &message.description {
        embed = embed.description(description);
    }
    if let Some(image) = &message.image_url {
        embed = embed.image(image);
    }
    if let Some(footer) = &message.footer {
        let mut f = CreateEmbedFooter::new(&footer.text);
        if let Some(icon) = &footer.icon_url {
            f = f.icon_url(icon);
        }
        embed = embed.footer(f);
    }
    if let Some(ts) = message
        .timestamp
        .and_then(|t| Timestamp::from_unix_timestamp(t.timestamp()).ok())
    {
        embed = embed.timestamp(ts);
    }
    embed
}
