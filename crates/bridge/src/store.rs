//! JSON file-backed state: channel mappings, posted links, pending queue.
//!
//! Every mutation that goes through a `record_*`/`enqueue_*`/`clear_*` method
//! is persisted before it returns. Loading never fails on bad content: the
//! offending document or record is dropped with a warning.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    chrono::{DateTime, Utc},
    indexmap::IndexMap,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tgbridge_common::types::FormattedMessage,
    tgbridge_config::BridgeSection,
    tokio::{fs, sync::Mutex},
    tracing::{debug, info, warn},
};

use crate::{Result, error::Context};

/// Store shared between the poll scheduler and the command surface.
pub type SharedStore = Arc<Mutex<BridgeStore>>;

/// A formatted post waiting for operator release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPost {
    pub post_date: DateTime<Utc>,
    pub link: String,
    /// Destination channel the post goes to when released.
    pub channel_id: String,
    pub message: FormattedMessage,
}

#[derive(Debug, Clone)]
struct StorePaths {
    mappings: PathBuf,
    posted_links: PathBuf,
    pending_posts: PathBuf,
}

pub struct BridgeStore {
    paths: StorePaths,
    mappings: IndexMap<String, String>,
    posted: IndexMap<String, Vec<String>>,
    pending: IndexMap<String, Vec<PendingPost>>,
}

impl BridgeStore {
    /// Open the store files under the configured data directory.
    pub async fn open(section: &BridgeSection) -> Result<Self> {
        Self::open_paths(
            section.mappings_path(),
            section.posted_links_path(),
            section.pending_posts_path(),
        )
        .await
    }

    /// Load all three documents. A missing mappings file is created as `{}`.
    pub async fn open_paths(
        mappings: PathBuf,
        posted_links: PathBuf,
        pending_posts: PathBuf,
    ) -> Result<Self> {
        let paths = StorePaths {
            mappings,
            posted_links,
            pending_posts,
        };
        for path in [&paths.mappings, &paths.posted_links, &paths.pending_posts] {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        if !fs::try_exists(&paths.mappings).await.unwrap_or(false) {
            info!(path = %paths.mappings.display(), "no channel mappings yet, creating an empty file");
            atomic_write(&paths.mappings, "{}").await?;
        }

        let mappings = parse_mappings(read_document(&paths.mappings).await);
        let mut posted = parse_posted_links(read_document(&paths.posted_links).await);
        let mut pending = parse_pending(read_document(&paths.pending_posts).await);
        for source in mappings.keys() {
            posted.entry(source.clone()).or_default();
            pending.entry(source.clone()).or_default();
        }

        info!(
            sources = mappings.len(),
            posted = posted.values().map(Vec::len).sum::<usize>(),
            pending = pending.values().map(Vec::len).sum::<usize>(),
            "bridge store loaded"
        );
        Ok(Self {
            paths,
            mappings,
            posted,
            pending,
        })
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Source channel → destination channel id, in file order.
    pub fn mappings(&self) -> &IndexMap<String, String> {
        &self.mappings
    }

    pub fn destination(&self, source: &str) -> Option<&str> {
        self.mappings.get(source).map(String::as_str)
    }

    pub fn is_posted(&self, source: &str, link: &str) -> bool {
        self.posted
            .get(source)
            .is_some_and(|links| links.iter().any(|l| l == link))
    }

    pub fn posted_links(&self, source: &str) -> &[String] {
        self.posted.get(source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Append `link` in memory. Returns `false` if it was already recorded.
    pub fn add_posted_link(&mut self, source: &str, link: &str) -> bool {
        let links = self.posted.entry(source.to_string()).or_default();
        if links.iter().any(|l| l == link) {
            return false;
        }
        links.push(link.to_string());
        true
    }

    /// Append `link` and persist the posted-link document.
    pub async fn record_posted(&mut self, source: &str, link: &str) -> Result<bool> {
        let added = self.add_posted_link(source, link);
        if added {
            self.save_posted_links().await?;
        }
        Ok(added)
    }

    pub fn is_pending(&self, source: &str, link: &str) -> bool {
        self.pending
            .get(source)
            .is_some_and(|posts| posts.iter().any(|p| p.link == link))
    }

    /// Queue for `source`, or `None` when the source has no queue at all.
    pub fn pending(&self, source: &str) -> Option<&[PendingPost]> {
        self.pending.get(source).map(Vec::as_slice)
    }

    /// Every queue, in file order, including empty ones.
    pub fn pending_queues(&self) -> impl Iterator<Item = (&str, &[PendingPost])> {
        self.pending
            .iter()
            .map(|(source, posts)| (source.as_str(), posts.as_slice()))
    }

    /// Append a post to the queue of `source` and persist the queue document.
    pub async fn enqueue_pending(&mut self, source: &str, post: PendingPost) -> Result<()> {
        self.pending.entry(source.to_string()).or_default().push(post);
        self.save_pending_posts().await
    }

    /// Remove and return the first `count` posts of `source` in memory.
    /// `None` when the source has no queue.
    pub fn take_pending(&mut self, source: &str, count: usize) -> Option<Vec<PendingPost>> {
        let queue = self.pending.get_mut(source)?;
        let n = count.min(queue.len());
        Some(queue.drain(..n).collect())
    }

    /// Empty the queue of `source` and persist. Returns how many posts were
    /// dropped, or `None` when the source has no queue.
    pub async fn clear_pending(&mut self, source: &str) -> Result<Option<usize>> {
        let Some(queue) = self.pending.get_mut(source) else {
            return Ok(None);
        };
        let cleared = queue.len();
        queue.clear();
        self.save_pending_posts().await?;
        Ok(Some(cleared))
    }

    pub async fn save_posted_links(&self) -> Result<()> {
        let json = serde_json::to_string(&self.posted)?;
        atomic_write(&self.paths.posted_links, &json).await
    }

    pub async fn save_pending_posts(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.pending)?;
        atomic_write(&self.paths.pending_posts, &json).await
    }

    /// Persist both mutable documents.
    pub async fn flush(&self) -> Result<()> {
        self.save_posted_links().await?;
        self.save_pending_posts().await?;
        debug!("bridge store flushed");
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Read and parse a JSON document. Missing or malformed documents yield
/// `None`; the latter with a warning.
async fn read_document(path: &Path) -> Option<Value> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read store file");
            return None;
        },
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed store file, starting empty");
            None
        },
    }
}

fn as_object(doc: Option<Value>, what: &str) -> serde_json::Map<String, Value> {
    match doc {
        Some(Value::Object(map)) => map,
        Some(_) => {
            warn!(document = what, "expected a JSON object, ignoring document");
            serde_json::Map::new()
        },
        None => serde_json::Map::new(),
    }
}

fn parse_mappings(doc: Option<Value>) -> IndexMap<String, String> {
    as_object(doc, "mappings")
        .into_iter()
        .filter_map(|(source, value)| match value {
            Value::String(id) if !id.trim().is_empty() => Some((source, id.trim().to_string())),
            Value::Number(n) if n.is_u64() => Some((source, n.to_string())),
            other => {
                warn!(source = %source, value = %other, "invalid destination id, dropping mapping");
                None
            },
        })
        .collect()
}

fn parse_posted_links(doc: Option<Value>) -> IndexMap<String, Vec<String>> {
    as_object(doc, "posted_links")
        .into_iter()
        .filter_map(|(source, value)| {
            let Value::Array(items) = value else {
                warn!(source = %source, "posted links are not a list, dropping them");
                return None;
            };
            let mut links: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(link) if !links.contains(&link) => links.push(link),
                    Value::String(_) => {},
                    other => warn!(source = %source, value = %other, "dropping invalid posted link"),
                }
            }
            Some((source, links))
        })
        .collect()
}

fn parse_pending(doc: Option<Value>) -> IndexMap<String, Vec<PendingPost>> {
    as_object(doc, "pending_posts")
        .into_iter()
        .filter_map(|(source, value)| {
            let Value::Array(items) = value else {
                warn!(source = %source, "pending posts are not a list, dropping them");
                return None;
            };
            let posts = items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<PendingPost>(item) {
                    Ok(post) => Some(post),
                    Err(e) => {
                        warn!(source = %source, error = %e, "dropping invalid pending post");
                        None
                    },
                })
                .collect();
            Some((source, posts))
        })
        .collect()
}
