//! Local preview handles for image candidates.
//!
//! A [`PreviewRegistry`] hands out [`PreviewHandle`]s that resolve to the
//! image bytes while the handle is alive. Dropping the handle revokes the
//! entry, so releasing a candidate (removal, batch teardown, early exit)
//! releases its preview on every path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use uuid::Uuid;

const PREVIEW_SCHEME: &str = "preview://";

#[derive(Debug)]
struct PreviewEntry {
    content_type: String,
    data: Bytes,
}

type Entries = Arc<Mutex<HashMap<Uuid, PreviewEntry>>>;

/// Registry of live preview resources.
#[derive(Clone, Debug, Default)]
pub struct PreviewRegistry {
    entries: Entries,
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<Uuid, PreviewEntry>> {
    // A panic while holding the lock cannot leave a half-written map entry.
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` and return the owning handle.
    pub fn acquire(&self, content_type: &str, data: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        lock(&self.entries).insert(
            id,
            PreviewEntry {
                content_type: content_type.to_string(),
                data,
            },
        );
        tracing::trace!(preview_id = %id, "Preview acquired");
        PreviewHandle {
            id,
            entries: self.entries.clone(),
        }
    }

    /// Number of previews not yet revoked.
    pub fn live_count(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        parse_url(url).is_some_and(|id| lock(&self.entries).contains_key(&id))
    }

    /// Resolve a preview URL to a `data:` URL while the handle is alive.
    pub fn resolve(&self, url: &str) -> Option<String> {
        let id = parse_url(url)?;
        let entries = lock(&self.entries);
        let entry = entries.get(&id)?;
        Some(format!(
            "data:{};base64,{}",
            entry.content_type,
            STANDARD.encode(&entry.data)
        ))
    }
}

fn parse_url(url: &str) -> Option<Uuid> {
    url.strip_prefix(PREVIEW_SCHEME)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Scoped preview resource. Revoked on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    entries: Entries,
}

impl PreviewHandle {
    pub fn url(&self) -> String {
        format!("{}{}", PREVIEW_SCHEME, self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        lock(&self.entries).remove(&self.id);
        tracing::trace!(preview_id = %self.id, "Preview revoked");
    }
}
