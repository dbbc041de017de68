//! Render model for clients: what each card shows and which actions it offers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::controller::Snapshot;
use crate::models::{EntryStatus, PhotoConfig, PhotoStyle, ResultEntry};

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub style: PhotoStyle,
    pub slug: &'static str,
    pub background: &'static str,
    pub status: EntryStatus,
    pub image: Option<String>,
    pub error: Option<String>,
    pub can_retry: bool,
    pub can_download: bool,
    pub download_name: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub source_image: Option<String>,
    pub is_generating: bool,
    pub can_generate: bool,
    pub cards: Vec<CardView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `IDPro_<style>.png`, with every non-alphanumeric character of the style name as `_`.
pub fn download_filename(style: PhotoStyle) -> String {
    let name: String = style
        .name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("IDPro_{}.png", name)
}

pub fn render_card(entry: &ResultEntry) -> CardView {
    let status = entry.status();
    let succeeded = status == EntryStatus::Succeeded;
    CardView {
        style: entry.style,
        slug: entry.style.slug(),
        background: entry.style.config().background,
        status,
        image: if succeeded { entry.image.as_ref().map(|i| i.to_data_uri()) } else { None },
        error: entry.error.clone().filter(|_| status == EntryStatus::Failed),
        can_retry: status == EntryStatus::Failed,
        can_download: succeeded,
        download_name: succeeded.then(|| download_filename(entry.style)),
        last_updated: entry.last_updated,
    }
}

pub fn render(snapshot: &Snapshot) -> SessionView {
    SessionView {
        id: snapshot.id,
        source_image: snapshot.source.as_ref().map(|s| s.to_data_uri()),
        is_generating: snapshot.is_generating,
        can_generate: snapshot.source.is_some() && !snapshot.is_generating,
        cards: snapshot.store.entries().iter().map(render_card).collect(),
        created_at: snapshot.created_at,
        updated_at: snapshot.updated_at,
    }
}

pub fn style_catalogue() -> Vec<PhotoConfig> {
    PhotoStyle::ALL.iter().map(|s| s.config()).collect()
}
