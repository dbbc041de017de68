use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::fmt;

/// One target document-photo category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotoStyle {
    #[serde(rename = "Passport")]
    Passport,
    #[serde(rename = "Visa")]
    Visa,
    #[serde(rename = "ID Card")]
    IdCard,
    #[serde(rename = "CV / Resume")]
    Cv,
}

/// Static prompt parameters for a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhotoConfig {
    pub style: PhotoStyle,
    pub background: &'static str,
    pub attire: &'static str,
    pub description: &'static str,
}

impl PhotoStyle {
    /// Every style, in display order.
    pub const ALL: [PhotoStyle; 4] = [PhotoStyle::Passport, PhotoStyle::Visa, PhotoStyle::IdCard, PhotoStyle::Cv];

    pub fn name(&self) -> &'static str {
        match self {
            PhotoStyle::Passport => "Passport",
            PhotoStyle::Visa => "Visa",
            PhotoStyle::IdCard => "ID Card",
            PhotoStyle::Cv => "CV / Resume",
        }
    }

    /// URL-friendly identifier used in route paths.
    pub fn slug(&self) -> &'static str {
        match self {
            PhotoStyle::Passport => "passport",
            PhotoStyle::Visa => "visa",
            PhotoStyle::IdCard => "id-card",
            PhotoStyle::Cv => "cv",
        }
    }

    pub fn from_slug(s: &str) -> Option<PhotoStyle> {
        match s.to_lowercase().as_str() {
            "passport" => Some(PhotoStyle::Passport),
            "visa" => Some(PhotoStyle::Visa),
            "id-card" | "id_card" | "idcard" => Some(PhotoStyle::IdCard),
            "cv" | "resume" | "cv-resume" => Some(PhotoStyle::Cv),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            PhotoStyle::Passport => 0,
            PhotoStyle::Visa => 1,
            PhotoStyle::IdCard => 2,
            PhotoStyle::Cv => 3,
        }
    }

    pub fn config(&self) -> PhotoConfig {
        match self {
            PhotoStyle::Passport => PhotoConfig {
                style: *self,
                background: "solid white",
                attire: "formal dark business suit and tie",
                description: "Standard passport size, white background, neutral expression.",
            },
            PhotoStyle::Visa => PhotoConfig {
                style: *self,
                background: "off-white or very light grey",
                attire: "formal business attire",
                description: "Visa compliant, light background, clear facial features.",
            },
            PhotoStyle::IdCard => PhotoConfig {
                style: *self,
                background: "light blue",
                attire: "formal suit",
                description: "Official ID card style, blue background, sharp contrast.",
            },
            PhotoStyle::Cv => PhotoConfig {
                style: *self,
                background: "professional light grey studio gradient",
                attire: "modern professional business suit",
                description: "Professional profile photo, approachable yet formal.",
            },
        }
    }
}

impl fmt::Display for PhotoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An image carried inline as base64 plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Short form of the payload for log lines.
    pub fn preview(&self) -> String {
        let total = self.data.chars().count();
        if total > 50 {
            format!("{}...[{} chars total]", self.data.chars().take(50).collect::<String>(), total)
        } else {
            self.data.clone()
        }
    }
}

/// Derived lifecycle state of a [`ResultEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Per-style generation status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub style: PhotoStyle,
    pub image: Option<InlineImage>,
    pub is_pending: bool,
    pub error: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// Stamp of the invocation allowed to settle this entry; 0 when none is.
    pub(crate) ticket: u64,
}

impl ResultEntry {
    pub fn idle(style: PhotoStyle) -> Self {
        Self { style, image: None, is_pending: false, error: None, last_updated: Utc::now(), ticket: 0 }
    }

    pub(crate) fn pending(style: PhotoStyle, ticket: u64) -> Self {
        Self { style, image: None, is_pending: true, error: None, last_updated: Utc::now(), ticket }
    }

    pub(crate) fn succeeded(style: PhotoStyle, image: InlineImage) -> Self {
        Self { style, image: Some(image), is_pending: false, error: None, last_updated: Utc::now(), ticket: 0 }
    }

    pub(crate) fn failed(style: PhotoStyle, message: &str) -> Self {
        Self { style, image: None, is_pending: false, error: Some(message.to_string()), last_updated: Utc::now(), ticket: 0 }
    }

    pub fn status(&self) -> EntryStatus {
        if self.is_pending {
            EntryStatus::Pending
        } else if self.error.is_some() {
            EntryStatus::Failed
        } else if self.image.is_some() {
            EntryStatus::Succeeded
        } else {
            EntryStatus::Idle
        }
    }
}
