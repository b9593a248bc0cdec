use serde::{Deserialize, Serialize};

/// Document row as the document service returns it in listing responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub format: String,
    pub owner_email: String,
}

/// Identity and display metadata for a document the user is opening.
///
/// `role` is an optional capability hint ("owner", "editor", "read") the
/// surrounding UI may use to gate editing; the session layer itself does
/// not enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: String,
    pub name: String,
    pub format: String,
    pub owner_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<DocumentRecord> for DocumentMeta {
    fn from(record: DocumentRecord) -> Self {
        Self {
            doc_id: record.id,
            name: record.title,
            format: record.format,
            owner_email: record.owner_email,
            role: None,
        }
    }
}
