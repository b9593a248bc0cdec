use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::DocumentRecord;

/// Client for the document service's request/reply API: login and
/// document listings. Live editing traffic does not go through here.
#[derive(Debug)]
pub struct DocServiceClient {
    client: Client,
    base_url: String,
}

/// Identity returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug)]
pub enum ServiceError {
    Transport(reqwest::Error),
    Rejected(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Transport(e) => write!(f, "Document service request failed: {}", e),
            ServiceError::Rejected(msg) => {
                write!(f, "Document service rejected the request: {}", msg)
            }
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Transport(e)
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    message: Option<String>,
    user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    success: bool,
    message: Option<String>,
    #[serde(default)]
    documents: Vec<DocumentRecord>,
}

impl DocServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Exchange credentials for the verified identity the session layer
    /// acts as.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ServiceError> {
        let url = format!("{}/login", self.base_url);
        let response: LoginResponse = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await?
            .json()
            .await?;
        profile_from_response(response)
    }

    /// Documents owned by `email`.
    pub async fn owned_documents(&self, email: &str) -> Result<Vec<DocumentRecord>, ServiceError> {
        self.fetch_documents("/get_all_documents_owner", email).await
    }

    /// Documents shared with `email`, directly or through a group.
    pub async fn shared_documents(&self, email: &str) -> Result<Vec<DocumentRecord>, ServiceError> {
        self.fetch_documents("/get_all_documents_shared", email).await
    }

    async fn fetch_documents(
        &self,
        path: &str,
        email: &str,
    ) -> Result<Vec<DocumentRecord>, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching documents from {}", url);
        let response: DocumentsResponse = self
            .client
            .post(&url)
            .json(&EmailRequest { email })
            .send()
            .await?
            .json()
            .await?;
        documents_from_response(response)
    }
}

fn profile_from_response(response: LoginResponse) -> Result<UserProfile, ServiceError> {
    if !response.success {
        return Err(ServiceError::Rejected(rejection_message(response.message)));
    }
    response
        .user
        .ok_or_else(|| ServiceError::Rejected("login response carried no user".to_string()))
}

fn documents_from_response(
    response: DocumentsResponse,
) -> Result<Vec<DocumentRecord>, ServiceError> {
    if !response.success {
        return Err(ServiceError::Rejected(rejection_message(response.message)));
    }
    Ok(response.documents)
}

fn rejection_message(message: Option<String>) -> String {
    message.unwrap_or_else(|| "no reason given".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_envelope_yields_records_on_success() {
        let response: DocumentsResponse = serde_json::from_str(
            r#"{"success": true, "documents": [{"id": "doc-1", "title": "Notes", "format": "text", "owner_email": "a@b.io"}]}"#,
        )
        .unwrap();

        let documents = documents_from_response(response).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "doc-1");
        assert_eq!(documents[0].owner_email, "a@b.io");
    }

    #[test]
    fn documents_envelope_rejection_carries_the_message() {
        let response: DocumentsResponse =
            serde_json::from_str(r#"{"success": false, "message": "unauthorized"}"#).unwrap();

        match documents_from_response(response) {
            Err(ServiceError::Rejected(msg)) => assert_eq!(msg, "unauthorized"),
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[test]
    fn documents_envelope_rejection_without_message_still_reads() {
        let response: DocumentsResponse =
            serde_json::from_str(r#"{"success": false}"#).unwrap();

        match documents_from_response(response) {
            Err(ServiceError::Rejected(msg)) => assert_eq!(msg, "no reason given"),
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[test]
    fn login_envelope_yields_the_profile() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"success": true, "user": {"email": "a@b.io", "first_name": "Ada", "last_name": "B"}}"#,
        )
        .unwrap();

        let profile = profile_from_response(response).unwrap();
        assert_eq!(profile.email, "a@b.io");
        assert_eq!(profile.first_name, "Ada");
    }

    #[test]
    fn login_envelope_rejects_bad_credentials() {
        let response: LoginResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(matches!(
            profile_from_response(response),
            Err(ServiceError::Rejected(_))
        ));
    }
}
