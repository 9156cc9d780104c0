//! Contracts for the remaining external collaborators: secrets, cloud
//! deployment, and git export.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Credentials for the external deployment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareCredentials {
    pub account_id: String,
    pub api_token: String,
}

/// Optional per-user secret lookup.
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    async fn cloudflare_credentials(&self, user_id: &str) -> Option<CloudflareCredentials>;
}

/// Error code the deployment client uses when the sandbox preview backing
/// the deploy has expired.
pub const PREVIEW_EXPIRED_CODE: &str = "PREVIEW_EXPIRED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudDeployResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable machine code accompanying `error`, e.g. [`PREVIEW_EXPIRED_CODE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CloudDeployResponse {
    pub fn is_preview_expired(&self) -> bool {
        self.error_code.as_deref() == Some(PREVIEW_EXPIRED_CODE)
    }
}

/// External deployment API client.
#[async_trait]
pub trait DeployClient: Send + Sync {
    async fn deploy(
        &self,
        project_name: &str,
        instance_id: &str,
        credentials: &CloudflareCredentials,
    ) -> CloudDeployResponse;
}

/// One raw version-control object for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportObject {
    pub hash: String,
    pub kind: String,
    pub data: Vec<u8>,
}

/// The exportable shape of a session's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitObjectsExport {
    pub objects: Vec<ExportObject>,
    pub query: String,
    pub has_commits: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubPushRequest {
    pub repository_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubPushResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// External version-control export API client.
#[async_trait]
pub trait ExportClient: Send + Sync {
    async fn push(
        &self,
        request: &GitHubPushRequest,
        export: &GitObjectsExport,
    ) -> GitHubPushResponse;
}

/// External web-search service behind the `web_search` tool.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_expired_detection() {
        let resp = CloudDeployResponse {
            success: false,
            error: Some("preview gone".into()),
            error_code: Some(PREVIEW_EXPIRED_CODE.into()),
            ..Default::default()
        };
        assert!(resp.is_preview_expired());
        assert!(!CloudDeployResponse::default().is_preview_expired());
    }
}
