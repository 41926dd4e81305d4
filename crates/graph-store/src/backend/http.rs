//! HTTP implementation of the graph backend

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use super::{extract_id, BackendError, GraphBackend, GraphSnapshot, ProjectDraft};
use crate::config::ApiConfig;
use crate::layout::{Layout, LayoutMap};
use crate::types::{EdgeId, GraphEdge, GraphNode, NodeId};

/// Graph backend speaking JSON over HTTP
///
/// Paths are relative to the configured base URL:
/// `graph`, `graph/nodes[/{id}]`, `graph/edges[/{id}]`,
/// `graph/layouts[/{id}]` and `projects`.
pub struct HttpGraphBackend {
    /// HTTP client for API requests
    http_client: reqwest::Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Optional bearer token
    token: Option<String>,
}

#[derive(Serialize)]
struct NodePayload<'a> {
    #[serde(flatten)]
    node: &'a GraphNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<&'a Layout>,
}

#[derive(Serialize)]
struct LayoutsPayload<'a> {
    layouts: &'a LayoutMap,
}

#[derive(Serialize)]
struct EdgesPayload<'a> {
    edges: &'a [GraphEdge],
}

impl HttpGraphBackend {
    /// Create a client from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.http_client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body (`Null` for empty bodies)
    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Value, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl GraphBackend for HttpGraphBackend {
    async fn fetch_graph(&self) -> Result<GraphSnapshot, BackendError> {
        let path = "graph";
        let body = self.send(path, self.request(Method::GET, path)).await?;
        GraphSnapshot::from_response(body)
    }

    async fn create_node(&self, node: &GraphNode, layout: Option<&Layout>) -> Result<NodeId, BackendError> {
        let path = "graph/nodes";
        let body = self
            .send(
                path,
                self.request(Method::POST, path)
                    .json(&NodePayload { node, layout }),
            )
            .await?;
        // Servers that echo nothing keep the client id
        Ok(extract_id(&body).unwrap_or_else(|| node.id.clone()))
    }

    async fn update_node(&self, node: &GraphNode) -> Result<(), BackendError> {
        let path = format!("graph/nodes/{}", node.id);
        self.send(&path, self.request(Method::PUT, &path).json(node))
            .await
            .map(|_| ())
    }

    async fn delete_node(&self, id: &str) -> Result<(), BackendError> {
        let path = format!("graph/nodes/{}", id);
        self.send(&path, self.request(Method::DELETE, &path))
            .await
            .map(|_| ())
    }

    async fn create_edge(&self, edge: &GraphEdge) -> Result<EdgeId, BackendError> {
        let path = "graph/edges";
        let body = self
            .send(path, self.request(Method::POST, path).json(edge))
            .await?;
        Ok(extract_id(&body).unwrap_or_else(|| edge.id.clone()))
    }

    async fn update_edge(&self, edge: &GraphEdge) -> Result<(), BackendError> {
        let path = format!("graph/edges/{}", edge.id);
        self.send(&path, self.request(Method::PUT, &path).json(edge))
            .await
            .map(|_| ())
    }

    async fn delete_edge(&self, id: &str) -> Result<(), BackendError> {
        let path = format!("graph/edges/{}", id);
        self.send(&path, self.request(Method::DELETE, &path))
            .await
            .map(|_| ())
    }

    async fn save_layout(&self, node_id: &str, layout: &Layout) -> Result<(), BackendError> {
        let path = format!("graph/layouts/{}", node_id);
        self.send(&path, self.request(Method::PUT, &path).json(layout))
            .await
            .map(|_| ())
    }

    async fn save_layouts(&self, layouts: &LayoutMap) -> Result<(), BackendError> {
        let path = "graph/layouts";
        self.send(
            path,
            self.request(Method::PUT, path)
                .json(&LayoutsPayload { layouts }),
        )
        .await
        .map(|_| ())
    }

    async fn save_edges(&self, edges: &[GraphEdge]) -> Result<(), BackendError> {
        let path = "graph/edges";
        self.send(
            path,
            self.request(Method::PUT, path).json(&EdgesPayload { edges }),
        )
        .await
        .map(|_| ())
    }

    async fn create_project(&self, project: &ProjectDraft) -> Result<String, BackendError> {
        let path = "projects";
        let body = self
            .send(path, self.request(Method::POST, path).json(project))
            .await?;
        extract_id(&body).ok_or_else(|| BackendError::Decode("project response has no id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_trimmed() {
        let backend = HttpGraphBackend::new(&ApiConfig {
            base_url: "http://localhost:9000/api/".to_string(),
            token: Some("secret".to_string()),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(backend.base_url, "http://localhost:9000/api");
    }
}
