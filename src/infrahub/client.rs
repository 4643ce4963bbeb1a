use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::types::*;
use super::InfrahubApi;

/// Infrahub API client bound to one branch
#[derive(Clone)]
pub struct InfrahubClient {
    base_url: String,
    token: String,
    branch: String,
    retries: u32,
    client: Client,
}

impl InfrahubClient {
    pub fn new(url: &str, token: &str, branch: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            branch: branch.to_string(),
            retries: 0,
            client,
        })
    }

    /// Retry transport failures this many extra times
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Same connection, different branch
    pub fn with_branch(&self, branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            ..self.clone()
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql/{}", self.base_url, self.branch)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.header("X-INFRAHUB-KEY", &self.token)
        }
    }

    /// Run a GraphQL document against the bound branch.
    ///
    /// Only failures to connect are retried: once the request has reached
    /// the server a mutation may already be committed.
    pub async fn execute(&self, query: &str, variables: &Value) -> Result<Value, InfrahubError> {
        let request = GraphqlRequest { query, variables };
        let mut attempt = 0;
        let resp = loop {
            match self.request(self.client.post(self.graphql_url())).json(&request).send().await {
                Ok(resp) => break resp,
                Err(e) if e.is_connect() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!("Infrahub connection failed ({}), retry {}/{}", e, attempt, self.retries);
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(e) => return Err(InfrahubError::Connection(e.to_string())),
            }
        };

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(InfrahubError::Http { status, body });
        }

        let body: GraphqlResponse = resp
            .json()
            .await
            .map_err(|e| InfrahubError::InvalidResponse(e.to_string()))?;

        if !body.errors.is_empty() {
            return Err(InfrahubError::Graphql(
                body.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        Ok(body.data.unwrap_or(Value::Null))
    }

    /// Test whether the schema endpoint answers
    pub async fn is_ready(&self) -> bool {
        match self
            .request(self.client.get(format!("{}/api/schema", self.base_url)))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    // --- Object storage ---

    /// Fetch raw artifact content by storage id
    pub async fn fetch_storage_object(&self, storage_id: &str) -> Result<String, InfrahubError> {
        let resp = self
            .request(self.client.get(format!("{}/api/storage/object/{}", self.base_url, storage_id)))
            .send()
            .await
            .map_err(|e| InfrahubError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(InfrahubError::Http { status, body });
        }

        resp.text()
            .await
            .map_err(|e| InfrahubError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl InfrahubApi for InfrahubClient {
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        Ok(self.execute(query, &variables).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_graphql_url_is_branch_scoped() {
        let client = InfrahubClient::new("http://infrahub:8000/", "", "main", 30).unwrap();
        assert_eq!(client.graphql_url(), "http://infrahub:8000/graphql/main");

        let other = client.with_branch("add-dc3");
        assert_eq!(other.graphql_url(), "http://infrahub:8000/graphql/add-dc3");
        assert_eq!(client.branch(), "main");
    }

    /// Minimal HTTP server answering every request with `status` and `body`,
    /// counting the requests it receives
    async fn canned_server(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                let resp = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{}", addr), hits)
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(n) = stream.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_undecodable_response_is_not_resent() {
        let (url, hits) = canned_server("200 OK", "oops").await;
        let client = InfrahubClient::new(&url, "", "main", 5).unwrap().with_retries(2);

        let err = client
            .create("DcimDevice", serde_json::json!({"name": {"value": "dc1-leaf-01"}}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InfrahubError>(),
            Some(InfrahubError::InvalidResponse(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_resent() {
        let (url, hits) = canned_server("500 Internal Server Error", "{}").await;
        let client = InfrahubClient::new(&url, "", "main", 5).unwrap().with_retries(2);

        let err = client.execute("mutation { BranchCreate }", &Value::Null).await.unwrap_err();
        assert!(matches!(err, InfrahubError::Http { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_graphql_data_is_returned() {
        let (url, hits) = canned_server("200 OK", r#"{"data": {"Branch": []}}"#).await;
        let client = InfrahubClient::new(&url, "", "main", 5).unwrap().with_retries(2);

        let data = client.execute("query { Branch { name } }", &Value::Null).await.unwrap();
        assert_eq!(data, serde_json::json!({"Branch": []}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
