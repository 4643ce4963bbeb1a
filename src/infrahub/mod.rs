pub mod client;
pub mod data;
pub mod types;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

pub use client::InfrahubClient;
pub use data::{clean_data, get_data};
pub use types::{attr, from_pool, rel, rels, AllocatedAddress, CreatedNode, InfrahubError};

/// Operations the generators, scripts and service catalog need from Infrahub.
///
/// Only `query` talks to the wire; the mutation helpers are built on top of
/// it so an alternate backend can override just what it needs.
#[async_trait::async_trait]
pub trait InfrahubApi: Send + Sync {
    /// Run a query or mutation against the bound branch and return `data`
    async fn query(&self, query: &str, variables: Value) -> Result<Value>;

    /// `{Kind}Create`
    async fn create(&self, kind: &str, data: Value) -> Result<CreatedNode> {
        self.mutate_object(kind, "Create", data).await
    }

    /// `{Kind}Upsert`
    async fn upsert(&self, kind: &str, data: Value) -> Result<CreatedNode> {
        self.mutate_object(kind, "Upsert", data).await
    }

    /// `{Kind}Update` with the id merged into the payload
    async fn update(&self, kind: &str, id: &str, data: Value) -> Result<()> {
        let mut data = data;
        if let Some(map) = data.as_object_mut() {
            map.insert("id".to_string(), json!(id));
        }
        self.mutate_object(kind, "Update", data).await.map(|_| ())
    }

    /// Take the next free address out of an IP address pool
    async fn allocate_ip(&self, pool_id: &str, identifier: &str, description: &str) -> Result<AllocatedAddress> {
        let query = r#"
            mutation AllocateIP($data: IPAddressPoolGetResourceInput!) {
                InfrahubIPAddressPoolGetResource(data: $data) {
                    ok
                    node { id display_label }
                }
            }"#;
        let variables = json!({
            "data": {
                "id": pool_id,
                "identifier": identifier,
                "data": { "description": description },
            }
        });
        let result = self.query(query, variables).await?;
        let node = &result["InfrahubIPAddressPoolGetResource"]["node"];
        let id = node["id"]
            .as_str()
            .ok_or_else(|| anyhow!("Pool {} returned no address for {}", pool_id, identifier))?;
        Ok(AllocatedAddress {
            id: id.to_string(),
            address: node["display_label"].as_str().unwrap_or_default().to_string(),
        })
    }

    #[doc(hidden)]
    async fn mutate_object(&self, kind: &str, action: &str, data: Value) -> Result<CreatedNode> {
        let mutation = format!("{}{}", kind, action);
        let query = format!(
            "mutation($data: {m}Input!) {{ {m}(data: $data) {{ ok object {{ id display_label }} }} }}",
            m = mutation
        );
        let result = self.query(&query, json!({ "data": data })).await?;
        let object = result[mutation.as_str()]["object"].clone();
        serde_json::from_value(object)
            .map_err(|e| anyhow!("Unexpected {} response: {}", mutation, e))
    }
}

/// Nodes requested per page by [`list_all`]
pub const PAGE_SIZE: usize = 50;

/// Run a `Kind(filters) { edges { node { ... } } }` query and return the cleaned node list.
///
/// This is a single request; use [`list_all`] for unfiltered listings that can
/// outgrow one page.
pub async fn list_nodes(api: &dyn InfrahubApi, query: &str, variables: Value, kind: &str) -> Result<Vec<Value>> {
    let data = api.query(query, variables).await?;
    let cleaned = clean_data(&data);
    Ok(cleaned
        .get(kind)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Every node of `kind`, fetched `PAGE_SIZE` at a time with offset/limit
pub async fn list_all(api: &dyn InfrahubApi, kind: &str, fields: &str) -> Result<Vec<Value>> {
    let query = format!(
        "query($offset: Int, $limit: Int) {{ {}(offset: $offset, limit: $limit) {{ count edges {{ node {{ {} }} }} }} }}",
        kind, fields
    );
    let mut nodes = Vec::new();
    loop {
        let data = api
            .query(&query, json!({ "offset": nodes.len(), "limit": PAGE_SIZE }))
            .await?;
        let total = data[kind]["count"].as_u64().map(|c| c as usize);
        let page = clean_data(&data)
            .get(kind)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let fetched = page.len();
        nodes.extend(page);
        if fetched < PAGE_SIZE || total.is_some_and(|t| nodes.len() >= t) {
            break;
        }
    }
    Ok(nodes)
}

/// Look up a single object id by name
pub async fn find_id_by_name(api: &dyn InfrahubApi, kind: &str, name: &str) -> Result<Option<String>> {
    let query = format!(
        "query($name: String!) {{ {}(name__value: $name) {{ edges {{ node {{ id }} }} }} }}",
        kind
    );
    let nodes = list_nodes(api, &query, json!({ "name": name }), kind).await?;
    Ok(nodes
        .first()
        .and_then(|n| n.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` devices honouring offset/limit
    struct PagedDevices {
        total: usize,
        requests: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InfrahubApi for PagedDevices {
        async fn query(&self, _query: &str, variables: Value) -> Result<Value> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let offset = variables["offset"].as_u64().unwrap_or(0) as usize;
            let limit = variables["limit"].as_u64().unwrap_or(0) as usize;
            let edges: Vec<Value> = (offset..(offset + limit).min(self.total))
                .map(|i| json!({"node": {"id": format!("d{}", i)}}))
                .collect();
            Ok(json!({"DcimDevice": {"count": self.total, "edges": edges}}))
        }
    }

    #[tokio::test]
    async fn test_list_all_follows_pages() {
        let api = PagedDevices {
            total: 120,
            requests: AtomicUsize::new(0),
        };
        let nodes = list_all(&api, "DcimDevice", "id").await.unwrap();
        assert_eq!(nodes.len(), 120);
        assert_eq!(nodes[119]["id"], "d119");
        assert_eq!(api.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_list_all_stops_at_count() {
        let api = PagedDevices {
            total: 100,
            requests: AtomicUsize::new(0),
        };
        assert_eq!(list_all(&api, "DcimDevice", "id").await.unwrap().len(), 100);
        assert_eq!(api.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_all_empty() {
        let api = PagedDevices {
            total: 0,
            requests: AtomicUsize::new(0),
        };
        assert!(list_all(&api, "DcimDevice", "id").await.unwrap().is_empty());
        assert_eq!(api.requests.load(Ordering::SeqCst), 1);
    }
}
