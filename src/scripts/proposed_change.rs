use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::catalog;
use crate::infrahub::types::is_already_exists;
use crate::infrahub::InfrahubApi;
use crate::models::catalog::proposed_change_url;

pub const DEFAULT_BRANCH: &str = "add-dc3";

#[derive(Debug, Clone, Serialize)]
pub struct ProposedChangeSummary {
    pub id: String,
    pub name: String,
    pub source_branch: String,
    pub destination_branch: String,
    pub state: String,
    pub url: String,
}

/// Open a proposed change merging `branch` into main.
///
/// A branch that is confirmed missing is an error. If the branch list cannot
/// be read at all the change is attempted anyway.
pub async fn create(api: &dyn InfrahubApi, ui_url: &str, branch: &str) -> Result<ProposedChangeSummary> {
    match catalog::branch_exists(api, branch).await {
        Ok(true) => {}
        Ok(false) => return Err(anyhow!("Branch '{}' does not exist", branch)),
        Err(e) => {
            tracing::warn!("Could not verify branch exists: {}", e);
            println!("Could not verify branch exists: {}. Continuing anyway...", e);
        }
    }

    let name = format!("Proposed change for {}", branch);
    let pc = catalog::create_proposed_change(
        api,
        &name,
        &format!("Automated proposed change created for branch {}", branch),
        branch,
        "main",
    )
    .await?;

    Ok(ProposedChangeSummary {
        url: proposed_change_url(ui_url, &pc.id),
        id: pc.id,
        name,
        source_branch: branch.to_string(),
        destination_branch: "main".to_string(),
        state: "open".to_string(),
    })
}

/// CLI entry: print the outcome and return the exit code
pub async fn run(api: &dyn InfrahubApi, ui_url: &str, branch: &str) -> i32 {
    println!("Creating proposed change for '{}'", branch);
    match create(api, ui_url, branch).await {
        Ok(pc) => {
            println!("Proposed change created successfully!");
            println!("  {:<20}{}", "ID", pc.id);
            println!("  {:<20}{}", "Name", pc.name);
            println!("  {:<20}{}", "Source Branch", pc.source_branch);
            println!("  {:<20}{}", "Destination Branch", pc.destination_branch);
            println!("  {:<20}{}", "State", pc.state);
            println!();
            println!("View Proposed Change: {}", pc.url);
            0
        }
        Err(e) => {
            println!("Failed to create proposed change: {}", e);
            if is_already_exists(&e) {
                println!("Tip: A proposed change for this branch may already exist.");
                println!("   Check the Infrahub UI or delete the existing proposed change first.");
            }
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrahub::fake::FakeInfrahub;
    use serde_json::json;

    #[tokio::test]
    async fn test_creates_change_for_existing_branch() {
        let fake = FakeInfrahub::new();
        fake.respond("Branch {", json!({"Branch": [{"name": "main"}, {"name": "add-dc3"}]}));

        let pc = create(&fake, "http://infrahub:8000", "add-dc3").await.unwrap();
        assert_eq!(pc.name, "Proposed change for add-dc3");
        assert_eq!(pc.state, "open");
        assert_eq!(pc.url, "http://infrahub:8000/proposed-changes/CoreProposedChange-1");

        let calls = fake.calls_of("create", "CoreProposedChange");
        assert_eq!(calls[0].data["source_branch"], json!({"value": "add-dc3"}));
        assert_eq!(calls[0].data["destination_branch"], json!({"value": "main"}));
        assert_eq!(
            calls[0].data["description"],
            json!({"value": "Automated proposed change created for branch add-dc3"})
        );
    }

    #[test]
    fn test_missing_branch_fails() {
        let fake = FakeInfrahub::new();
        fake.respond("Branch {", json!({"Branch": [{"name": "main"}]}));

        assert_eq!(tokio_test::block_on(run(&fake, "http://infrahub:8000", "add-dc9")), 1);
        assert!(fake.calls_of("create", "CoreProposedChange").is_empty());
    }
}
