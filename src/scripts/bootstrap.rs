//! Load schemas, menus and seed objects into a fresh Infrahub instance.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::process::Command;

use crate::infrahub::{InfrahubApi, InfrahubClient};

use super::{rule, step_banner, users_roles};

const TOTAL_STEPS: usize = 7;
const READY_RETRIES: u32 = 30;
const READY_INTERVAL: Duration = Duration::from_secs(2);
const REPOSITORY_SYNC_WAIT: Duration = Duration::from_secs(120);

/// One `infrahubctl` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtlStep {
    pub description: &'static str,
    pub args: Vec<String>,
}

impl CtlStep {
    fn new(description: &'static str, args: &[&str], branch: &str) -> Self {
        let mut args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        args.push("--branch".to_string());
        args.push(branch.to_string());
        Self { description, args }
    }

    pub fn command_line(&self) -> String {
        format!("infrahubctl {}", self.args.join(" "))
    }
}

/// Steps 1-4, all required
pub fn load_steps(branch: &str) -> Vec<CtlStep> {
    vec![
        CtlStep::new("Loading schemas", &["schema", "load", "schemas"], branch),
        CtlStep::new("Loading menu definitions", &["menu", "load", "menus/menu-full.yml"], branch),
        CtlStep::new(
            "Loading bootstrap data (locations, platforms, roles, etc.)",
            &["object", "load", "objects/bootstrap/"],
            branch,
        ),
        CtlStep::new(
            "Loading security data (zones, policies, rules)",
            &["object", "load", "objects/security/"],
            branch,
        ),
    ]
}

/// Repository object: the local mount during development, GitHub otherwise
pub fn repository_step(branch: &str, git_local: bool) -> CtlStep {
    let file = if git_local {
        "objects/git-repo/local-dev.yml"
    } else {
        "objects/git-repo/github.yml"
    };
    CtlStep::new("Adding bundle-dc repository", &["object", "load", file], branch)
}

pub fn events_step(branch: &str) -> CtlStep {
    CtlStep::new("Loading event actions (optional)", &["object", "load", "objects/events/"], branch)
}

struct CtlOutput {
    success: bool,
    output: String,
}

async fn run_ctl(step: &CtlStep) -> Result<CtlOutput> {
    tracing::debug!("Running {}", step.command_line());
    let out = Command::new("infrahubctl")
        .args(&step.args)
        .output()
        .await
        .map_err(|e| anyhow!("Failed to run {}: {}", step.command_line(), e))?;
    let output = format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(CtlOutput {
        success: out.status.success(),
        output,
    })
}

/// Poll `/api/schema` until Infrahub answers
pub async fn wait_until_ready(client: &InfrahubClient, retries: u32, interval: Duration) -> bool {
    for attempt in 1..=retries {
        if client.is_ready().await {
            println!("Infrahub is ready!");
            return true;
        }
        tracing::debug!("Infrahub not ready, attempt {}/{}", attempt, retries);
        tokio::time::sleep(interval).await;
    }
    false
}

async fn required(step_no: usize, step: &CtlStep) -> Result<()> {
    step_banner(step_no, TOTAL_STEPS, step.description);
    let out = run_ctl(step).await?;
    print!("{}", out.output);
    if !out.success {
        return Err(anyhow!("Failed: {}", step.description));
    }
    println!("{} completed", step.description);
    Ok(())
}

/// Full bootstrap; returns the process exit code
pub async fn run(client: &InfrahubClient, api: &dyn InfrahubApi, branch: &str, git_local: bool) -> i32 {
    println!("Infrahub bundle-dc bootstrap (branch: {})", branch);
    println!("This will load schemas, menu definitions, bootstrap data, security data and the bundle-dc repository");

    if !wait_until_ready(client, READY_RETRIES, READY_INTERVAL).await {
        println!("ERROR: Infrahub is not responding at {}", client.base_url());
        println!("Check the containers are running with: docker ps");
        return 1;
    }

    for (i, step) in load_steps(branch).iter().enumerate() {
        if let Err(e) = required(i + 1, step).await {
            tracing::error!("{}", e);
            println!("Bootstrap failed!");
            return 1;
        }
        rule();
    }

    step_banner(5, TOTAL_STEPS, "Creating user accounts and roles");
    if let Err(e) = users_roles::run(api).await {
        tracing::error!("User and role setup failed: {}", e);
        println!("Bootstrap failed!");
        return 1;
    }
    rule();

    let repo = repository_step(branch, git_local);
    step_banner(6, TOTAL_STEPS, repo.description);
    match run_ctl(&repo).await {
        Ok(out) if out.success => println!("Repository added"),
        Ok(out) if out.output.to_lowercase().contains("already exists") => {
            println!("Repository already exists, skipping...")
        }
        Ok(out) => println!("Failed to add repository\n{}", out.output),
        Err(e) => println!("Failed to add repository: {}", e),
    }
    rule();

    println!("Waiting {}s for repository sync", REPOSITORY_SYNC_WAIT.as_secs());
    tokio::time::sleep(REPOSITORY_SYNC_WAIT).await;

    let events = events_step(branch);
    step_banner(7, TOTAL_STEPS, events.description);
    match run_ctl(&events).await {
        Ok(out) if out.success => println!("Event actions loaded"),
        Ok(_) | Err(_) => {
            tracing::warn!("Event actions could not be loaded; the repository may still be syncing");
            println!("Event actions not loaded (optional, retry once the repository has synced)");
        }
    }

    println!();
    println!("Bootstrap complete!");
    println!("Next: bundle-dc serve, or bundle-dc generate dc --name <DC>");
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_steps_are_branch_scoped() {
        let steps = load_steps("dev");
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].command_line(), "infrahubctl schema load schemas --branch dev");
        assert_eq!(
            steps[3].command_line(),
            "infrahubctl object load objects/security/ --branch dev"
        );
    }

    #[test]
    fn test_repository_file_follows_git_local() {
        assert!(repository_step("main", true).args.contains(&"objects/git-repo/local-dev.yml".to_string()));
        assert!(repository_step("main", false).args.contains(&"objects/git-repo/github.yml".to_string()));
        assert_eq!(events_step("main").args[2], "objects/events/");
    }

    #[tokio::test]
    async fn test_unreachable_infrahub_is_not_ready() {
        let client = InfrahubClient::new("http://127.0.0.1:9", "", "main", 1).unwrap();
        assert!(!wait_until_ready(&client, 2, Duration::ZERO).await);
    }
}
