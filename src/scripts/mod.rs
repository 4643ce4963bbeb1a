//! Operator scripts behind the CLI subcommands: bootstrap, proposed change,
//! RBAC demo accounts and artifact export.

pub mod bootstrap;
pub mod get_configs;
pub mod proposed_change;
pub mod users_roles;

/// `[n/total] description` header printed before each step
pub fn step_banner(step: usize, total: usize, description: &str) {
    println!();
    println!("[{}/{}] {}", step, total, description);
}

/// Horizontal separator between steps
pub fn rule() {
    println!("{}", "-".repeat(60));
}
