//! `lendora-authz`: load the authorization catalog and answer one question
//! about one user.
//!
//! ```text
//! lendora-authz <user-id> [permission | resource:action]
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use lendora_auth::Principal;
use lendora_client::{AuthorizationClient, ClientConfig, HttpAuthority};
use lendora_core::UserId;

const USAGE: &str = "usage: lendora-authz <user-id> [permission | resource:action]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    lendora_observability::init();

    let mut args = std::env::args().skip(1);
    let user_id = UserId::parse(&args.next().context(USAGE)?)?;
    let question = args.next();

    let config = ClientConfig::from_env();
    let remote = HttpAuthority::new(&config).context("failed to build HTTP client")?;
    tracing::info!(api_url = %remote.base_url(), "loading authorization catalog");

    let client = AuthorizationClient::new(Arc::new(remote));
    client
        .start()
        .await
        .context("failed to load authorization catalog")?;

    let principal = Principal::new(user_id.clone());

    let roles = client.user_roles(&user_id);
    if roles.is_empty() {
        println!("{user_id}: no roles");
    } else {
        let names: Vec<&str> = roles.iter().map(|role| role.name.as_str()).collect();
        println!("{user_id}: {}", names.join(", "));
    }
    for permission in client.effective_permissions(&user_id) {
        println!("  {permission}");
    }

    match question.as_deref() {
        None => {}
        Some(q) => match q.split_once(':') {
            Some((resource, action)) => {
                let allowed = client.can_access(&principal, resource, action);
                println!("{action} on {resource}: {}", if allowed { "allowed" } else { "denied" });
            }
            None => {
                let explanation = client.explain(&principal, q);
                println!("{}", serde_json::to_string_pretty(&explanation)?);
            }
        },
    }

    Ok(())
}
