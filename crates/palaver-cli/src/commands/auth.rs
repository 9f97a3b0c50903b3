use anyhow::{Context, Result};
use tracing::warn;

use super::prompt;
use crate::app::AppContext;

async fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => prompt("Password: ").await,
    }
}

pub async fn login(ctx: &AppContext, username: &str, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password).await?;
    let credentials = ctx
        .auth_api()
        .login(username, &password)
        .await
        .context("Login failed")?;
    ctx.sync_credentials().await?;
    println!("Logged in as {}", credentials.username);
    Ok(())
}

pub async fn register(
    ctx: &AppContext,
    username: &str,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_prompt(password).await?;
    let credentials = ctx
        .auth_api()
        .register(username, email, &password)
        .await
        .context("Registration failed")?;
    ctx.sync_credentials().await?;
    println!("Registered and logged in as {}", credentials.username);
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    if let Err(e) = ctx.auth_api().logout().await {
        warn!(error = ?e, "Backend logout failed, forgetting local token anyway");
    }
    ctx.sync_credentials().await?;
    println!("Logged out");
    Ok(())
}
