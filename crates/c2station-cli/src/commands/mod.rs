pub mod auth;
pub mod config;
pub mod devices;
pub mod recordings;
pub mod run;
pub mod schedule;

use std::sync::Arc;

use clap::Args;
use c2station_core::{Config, RequestGateway};

/// Env var consulted for the password when `--password-env` is not given.
pub const DEFAULT_PASSWORD_ENV: &str = "C2STATION_PASSWORD";

/// Credentials for commands that talk to the console API.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Operator name; defaults to the one remembered by `auth login`
    #[arg(long)]
    pub username: Option<String>,
    /// Environment variable holding the password
    #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
    pub password_env: String,
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Username from the flag, falling back to the remembered one.
pub(crate) fn resolve_username(
    flag: Option<String>,
    config: &Config,
) -> Result<String, Box<dyn std::error::Error>> {
    flag.or_else(|| config.username().map(String::from))
        .ok_or_else(|| "no username given (use --username or `auth login` first)".into())
}

/// Passwords are only ever read from the environment.
pub(crate) fn password_from_env(var: &str) -> Result<String, Box<dyn std::error::Error>> {
    match std::env::var(var) {
        Ok(pw) if !pw.is_empty() => Ok(pw),
        _ => Err(format!("password not set: export {var}").into()),
    }
}

/// Build a gateway from config and log in.
pub(crate) async fn login(
    config: &Config,
    username: &str,
    password_env: &str,
) -> Result<Arc<RequestGateway>, Box<dyn std::error::Error>> {
    let password = password_from_env(password_env)?;
    let gateway = RequestGateway::new(config.gateway_config())?;
    gateway.login(username, &password).await?;
    Ok(Arc::new(gateway))
}

/// Resolve credentials from `api` and log in.
pub(crate) async fn connect(
    config: &Config,
    api: &ApiArgs,
) -> Result<Arc<RequestGateway>, Box<dyn std::error::Error>> {
    let username = resolve_username(api.username.clone(), config)?;
    login(config, &username, &api.password_env).await
}
