use clap::Subcommand;
use c2station_core::Config;

use super::DEFAULT_PASSWORD_ENV;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Verify credentials against the console API and remember the username
    Login {
        #[arg(long)]
        username: String,
        /// Environment variable holding the password
        #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
        password_env: String,
    },
    /// Forget the remembered username
    Logout,
    /// Show the API endpoint and remembered username
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Login {
            username,
            password_env,
        } => {
            let mut config = Config::load()?;
            let rt = super::runtime()?;
            let api = rt.block_on(async {
                let gateway = super::login(&config, &username, &password_env).await?;
                // Tokens live only as long as a process; end this one cleanly.
                let _ = gateway.logout().await;
                Ok::<_, Box<dyn std::error::Error>>(gateway.base_url().to_string())
            })?;
            config.set("auth.username", &username)?;
            println!("authenticated as {username} at {api}");
        }
        AuthAction::Logout => {
            let mut config = Config::load()?;
            config.set("auth.username", "")?;
            println!("username forgotten");
        }
        AuthAction::Status => {
            let config = Config::load()?;
            println!("api: {}", config.api.base_url);
            match config.username() {
                Some(user) => println!("username: {user}"),
                None => println!("not logged in"),
            }
        }
    }
    Ok(())
}
