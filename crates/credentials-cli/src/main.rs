//! LazyCodr credentials CLI
//!
//! Thin shell over `credentials-core`: prompts, retry loops and deleting an
//! unrecoverable store all live here, never in the core.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Password};
use std::path::PathBuf;
use tracing::debug;

use credentials_core::{
    CredentialsError, CredentialsManager, StoreConfig, GITHUB_TOKEN_NAME, OPENAI_API_KEY_NAME,
};

const MAX_PASSWORD_ATTEMPTS: usize = 3;

/// LazyCodr - encrypted local storage for API credentials
#[derive(Parser, Debug)]
#[command(name = "lazycodr-credentials")]
#[command(version)]
#[command(about = "Manage the encrypted LazyCodr credentials file")]
struct Cli {
    /// Path of the credentials file (overrides config and environment)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// JSON settings file with `path` and `kdf` cost
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the OpenAI API key and GitHub token
    Credentials {
        /// OpenAI API key (prompted when omitted)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_api_key: Option<String>,

        /// GitHub token (prompted when omitted)
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },
    /// Change the password protecting the credentials file
    UpdatePassword,
    /// Delete the credentials file after confirming the password
    DeleteCredentials,
    /// Print a single stored credential
    Show {
        /// Credential name, e.g. openai_api_key
        name: String,
    },
}

/// Outcome of one unlock attempt
enum Unlock {
    Unlocked(CredentialsManager),
    WrongPassword,
    /// Corrupted store; the user has been told how to recover
    Unrecoverable,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = resolve_config(&cli)?;
    debug!("Using credentials file {:?}", config.path);

    match cli.command {
        Command::Credentials {
            openai_api_key,
            github_token,
        } => credentials(&config, openai_api_key, github_token),
        Command::UpdatePassword => update_password(&config),
        Command::DeleteCredentials => delete_credentials(&config),
        Command::Show { name } => show(&config, &name),
    }
}

fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StoreConfig::from_home()?,
    }
    .with_env_overrides();

    Ok(match &cli.file {
        Some(path) => StoreConfig {
            path: path.clone(),
            ..config
        },
        None => config,
    })
}

fn credentials(config: &StoreConfig, openai_api_key: Option<String>, github_token: Option<String>) -> Result<()> {
    let openai_api_key = match openai_api_key {
        Some(key) => key,
        None => prompt_secret("OpenAI API key")?,
    };
    let github_token = match github_token {
        Some(token) => token,
        None => prompt_secret("GitHub token")?,
    };

    let mut manager = if config.exists() {
        let password = prompt_secret("Confirm your password")?;
        match try_unlock(config, &password)? {
            Unlock::Unlocked(manager) => manager,
            Unlock::WrongPassword | Unlock::Unrecoverable => return Ok(()),
        }
    } else {
        let password = prompt_secret(
            "Please setup a password so your credentials can be encrypted\nPassword",
        )?;
        CredentialsManager::create_with_cost(&password, config.kdf)?
    };

    manager.set(OPENAI_API_KEY_NAME, openai_api_key);
    manager.set(GITHUB_TOKEN_NAME, github_token);
    manager.save(&config.path)?;

    println!("Credentials securely saved");
    Ok(())
}

fn update_password(config: &StoreConfig) -> Result<()> {
    let unlocked = if config.exists() {
        match unlock_with_retries(config)? {
            Some(unlocked) => Some(unlocked),
            None => return Ok(()),
        }
    } else {
        eprintln!("There are no existing passwords to update");
        let create = Confirm::new()
            .with_prompt("Would you like to create one?")
            .default(false)
            .interact()?;
        if !create {
            return Ok(());
        }
        None
    };

    let new_password = Password::new()
        .with_prompt("Enter new password")
        .with_confirmation("Re-enter new password", "Passwords do not match. Retry")
        .interact()?;

    let manager = match unlocked {
        Some((mut manager, current_password)) => {
            manager.update_password(&current_password, &new_password)?;
            manager
        }
        None => CredentialsManager::create_with_cost(&new_password, config.kdf)?,
    };
    manager.save(&config.path)?;

    println!("Password updated successfully");
    Ok(())
}

fn delete_credentials(config: &StoreConfig) -> Result<()> {
    if !config.exists() {
        eprintln!("There are no credentials to delete");
        return Ok(());
    }

    let confirmed = Confirm::new()
        .with_prompt("Are you sure you want to delete your credentials?")
        .default(false)
        .interact()?;
    if !confirmed {
        bail!("Aborted");
    }

    if unlock_with_retries(config)?.is_some() {
        std::fs::remove_file(&config.path)
            .with_context(|| format!("Failed to delete {}", config.path.display()))?;
        println!("Credentials deleted successfully");
    }
    Ok(())
}

fn show(config: &StoreConfig, name: &str) -> Result<()> {
    if !config.exists() {
        bail!("No credentials file at {}", config.path.display());
    }

    let Some((manager, _)) = unlock_with_retries(config)? else {
        return Ok(());
    };

    match manager.get(name) {
        Ok(value) => println!("{}", value),
        Err(CredentialsError::NotFound(_)) => eprintln!("No credential named {}", name),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Prompt for the current password up to three times
///
/// Returns the manager and the password that unlocked it, or `None` when
/// the store turned out to be corrupted. Running out of attempts is an
/// error.
fn unlock_with_retries(config: &StoreConfig) -> Result<Option<(CredentialsManager, String)>> {
    for attempt in 1..=MAX_PASSWORD_ATTEMPTS {
        let prompt = if attempt == 1 {
            "Enter current password".to_string()
        } else {
            format!(
                "Enter current password (Attempt {} / {})",
                attempt, MAX_PASSWORD_ATTEMPTS
            )
        };

        let password = prompt_secret(&prompt)?;
        match try_unlock(config, &password)? {
            Unlock::Unlocked(manager) => return Ok(Some((manager, password))),
            Unlock::WrongPassword => continue,
            Unlock::Unrecoverable => return Ok(None),
        }
    }

    bail!("Too many incorrect attempts.")
}

fn try_unlock(config: &StoreConfig, password: &str) -> Result<Unlock> {
    match CredentialsManager::load(&config.path, password) {
        Ok(manager) => Ok(Unlock::Unlocked(manager)),
        Err(e) if e.is_incorrect_password() => {
            eprintln!("Incorrect password");
            Ok(Unlock::WrongPassword)
        }
        Err(e) if e.is_corrupted() => {
            handle_corrupted(config, &e)?;
            Ok(Unlock::Unrecoverable)
        }
        Err(e) => Err(e.into()),
    }
}

/// Explain the corruption and delete the file only if the user agrees
fn handle_corrupted(config: &StoreConfig, error: &CredentialsError) -> Result<()> {
    eprintln!("Oh no! The credentials file is corrupted.");
    eprintln!("Error: {}", error);

    let delete = Confirm::new()
        .with_prompt("Delete it so your credentials can be recreated?")
        .default(false)
        .interact()?;
    if !delete {
        eprintln!("The file was left in place at {}", config.path.display());
        return Ok(());
    }

    std::fs::remove_file(&config.path)
        .with_context(|| format!("Failed to delete {}", config.path.display()))?;
    eprintln!("For the security of your credentials, it has now been deleted");
    eprintln!("Please recreate your credentials with the following command");
    eprintln!("  lazycodr-credentials credentials");
    Ok(())
}

fn prompt_secret(prompt: &str) -> Result<String> {
    Ok(Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["lazycodr-credentials", "update-password"]).unwrap();
        assert!(matches!(cli.command, Command::UpdatePassword));

        let cli = Cli::try_parse_from(["lazycodr-credentials", "delete-credentials"]).unwrap();
        assert!(matches!(cli.command, Command::DeleteCredentials));

        let cli = Cli::try_parse_from(["lazycodr-credentials", "show", "github_token"]).unwrap();
        assert!(matches!(cli.command, Command::Show { ref name } if name == "github_token"));
    }

    #[test]
    fn test_file_flag_overrides_config_path() {
        let cli = Cli::try_parse_from([
            "lazycodr-credentials",
            "show",
            "x",
            "--file",
            "/tmp/creds.bin",
        ])
        .unwrap();

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/creds.bin"));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["lazycodr-credentials"]).is_err());
    }
}
