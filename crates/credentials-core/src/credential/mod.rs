//! Credential mapping and the unlocked store that owns it

mod codec;
mod manager;

pub use codec::{decode, encode, CredentialMapping};
pub use manager::CredentialsManager;

/// Name under which the OpenAI API key is stored
pub const OPENAI_API_KEY_NAME: &str = "openai_api_key";

/// Name under which the GitHub token is stored
pub const GITHUB_TOKEN_NAME: &str = "github_token";
