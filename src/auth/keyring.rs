use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::provider::TokenSet;

pub(crate) const SERVICE_NAME: &str = "timecard";

/// What survives between invocations: who signed in and their tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub username: String,
    pub tokens: TokenSet,
}

/// Store the session tokens in the system keyring via Secret Service.
pub async fn store_session(stored: &StoredSession) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);

    let secret = serde_json::to_vec(stored).map_err(|e| format!("Failed to encode session: {}", e))?;

    keyring
        .create_item(
            &format!("Timecard session ({})", stored.username),
            &attrs,
            &secret,
            true, // replace existing
        )
        .await
        .map_err(|e| format!("Failed to store session: {}", e))?;

    Ok(())
}

/// Load the cached session from the system keyring, if any.
pub async fn load_session() -> Result<Option<StoredSession>, String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    if let Some(item) = items.first() {
        let secret_bytes = item
            .secret()
            .await
            .map_err(|e| format!("Failed to read secret: {}", e))?;
        let stored = serde_json::from_slice(&secret_bytes)
            .map_err(|e| format!("Invalid session in keyring: {}", e))?;
        return Ok(Some(stored));
    }

    Ok(None)
}

/// Delete the cached session from the system keyring.
pub async fn clear_session() -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    for item in items {
        item.delete()
            .await
            .map_err(|e| format!("Failed to delete session: {}", e))?;
    }

    Ok(())
}
