//! Registry of the statically configured OAuth clients

use std::collections::HashMap;

use crate::config::ClientConfig;
use crate::credentials::constant_time_eq;

/// Validates client credentials and redirect URIs
///
/// Clients are fixed at startup; nothing here mutates after construction.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: Vec<ClientConfig>,
    redirects: HashMap<String, Vec<String>>,
}

impl ClientRegistry {
    pub fn new(clients: &[ClientConfig]) -> Self {
        let redirects = clients
            .iter()
            .map(|c| (c.client_id.clone(), c.redirect_uris.clone()))
            .collect();
        Self {
            clients: clients.to_vec(),
            redirects,
        }
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.redirects.contains_key(client_id)
    }

    /// Check a client id/secret pair
    ///
    /// Every configured client is compared in full, and id and secret are
    /// both always compared, so timing reveals neither which client nor
    /// which field mismatched.
    pub fn verify(&self, client_id: &str, client_secret: &str) -> bool {
        let mut matched = false;
        for client in &self.clients {
            let id_ok = constant_time_eq(&client.client_id, client_id);
            let secret_ok = constant_time_eq(&client.client_secret, client_secret);
            matched |= id_ok & secret_ok;
        }
        matched
    }

    /// Exact string match against the client's allow-list
    pub fn is_authorized_redirect(&self, client_id: &str, redirect_uri: &str) -> bool {
        self.redirects
            .get(client_id)
            .is_some_and(|uris| uris.iter().any(|uri| uri == redirect_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(&[
            ClientConfig {
                client_id: "C1".into(),
                client_secret: "SECRET".into(),
                redirect_uris: vec!["https://example.com/cb".into()],
            },
            ClientConfig {
                client_id: "C2".into(),
                client_secret: "OTHER".into(),
                redirect_uris: vec!["https://other.example/cb".into()],
            },
        ])
    }

    #[test]
    fn test_verify_requires_matching_pair() {
        let registry = registry();
        assert!(registry.verify("C1", "SECRET"));
        assert!(registry.verify("C2", "OTHER"));
        assert!(!registry.verify("C1", "OTHER"));
        assert!(!registry.verify("C1", ""));
        assert!(!registry.verify("C3", "SECRET"));
    }

    #[test]
    fn test_redirect_requires_exact_match() {
        let registry = registry();
        assert!(registry.is_authorized_redirect("C1", "https://example.com/cb"));
        assert!(!registry.is_authorized_redirect("C1", "https://example.com/cb/"));
        assert!(!registry.is_authorized_redirect("C1", "https://EXAMPLE.com/cb"));
        assert!(!registry.is_authorized_redirect("C1", "https://example.com/cb?x=1"));
        // Another client's URI is not shared
        assert!(!registry.is_authorized_redirect("C1", "https://other.example/cb"));
        assert!(!registry.is_authorized_redirect("C3", "https://example.com/cb"));
    }
}
