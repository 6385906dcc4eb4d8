//! Password-reset mail seam
//!
//! Email delivery is an external collaborator; this seam formats the reset
//! link and records the send. Failures in a real transport would be handled
//! behind this interface without reaching the auth service.

/// Outgoing-mail seam for the auth service
#[derive(Debug, Clone)]
pub struct Mailer {
    client_url: String,
}

impl Mailer {
    pub fn new(client_url: impl Into<String>) -> Self {
        Self {
            client_url: client_url.into(),
        }
    }

    /// Build the link a user follows to consume a reset secret
    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{token}",
            self.client_url.trim_end_matches('/')
        )
    }

    /// Hand a password-reset link to the delivery channel. The raw secret is
    /// only ever in this link; the database keeps its digest.
    pub fn send_password_reset(&self, email: &str, token: &str) {
        let link = self.reset_link(token);
        tracing::info!("password reset link issued for {email}: {link}");
    }
}
