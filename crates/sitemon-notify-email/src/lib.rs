// # E-mail Notifier
//
// This crate provides the e-mail notification collaborator for the sitemap
// monitor.
//
// ## Purpose
//
// Renders a "Sitemap Changes Detected" message for a change set. Delivery
// is not wired to a mail relay: the rendered message is emitted on the
// `sitemon::email` tracing target, where a log shipper or relay sidecar can
// pick it up.
//
// ## Configuration
//
// A notifier without a recipient reports `Ok(false)` ("not configured"),
// which the engine logs without failing the check.

use sitemon_core::config::NotifierConfig;
use sitemon_core::model::ChangeSet;
use sitemon_core::traits::Notifier;
use sitemon_core::{Error, Result};

/// A rendered change notification
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChangeEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// E-mail notifier
pub struct EmailNotifier {
    recipient: Option<String>,
}

impl EmailNotifier {
    pub fn new(recipient: Option<String>) -> Self {
        Self { recipient }
    }

    /// Build from config; `None` when notifications are disabled
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>> {
        config.validate()?;
        Ok(match config {
            NotifierConfig::None => None,
            NotifierConfig::Email { recipient } => Some(Self::new(recipient.clone())),
        })
    }

    /// Render the message for `changes` detected on `site_url`
    pub fn render(&self, to: &str, changes: &ChangeSet, site_url: &str) -> Result<ChangeEmail> {
        let host = url::Url::parse(site_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| Error::notify(format!("Cannot derive host from {}", site_url)))?;

        let mut items = String::new();
        for (count, label) in [
            (changes.added.len(), "Added URLs"),
            (changes.modified.len(), "Modified URLs"),
            (changes.removed.len(), "Removed URLs"),
        ] {
            if count > 0 {
                items.push_str(&format!("    <li>{}: {}</li>\n", label, count));
            }
        }

        let html = format!(
            "<h2>Sitemap Changes Detected</h2>\n\
             <p>Changes were detected in the sitemap for {}:</p>\n\
             <ul>\n{}</ul>\n\
             <p>Visit the dashboard to see detailed changes.</p>\n",
            html_escape::encode_text(site_url),
            items
        );

        Ok(ChangeEmail {
            to: to.to_string(),
            subject: format!("Sitemap Changes Detected - {}", host),
            html,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, changes: &ChangeSet, site_url: &str) -> Result<bool> {
        let Some(to) = &self.recipient else {
            tracing::debug!("E-mail notification skipped: no recipient configured");
            return Ok(false);
        };

        let email = self.render(to, changes, site_url)?;
        tracing::info!(
            target: "sitemon::email",
            to = %email.to,
            subject = %email.subject,
            summary = %changes.summary().join(", "),
            "Change notification ready"
        );
        tracing::debug!(target: "sitemon::email", body = %email.html, "Change notification body");
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemon_core::model::UrlRecord;

    fn changes() -> ChangeSet {
        ChangeSet {
            added: vec![UrlRecord::new("https://shop.example/new"), UrlRecord::new("https://shop.example/new2")],
            modified: Vec::new(),
            removed: vec![UrlRecord::new("https://shop.example/old")],
        }
    }

    #[test]
    fn test_render_subject_and_counts() {
        let notifier = EmailNotifier::new(Some("ops@shop.example".to_string()));
        let email = notifier
            .render("ops@shop.example", &changes(), "https://shop.example/sitemap.xml?a=1&b=2")
            .unwrap();

        assert_eq!(email.to, "ops@shop.example");
        assert_eq!(email.subject, "Sitemap Changes Detected - shop.example");
        assert!(email.html.contains("<li>Added URLs: 2</li>"));
        assert!(email.html.contains("<li>Removed URLs: 1</li>"));
        assert!(!email.html.contains("Modified URLs"));
        assert!(email.html.contains("sitemap.xml?a=1&amp;b=2"));
    }

    #[test]
    fn test_render_escapes_markup_in_site_url() {
        let notifier = EmailNotifier::new(Some("ops@shop.example".to_string()));
        let email = notifier
            .render("ops@shop.example", &changes(), "https://shop.example/<script>")
            .unwrap();

        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_without_recipient_reports_not_configured() {
        let notifier = EmailNotifier::new(None);
        assert!(!notifier.notify(&changes(), "https://shop.example/").await.unwrap());
    }

    #[tokio::test]
    async fn test_with_recipient_reports_handled() {
        let notifier = EmailNotifier::new(Some("ops@shop.example".to_string()));
        assert!(notifier.notify(&changes(), "https://shop.example/").await.unwrap());
    }

    #[tokio::test]
    async fn test_unparseable_site_url_is_a_notify_error() {
        let notifier = EmailNotifier::new(Some("ops@shop.example".to_string()));
        let err = notifier.notify(&changes(), "not a url").await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));
    }

    #[test]
    fn test_from_config() {
        assert!(EmailNotifier::from_config(&NotifierConfig::None).unwrap().is_none());

        let config = NotifierConfig::Email {
            recipient: Some("ops@shop.example".to_string()),
        };
        assert!(EmailNotifier::from_config(&config).unwrap().is_some());

        let invalid = NotifierConfig::Email {
            recipient: Some("nobody".to_string()),
        };
        assert!(matches!(EmailNotifier::from_config(&invalid), Err(Error::Config(_))));
    }
}
