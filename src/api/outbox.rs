//! Implements the `Notifier` trait by writing each message to a file.

use crate::api::{Notification, Notifier};
use crate::{utils, Result};
use anyhow::ensure;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes each notification as an RFC 822 style `.eml` file with an HTML body. Files are named
/// `YYYYMMDD-HHMMSS-NNN.eml`, where `NNN` counts the messages sent by this outbox.
#[derive(Debug, Clone)]
pub struct Outbox {
    dir: PathBuf,
    sent: u32,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sent: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl Notifier for Outbox {
    async fn send(&mut self, notification: &Notification) -> Result<()> {
        ensure!(
            !notification.to().is_empty(),
            "Notification '{}' has no recipients",
            notification.subject()
        );
        utils::make_dir(&self.dir).await?;
        self.sent += 1;
        let now = Local::now();
        let path = self.dir.join(format!(
            "{}-{:03}.eml",
            now.format("%Y%m%d-%H%M%S"),
            self.sent
        ));
        let message = format_message(notification, &now.to_rfc2822());
        utils::write(&path, message).await?;
        info!(
            "Queued '{}' for {} in {}",
            notification.subject(),
            notification.to().join(", "),
            path.display()
        );
        Ok(())
    }
}

fn format_message(notification: &Notification, date: &str) -> String {
    let mut message = format!("To: {}\r\n", notification.to().join(", "));
    if !notification.cc().is_empty() {
        message.push_str(&format!("Cc: {}\r\n", notification.cc().join(", ")));
    }
    message.push_str(&format!("Subject: {}\r\n", notification.subject()));
    message.push_str(&format!("Date: {date}\r\n"));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
    message.push_str(notification.html());
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_send_writes_files() {
        let dir = TempDir::new().unwrap();
        let mut outbox = Outbox::new(dir.path().join("outbox"));
        let n = Notification::new(vec!["ops@example.com".into()], "Risk", "<p>hi</p>")
            .with_cc(vec!["lead@example.com".into()]);
        outbox.send(&n).await.unwrap();
        outbox.send(&n).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(outbox.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("-001.eml"));
        assert!(names[1].ends_with("-002.eml"));

        let text = std::fs::read_to_string(outbox.dir().join(&names[0])).unwrap();
        assert!(text
            .starts_with("To: ops@example.com\r\nCc: lead@example.com\r\nSubject: Risk\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let dir = TempDir::new().unwrap();
        let mut outbox = Outbox::new(dir.path());
        let n = Notification::new(Vec::new(), "Risk", "");
        assert!(outbox.send(&n).await.is_err());
    }

    #[test]
    fn test_format_without_cc() {
        let n = Notification::new(vec!["a@b.c".into()], "S", "<b>x</b>");
        let text = format_message(&n, "Mon, 1 Jan 2024 00:00:00 +0000");
        assert!(!text.contains("Cc:"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8"));
    }
}
