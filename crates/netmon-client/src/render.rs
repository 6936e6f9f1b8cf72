//! Turn server notifications into terminal text.

use netmon_core::{Notification, NotificationKind};

/// Text printed for one notification.
///
/// `init` prints every record oldest first, `result` prints the new record,
/// `status` prints `Status: <text>`.
pub fn render(notification: &Notification) -> serde_json::Result<String> {
    Ok(match notification.kind {
        NotificationKind::Status => format!("Status: {}", notification.data),
        NotificationKind::Init => {
            let history = notification.history()?;
            if history.is_empty() {
                "No measurements yet.".to_string()
            } else {
                history
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        NotificationKind::Result => notification.record()?.to_string(),
    })
}

/// Parse and render one text frame.
pub fn render_frame(text: &str) -> serde_json::Result<String> {
    render(&Notification::from_json(text)?)
}
