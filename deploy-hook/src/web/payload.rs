//! Push webhook JSON payload.
//!
//! Only the repository name and clone URL are read; every other field the
//! sender includes is ignored.

use serde::Deserialize;

use crate::deploy::WebhookEvent;

#[derive(Debug, Deserialize)]
pub struct PushPayload {
    pub repository: Repository,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub clone_url: String,
}

impl From<PushPayload> for WebhookEvent {
    fn from(payload: PushPayload) -> Self {
        WebhookEvent::new(&payload.repository.name, payload.repository.clone_url)
    }
}

/// Parse a verified request body into a deployment request.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    serde_json::from_slice::<PushPayload>(body).map(WebhookEvent::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event() {
        let event =
            parse_event(br#"{"repository":{"name":"My-Repo","clone_url":"https://x/y.git"}}"#)
                .unwrap();

        assert_eq!(event.project_name, "my-repo");
        assert_eq!(event.source_location, "https://x/y.git");
    }

    #[test]
    fn test_parse_event_ignores_other_fields() {
        let body = br#"{
            "ref": "refs/heads/main",
            "after": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c",
            "repository": {
                "id": 1296269,
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "clone_url": "https://github.com/octocat/Hello-World.git"
            },
            "pusher": {"name": "octocat"}
        }"#;

        let event = parse_event(body).unwrap();

        assert_eq!(event.project_name, "hello-world");
        assert_eq!(
            event.source_location,
            "https://github.com/octocat/Hello-World.git"
        );
    }

    #[test]
    fn test_parse_event_rejects_invalid_json() {
        assert!(parse_event(b"not json").is_err());
        assert!(parse_event(b"").is_err());
    }

    #[test]
    fn test_parse_event_rejects_missing_fields() {
        assert!(parse_event(br#"{}"#).is_err());
        assert!(parse_event(br#"{"repository":{"name":"api"}}"#).is_err());
        assert!(parse_event(br#"{"repository":{"clone_url":"https://x/y.git"}}"#).is_err());
        assert!(
            parse_event(br#"{"repository":{"name":7,"clone_url":"https://x/y.git"}}"#).is_err()
        );
    }
}
