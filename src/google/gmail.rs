//! Gmail API client for finding sign-in mail and marking it handled.
//!
//! Only the slice of the API the sign-in flow needs: search for message ids,
//! fetch a message with its full payload, and clear the UNREAD label once a
//! message has been used.

use std::time::Duration;

use anyhow::Result;
use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Message and payload structures from Gmail API documentation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageResponse>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub snippet: Option<String>,
    pub payload: Option<MessagePayload>,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
    #[serde(rename = "internalDate", default)]
    pub internal_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePartBody {
    #[serde(rename = "attachmentId")]
    attachment_id: Option<String>,
    #[serde(default)]
    size: u64,
    // Base64 encoded
    data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "partId")]
    pub part_id: Option<String>,
    #[serde(rename = "mimeType")]
    pub mimetype: String,
    pub body: Option<MessagePartBody>,
    // multipart/mixed wraps a nested multipart/alternative
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub headers: Option<Vec<MessageHeader>>,
    #[serde(rename = "mimeType")]
    pub mimetype: String,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// Gmail API client scoped to one sign-in attempt: one access token, one
/// reqwest client, nothing shared between invocations.
pub struct GmailClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: &str, timeout: Duration) -> Self {
        Self::with_base_url(access_token, timeout, GMAIL_API_BASE)
    }

    /// Point the client at a different API root. Tests use this with a local
    /// mock server.
    pub fn with_base_url(access_token: &str, timeout: Duration, base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Search for message ids matching a Gmail query string. An empty result
    /// list is not an error.
    pub async fn search_messages(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageResponse>> {
        let url = format!("{}/messages", self.base_url);
        let res = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("maxResults", &max_results.to_string())])
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Message search failed: {} ({})", status, text);
        }
        let list: ListMessagesResponse = serde_json::from_str(&text)?;
        Ok(list.messages.unwrap_or_default())
    }

    /// Fetch the full message, headers and body parts included.
    pub async fn get_message(&self, id: &str) -> Result<Message> {
        let url = format!("{}/messages/{}", self.base_url, id);
        let res = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Message fetch failed: {} ({})", status, text);
        }
        let message: Message = serde_json::from_str(&text)?;
        Ok(message)
    }

    /// Clear the UNREAD label from a message.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let url = format!("{}/messages/{}/modify", self.base_url, id);
        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({"removeLabelIds": ["UNREAD"]}))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("Marking message {} read failed: {} ({})", id, status, text);
        }
        Ok(())
    }
}

fn decode_base64(data: &str) -> Option<String> {
    // Gmail pads body data inconsistently so accept both forms
    URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Extract the decoded body best suited for link scraping.
///
/// Sign-in links arrive inside anchor tags, so `text/html` parts win over
/// `text/plain`; the bare-URL matcher downstream covers plain-text bodies.
/// - The message can carry `payload.body.data` or one or more `parts[].body.data`
/// - Parts nest, so search depth-first
/// - A part with an attachment id is a file, not a body
pub fn message_body(message: &Message) -> Option<String> {
    let payload = message.payload.as_ref()?;

    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && !data.is_empty()
    {
        return decode_base64(data);
    }

    let parts = payload.parts.as_deref()?;
    find_part_body(parts, "text/html").or_else(|| find_part_body(parts, "text/plain"))
}

fn find_part_body(parts: &[MessagePart], mimetype: &str) -> Option<String> {
    for part in parts {
        if part.mimetype == mimetype
            && let Some(body) = &part.body
        {
            // Skip attachments
            if body.attachment_id.is_some() {
                continue;
            }
            if let Some(data) = &body.data
                && !data.is_empty()
                && let Some(decoded) = decode_base64(data)
            {
                return Some(decoded);
            }
        }
        if let Some(nested) = &part.parts
            && let Some(found) = find_part_body(nested, mimetype)
        {
            return Some(found);
        }
    }
    None
}

pub fn header_value(message: &Message, name: &str) -> Option<String> {
    let payload = message.payload.as_ref()?;
    let headers = payload.headers.as_ref()?;
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Extract the subject from a message
pub fn extract_subject(message: &Message) -> String {
    header_value(message, "subject").unwrap_or_default()
}

/// Extract the from field from a message
pub fn extract_from(message: &Message) -> String {
    header_value(message, "from").unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(data: &str) -> String {
        URL_SAFE.encode(data.as_bytes())
    }

    fn message_with_payload(payload: MessagePayload) -> Message {
        Message {
            id: "msg_001".to_string(),
            thread_id: "thr_001".to_string(),
            snippet: None,
            payload: Some(payload),
            label_ids: None,
            internal_date: Some("1731401723000".to_string()),
        }
    }

    #[test]
    fn test_decode_base64_accepts_padded_and_unpadded() {
        assert_eq!(decode_base64("SGVsbG8=").as_deref(), Some("Hello"));
        assert_eq!(decode_base64("SGVsbG8").as_deref(), Some("Hello"));
        assert_eq!(decode_base64("not base64!!!"), None);
    }

    #[test]
    fn test_message_body_from_payload_body() {
        let payload = MessagePayload {
            headers: None,
            mimetype: "text/html".to_string(),
            body: Some(MessagePartBody {
                attachment_id: None,
                size: 12,
                data: Some(encode("<p>Hello</p>")),
            }),
            parts: None,
        };
        let message = message_with_payload(payload);
        assert_eq!(message_body(&message).as_deref(), Some("<p>Hello</p>"));
    }

    #[test]
    fn test_message_body_prefers_html_part() {
        let payload = MessagePayload {
            headers: None,
            mimetype: "multipart/alternative".to_string(),
            body: None,
            parts: Some(vec![
                MessagePart {
                    part_id: Some("0".to_string()),
                    mimetype: "text/plain".to_string(),
                    body: Some(MessagePartBody {
                        attachment_id: None,
                        size: 10,
                        data: Some(encode("plain body")),
                    }),
                    parts: None,
                },
                MessagePart {
                    part_id: Some("1".to_string()),
                    mimetype: "text/html".to_string(),
                    body: Some(MessagePartBody {
                        attachment_id: None,
                        size: 17,
                        data: Some(encode("<a href=\"x\">x</a>")),
                    }),
                    parts: None,
                },
            ]),
        };
        let message = message_with_payload(payload);
        assert_eq!(
            message_body(&message).as_deref(),
            Some("<a href=\"x\">x</a>")
        );
    }

    #[test]
    fn test_message_body_falls_back_to_plain() {
        let payload = MessagePayload {
            headers: None,
            mimetype: "multipart/alternative".to_string(),
            body: None,
            parts: Some(vec![MessagePart {
                part_id: Some("0".to_string()),
                mimetype: "text/plain".to_string(),
                body: Some(MessagePartBody {
                    attachment_id: None,
                    size: 10,
                    data: Some(encode("plain body")),
                }),
                parts: None,
            }]),
        };
        let message = message_with_payload(payload);
        assert_eq!(message_body(&message).as_deref(), Some("plain body"));
    }

    #[test]
    fn test_message_body_descends_into_nested_parts() {
        let payload = MessagePayload {
            headers: None,
            mimetype: "multipart/mixed".to_string(),
            body: None,
            parts: Some(vec![MessagePart {
                part_id: Some("0".to_string()),
                mimetype: "multipart/alternative".to_string(),
                body: None,
                parts: Some(vec![MessagePart {
                    part_id: Some("0.0".to_string()),
                    mimetype: "text/html".to_string(),
                    body: Some(MessagePartBody {
                        attachment_id: None,
                        size: 13,
                        data: Some(encode("<b>nested</b>")),
                    }),
                    parts: None,
                }]),
            }]),
        };
        let message = message_with_payload(payload);
        assert_eq!(message_body(&message).as_deref(), Some("<b>nested</b>"));
    }

    #[test]
    fn test_message_body_skips_attachments() {
        let payload = MessagePayload {
            headers: None,
            mimetype: "multipart/mixed".to_string(),
            body: None,
            parts: Some(vec![MessagePart {
                part_id: Some("0".to_string()),
                mimetype: "text/html".to_string(),
                body: Some(MessagePartBody {
                    attachment_id: Some("att_001".to_string()),
                    size: 1024,
                    data: Some(encode("<p>attached file</p>")),
                }),
                parts: None,
            }]),
        };
        let message = message_with_payload(payload);
        assert_eq!(message_body(&message), None);
    }

    #[test]
    fn test_message_body_empty_message() {
        let message = Message {
            id: "msg_001".to_string(),
            thread_id: "thr_001".to_string(),
            snippet: Some("snippet only".to_string()),
            payload: None,
            label_ids: None,
            internal_date: None,
        };
        assert_eq!(message_body(&message), None);
    }

    #[test]
    fn test_header_helpers() {
        let payload = MessagePayload {
            headers: Some(vec![
                MessageHeader {
                    name: "Subject".to_string(),
                    value: "Confirm your sign-in".to_string(),
                },
                MessageHeader {
                    name: "From".to_string(),
                    value: "no-reply@auth.example.com".to_string(),
                },
            ]),
            mimetype: "text/plain".to_string(),
            body: None,
            parts: None,
        };
        let message = message_with_payload(payload);
        assert_eq!(extract_subject(&message), "Confirm your sign-in");
        assert_eq!(extract_from(&message), "no-reply@auth.example.com");

        let empty = Message {
            id: "x".to_string(),
            thread_id: "y".to_string(),
            snippet: None,
            payload: None,
            label_ids: None,
            internal_date: None,
        };
        assert_eq!(extract_subject(&empty), "");
    }

    #[tokio::test]
    async fn test_search_messages() {
        let mut server = mockito::Server::new_async().await;

        let mock_resp =
            r#"{"messages": [{"id": "msg_001", "threadId": "thr_001"}], "nextPageToken": null}"#;
        let _mock = server
            .mock("GET", "/messages")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".into(), "from:no-reply@auth.example.com".into()),
                mockito::Matcher::UrlEncoded("maxResults".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(mock_resp)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("token", Duration::from_secs(5), &server.url());
        let messages = client
            .search_messages("from:no-reply@auth.example.com", 5)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "msg_001");
    }

    #[tokio::test]
    async fn test_search_messages_empty_result() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("token", Duration::from_secs(5), &server.url());
        let messages = client.search_messages("whatever", 5).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_search_messages_error_status() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": {"message": "Unauthorized"}}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("bad-token", Duration::from_secs(5), &server.url());
        let err = client.search_messages("whatever", 5).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_get_message() {
        let mut server = mockito::Server::new_async().await;

        let mock_resp = format!(
            r#"{{
                "id": "msg_001",
                "threadId": "thr_001",
                "snippet": "Confirm your sign-in",
                "internalDate": "1731401723000",
                "payload": {{
                    "mimeType": "text/html",
                    "headers": [{{"name": "Subject", "value": "Confirm your sign-in"}}],
                    "body": {{"size": 42, "data": "{}"}}
                }}
            }}"#,
            URL_SAFE.encode(b"<a href=\"https://auth.example.com/c\">go</a>")
        );
        let _mock = server
            .mock("GET", "/messages/msg_001")
            .match_query(mockito::Matcher::UrlEncoded("format".into(), "full".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(mock_resp)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("token", Duration::from_secs(5), &server.url());
        let message = client.get_message("msg_001").await.unwrap();
        assert_eq!(message.id, "msg_001");
        let body = message_body(&message).unwrap();
        assert!(body.contains("auth.example.com"));
    }

    #[tokio::test]
    async fn test_mark_read_posts_label_removal() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/messages/msg_001/modify")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"removeLabelIds": ["UNREAD"]}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "msg_001", "threadId": "thr_001", "labelIds": ["INBOX"]}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("token", Duration::from_secs(5), &server.url());
        client.mark_read("msg_001").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_mark_read_error_status() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/messages/msg_001/modify")
            .with_status(403)
            .with_body(r#"{"error": {"message": "Insufficient scope"}}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("token", Duration::from_secs(5), &server.url());
        let err = client.mark_read("msg_001").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
