// reqdebug - Request-scoped debugging toolkit
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Webhook notifications
//!
//! Messages follow the Slack attachment format. Building the message and picking
//! recipients is pure; delivery goes through a [`NotificationSink`] so hosts and
//! tests can replace the HTTP client.

use std::time::Duration;

use once_cell::unsync::OnceCell;
use reqwest::blocking::Client;
use serde::Serialize;

use crate::{error::Result, DumpValue, FieldKey};

/// Base URL of Slack incoming webhooks
pub const SLACK_HOOK_BASE: &str = "https://hooks.slack.com/services/";

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// One field of a message attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageField {
    /// Field title
    pub title: String,
    /// Field text
    pub value: String,
    /// Whether the field may share a line with another short field
    pub short: bool,
}

impl MessageField {
    /// A short field
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self { title: title.into(), value: value.into(), short: true }
    }

    /// A field that takes a full line
    pub fn long(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self { short: false, ..Self::new(title, value) }
    }

    /// A short field describing a value
    ///
    /// Collections become one line per truthy entry, `key: value` for named keys and
    /// just the value for positional ones; nested values are written as JSON. Returns
    /// `None` when nothing is left to show.
    pub fn from_value(title: impl Into<String>, value: &DumpValue) -> Option<Self> {
        let text = match value {
            DumpValue::Collection(fields) => fields
                .iter()
                .filter(|field| field.value.is_truthy())
                .map(|field| {
                    let text = field
                        .value
                        .scalar_text()
                        .unwrap_or_else(|| field.value.to_json().to_string());
                    match &field.key {
                        FieldKey::Index(_) => text,
                        FieldKey::Name(name) => format!("{name}: {text}"),
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            other if other.is_truthy() => {
                other.scalar_text().unwrap_or_else(|| other.to_json().to_string())
            }
            _ => String::new(),
        };
        (!text.is_empty()).then(|| Self::new(title, text))
    }
}

/// A message attachment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlackMessage {
    /// Plain-text summary for clients that cannot show attachments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Colour bar, e.g. `#36a64f` or `danger`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Main text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Text above the attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    /// Author line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Link of the author line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_link: Option<String>,
    /// Title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Link of the title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    /// Image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Thumbnail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    /// Footer line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Footer icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_icon: Option<String>,
    /// Fields in display order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<MessageField>,
    /// Parts that are rendered as markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrkdwn_in: Option<Vec<String>>,
    /// Timestamp of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl SlackMessage {
    /// A message with just a text
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Default::default() }
    }

    /// A message listing `key: value` lines, values as inline code
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let lines: Vec<String> = pairs
            .into_iter()
            .map(|(key, value)| format!("{}: `{}`", key.as_ref(), value.as_ref()))
            .collect();
        Self::text(lines.join("\n"))
    }

    /// Set the pretext
    pub fn with_pretext(mut self, pretext: impl Into<String>) -> Self {
        self.pretext = Some(pretext.into());
        self
    }

    /// Set the colour
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a field
    pub fn with_field(mut self, field: MessageField) -> Self {
        self.fields.push(field);
        self
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        [&self.text, &self.pretext, &self.title]
            .into_iter()
            .all(|part| part.as_deref().is_none_or(str::is_empty))
            && self.fields.is_empty()
    }

    /// Drop empty parts, then fill in the fallback and markdown defaults
    pub fn prepare(&mut self) {
        for part in [
            &mut self.fallback,
            &mut self.color,
            &mut self.text,
            &mut self.pretext,
            &mut self.author_name,
            &mut self.author_link,
            &mut self.title,
            &mut self.title_link,
            &mut self.image_url,
            &mut self.thumb_url,
            &mut self.footer,
            &mut self.footer_icon,
        ] {
            if part.as_deref().is_some_and(str::is_empty) {
                *part = None;
            }
        }
        self.fields.retain(|field| !field.value.is_empty());

        if self.fallback.is_none() {
            let fallback: Vec<&str> =
                [&self.pretext, &self.text].into_iter().filter_map(|p| p.as_deref()).collect();
            if !fallback.is_empty() {
                self.fallback = Some(fallback.join(" - "));
            }
        }
        if self.mrkdwn_in.is_none() {
            self.mrkdwn_in = Some(["text", "pretext", "fields"].map(String::from).to_vec());
        }
    }
}

impl From<&str> for SlackMessage {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for SlackMessage {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Body posted to the webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackPayload {
    /// The message, as single attachment
    pub attachments: Vec<SlackMessage>,
    /// Enables markdown in the attachment
    pub mrkdwn: bool,
    /// Sender name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Sender icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    /// Recipient, the webhook's default channel when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// A trimmed channel when it looks like `@user`, `#channel`, `D123` or `C123`
pub fn valid_channel(channel: &str) -> Option<String> {
    let channel = channel.trim();
    channel.starts_with(['@', '#', 'D', 'C']).then(|| channel.to_string())
}

/// Recipients of a message
///
/// Invalid channels are dropped. The comma separated `defaults` are added unless
/// the message is private and still has a valid recipient. Duplicates are removed;
/// an empty list becomes a single delivery to the webhook's own channel (`None`).
pub fn recipients<S: AsRef<str>>(
    requested: &[S],
    defaults: &str,
    is_private: bool,
) -> Vec<Option<String>> {
    let mut channels: Vec<String> =
        requested.iter().filter_map(|c| valid_channel(c.as_ref())).collect();

    if !is_private || channels.is_empty() {
        channels.extend(defaults.split(',').filter_map(valid_channel));
    }

    let mut unique: Vec<Option<String>> = Vec::with_capacity(channels.len());
    for channel in channels {
        if !unique.iter().flatten().any(|known| *known == channel) {
            unique.push(Some(channel));
        }
    }
    if unique.is_empty() {
        unique.push(None);
    }
    unique
}

/// Delivers payloads to a webhook
pub trait NotificationSink {
    /// Post `payload` to the webhook identified by `hook`
    fn deliver(&self, hook: &str, payload: &SlackPayload) -> Result<()>;
}

/// Posts to Slack incoming webhooks
///
/// The HTTP client is built on first delivery.
#[derive(Debug, Default)]
pub struct SlackWebhook {
    base_url: Option<String>,
    client: OnceCell<Client>,
}

impl SlackWebhook {
    /// A webhook client for `hooks.slack.com`
    pub fn new() -> Self {
        Self::default()
    }

    /// A webhook client for another endpoint with the same protocol
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: Some(base_url.into()), client: OnceCell::new() }
    }

    /// URL of a hook
    pub fn url(&self, hook: &str) -> String {
        format!("{}{hook}", self.base_url.as_deref().unwrap_or(SLACK_HOOK_BASE))
    }
}

impl NotificationSink for SlackWebhook {
    fn deliver(&self, hook: &str, payload: &SlackPayload) -> Result<()> {
        let client =
            self.client.get_or_try_init(|| Client::builder().timeout(DELIVERY_TIMEOUT).build())?;
        client.post(self.url(hook)).json(payload).send()?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_validation() {
        assert_eq!(valid_channel(" #dev "), Some("#dev".to_string()));
        assert_eq!(valid_channel("@alice"), Some("@alice".to_string()));
        assert_eq!(valid_channel("D024BE91L"), Some("D024BE91L".to_string()));
        assert_eq!(valid_channel("general"), None);
        assert_eq!(valid_channel(""), None);
    }

    #[test]
    fn test_recipients() {
        assert_eq!(
            recipients(&["#a", "bogus", "@b"], "#ops, #a", false),
            vec![Some("#a".into()), Some("@b".into()), Some("#ops".into())]
        );
        // private messages skip the defaults
        assert_eq!(recipients(&["@b"], "#ops", true), vec![Some("@b".into())]);
        // unless no valid recipient is left
        assert_eq!(recipients(&["bogus"], "#ops", true), vec![Some("#ops".into())]);
        assert_eq!(recipients::<&str>(&[], "", false), vec![None]);
    }

    #[test]
    fn test_prepare_fills_defaults() {
        let mut message = SlackMessage::text("body").with_pretext("head");
        message.footer = Some(String::new());
        message.fields.push(MessageField::new("empty", ""));
        message.prepare();

        assert_eq!(message.fallback.as_deref(), Some("head - body"));
        assert_eq!(message.footer, None);
        assert!(message.fields.is_empty());
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "fallback": "head - body",
                "text": "body",
                "pretext": "head",
                "mrkdwn_in": ["text", "pretext", "fields"]
            })
        );
    }

    #[test]
    fn test_from_pairs() {
        let message = SlackMessage::from_pairs([("order", "42"), ("state", "paid")]);
        assert_eq!(message.text.as_deref(), Some("order: `42`\nstate: `paid`"));
        assert!(!message.is_empty());
        assert!(SlackMessage::text("").is_empty());
    }

    #[test]
    fn test_field_from_value() {
        let value = DumpValue::map([
            ("user", DumpValue::from("alice")),
            ("empty", DumpValue::from("")),
            ("tags", DumpValue::list(vec!["a"])),
        ]);
        let field = MessageField::from_value("Context", &value).unwrap();
        assert_eq!(field.value, "user: alice\ntags: [\"a\"]");
        assert!(field.short);

        let list = DumpValue::list(vec!["x", "y"]);
        assert_eq!(MessageField::from_value("L", &list).unwrap().value, "x\ny");
        assert!(MessageField::from_value("None", &DumpValue::Null).is_none());
    }

    #[test]
    fn test_payload_serialization() {
        let payload = SlackPayload {
            attachments: vec![SlackMessage::text("hi")],
            mrkdwn: true,
            username: Some("bot".into()),
            icon_emoji: None,
            channel: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"attachments": [{"text": "hi"}], "mrkdwn": true, "username": "bot"})
        );
        assert_eq!(
            SlackWebhook::new().url("T0/B1/x"),
            "https://hooks.slack.com/services/T0/B1/x"
        );
    }
}
