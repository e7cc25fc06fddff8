//! On-disk conversation formats.
//!
//! The store treats the file format as a black box behind
//! [`ConversationFormat`]. [`XmlFormat`] reads and writes the layout produced
//! by the capture process:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <Conversation>
//!   <Id>room42</Id>
//!   <Started>2024-03-01T10:00:00Z</Started>
//!   <Messages>
//!     <Message TimeStamp="2024-03-01T10:00:05Z" Direction="Incoming" Contact="Ada" ContactEmail="ada@example.com">
//!       <Text>hello</Text>
//!     </Message>
//!   </Messages>
//! </Conversation>
//! ```

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_EXTENSION;
use crate::error::{ChatlogError, Result};
use crate::model::{Conversation, Direction, Message};

/// Encodes and decodes conversation documents.
pub trait ConversationFormat: Send + Sync + fmt::Debug {
    /// File extension (without the dot) used for this format.
    fn extension(&self) -> &str;

    /// Decode file content. `path` is used for error context and as the
    /// identifier fallback when the document carries none.
    fn decode(&self, path: &Path, content: &str) -> Result<Conversation>;

    /// Encode a conversation to file content.
    fn encode(&self, conversation: &Conversation) -> Result<String>;
}

/// The XML conversation format.
#[derive(Debug, Clone)]
pub struct XmlFormat {
    extension: String,
}

impl Default for XmlFormat {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl XmlFormat {
    /// Create an XML format that uses the given extension.
    #[must_use]
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Conversation")]
struct ConversationRecord {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "Started", default)]
    started: Option<String>,
    #[serde(rename = "Messages", default)]
    messages: Option<MessagesRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MessagesRecord {
    #[serde(rename = "Message", default)]
    items: Vec<MessageRecord>,
}

// Attributes must precede child elements for the serializer.
#[derive(Debug, Serialize, Deserialize)]
struct MessageRecord {
    #[serde(rename = "@TimeStamp", default)]
    timestamp: Option<String>,
    #[serde(rename = "@Direction", default)]
    direction: Option<String>,
    #[serde(rename = "@Contact", default, skip_serializing_if = "Option::is_none")]
    contact: Option<String>,
    #[serde(rename = "@ContactEmail", default, skip_serializing_if = "Option::is_none")]
    contact_email: Option<String>,
    #[serde(rename = "@Attachment", default, skip_serializing_if = "Option::is_none")]
    attachment: Option<String>,
    #[serde(rename = "Text", default)]
    text: Option<String>,
}

/// Parse an RFC 3339 timestamp; offset-less values are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl MessageRecord {
    fn into_message(self, path: &Path, index: usize) -> Result<Message> {
        let raw_ts = self.timestamp.unwrap_or_default();
        let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| {
            ChatlogError::parse(path, format!("message {index} has invalid TimeStamp '{raw_ts}'"))
        })?;
        let direction = match self.direction.as_deref() {
            None | Some("") => Direction::Incoming,
            Some(d) => d.parse().map_err(|_| {
                ChatlogError::parse(path, format!("message {index} has invalid Direction '{d}'"))
            })?,
        };

        Ok(Message::new(timestamp, direction, self.text.unwrap_or_default())
            .with_contact(self.contact, self.contact_email)
            .with_attachment(self.attachment))
    }

    fn from_message(message: &Message) -> Self {
        Self {
            timestamp: Some(format_timestamp(message.timestamp())),
            direction: Some(message.direction().as_str().to_string()),
            contact: message.contact().map(str::to_string),
            contact_email: message.contact_email().map(str::to_string),
            attachment: message.attachment().map(str::to_string),
            text: Some(message.text().to_string()),
        }
    }
}

impl ConversationFormat for XmlFormat {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn decode(&self, path: &Path, content: &str) -> Result<Conversation> {
        let record: ConversationRecord =
            quick_xml::de::from_str(content).map_err(|e| ChatlogError::parse(path, e.to_string()))?;

        let raw_started = record.started.unwrap_or_default();
        let started = parse_timestamp(&raw_started).ok_or_else(|| {
            ChatlogError::parse(path, format!("invalid Started value '{raw_started}'"))
        })?;

        let id = record
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();

        let messages = record
            .messages
            .unwrap_or_default()
            .items
            .into_iter()
            .enumerate()
            .map(|(i, m)| m.into_message(path, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(Conversation::from_parts(id, started, messages))
    }

    fn encode(&self, conversation: &Conversation) -> Result<String> {
        let record = ConversationRecord {
            id: Some(conversation.id.clone()),
            started: Some(format_timestamp(conversation.started)),
            messages: Some(MessagesRecord {
                items: conversation
                    .messages()
                    .iter()
                    .map(MessageRecord::from_message)
                    .collect(),
            }),
        };

        let body = quick_xml::se::to_string(&record).map_err(|e| ChatlogError::Encode {
            id: conversation.id.clone(),
            message: e.to_string(),
        })?;

        Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n{body}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Conversation xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <Id>room42</Id>
  <Started>2024-03-01T10:00:00.1234567-05:00</Started>
  <Messages>
    <Message TimeStamp="2024-03-01T10:01:00-05:00" Direction="Outgoing" Contact="Me" ContactEmail="me@example.com">
      <Text>  second  </Text>
    </Message>
    <Message TimeStamp="2024-03-01T10:00:30-05:00" Direction="Incoming" Contact="Ada" ContactEmail="ada@example.com">
      <Text>first</Text>
    </Message>
  </Messages>
</Conversation>"#;

    #[test]
    fn test_decode_sample() {
        let conv = XmlFormat::default()
            .decode(Path::new("/logs/room42.xml"), SAMPLE)
            .unwrap();

        assert_eq!(conv.id, "room42");
        assert_eq!(conv.started.date_naive(), chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].text(), "first");
        assert_eq!(conv.messages()[0].contact(), Some("Ada"));
        assert_eq!(conv.messages()[1].text(), "second");
        assert_eq!(conv.messages()[1].direction(), Direction::Outgoing);
    }

    #[test]
    fn test_decode_offsetless_timestamp_is_utc() {
        let xml = r#"<Conversation><Id>x</Id><Started>2024-03-01T10:00:00</Started><Messages /></Conversation>"#;
        let conv = XmlFormat::default().decode(Path::new("x.xml"), xml).unwrap();
        assert_eq!(conv.started, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        assert!(conv.is_empty());
    }

    #[test]
    fn test_decode_missing_id_uses_file_stem() {
        let xml = r#"<Conversation><Started>2024-03-01T10:00:00Z</Started></Conversation>"#;
        let conv = XmlFormat::default().decode(Path::new("/logs/abc.xml"), xml).unwrap();
        assert_eq!(conv.id, "abc");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = XmlFormat::default()
            .decode(Path::new("bad.xml"), "this is not xml <<<")
            .unwrap_err();
        assert!(matches!(err, ChatlogError::Parse { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_started() {
        let xml = r#"<Conversation><Id>x</Id><Started>yesterday</Started></Conversation>"#;
        let err = XmlFormat::default().decode(Path::new("x.xml"), xml).unwrap_err();
        assert!(err.to_string().contains("invalid Started"));
    }

    #[test]
    fn test_encode_then_decode_preserves_messages() {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut conv = Conversation::with_started("room/1", started);
        conv.push(
            Message::new(started, Direction::Incoming, "a < b & c")
                .with_contact(Some("Ada".into()), Some("ada@example.com".into())),
        );
        conv.push(Message::new(started + chrono::Duration::seconds(5), Direction::Outgoing, "ok"));

        let format = XmlFormat::default();
        let xml = format.encode(&conv).unwrap();
        assert!(xml.starts_with("<?xml"));
        let back = format.decode(Path::new("room.xml"), &xml).unwrap();
        assert_eq!(back, conv);
    }
}
