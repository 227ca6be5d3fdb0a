use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Marks where the embedded plan starts in a finger response
pub const PLAN_MARKER: &str = "Plan:";

/// One identity's published data: profile, posts and follow list.
///
/// Remote plans come from peers we do not control, so every field is
/// optional on the way in and `null` reads as empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Plan {
    #[serde(deserialize_with = "nullable")]
    pub address: String,

    #[serde(deserialize_with = "nullable")]
    pub name: String,

    #[serde(deserialize_with = "nullable")]
    pub bio: String,

    #[serde(deserialize_with = "nullable")]
    pub messages: Vec<Message>,

    /// Reserved. Kept as-is so that re-publishing does not lose anything.
    #[serde(deserialize_with = "nullable")]
    pub replies: serde_json::Map<String, Value>,

    #[serde(deserialize_with = "nullable")]
    pub following: Vec<Follow>,

    /// Contact details (website, mobile, email, ...)
    #[serde(deserialize_with = "string_map")]
    pub properties: BTreeMap<String, String>,
}

/// The details collected when setting up a new local identity
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Identity {
    pub address: String,
    pub name: String,
    pub bio: String,
    pub website: String,
    pub mobile: String,
    pub email: String,
}

impl Plan {
    pub fn new(identity: Identity) -> Plan {
        let mut properties = BTreeMap::new();
        properties.insert("website".to_owned(), identity.website);
        properties.insert("mobile".to_owned(), identity.mobile);
        properties.insert("email".to_owned(), identity.email);

        Plan {
            address: identity.address,
            name: identity.name,
            bio: identity.bio,
            properties,
            ..Default::default()
        }
    }

    /// Pull the plan out of the text a finger daemon returned. Everything
    /// after the first `Plan:` marker (and any whitespace following it) is
    /// the JSON payload.
    pub fn from_finger_response(response: &str, max_bytes: usize) -> Result<Plan, Error> {
        let start = match response.find(PLAN_MARKER) {
            Some(i) => i + PLAN_MARKER.len(),
            None => return Err(ErrorKind::PlanMarkerMissing.into()),
        };
        let payload = response[start..].trim_start();
        if payload.len() > max_bytes {
            return Err(ErrorKind::PlanTooLarge(payload.len()).into());
        }

        let plan: Plan = serde_json::from_str(payload)
            .map_err(|e| -> Error { ErrorKind::MalformedPlan(e).into() })?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check what serde cannot: every message time must be a real
    /// `YYYYMMDDHHMMSS` timestamp, otherwise the timeline cannot order it.
    pub fn validate(&self) -> Result<(), Error> {
        for message in &self.messages {
            if message.timestamp().is_none() {
                return Err(ErrorKind::InvalidMessageTime(message.time.clone()).into());
            }
        }
        Ok(())
    }

    pub fn property(&self, key: &str) -> &str {
        self.properties.get(key).map(|s| s.as_str()).unwrap_or("")
    }
}

/// A post
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// UTC, `YYYYMMDDHHMMSS`. Sorting these strings sorts chronologically.
    #[serde(deserialize_with = "time_string")]
    pub time: String,

    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
}

impl Message {
    pub fn new(text: String, at: OffsetDateTime) -> Result<Message, Error> {
        let time = at
            .to_offset(time::UtcOffset::UTC)
            .format(format_description!("[year][month][day][hour][minute][second]"))?;
        Ok(Message { time, text })
    }

    pub fn now(text: String) -> Result<Message, Error> {
        Message::new(text, OffsetDateTime::now_utc())
    }

    /// The message time, if it is a valid timestamp
    pub fn timestamp(&self) -> Option<PrimitiveDateTime> {
        let t = &self.time;
        if t.len() != 14 || !t.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let field = |range: std::ops::Range<usize>| t[range].parse::<u16>().ok();

        let year = field(0..4)? as i32;
        let month = Month::try_from(field(4..6)? as u8).ok()?;
        let day = field(6..8)? as u8;
        let date = Date::from_calendar_date(year, month, day).ok()?;
        let (hour, minute, second) = (field(8..10)?, field(10..12)?, field(12..14)?);
        let time = Time::from_hms(hour as u8, minute as u8, second as u8).ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }

    /// `YYYY-MM-DD HH:MM:SS`, or the raw time string if it does not parse
    pub fn display_time(&self) -> String {
        self.timestamp()
            .and_then(|t| {
                t.format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .ok()
            })
            .unwrap_or_else(|| self.time.clone())
    }
}

/// A follow list entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Follow {
    #[serde(default)]
    pub nick: Option<String>,

    pub address: String,
}

impl Follow {
    pub fn new(nick: &str, address: &str) -> Follow {
        Follow {
            nick: Some(nick.to_owned()),
            address: address.to_owned(),
        }
    }

    /// The nick, unless it is missing or a placeholder
    pub fn display_nick(&self) -> Option<&str> {
        match self.nick.as_deref() {
            None | Some("") | Some("None") => None,
            Some(nick) => Some(nick),
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Peers have published times as numbers as well as strings
fn time_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "message time must be a string, not {other}"
        ))),
    }
}

// Keep string and scalar values, drop nulls
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut map = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        match value {
            Value::Null => {}
            Value::String(s) => {
                map.insert(key, s);
            }
            other => {
                map.insert(key, other.to_string());
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const BOB: &str = r#"{"address":"bob@host2","name":"Bob","messages":[{"time":"20230101120000","text":"hi"}],"replies":{},"following":[],"properties":{}}"#;

    #[test]
    fn test_extract_after_marker() {
        let response = format!("You fingered the user 'bob'\nPlan:\n{}", BOB);
        let plan = Plan::from_finger_response(&response, 4096).unwrap();
        assert_eq!(plan.address, "bob@host2");
        assert_eq!(plan.name, "Bob");
        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].text, "hi");
    }

    #[test]
    fn test_extract_same_line() {
        let response = format!("Login: bob\nPlan: {}\n\n", BOB);
        let plan = Plan::from_finger_response(&response, 4096).unwrap();
        assert_eq!(plan.name, "Bob");
    }

    #[test]
    fn test_missing_marker() {
        let e = Plan::from_finger_response("You fingered the user 'bob'\n", 4096).unwrap_err();
        assert!(matches!(e.kind, ErrorKind::PlanMarkerMissing));
        assert!(e.is_malformed_plan());
    }

    #[test]
    fn test_malformed_payload() {
        let e = Plan::from_finger_response("Plan:\nnothing to see here", 4096).unwrap_err();
        assert!(matches!(e.kind, ErrorKind::MalformedPlan(_)));
    }

    #[test]
    fn test_payload_too_large() {
        let response = format!("Plan:\n{}", BOB);
        let e = Plan::from_finger_response(&response, 16).unwrap_err();
        assert!(matches!(e.kind, ErrorKind::PlanTooLarge(_)));
    }

    #[test]
    fn test_bad_message_time() {
        let response = r#"Plan: {"messages":[{"time":"yesterday","text":"x"}]}"#;
        let e = Plan::from_finger_response(response, 4096).unwrap_err();
        assert!(matches!(e.kind, ErrorKind::InvalidMessageTime(_)));
    }

    #[test]
    fn test_loose_remote_fields() {
        let response = r#"Plan:
{"address":"carol@host3","name":null,"bio":"b",
 "messages":[{"time":20230102000000,"text":"numeric time"}],
 "following":[{"nick":null,"address":"dave@host4"}],
 "properties":{"email":"c@host3","mobile":null,"age":42}}"#;
        let plan = Plan::from_finger_response(response, 4096).unwrap();
        assert_eq!(plan.name, "");
        assert_eq!(plan.messages[0].time, "20230102000000");
        assert_eq!(plan.following[0].display_nick(), None);
        assert_eq!(plan.property("email"), "c@host3");
        assert_eq!(plan.property("mobile"), "");
        assert_eq!(plan.property("age"), "42");
        assert!(plan.replies.is_empty());
    }

    #[test]
    fn test_message_time_format() {
        let m = Message::new("hello".to_owned(), datetime!(2023-01-01 12:00:00 UTC)).unwrap();
        assert_eq!(m.time, "20230101120000");
        assert_eq!(m.display_time(), "2023-01-01 12:00:00");

        let m = Message::new("later".to_owned(), datetime!(2023-01-01 14:30:00 +02:00)).unwrap();
        assert_eq!(m.time, "20230101123000");
    }

    #[test]
    fn test_display_time_falls_back_to_raw() {
        let m = Message {
            time: "20231301000000".to_owned(),
            text: String::new(),
        };
        assert!(m.timestamp().is_none());
        assert_eq!(m.display_time(), "20231301000000");
    }

    #[test]
    fn test_new_plan_has_contact_properties() {
        let plan = Plan::new(Identity {
            address: "alice@host1".to_owned(),
            name: "Alice".to_owned(),
            bio: "hello".to_owned(),
            website: "https://host1".to_owned(),
            mobile: "555".to_owned(),
            email: "alice@host1".to_owned(),
        });
        assert_eq!(plan.property("website"), "https://host1");
        assert_eq!(plan.property("mobile"), "555");
        assert!(plan.messages.is_empty());
        assert!(plan.following.is_empty());
    }

    #[test]
    fn test_display_nick() {
        assert_eq!(Follow::new("bob", "bob@h").display_nick(), Some("bob"));
        assert_eq!(Follow::new("None", "bob@h").display_nick(), None);
        assert_eq!(Follow::new("", "bob@h").display_nick(), None);
    }
}
