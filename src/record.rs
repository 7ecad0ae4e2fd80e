//! Stored shapes of versioned entities: the live row and its version rows
use chrono::{DateTime, TimeZone, Utc};

use crate::error::MarketResult;
use crate::utils::content_digest;

const VERSION_SEPARATOR: u8 = b'/';

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// The current, overwritten-in-place state of an entity.
///
/// `version` always names the newest row in the entity's history.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct LiveRecord<C, S> {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub organization_id: String,
    #[n(2)]
    pub creator_username: String,
    #[n(3)]
    pub content: C,
    #[n(4)]
    pub status: S,
    #[n(5)]
    pub version: u32,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
    #[n(7)]
    pub updated_at: TimeStamp<Utc>,
}

/// Immutable snapshot of an entity at one version number.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct VersionRecord<C, S> {
    #[n(0)]
    pub entity_id: String,
    #[n(1)]
    pub version: u32,
    #[n(2)]
    pub content: C,
    #[n(3)]
    pub status: S,
    #[n(4)]
    pub digest: String, // sha256 of `content`
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

impl<C, S> LiveRecord<C, S>
where
    C: minicbor::Encode<()> + Clone,
    S: Copy,
{
    /// Snapshot of the current content and status, stamped with the live version.
    pub fn snapshot(&self, at: TimeStamp<Utc>) -> MarketResult<VersionRecord<C, S>> {
        Ok(VersionRecord {
            entity_id: self.id.clone(),
            version: self.version,
            content: self.content.clone(),
            status: self.status,
            digest: content_digest(&self.content)?,
            created_at: at,
        })
    }
}

impl<C, S> VersionRecord<C, S>
where
    C: minicbor::Encode<()> + PartialEq,
    S: PartialEq,
{
    /// True when this row holds exactly the live row's content and status.
    pub fn matches(&self, live: &LiveRecord<C, S>) -> bool {
        self.entity_id == live.id
            && self.content == live.content
            && self.status == live.status
            && content_digest(&live.content).is_ok_and(|digest| digest == self.digest)
    }
}

// `<id>/<version as big endian>`: prefix scans come back in version order
pub(crate) fn version_key(entity_id: &str, version: u32) -> Vec<u8> {
    let mut key = history_prefix(entity_id);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

pub(crate) fn history_prefix(entity_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity_id.len() + 5);
    key.extend_from_slice(entity_id.as_bytes());
    key.push(VERSION_SEPARATOR);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_keys_sort_numerically() {
        let mut keys = vec![
            version_key("tender_1abc", 10),
            version_key("tender_1abc", 2),
            version_key("tender_1abc", 256),
            version_key("tender_1abc", 1),
        ];
        keys.sort();

        assert_eq!(keys[0], version_key("tender_1abc", 1));
        assert_eq!(keys[1], version_key("tender_1abc", 2));
        assert_eq!(keys[2], version_key("tender_1abc", 10));
        assert_eq!(keys[3], version_key("tender_1abc", 256));
        assert!(keys.iter().all(|k| k.starts_with(&history_prefix("tender_1abc"))));
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }
}
