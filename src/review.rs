//! Append-only reviews of bids. Reviews are never edited, so they carry no history.
use chrono::{DateTime, Utc};
use serde::Serialize;
use sled::{Db, Tree};

use crate::content::limit;
use crate::error::{MarketError, MarketResult, StorageResultExt};
use crate::record::{TimeStamp, history_prefix};
use crate::utils::{REVIEW_HRP, new_id};

pub const COMMENT_MAX: usize = 1000;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub bid_id: String,
    #[n(2)]
    pub author_username: String,
    #[n(3)]
    pub organization_id: String, // organization the author reviewed on behalf of
    #[n(4)]
    pub rating: u8,
    #[n(5)]
    pub comment: String,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: String,
    pub bid_id: String,
    pub author_username: String,
    pub organization_id: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            bid_id: review.bid_id,
            author_username: review.author_username,
            organization_id: review.organization_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at.to_datetime_utc(),
        }
    }
}

pub struct ReviewStore {
    reviews: Tree, // bid id / created nanos / review id -> Review
}

impl ReviewStore {
    pub fn open(db: &Db) -> MarketResult<Self> {
        Ok(Self {
            reviews: db.open_tree("reviews").storage("open reviews")?,
        })
    }

    pub fn append(
        &self,
        bid_id: &str,
        author_username: &str,
        organization_id: &str,
        rating: u8,
        comment: &str,
    ) -> MarketResult<Review> {
        if !(1..=5).contains(&rating) {
            return Err(MarketError::ValidationFailed(
                "rating must be between 1 and 5".into(),
            ));
        }
        limit("comment", comment, COMMENT_MAX)?;

        let review = Review {
            id: new_id(REVIEW_HRP)?,
            bid_id: bid_id.to_string(),
            author_username: author_username.to_string(),
            organization_id: organization_id.to_string(),
            rating,
            comment: comment.to_string(),
            created_at: TimeStamp::new(),
        };
        // bech32 text does not sort by time, so order on the timestamp first
        let nanos = review
            .created_at
            .to_datetime_utc()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let mut key = history_prefix(bid_id);
        key.extend_from_slice(&nanos.to_be_bytes());
        key.extend_from_slice(review.id.as_bytes());
        self.reviews
            .insert(key, minicbor::to_vec(&review).storage("encode review")?)
            .storage("insert review")?;

        tracing::info!(bid_id, review_id = %review.id, rating, "review submitted");
        Ok(review)
    }

    /// Reviews of `bid_id`, oldest first.
    pub fn for_bid(&self, bid_id: &str) -> MarketResult<Vec<Review>> {
        self.reviews
            .scan_prefix(history_prefix(bid_id))
            .map(|entry| {
                let (_, bytes) = entry.storage("scan reviews")?;
                minicbor::decode(&bytes).storage("decode review")
            })
            .collect()
    }
}
