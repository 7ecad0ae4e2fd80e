//! Bid kind: an organization's offer against a published tender
//!
//! Bids are owned by the organization named when they are created, the same
//! way tenders are. Ownership by author (user or organization) is not supported.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::{Content, EditMode, limit, merge_field, require};
use crate::error::MarketResult;
use crate::projection::Projection;
use crate::repository::{EntityKind, Live, Version};
use crate::status::{Status, Visibility, status_text};

pub const NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;

pub struct Bid;

impl EntityKind for Bid {
    const NAME: &'static str = "bid";
    const ID_PREFIX: &'static str = "bid_";

    type Content = BidContent;
    type Status = BidStatus;
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BidStatus {
    #[n(0)]
    Created,
    #[n(1)]
    Published,
    #[n(2)]
    Canceled,
}

impl Status for BidStatus {
    const ALL: &'static [Self] = &[Self::Created, Self::Published, Self::Canceled];
    const INITIAL: Self = Self::Created;

    fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Published => "Published",
            Self::Canceled => "Canceled",
        }
    }

    fn visibility(&self) -> Visibility {
        match self {
            Self::Published => Visibility::Public,
            Self::Created | Self::Canceled => Visibility::Owners,
        }
    }
}

status_text!(BidStatus);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Default)]
pub struct BidContent {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub tender_id: String, // fixed at creation, not editable
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidEdit {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Content for BidContent {
    type Edit = BidEdit;

    fn validate(&self) -> MarketResult<()> {
        require("name", &self.name, NAME_MAX)?;
        limit("description", &self.description, DESCRIPTION_MAX)?;
        require("tender id", &self.tender_id, usize::MAX)
    }

    fn apply(&mut self, edit: &BidEdit, mode: EditMode) -> bool {
        let name = merge_field(&mut self.name, edit.name.as_ref(), mode);
        let description = merge_field(&mut self.description, edit.description.as_ref(), mode);
        name || description
    }
}

#[derive(Debug, Clone)]
pub struct NewBid {
    pub name: String,
    pub description: String,
    pub tender_id: String,
    pub organization_id: String,
    pub creator_username: String,
}

impl NewBid {
    pub fn content(&self) -> BidContent {
        BidContent {
            name: self.name.clone(),
            description: self.description.clone(),
            tender_id: self.tender_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: BidStatus,
    pub tender_id: String,
    pub organization_id: String,
    pub creator_username: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl Projection for Bid {
    type View = BidView;

    fn project(live: &Live<Self>, snapshot: Option<&Version<Self>>) -> BidView {
        let (content, status, version, created_at) = match snapshot {
            Some(row) => (&row.content, row.status, row.version, &row.created_at),
            None => (&live.content, live.status, live.version, &live.created_at),
        };
        BidView {
            id: live.id.clone(),
            name: content.name.clone(),
            description: content.description.clone(),
            status,
            tender_id: content.tender_id.clone(),
            organization_id: live.organization_id.clone(),
            creator_username: live.creator_username.clone(),
            version,
            created_at: created_at.to_datetime_utc(),
        }
    }
}
