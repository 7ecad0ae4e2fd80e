//! Tender kind: what an organization publishes for others to bid on
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::{Content, EditMode, limit, merge_field, require};
use crate::error::MarketResult;
use crate::projection::Projection;
use crate::repository::{EntityKind, Live, Version};
use crate::status::{Status, Visibility, status_text};

pub const NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;
pub const SERVICE_TYPE_MAX: usize = 100;

pub struct Tender;

impl EntityKind for Tender {
    const NAME: &'static str = "tender";
    const ID_PREFIX: &'static str = "tender_";

    type Content = TenderContent;
    type Status = TenderStatus;
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TenderStatus {
    #[n(0)]
    Created,
    #[n(1)]
    Published,
    #[n(2)]
    Closed,
}

impl Status for TenderStatus {
    const ALL: &'static [Self] = &[Self::Created, Self::Published, Self::Closed];
    const INITIAL: Self = Self::Created;

    fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Published => "Published",
            Self::Closed => "Closed",
        }
    }

    fn visibility(&self) -> Visibility {
        match self {
            Self::Published => Visibility::Public,
            Self::Created | Self::Closed => Visibility::Owners,
        }
    }
}

status_text!(TenderStatus);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Default)]
pub struct TenderContent {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub service_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenderEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub service_type: Option<String>,
}

impl Content for TenderContent {
    type Edit = TenderEdit;

    fn validate(&self) -> MarketResult<()> {
        require("name", &self.name, NAME_MAX)?;
        limit("description", &self.description, DESCRIPTION_MAX)?;
        require("service type", &self.service_type, SERVICE_TYPE_MAX)
    }

    fn apply(&mut self, edit: &TenderEdit, mode: EditMode) -> bool {
        // no short-circuit: every field must be merged
        let name = merge_field(&mut self.name, edit.name.as_ref(), mode);
        let description = merge_field(&mut self.description, edit.description.as_ref(), mode);
        let service_type = merge_field(&mut self.service_type, edit.service_type.as_ref(), mode);
        name || description || service_type
    }
}

/// Request to publish a new tender on behalf of `organization_id`.
#[derive(Debug, Clone)]
pub struct NewTender {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub organization_id: String,
    pub creator_username: String,
}

impl NewTender {
    pub fn content(&self) -> TenderContent {
        TenderContent {
            name: self.name.clone(),
            description: self.description.clone(),
            service_type: self.service_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub status: TenderStatus,
    pub organization_id: String,
    pub creator_username: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl Projection for Tender {
    type View = TenderView;

    fn project(live: &Live<Self>, snapshot: Option<&Version<Self>>) -> TenderView {
        let (content, status, version, created_at) = match snapshot {
            Some(row) => (&row.content, row.status, row.version, &row.created_at),
            None => (&live.content, live.status, live.version, &live.created_at),
        };
        TenderView {
            id: live.id.clone(),
            name: content.name.clone(),
            description: content.description.clone(),
            service_type: content.service_type.clone(),
            status,
            organization_id: live.organization_id.clone(),
            creator_username: live.creator_username.clone(),
            version,
            created_at: created_at.to_datetime_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::parse_status;

    fn content() -> TenderContent {
        TenderContent {
            name: "A".into(),
            description: "first".into(),
            service_type: "Construction".into(),
        }
    }

    #[test]
    fn status_parse_normalizes_case() {
        assert_eq!(parse_status::<TenderStatus>("published").unwrap(), TenderStatus::Published);
        assert_eq!(parse_status::<TenderStatus>(" CLOSED ").unwrap(), TenderStatus::Closed);
        assert_eq!("Created".parse::<TenderStatus>().unwrap(), TenderStatus::Created);
        assert!(parse_status::<TenderStatus>("Canceled").is_err());
        assert!(parse_status::<TenderStatus>("").is_err());
    }

    #[test]
    fn only_published_is_public() {
        assert_eq!(TenderStatus::Published.visibility(), Visibility::Public);
        assert_eq!(TenderStatus::Created.visibility(), Visibility::Owners);
        assert_eq!(TenderStatus::Closed.visibility(), Visibility::Owners);
    }

    #[test]
    fn edit_merges_every_supplied_field() {
        let mut tender = content();
        let changed = tender.apply(
            &TenderEdit {
                name: Some("B".into()),
                description: None,
                service_type: Some("Delivery".into()),
            },
            EditMode::EmptyMeansUnchanged,
        );

        assert!(changed);
        assert_eq!(tender.name, "B");
        assert_eq!(tender.description, "first");
        assert_eq!(tender.service_type, "Delivery");
    }

    #[test]
    fn empty_edit_changes_nothing() {
        let mut tender = content();
        let edit = TenderEdit {
            name: Some(String::new()),
            description: Some(String::new()),
            service_type: None,
        };

        assert!(!tender.apply(&edit, EditMode::EmptyMeansUnchanged));
        assert_eq!(tender, content());
    }

    #[test]
    fn clearing_required_field_fails_validation() {
        let mut tender = content();
        let edit = TenderEdit {
            name: Some(String::new()),
            ..TenderEdit::default()
        };

        assert!(tender.apply(&edit, EditMode::Explicit));
        assert!(tender.validate().is_err());
    }
}
