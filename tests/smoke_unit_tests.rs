//! Smoke screen unit tests for the marketplace components
//!
//! These exercise each component on its own (directory, guard, repository,
//! projection, config) and generally test the happy path plus the one or two
//! failures each component is responsible for.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tender_market::{
    MarketConfig, MarketError, MarketResult, Marketplace,
    directory::{Employee, Organization, OrganizationType, ResponsibilityDirectory, SledDirectory},
    guard::MutationGuard,
    projection::Projection,
    record::TimeStamp,
    repository::VersionedRepository,
    tender::{NewTender, Tender, TenderContent, TenderEdit, TenderStatus},
};

fn temporary_db() -> sled::Db {
    MarketConfig::temporary().open_db().unwrap()
}

fn tender_content(name: &str) -> TenderContent {
    TenderContent {
        name: name.to_string(),
        description: "desc".to_string(),
        service_type: "Delivery".to_string(),
    }
}

// In-memory stand-in for the identity store.
#[derive(Default)]
struct StaticDirectory {
    employees: HashMap<String, Employee>,
    responsible: HashSet<(String, String)>,
}

impl StaticDirectory {
    fn with(mut self, username: &str, organizations: &[&str]) -> Self {
        let id = format!("user_{username}");
        for organization in organizations {
            self.responsible.insert((id.clone(), organization.to_string()));
        }
        self.employees.insert(
            username.to_string(),
            Employee {
                id,
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                created_at: TimeStamp::new(),
            },
        );
        self
    }
}

impl ResponsibilityDirectory for StaticDirectory {
    fn employee(&self, username: &str) -> MarketResult<Option<Employee>> {
        Ok(self.employees.get(username).cloned())
    }

    fn organization(&self, _organization_id: &str) -> MarketResult<Option<Organization>> {
        Ok(None)
    }

    fn is_responsible(&self, employee_id: &str, organization_id: &str) -> MarketResult<bool> {
        Ok(self
            .responsible
            .contains(&(employee_id.to_string(), organization_id.to_string())))
    }
}

// DIRECTORY TESTS
#[cfg(test)]
mod directory_tests {
    use super::*;

    #[test]
    fn usernames_are_unique() {
        let db = temporary_db();
        let directory = SledDirectory::open(&db).unwrap();

        let first = directory.register_employee("alice", "Alice", "A").unwrap();
        assert!(first.id.starts_with("user_1"));

        let err = directory.register_employee("alice", "Other", "Alice").unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed(_)));
        assert_eq!(directory.employee("alice").unwrap(), Some(first));
    }

    #[test]
    fn responsibility_is_a_pair() {
        let db = temporary_db();
        let directory = SledDirectory::open(&db).unwrap();
        let alice = directory.register_employee("alice", "Alice", "A").unwrap();
        let acme = directory
            .register_organization("Acme", "", OrganizationType::Jsc)
            .unwrap();
        let other = directory
            .register_organization("Other", "", OrganizationType::Llc)
            .unwrap();

        let granted = directory.assign_responsible(&alice.id, &acme.id).unwrap();
        let again = directory.assign_responsible(&alice.id, &acme.id).unwrap();
        assert_eq!(granted, again);

        assert!(directory.is_responsible(&alice.id, &acme.id).unwrap());
        assert!(!directory.is_responsible(&alice.id, &other.id).unwrap());
        assert_eq!(
            directory.organization(&acme.id).unwrap().map(|o| o.kind),
            Some(OrganizationType::Jsc)
        );
    }

    #[test]
    fn cannot_be_responsible_for_unknown_organization() {
        let db = temporary_db();
        let directory = SledDirectory::open(&db).unwrap();
        let alice = directory.register_employee("alice", "Alice", "A").unwrap();

        let err = directory.assign_responsible(&alice.id, "org_1missing").unwrap_err();
        assert!(matches!(err, MarketError::NotFound { kind: "organization", .. }));
    }
}

// GUARD TESTS
#[cfg(test)]
mod guard_tests {
    use super::*;
    use tender_market::guard::Actor;

    fn guard() -> MutationGuard<StaticDirectory> {
        MutationGuard::new(
            StaticDirectory::default()
                .with("alice", &["org_a"])
                .with("bob", &["org_b", "org_c"]),
        )
    }

    #[test]
    fn authorize_checks_the_pair() {
        let guard = guard();

        let actor = guard.authorize("alice", "org_a").unwrap();
        assert_eq!(
            actor,
            Actor {
                employee_id: "user_alice".into(),
                username: "alice".into()
            }
        );
        assert!(guard.authorize("bob", "org_c").is_ok());

        let err = guard.authorize("alice", "org_b").unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
    }

    #[test]
    fn unknown_actor_is_unauthorized() {
        let err = guard().authorize("mallory", "org_a").unwrap_err();
        assert!(matches!(err, MarketError::ActorNotFound(ref name) if name == "mallory"));
        assert_eq!(err.code().http_status(), 401);
    }

    #[test]
    fn blank_username_is_invalid() {
        let err = guard().resolve("  ").unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed(_)));
    }

    #[test]
    fn published_status_is_readable_by_anyone() {
        let guard = guard();
        let bob = guard.resolve("bob").unwrap();

        assert!(guard
            .authorize_read(&bob, "org_a", TenderStatus::Published)
            .is_ok());
        assert!(guard
            .authorize_read(&bob, "org_a", TenderStatus::Created)
            .is_err());
        assert!(guard
            .authorize_read(&bob, "org_b", TenderStatus::Closed)
            .is_ok());
    }

    #[test]
    fn marketplace_accepts_any_directory() {
        let db = Arc::new(temporary_db());
        let directory = StaticDirectory::default().with("alice", &["org_a"]);
        let market = Marketplace::with_db(db, MarketConfig::temporary(), directory).unwrap();

        let tender = market
            .create_tender(NewTender {
                name: "Roof".into(),
                description: String::new(),
                service_type: "Construction".into(),
                organization_id: "org_a".into(),
                creator_username: "alice".into(),
            })
            .unwrap();
        assert_eq!(tender.organization_id, "org_a");
        assert_eq!(tender.creator_username, "alice");
    }
}

// REPOSITORY TESTS
#[cfg(test)]
mod repository_tests {
    use super::*;
    use tender_market::content::EditMode;

    fn setup() -> (sled::Db, MutationGuard<StaticDirectory>) {
        let guard = MutationGuard::new(StaticDirectory::default().with("alice", &["org_a"]));
        (temporary_db(), guard)
    }

    #[test]
    fn create_writes_live_row_and_first_version() {
        let (db, guard) = setup();
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();

        let (live, first) = tenders
            .create(&guard, "alice", "org_a", tender_content("Roof"))
            .unwrap();

        assert!(live.id.starts_with("tender_1"));
        assert_eq!(live.version, 1);
        assert_eq!(live.status, TenderStatus::Created);
        assert_eq!(first.version, 1);
        assert!(first.matches(&live));
        assert_eq!(tenders.get(&live.id).unwrap(), live);
        assert_eq!(tenders.max_version(&live.id).unwrap(), 1);
    }

    #[test]
    fn create_validates_before_writing() {
        let (db, guard) = setup();
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();

        let err = tenders
            .create(&guard, "alice", "org_a", tender_content(""))
            .unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed(_)));

        let err = tenders
            .create(&guard, "alice", "org_b", tender_content("Roof"))
            .unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
        assert!(tenders.scan().unwrap().is_empty());
    }

    #[test]
    fn missing_entity_is_not_found() {
        let (db, guard) = setup();
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();

        let err = tenders
            .edit(&guard, "tender_1nope", "alice", &TenderEdit::default(), EditMode::default())
            .unwrap_err();
        assert_eq!(err.code().http_status(), 404);
        assert_eq!(tenders.max_version("tender_1nope").unwrap(), 0);
        assert!(tenders.list_versions("tender_1nope").unwrap().is_empty());
    }

    #[test]
    fn setting_the_same_status_is_a_no_op() {
        let (db, guard) = setup();
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();
        let (live, _) = tenders
            .create(&guard, "alice", "org_a", tender_content("Roof"))
            .unwrap();

        let same = tenders
            .set_status(&guard, &live.id, "alice", TenderStatus::Created)
            .unwrap();
        assert_eq!(same.version, 1);

        let published = tenders
            .set_status(&guard, &live.id, "alice", TenderStatus::Published)
            .unwrap();
        assert_eq!(published.version, 2);
        assert_eq!(published.content, live.content);
    }

    #[test]
    fn histories_do_not_bleed_between_entities() {
        let (db, guard) = setup();
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();
        let (a, _) = tenders
            .create(&guard, "alice", "org_a", tender_content("A"))
            .unwrap();
        let (b, _) = tenders
            .create(&guard, "alice", "org_a", tender_content("B"))
            .unwrap();
        tenders
            .set_status(&guard, &a.id, "alice", TenderStatus::Closed)
            .unwrap();

        assert_eq!(tenders.list_versions(&a.id).unwrap().len(), 2);
        assert_eq!(tenders.list_versions(&b.id).unwrap().len(), 1);
        assert!(tenders
            .list_versions(&b.id)
            .unwrap()
            .iter()
            .all(|row| row.entity_id == b.id));
    }
}

// PROJECTION TESTS
#[cfg(test)]
mod projection_tests {
    use super::*;

    #[test]
    fn snapshot_overrides_live_content() {
        let db = temporary_db();
        let guard = MutationGuard::new(StaticDirectory::default().with("alice", &["org_a"]));
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();
        let (live, first) = tenders
            .create(&guard, "alice", "org_a", tender_content("Roof"))
            .unwrap();
        let live = tenders
            .edit(
                &guard,
                &live.id,
                "alice",
                &TenderEdit {
                    name: Some("Walls".into()),
                    ..TenderEdit::default()
                },
                Default::default(),
            )
            .unwrap();

        let latest = Tender::latest(&live);
        let old = Tender::project(&live, Some(&first));

        assert_eq!(latest.name, "Walls");
        assert_eq!(latest.version, 2);
        assert_eq!(old.name, "Roof");
        assert_eq!(old.version, 1);
        assert_eq!(old.id, latest.id);
        assert_eq!(old.organization_id, latest.organization_id);
    }

    #[test]
    fn views_serialize_in_camel_case() {
        let db = temporary_db();
        let guard = MutationGuard::new(StaticDirectory::default().with("alice", &["org_a"]));
        let tenders = VersionedRepository::<Tender>::open(&db).unwrap();
        let (live, _) = tenders
            .create(&guard, "alice", "org_a", tender_content("Roof"))
            .unwrap();

        let json = serde_json::to_value(Tender::latest(&live)).unwrap();
        for field in [
            "id",
            "name",
            "description",
            "serviceType",
            "status",
            "organizationId",
            "creatorUsername",
            "version",
            "createdAt",
        ] {
            assert!(json.get(field).is_some(), "missing `{field}`");
        }
        assert_eq!(json["status"], "Created");
        assert_eq!(json["version"], 1);
    }
}

// CONFIG TESTS
#[cfg(test)]
mod config_tests {
    use super::*;
    use tender_market::content::EditMode;

    #[test]
    fn defaults_match_listing_limits() {
        let config = MarketConfig::default();
        assert_eq!(config.tender_page_limit, 5);
        assert_eq!(config.bid_page_limit, 10);
        assert_eq!(config.edit_mode, EditMode::EmptyMeansUnchanged);
        assert!(!config.temporary);
    }

    #[test]
    fn builder_overrides() {
        let config = MarketConfig::new("/tmp/market")
            .edit_mode(EditMode::Explicit)
            .tender_page_limit(20)
            .cache_capacity(1024)
            .flush_every_ms(None);
        assert_eq!(config.edit_mode, EditMode::Explicit);
        assert_eq!(config.tender_page_limit, 20);
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.flush_every_ms, None);
    }

    #[test]
    fn data_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("market.db");
        let tender_id = {
            let market = Marketplace::open(MarketConfig::new(&path).flush_every_ms(None))?;
            let directory = market.directory();
            let acme = directory.register_organization("Acme", "", OrganizationType::Llc)?;
            let alice = directory.register_employee("alice", "Alice", "A")?;
            directory.assign_responsible(&alice.id, &acme.id)?;
            let tender = market.create_tender(NewTender {
                name: "Roof".into(),
                description: String::new(),
                service_type: "Construction".into(),
                organization_id: acme.id,
                creator_username: "alice".into(),
            })?;
            market.flush()?;
            tender.id
        };

        let market = Marketplace::open(MarketConfig::new(&path).flush_every_ms(None))?;
        assert_eq!(market.tender_status(&tender_id, "alice")?, TenderStatus::Created);
        assert_eq!(market.tenders().max_version(&tender_id)?, 1);
        Ok(())
    }
}
