//! Employees, organizations and the responsible-for relation between them
use chrono::Utc;
use sled::{Db, Tree};

use crate::error::{MarketError, MarketResult, StorageResultExt};
use crate::record::TimeStamp;
use crate::utils::{EMPLOYEE_HRP, ORGANIZATION_HRP, RESPONSIBILITY_HRP, new_id};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationType {
    #[n(0)]
    Ie, // sole proprietor
    #[n(1)]
    Llc,
    #[n(2)]
    Jsc,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub first_name: String,
    #[n(3)]
    pub last_name: String,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub kind: OrganizationType,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Responsibility {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub organization_id: String,
    #[n(2)]
    pub employee_id: String,
}

/// The queries the marketplace needs from the identity store.
pub trait ResponsibilityDirectory {
    fn employee(&self, username: &str) -> MarketResult<Option<Employee>>;
    fn organization(&self, organization_id: &str) -> MarketResult<Option<Organization>>;
    fn is_responsible(&self, employee_id: &str, organization_id: &str) -> MarketResult<bool>;
}

/// sled-backed directory, sharing the marketplace database.
pub struct SledDirectory {
    employees: Tree,     // username -> Employee
    organizations: Tree, // id -> Organization
    responsible: Tree,   // employee id / organization id -> Responsibility
}

impl SledDirectory {
    pub fn open(db: &Db) -> MarketResult<Self> {
        Ok(Self {
            employees: db.open_tree("employees").storage("open employees")?,
            organizations: db.open_tree("organizations").storage("open organizations")?,
            responsible: db
                .open_tree("organization_responsible")
                .storage("open organization_responsible")?,
        })
    }

    pub fn register_employee(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> MarketResult<Employee> {
        if username.trim().is_empty() {
            return Err(MarketError::ValidationFailed("username is required".into()));
        }
        let employee = Employee {
            id: new_id(EMPLOYEE_HRP)?,
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            created_at: TimeStamp::new(),
        };
        let bytes = minicbor::to_vec(&employee).storage("encode employee")?;

        // usernames are unique: only insert when the key is vacant
        self.employees
            .compare_and_swap(username.as_bytes(), None as Option<&[u8]>, Some(bytes))
            .storage("insert employee")?
            .map_err(|_| MarketError::ValidationFailed(format!("username `{username}` is taken")))?;

        tracing::info!(username, employee_id = %employee.id, "registered employee");
        Ok(employee)
    }

    pub fn register_organization(
        &self,
        name: &str,
        description: &str,
        kind: OrganizationType,
    ) -> MarketResult<Organization> {
        if name.trim().is_empty() {
            return Err(MarketError::ValidationFailed(
                "organization name is required".into(),
            ));
        }
        let organization = Organization {
            id: new_id(ORGANIZATION_HRP)?,
            name: name.to_string(),
            description: description.to_string(),
            kind,
            created_at: TimeStamp::new(),
        };
        self.organizations
            .insert(
                organization.id.as_bytes(),
                minicbor::to_vec(&organization).storage("encode organization")?,
            )
            .storage("insert organization")?;

        tracing::info!(organization_id = %organization.id, name, "registered organization");
        Ok(organization)
    }

    /// Grants `employee_id` the right to act for `organization_id`. Granting twice is a no-op.
    pub fn assign_responsible(
        &self,
        employee_id: &str,
        organization_id: &str,
    ) -> MarketResult<Responsibility> {
        if self.organization(organization_id)?.is_none() {
            return Err(MarketError::NotFound {
                kind: "organization",
                id: organization_id.to_string(),
            });
        }
        let key = responsibility_key(employee_id, organization_id);
        if let Some(existing) = self.responsible.get(&key).storage("load responsibility")? {
            return minicbor::decode(&existing).storage("decode responsibility");
        }

        let responsibility = Responsibility {
            id: new_id(RESPONSIBILITY_HRP)?,
            organization_id: organization_id.to_string(),
            employee_id: employee_id.to_string(),
        };
        self.responsible
            .insert(
                key,
                minicbor::to_vec(&responsibility).storage("encode responsibility")?,
            )
            .storage("insert responsibility")?;

        tracing::info!(employee_id, organization_id, "assigned responsibility");
        Ok(responsibility)
    }
}

impl ResponsibilityDirectory for SledDirectory {
    fn employee(&self, username: &str) -> MarketResult<Option<Employee>> {
        self.employees
            .get(username.as_bytes())
            .storage("load employee")?
            .map(|bytes| minicbor::decode(&bytes).storage("decode employee"))
            .transpose()
    }

    fn organization(&self, organization_id: &str) -> MarketResult<Option<Organization>> {
        self.organizations
            .get(organization_id.as_bytes())
            .storage("load organization")?
            .map(|bytes| minicbor::decode(&bytes).storage("decode organization"))
            .transpose()
    }

    fn is_responsible(&self, employee_id: &str, organization_id: &str) -> MarketResult<bool> {
        self.responsible
            .contains_key(responsibility_key(employee_id, organization_id))
            .storage("check responsibility")
    }
}

fn responsibility_key(employee_id: &str, organization_id: &str) -> Vec<u8> {
    format!("{employee_id}/{organization_id}").into_bytes()
}
