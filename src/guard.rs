//! Authorization gate in front of every state-changing operation
use crate::directory::{Employee, ResponsibilityDirectory};
use crate::error::{MarketError, MarketResult};
use crate::status::{Status, Visibility};

/// An employee that has been resolved from a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub employee_id: String,
    pub username: String,
}

impl From<Employee> for Actor {
    fn from(employee: Employee) -> Self {
        Self {
            employee_id: employee.id,
            username: employee.username,
        }
    }
}

pub struct MutationGuard<D> {
    directory: D,
}

impl<D: ResponsibilityDirectory> MutationGuard<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolves `username` to an employee, failing `ActorNotFound` if there is none.
    pub fn resolve(&self, username: &str) -> MarketResult<Actor> {
        if username.trim().is_empty() {
            return Err(MarketError::ValidationFailed("username is required".into()));
        }
        match self.directory.employee(username)? {
            Some(employee) => Ok(employee.into()),
            None => {
                tracing::warn!(username, "unknown actor");
                Err(MarketError::ActorNotFound(username.to_string()))
            }
        }
    }

    /// Resolves the actor and checks it is responsible for `organization_id`.
    ///
    /// Callers pass the organization stored on the entity being changed, never
    /// one taken from the request, except when creating.
    pub fn authorize(&self, username: &str, organization_id: &str) -> MarketResult<Actor> {
        let actor = self.resolve(username)?;
        self.check(&actor, organization_id)?;
        Ok(actor)
    }

    pub fn check(&self, actor: &Actor, organization_id: &str) -> MarketResult<()> {
        if self
            .directory
            .is_responsible(&actor.employee_id, organization_id)?
        {
            return Ok(());
        }
        tracing::warn!(
            actor = %actor.username,
            organization_id,
            "actor is not responsible for organization"
        );
        Err(MarketError::NotAuthorized {
            username: actor.username.clone(),
            organization_id: organization_id.to_string(),
        })
    }

    pub fn is_responsible(&self, actor: &Actor, organization_id: &str) -> MarketResult<bool> {
        self.directory
            .is_responsible(&actor.employee_id, organization_id)
    }

    /// May `actor` observe `status` on an entity owned by `organization_id`?
    pub fn authorize_read<S: Status>(
        &self,
        actor: &Actor,
        organization_id: &str,
        status: S,
    ) -> MarketResult<()> {
        match status.visibility() {
            Visibility::Public => Ok(()),
            Visibility::Owners => self.check(actor, organization_id),
        }
    }
}
