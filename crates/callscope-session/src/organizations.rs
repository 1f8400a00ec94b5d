//! Organization list and current-organization selection

use crate::notify::Notifier;
use crate::session::{self, Session, SessionView, SessionWriter};
use crate::storage::{CURRENT_ORGANIZATION_KEY, DurableStore};
use callscope_core::utils::slugify;
use callscope_core::{Error, Organization, OrganizationId, OrganizationInput, Result, UserId};
use callscope_gateway::{DataGateway, MembershipQueries, OrganizationQueries, UserRoleQueries};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

/// Progress of the organization list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// A load is in flight or none has finished yet
    Loading,
    /// The list reflects the last successful load
    Loaded,
    /// The last load failed; holds until the next attempt
    Error(String),
}

/// Owner of the organization list and the current selection
///
/// This is the only component that writes the session's organization;
/// hand out [`SessionView`]s to everything else.
#[derive(Debug)]
pub struct OrganizationContext {
    gateway: Arc<dyn DataGateway>,
    store: Arc<dyn DurableStore>,
    notifier: Arc<dyn Notifier>,
    session: SessionWriter,
    organizations: Vec<Organization>,
    state: LoadState,
}

impl OrganizationContext {
    /// Create a context for `user_id`, restoring the persisted selection
    #[must_use]
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        store: Arc<dyn DurableStore>,
        notifier: Arc<dyn Notifier>,
        user_id: Option<UserId>,
    ) -> Self {
        let organization_id = store
            .get(CURRENT_ORGANIZATION_KEY)
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not read stored organization");
                None
            })
            .filter(|id| !id.trim().is_empty());

        let (session, _) = session::channel(Session {
            user_id,
            organization_id,
        });

        Self {
            gateway,
            store,
            notifier,
            session,
            organizations: Vec::new(),
            state: LoadState::Loading,
        }
    }

    /// A read-only view on the session
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    /// Snapshot of the session
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.current()
    }

    /// Switch the signed-in user
    pub fn set_user(&self, user_id: Option<UserId>) {
        self.session.set_user(user_id);
    }

    /// Organizations from the last successful load
    #[must_use]
    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    /// State of the organization list
    #[must_use]
    pub const fn state(&self) -> &LoadState {
        &self.state
    }

    /// Id of the current organization
    #[must_use]
    pub fn current_organization_id(&self) -> Option<OrganizationId> {
        self.session.current().organization_id
    }

    /// The loaded organization matching the current selection
    #[must_use]
    pub fn current_organization(&self) -> Option<&Organization> {
        let id = self.current_organization_id()?;
        self.organizations.iter().find(|o| o.id == id)
    }

    /// Reload the organizations visible to the signed-in user
    ///
    /// Global admins see every organization; everyone else sees the ones they
    /// are a member of. Failures leave an empty list and an error state.
    #[instrument(skip(self))]
    pub async fn load_organizations(&mut self) -> Vec<Organization> {
        self.state = LoadState::Loading;

        let Some(user_id) = self.session.current().user_id else {
            debug!("no signed-in user, nothing to load");
            self.organizations.clear();
            self.state = LoadState::Loaded;
            return Vec::new();
        };

        match self.fetch_visible(&user_id).await {
            Ok(organizations) => {
                info!(count = organizations.len(), "loaded organizations");
                self.organizations = organizations;
                self.state = LoadState::Loaded;
                self.reconcile_selection();
                self.organizations.clone()
            }
            Err(e) => {
                error!(error = %e, "failed to load organizations");
                self.organizations.clear();
                self.state = LoadState::Error(e.to_string());
                self.notifier
                    .error("Error loading organizations", &e.to_string());
                Vec::new()
            }
        }
    }

    /// Make `organization_id` current and persist the choice
    ///
    /// The in-memory selection changes before this returns; the id is not
    /// checked against the loaded list.
    pub fn change_organization(&mut self, organization_id: &str) {
        if let Err(e) = self.store.set(CURRENT_ORGANIZATION_KEY, organization_id) {
            warn!(organization_id, error = %e, "could not persist organization selection");
        }
        self.session
            .set_organization(Some(organization_id.to_string()));
        info!(organization_id, "switched organization");
    }

    /// Create an organization with the signed-in user as its admin
    ///
    /// The list is reloaded whether or not creation succeeds.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad name or slug or when nobody is
    /// signed in, and the backend error if the insert fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_organization(&mut self, input: OrganizationInput) -> Result<Organization> {
        let result = self.insert_organization(&input).await;

        match &result {
            Ok(organization) => {
                info!(
                    organization_id = %organization.id,
                    slug = %organization.slug,
                    "created organization"
                );
                self.notifier.success(
                    "Organization created",
                    &format!("{} is ready", organization.name),
                );
            }
            Err(e) => {
                error!(error = %e, "failed to create organization");
                self.notifier
                    .error("Error creating organization", &e.to_string());
            }
        }

        self.load_organizations().await;
        result
    }

    /// Apply `patch` to an organization; false on failure
    #[instrument(skip(self, patch))]
    pub async fn update_organization(
        &mut self,
        organization_id: &str,
        patch: OrganizationInput,
    ) -> bool {
        let patch = patch.trimmed();
        let result = match patch.validate() {
            Ok(()) => {
                OrganizationQueries::update(self.gateway.as_ref(), organization_id, &patch).await
            }
            Err(e) => Err(Error::validation("organization", e.to_string())),
        };

        let updated = match result {
            Ok(organization) => {
                info!(organization_id, "updated organization");
                self.notifier.success(
                    "Organization updated",
                    &format!("{} was saved", organization.name),
                );
                true
            }
            Err(e) => {
                error!(organization_id, error = %e, "failed to update organization");
                self.notifier
                    .error("Error updating organization", &e.to_string());
                false
            }
        };

        self.load_organizations().await;
        updated
    }

    /// Delete an organization; false on failure
    ///
    /// Deleting the current organization moves the selection on the reload.
    #[instrument(skip(self))]
    pub async fn delete_organization(&mut self, organization_id: &str) -> bool {
        let result = OrganizationQueries::delete(self.gateway.as_ref(), organization_id).await;
        let deleted = match result {
            Ok(true) => {
                info!(organization_id, "deleted organization");
                self.notifier
                    .success("Organization deleted", "The organization was removed");
                true
            }
            Ok(false) => {
                let e = Error::not_found(format!("organization {organization_id}"));
                warn!(organization_id, "nothing to delete");
                self.notifier
                    .error("Error deleting organization", &e.to_string());
                false
            }
            Err(e) => {
                error!(organization_id, error = %e, "failed to delete organization");
                self.notifier
                    .error("Error deleting organization", &e.to_string());
                false
            }
        };

        self.load_organizations().await;
        deleted
    }

    async fn fetch_visible(&self, user_id: &str) -> Result<Vec<Organization>> {
        let gateway = self.gateway.as_ref();
        if UserRoleQueries::find_admin(gateway, user_id).await?.is_some() {
            return OrganizationQueries::list_all(gateway).await;
        }

        let ids: Vec<String> = MembershipQueries::for_user(gateway, user_id)
            .await?
            .into_iter()
            .map(|m| m.organization_id)
            .collect();
        OrganizationQueries::list_by_ids(gateway, &ids).await
    }

    /// Insert the organization and its creator's admin membership
    ///
    /// A failed membership insert deletes the new organization again so no
    /// row is left that its creator can neither see nor remove.
    async fn insert_organization(&self, input: &OrganizationInput) -> Result<Organization> {
        let input = input.trimmed();
        input
            .validate()
            .map_err(|e| Error::validation("organization", e.to_string()))?;
        let user_id = self
            .session
            .current()
            .user_id
            .ok_or_else(|| Error::validation("user_id", "Sign in to create an organization"))?;

        let slug = match input.slug.as_deref() {
            Some(slug) => slug.to_string(),
            None => slugify(&input.name),
        };
        if slug.is_empty() {
            return Err(Error::validation(
                "slug",
                "Name must contain at least one letter or digit",
            ));
        }

        let gateway = self.gateway.as_ref();
        let organization = OrganizationQueries::insert(gateway, &input, &slug).await?;
        if let Err(e) = MembershipQueries::insert(gateway, &user_id, &organization.id, true).await {
            warn!(
                organization_id = %organization.id,
                error = %e,
                "admin membership failed, removing organization"
            );
            if let Err(rollback) = OrganizationQueries::delete(gateway, &organization.id).await {
                error!(
                    organization_id = %organization.id,
                    error = %rollback,
                    "failed to remove organization after membership error"
                );
            }
            return Err(e);
        }
        Ok(organization)
    }

    /// Point the selection at a loaded organization
    ///
    /// A missing or stale selection falls back to the first organization, or
    /// to none when the list is empty.
    fn reconcile_selection(&mut self) {
        let current = self.current_organization_id();
        if current
            .as_deref()
            .is_some_and(|id| self.organizations.iter().any(|o| o.id == id))
        {
            return;
        }

        match self.organizations.first().map(|o| o.id.clone()) {
            Some(first) => {
                debug!(stale = ?current, fallback = %first, "selecting first organization");
                self.change_organization(&first);
            }
            None => {
                if current.is_some() {
                    debug!(stale = ?current, "no organizations left, clearing selection");
                }
                if let Err(e) = self.store.remove(CURRENT_ORGANIZATION_KEY) {
                    warn!(error = %e, "could not clear stored organization");
                }
                self.session.set_organization(None);
            }
        }
    }
}
