//! Command execution against a gateway and the persisted session

use crate::cli::{
    CallsArgs, Cli, Commands, OrgCommands, OutputFormat, RangeArgs, StatsArgs, UserCommands,
};
use crate::demo::{DEMO_USER, demo_gateway};
use crate::output;
use anyhow::{Context, bail};
use callscope_core::{Config, DateRange, OrganizationInput, Organization, Role, SortDirection};
use callscope_gateway::{DataGateway, RestGateway};
use callscope_session::{
    CallsLoader, CallsQuery, DurableStore, FileStore, GlobalRoster, LoadState, Notifier,
    OrganizationContext, OrganizationRoster, PermissionResolver, StatsLoader, TracingNotifier,
    UserActions, accept_invitation,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

const REDACTED: &str = "<redacted>";

/// Everything a command needs: backend, session and output settings
#[derive(Debug)]
pub struct App {
    config: Config,
    gateway: Arc<dyn DataGateway>,
    notifier: Arc<dyn Notifier>,
    context: OrganizationContext,
    format: OutputFormat,
}

impl App {
    /// Wire an app from explicit parts
    #[must_use]
    pub fn new(
        config: Config,
        gateway: Arc<dyn DataGateway>,
        store: Arc<dyn DurableStore>,
        notifier: Arc<dyn Notifier>,
        user_id: Option<String>,
        format: OutputFormat,
    ) -> Self {
        let context =
            OrganizationContext::new(gateway.clone(), store, notifier.clone(), user_id);
        Self {
            config,
            gateway,
            notifier,
            context,
            format,
        }
    }

    /// Wire an app from parsed arguments and loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be opened or the HTTP
    /// client cannot be built.
    pub fn from_cli(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.session.storage_dir).with_context(|| {
            format!(
                "opening session store in {}",
                config.session.storage_dir.display()
            )
        })?;

        let (gateway, user_id): (Arc<dyn DataGateway>, Option<String>) = if cli.offline {
            info!("using the built-in demo backend");
            let user = cli.user.clone().unwrap_or_else(|| DEMO_USER.to_string());
            (Arc::new(demo_gateway()), Some(user))
        } else {
            let gateway = RestGateway::from_config(&config.backend)?;
            (Arc::new(gateway), cli.user.clone())
        };

        Ok(Self::new(
            config,
            gateway,
            Arc::new(store),
            Arc::new(TracingNotifier),
            user_id,
            cli.format,
        ))
    }

    /// The organization context, for inspecting the selection
    #[must_use]
    pub const fn context(&self) -> &OrganizationContext {
        &self.context
    }

    /// Execute one command and return its rendered output
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or its input is invalid.
    pub async fn run(&mut self, command: Commands) -> anyhow::Result<String> {
        debug!(?command, "running command");
        match command {
            Commands::Orgs { action } => self.orgs(action).await,
            Commands::Access { organization } => self.access(organization).await,
            Commands::Calls(args) => self.calls(args).await,
            Commands::Call { id, summarize } => self.call(&id, summarize).await,
            Commands::Stats(args) => self.stats(args).await,
            Commands::Users { org, all, action } => self.users(org, all, action).await,
            Commands::Invite { email, role, org } => self.invite(&email, role, org).await,
            Commands::Accept { token } => self.accept(&token).await,
            Commands::Config { show } => self.show_config(show),
        }
    }

    async fn orgs(&mut self, action: OrgCommands) -> anyhow::Result<String> {
        match action {
            OrgCommands::List => {
                let organizations = self.load_organizations().await?;
                let current = self.context.current_organization_id();
                output::render(self.format, &organizations, |orgs| {
                    output::organizations(orgs, current.as_deref())
                })
            }
            OrgCommands::Switch { id } => {
                let organizations = self.load_organizations().await?;
                let Some(target) = organizations.iter().find(|o| o.id == id) else {
                    bail!("organization {id} is not visible to the signed-in user");
                };
                self.context.change_organization(&target.id);
                Ok(format!("Switched to {} ({})", target.name, target.slug))
            }
            OrgCommands::Create {
                name,
                slug,
                description,
            } => {
                let input = OrganizationInput {
                    name,
                    slug,
                    description,
                    agent_id: None,
                };
                let organization = self.context.create_organization(input).await?;
                output::render(self.format, &organization, |o| {
                    format!("Created {} ({}) with id {}", o.name, o.slug, o.id)
                })
            }
            OrgCommands::Delete { id } => {
                if !self.context.delete_organization(&id).await {
                    bail!("organization {id} could not be deleted");
                }
                Ok(format!("Deleted organization {id}"))
            }
        }
    }

    async fn access(&mut self, organization: Option<String>) -> anyhow::Result<String> {
        let user_id = self.require_user()?;
        let organization_id = match organization {
            Some(id) => id,
            None => self.current_organization().await?.id,
        };

        let mut resolver = PermissionResolver::new(self.gateway.clone(), self.context.view());
        let granted = resolver.check_user_access(&user_id, &organization_id).await;
        let current = if self.context.current_organization_id().as_deref()
            == Some(organization_id.as_str())
        {
            Some(resolver.check_current_user_permissions().await)
        } else {
            None
        };

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "userId": user_id,
                "organizationId": organization_id,
                "hasAdminAccess": granted,
                "permissions": current,
            }))?),
            OutputFormat::Table => Ok(output::access(
                &user_id,
                &organization_id,
                granted,
                current,
            )),
        }
    }

    async fn calls(&mut self, args: CallsArgs) -> anyhow::Result<String> {
        let organization = self.current_organization().await?;
        let mut query = CallsQuery::for_organization(
            organization.slug,
            args.limit.unwrap_or(self.config.session.page_size),
        )
        .with_page(args.page);
        query.sort = args.sort;
        query.direction = if args.asc {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        if let Some(range) = date_range(args.range)? {
            query = query.with_date_range(range);
        }

        let mut loader = CallsLoader::new(self.gateway.clone());
        let page = loader
            .fetch(&query)
            .await?
            .context("no organization selected")?;
        output::render(self.format, &page, output::calls_page)
    }

    async fn call(&self, id: &str, summarize: bool) -> anyhow::Result<String> {
        let loader = CallsLoader::new(self.gateway.clone());
        let call = loader.fetch_call(id).await?;
        let summary = if summarize {
            Some(loader.generate_summary(&call).await?)
        } else {
            None
        };

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "call": call,
                "summary": summary,
            }))?),
            OutputFormat::Table => Ok(output::call_detail(&call, summary.as_deref())),
        }
    }

    async fn stats(&mut self, args: StatsArgs) -> anyhow::Result<String> {
        let loader = StatsLoader::new(self.gateway.clone(), self.notifier.clone());

        if let Some(customer_id) = args.customer {
            let stats = loader.customer_stats(&customer_id).await?;
            return output::render(self.format, &stats, output::customer_stats);
        }

        let organization = self.current_organization().await?;
        let range = date_range(args.range)?;
        match (range, args.daily) {
            (Some(range), true) => {
                let counts = loader.calls_per_day(&organization.slug, range).await;
                output::render(self.format, &counts, output::histogram)
            }
            (None, true) => bail!("--daily needs --from and --to"),
            (range, false) => {
                let stats = loader.load_stats(&organization.slug, range).await;
                output::render(self.format, &stats, output::stats)
            }
        }
    }

    async fn users(
        &mut self,
        org: Option<String>,
        all: bool,
        action: Option<UserCommands>,
    ) -> anyhow::Result<String> {
        if all && action.is_none() {
            let mut roster = GlobalRoster::new(self.gateway.clone());
            let users = roster.load(false).await?;
            return output::render(self.format, users, output::users);
        }

        let organization_id = match org {
            Some(id) => id,
            None => self.current_organization().await?.id,
        };
        let mut roster = OrganizationRoster::new(self.gateway.clone(), organization_id.clone());

        if let Some(action) = action {
            let stale = Arc::new(AtomicBool::new(false));
            let actions = self.user_actions(stale.clone());
            apply_user_action(&actions, &organization_id, action).await?;
            if !stale.load(Ordering::SeqCst) {
                bail!("roster was not refreshed after the change");
            }
        }

        if all {
            let mut global = GlobalRoster::new(self.gateway.clone());
            let users = global.load(true).await?;
            return output::render(self.format, users, output::users);
        }
        let users = roster.load(true).await?;
        output::render(self.format, users, output::users)
    }

    async fn invite(
        &mut self,
        email: &str,
        role: Role,
        org: Option<String>,
    ) -> anyhow::Result<String> {
        let organization_id = match org {
            Some(id) => id,
            None => self.current_organization().await?.id,
        };
        let actions = self.user_actions(Arc::new(AtomicBool::new(false)));
        let invitation = actions.invite_user(email, &organization_id, role).await?;
        output::render(self.format, &invitation, output::invitation)
    }

    async fn accept(&mut self, token: &str) -> anyhow::Result<String> {
        let user_id = self.require_user()?;
        let membership = accept_invitation(self.gateway.as_ref(), token, &user_id).await?;
        self.context
            .change_organization(&membership.organization_id);
        output::render(self.format, &membership, output::membership)
    }

    fn show_config(&self, show: bool) -> anyhow::Result<String> {
        self.config.validate()?;
        if !show {
            return Ok("Configuration is valid".to_string());
        }
        let mut shown = self.config.clone();
        if !shown.backend.anon_key.is_empty() {
            shown.backend.anon_key = REDACTED.to_string();
        }
        if shown.backend.access_token.is_some() {
            shown.backend.access_token = Some(REDACTED.to_string());
        }
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&shown)?),
            OutputFormat::Table => Ok(toml::to_string_pretty(&shown)?),
        }
    }

    fn user_actions(&self, stale: Arc<AtomicBool>) -> UserActions {
        UserActions::new(
            self.gateway.clone(),
            self.notifier.clone(),
            Box::new(move || stale.store(true, Ordering::SeqCst)),
        )
        .with_invitation_ttl_days(self.config.session.invitation_ttl_days)
    }

    fn require_user(&self) -> anyhow::Result<String> {
        self.context
            .session()
            .user_id
            .context("no signed-in user; pass --user or set CALLSCOPE_USER")
    }

    async fn load_organizations(&mut self) -> anyhow::Result<Vec<Organization>> {
        self.require_user()?;
        let organizations = self.context.load_organizations().await;
        if let LoadState::Error(message) = self.context.state() {
            bail!("could not load organizations: {message}");
        }
        Ok(organizations)
    }

    async fn current_organization(&mut self) -> anyhow::Result<Organization> {
        self.load_organizations().await?;
        self.context
            .current_organization()
            .cloned()
            .context("no organization selected; run `callscope orgs switch <ORG_ID>`")
    }
}

async fn apply_user_action(
    actions: &UserActions,
    organization_id: &str,
    action: UserCommands,
) -> anyhow::Result<()> {
    let applied = match action {
        UserCommands::Add { email, role } => {
            actions.add_user(&email, organization_id, role).await?;
            true
        }
        UserCommands::Remove { user_id } => {
            actions.remove_user(&user_id, organization_id).await?;
            true
        }
        UserCommands::Promote { user_id } => actions.promote(&user_id, organization_id).await,
        UserCommands::Demote { user_id } => actions.demote(&user_id, organization_id).await,
        UserCommands::Role { user_id, role } => actions.set_global_role(&user_id, role).await,
        UserCommands::ResetPassword { email } => actions.reset_password(&email).await,
        UserCommands::ResendInvite { id } => actions.resend_invite(&id).await,
        UserCommands::CancelInvite { id } => actions.cancel_invite(&id).await,
    };
    if !applied {
        bail!("the change was rejected; see the log for details");
    }
    Ok(())
}

fn date_range(args: RangeArgs) -> anyhow::Result<Option<DateRange>> {
    match (args.from, args.to) {
        (Some(from), Some(to)) => Ok(Some(DateRange::new(from, to)?)),
        (Some(_), None) | (None, Some(_)) => bail!("--from and --to must be given together"),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 1, d)
    }

    #[test]
    fn test_date_range_needs_both_ends() {
        let half = RangeArgs {
            from: day(3),
            to: None,
        };
        assert!(date_range(half).is_err());
        assert!(date_range(RangeArgs { from: None, to: day(3) }).is_err());
        assert!(date_range(RangeArgs::default()).unwrap().is_none());

        let range = date_range(RangeArgs {
            from: day(1),
            to: day(3),
        })
        .unwrap()
        .unwrap();
        assert_eq!(range.days().count(), 3);
    }
}
