//! Subcommand definitions and their mapping onto the API facade.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use gavel_engine::types::{
    Actor, ActorId, DueDiligenceCategory, DueDiligenceStatus, Page, RequestContext,
    RoiInputsPatch, TenantId,
};
use gavel_engine::{ApiResponse, GavelApi, Settings, config_path};

const DEFAULT_CONFIG: &str = r#"# Gavel configuration

[app]
env = "development"

[store]
# path = "${HOME}/.gavel/gavel.db"
busy_timeout_ms = 5000

[api]
operation_timeout_ms = 10000
default_page_size = 20
max_page_size = 100

[audit]
enabled = true
"#;

#[derive(Debug, Parser)]
#[command(name = "gavel", version, about = "Auction asset lifecycle, ROI and rule engine")]
pub struct Cli {
    /// Tenant every operation is scoped to.
    #[arg(long, global = true, env = "GAVEL_TENANT")]
    pub tenant: Option<String>,

    /// Acting user recorded in the audit trail.
    #[arg(long, global = true, env = "GAVEL_ACTOR", default_value = "cli")]
    pub actor: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a default config file if none exists and create the database.
    Init,
    #[command(subcommand)]
    Asset(AssetCommand),
    #[command(subcommand)]
    Bid(BidCommand),
    #[command(subcommand)]
    Roi(RoiCommand),
    /// Run the rule engine and print the full result.
    Validate(TargetArgs),
    /// Like `validate`, but fail when any violation is found.
    Enforce(TargetArgs),
    /// Print non-blocking guidance for a resource.
    Suggestions {
        resource_type: String,
        resource_id: String,
    },
    #[command(subcommand)]
    Document(DocumentCommand),
    #[command(subcommand)]
    Workflow(WorkflowCommand),
    #[command(subcommand)]
    Audit(AuditCommand),
}

#[derive(Debug, Subcommand)]
pub enum AssetCommand {
    Create {
        #[arg(long)]
        title: String,
        /// Court case or lot reference.
        #[arg(long)]
        reference: Option<String>,
        /// Linked document id (repeatable).
        #[arg(long = "document")]
        documents: Vec<String>,
    },
    Show {
        asset_id: String,
    },
    List(PageArgs),
    /// Advance to the next stage.
    Transition {
        asset_id: String,
        to_stage: String,
    },
    /// Update checklist categories and recompute the risk score.
    DueDiligence(DueDiligenceArgs),
    Risk {
        asset_id: String,
    },
}

#[derive(Debug, Args)]
pub struct DueDiligenceArgs {
    asset_id: String,
    #[arg(long)]
    occupancy: Option<DueDiligenceStatus>,
    #[arg(long)]
    debts: Option<DueDiligenceStatus>,
    #[arg(long)]
    legal_risks: Option<DueDiligenceStatus>,
    #[arg(long)]
    zoning: Option<DueDiligenceStatus>,
    /// `CATEGORY=TEXT` note for a category updated in the same call (repeatable).
    #[arg(long = "note", value_name = "CATEGORY=TEXT")]
    notes: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum BidCommand {
    Place {
        asset_id: String,
        amount: f64,
        /// Defaults to the acting user.
        #[arg(long)]
        bidder: Option<String>,
    },
    List {
        asset_id: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum RoiCommand {
    Show {
        asset_id: String,
    },
    /// Merge the given inputs and recalculate.
    Update {
        asset_id: String,
        #[arg(long)]
        acquisition_price: Option<f64>,
        #[arg(long)]
        taxes: Option<f64>,
        #[arg(long)]
        legal_costs: Option<f64>,
        #[arg(long)]
        renovation_estimate: Option<f64>,
        #[arg(long)]
        expected_resale_value: Option<f64>,
        #[arg(long)]
        expected_resale_date: Option<String>,
    },
    Versions {
        asset_id: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum DocumentCommand {
    /// Record a document's quality-control status.
    Register {
        document_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "pending")]
        cpo_status: String,
        #[arg(long)]
        approved: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    Block {
        resource_type: String,
        resource_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Unblock {
        resource_type: String,
        resource_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Audit events for one resource, newest first.
    List {
        resource_type: String,
        resource_id: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    resource_type: String,
    resource_id: String,
    #[arg(long, default_value = "general")]
    operation: String,
}

impl TargetArgs {
    fn body(self) -> Value {
        json!({
            "resource_type": self.resource_type,
            "resource_id": self.resource_id,
            "operation": self.operation,
        })
    }
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Page size; 0 uses the configured default.
    #[arg(long, default_value_t = 0)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

impl PageArgs {
    fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

pub async fn run(cli: Cli, settings: &Settings) -> Result<ApiResponse> {
    let ctx = request_context(cli.tenant.as_deref(), &cli.actor)?;
    let open = || {
        GavelApi::open(settings)
            .with_context(|| format!("failed to open store at {}", settings.db_path.display()))
    };

    let response = match cli.command {
        Command::Init => init(settings)?,
        Command::Asset(command) => asset(&open()?, ctx, command).await?,
        Command::Bid(command) => bid(&open()?, ctx, command).await,
        Command::Roi(command) => roi(&open()?, ctx, command).await,
        Command::Validate(target) => open()?.validate(ctx, target.body()).await,
        Command::Enforce(target) => open()?.validate_and_enforce(ctx, target.body()).await,
        Command::Suggestions {
            resource_type,
            resource_id,
        } => {
            open()?
                .suggestions(ctx, &resource_type, &resource_id)
                .await
        }
        Command::Document(DocumentCommand::Register {
            document_id,
            title,
            cpo_status,
            approved,
        }) => {
            let body = json!({
                "id": document_id,
                "title": title,
                "is_approved": approved,
                "cpo_status": cpo_status,
            });
            open()?.register_document(ctx, body).await
        }
        Command::Workflow(command) => {
            let (resource_type, resource_id, body) = match command {
                WorkflowCommand::Block {
                    resource_type,
                    resource_id,
                    reason,
                } => (
                    resource_type,
                    resource_id,
                    json!({ "blocked": true, "reason": reason }),
                ),
                WorkflowCommand::Unblock {
                    resource_type,
                    resource_id,
                } => (
                    resource_type,
                    resource_id,
                    json!({ "blocked": false, "reason": null }),
                ),
            };
            open()?
                .set_workflow_block(ctx, &resource_type, &resource_id, body)
                .await
        }
        Command::Audit(AuditCommand::List {
            resource_type,
            resource_id,
            page,
        }) => {
            open()?
                .audit_events(ctx, &resource_type, &resource_id, page.page())
                .await
        }
    };
    Ok(response)
}

fn request_context(tenant: Option<&str>, actor: &str) -> Result<RequestContext> {
    let actor = Actor::new(ActorId::new(actor).context("invalid --actor")?);
    Ok(match tenant {
        Some(tenant) => RequestContext::new(actor, TenantId::new(tenant).context("invalid --tenant")?),
        None => RequestContext::without_tenant(actor),
    })
}

fn init(settings: &Settings) -> Result<ApiResponse> {
    let Some(config) = config_path() else {
        bail!("cannot determine a home directory; set GAVEL_CONFIG");
    };
    let created = write_default_config(&config)?;
    GavelApi::open(settings)
        .with_context(|| format!("failed to create store at {}", settings.db_path.display()))?;
    tracing::info!(config = %config.display(), db = %settings.db_path.display(), "initialized");

    Ok(ApiResponse {
        status: 201,
        body: json!({
            "config": config.display().to_string(),
            "config_created": created,
            "db_path": settings.db_path.display().to_string(),
            "environment": settings.environment.as_str(),
        }),
    })
}

/// Returns false when a config file already exists.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

async fn asset(api: &GavelApi, ctx: RequestContext, command: AssetCommand) -> Result<ApiResponse> {
    Ok(match command {
        AssetCommand::Create {
            title,
            reference,
            documents,
        } => {
            let body = json!({
                "title": title,
                "reference": reference,
                "linked_document_ids": documents,
            });
            api.create_asset(ctx, body).await
        }
        AssetCommand::Show { asset_id } => api.get_asset(ctx, &asset_id).await,
        AssetCommand::List(page) => api.list_assets(ctx, page.page()).await,
        AssetCommand::Transition { asset_id, to_stage } => {
            api.transition(ctx, &asset_id, json!({ "to_stage": to_stage }))
                .await
        }
        AssetCommand::DueDiligence(args) => {
            let asset_id = args.asset_id.clone();
            let body = json!({ "items": checklist_items(args)? });
            api.update_due_diligence(ctx, &asset_id, body).await
        }
        AssetCommand::Risk { asset_id } => api.risk(ctx, &asset_id).await,
    })
}

fn checklist_items(args: DueDiligenceArgs) -> Result<BTreeMap<&'static str, Value>> {
    let mut notes = BTreeMap::new();
    for note in &args.notes {
        let Some((category, text)) = note.split_once('=') else {
            bail!("--note expects CATEGORY=TEXT, got '{note}'");
        };
        notes.insert(category.trim().to_owned(), text.to_owned());
    }

    let statuses = [
        (DueDiligenceCategory::Occupancy, args.occupancy),
        (DueDiligenceCategory::Debts, args.debts),
        (DueDiligenceCategory::LegalRisks, args.legal_risks),
        (DueDiligenceCategory::Zoning, args.zoning),
    ];
    let mut items = BTreeMap::new();
    for (category, status) in statuses {
        let note = notes.remove(category.as_str());
        match status {
            Some(status) => {
                items.insert(
                    category.as_str(),
                    json!({ "status": status.as_str(), "notes": note }),
                );
            }
            None if note.is_some() => {
                bail!("a note for {category} needs --{} as well", category.as_str().replace('_', "-"));
            }
            None => {}
        }
    }
    if let Some(unknown) = notes.keys().next() {
        bail!("unknown due-diligence category '{unknown}'");
    }
    Ok(items)
}

async fn bid(api: &GavelApi, ctx: RequestContext, command: BidCommand) -> ApiResponse {
    match command {
        BidCommand::Place {
            asset_id,
            amount,
            bidder,
        } => {
            api.place_bid(ctx, &asset_id, json!({ "amount": amount, "bidder": bidder }))
                .await
        }
        BidCommand::List { asset_id, page } => api.list_bids(ctx, &asset_id, page.page()).await,
    }
}

async fn roi(api: &GavelApi, ctx: RequestContext, command: RoiCommand) -> ApiResponse {
    match command {
        RoiCommand::Show { asset_id } => api.get_roi(ctx, &asset_id).await,
        RoiCommand::Update {
            asset_id,
            acquisition_price,
            taxes,
            legal_costs,
            renovation_estimate,
            expected_resale_value,
            expected_resale_date,
        } => {
            let patch = RoiInputsPatch {
                acquisition_price,
                taxes,
                legal_costs,
                renovation_estimate,
                expected_resale_value,
                expected_resale_date,
            };
            api.update_roi(ctx, &asset_id, json!(patch)).await
        }
        RoiCommand::Versions { asset_id, page } => {
            api.roi_versions(ctx, &asset_id, page.page()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gavel").chain(args.iter().copied())).unwrap()
    }

    fn due_diligence(args: &[&str]) -> DueDiligenceArgs {
        let mut full = vec!["asset", "due-diligence"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Command::Asset(AssetCommand::DueDiligence(args)) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_tenant_follows_subcommand() {
        let cli = parse(&["bid", "place", "a-1", "1500.5", "--tenant", "t-9"]);
        assert_eq!(cli.tenant.as_deref(), Some("t-9"));
        assert!(matches!(
            cli.command,
            Command::Bid(BidCommand::Place { amount, .. }) if amount == 1500.5
        ));
    }

    #[test]
    fn checklist_flags_become_items() {
        let items = checklist_items(due_diligence(&[
            "a-1",
            "--occupancy",
            "OK",
            "--legal-risks",
            "risk",
            "--note",
            "legal_risks=pending lawsuit",
        ]))
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items["occupancy"], json!({ "status": "ok", "notes": null }));
        assert_eq!(
            items["legal_risks"],
            json!({ "status": "risk", "notes": "pending lawsuit" })
        );
    }

    #[test]
    fn note_without_status_is_rejected() {
        let err = checklist_items(due_diligence(&["a-1", "--note", "zoning=residential"]))
            .unwrap_err();
        assert!(err.to_string().contains("--zoning"));

        let err = checklist_items(due_diligence(&["a-1", "--debts", "ok", "--note", "roof=leaks"]))
            .unwrap_err();
        assert!(err.to_string().contains("roof"));
    }

    #[test]
    fn unknown_status_fails_to_parse() {
        let result = Cli::try_parse_from(["gavel", "asset", "due-diligence", "a-1", "--debts", "maybe"]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_tenant_builds_anonymous_context() {
        let ctx = request_context(None, "cli").unwrap();
        assert!(ctx.tenant.is_none());
        assert!(request_context(Some("  "), "cli").is_err());
    }

    #[test]
    fn default_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());

        let config = gavel_engine::GavelConfig::load_from(&path).unwrap();
        let settings = config.resolve();
        assert_eq!(settings.max_page_size, 100);
        assert!(settings.audit_enabled);
    }
}
