//! Firewall rule command handlers.

use tabled::{Table, Tabled, settings::Style};

use lavascope_api::VultrClient;
use lavascope_core::{
    Controller, GroupKey, Rule, RuleDraft, RuleEntry, RuleKey, SourceType, protocol_label,
};

use crate::cli::{GlobalOpts, RuleCreateArgs, RulesArgs, RulesCommand};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{my_ip, util};

// ── Rule table row ──────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Type")]
    ip_type: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Notes")]
    notes: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&RuleEntry> for RuleRow {
    fn from(e: &RuleEntry) -> Self {
        let r = &e.rule;
        Self {
            id: r.id,
            ip_type: r.ip_type.to_string(),
            action: r.action.to_string(),
            protocol: protocol_label(r.protocol, &r.port),
            port: r.port.clone(),
            source: source_label(r),
            notes: r.notes.clone(),
            status: output::rule_badge(e.lifecycle, false),
        }
    }
}

/// `subnet/size`, or the named source when one is set.
fn source_label(r: &Rule) -> String {
    if r.source.is_empty() {
        format!("{}/{}", r.subnet, r.subnet_size)
    } else {
        r.source.clone()
    }
}

pub(crate) fn rules_table(entries: &[RuleEntry]) -> String {
    let rows: Vec<RuleRow> = entries.iter().map(RuleRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn rule_detail(r: &Rule) -> String {
    [
        format!("ID:       {}", r.id),
        format!("Type:     {}", r.ip_type),
        format!("Action:   {}", r.action),
        format!("Protocol: {}", protocol_label(r.protocol, &r.port)),
        format!("Port:     {}", if r.port.is_empty() { "-" } else { r.port.as_str() }),
        format!("Source:   {}", source_label(r)),
        format!("Notes:    {}", if r.notes.is_empty() { "-" } else { r.notes.as_str() }),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller<VultrClient>,
    args: RulesArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List { group } => {
            let key = util::require_group(controller, &group).await?;
            controller.refresh_rules(&key).await?;
            let snap = controller.snapshot();
            let entries: Vec<RuleEntry> = snap
                .rules(&key)
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default();
            let out = output::render_list(
                global.output,
                &entries,
                |e| RuleRow::from(e),
                |e| e.rule.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Get { group, rule } => {
            let key = GroupKey::from(group.as_str());
            controller.fetch_group(&key).await?;
            let entry = controller.fetch_rule(&key, RuleKey::Server(rule)).await?;
            let out = output::render_single(global.output, &entry.rule, rule_detail, |r| {
                r.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Create(create) => {
            let key = util::require_group(controller, &create.group).await?;
            let draft = build_draft(create, resolved).await?;

            // Stage the draft the way an editor would, then submit it
            controller
                .registry()
                .set_rule_draft(&key, draft.ip_type, draft.clone());
            let rule = controller.mutations().create_rule(&key, &draft).await?;

            let out = output::render_single(global.output, &rule, rule_detail, |r| {
                r.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Delete { group, rule } => {
            let key = util::require_group(controller, &group).await?;
            controller.refresh_rules(&key).await?;
            let rule_key = RuleKey::Server(rule);
            if controller.snapshot().rule(&key, rule_key).is_none() {
                return Err(CliError::NotFound {
                    resource_type: "rule".into(),
                    identifier: rule.to_string(),
                    list_command: format!("rules list {group}"),
                });
            }
            if !util::confirm(&format!("Delete rule {rule} from group {group}?"), global.yes)? {
                return Ok(());
            }
            controller.mutations().delete_rule(&key, rule_key).await?;
            Ok(())
        }
    }
}

/// Turn the flags into a draft. A `my-ip` source with no address looks up
/// the public address of the draft's family.
async fn build_draft(args: RuleCreateArgs, resolved: &Resolved) -> Result<RuleDraft, CliError> {
    let mut draft = RuleDraft {
        ip_type: args.ip_type,
        protocol: args.protocol,
        port: args.port,
        source_type: args.source,
        source_text: args.subnet,
        notes: args.notes,
    };

    if draft.source_type == SourceType::MyIp && draft.source_text.trim().is_empty() {
        let address = my_ip::lookup(resolved, draft.ip_type).await?;
        tracing::info!(address = %address.value, source = %address.source, "using public address");
        draft.source_text = address.value.to_string();
    }

    Ok(draft)
}
