//! Firewall group command handlers.

use serde::Serialize;
use tabled::Tabled;

use lavascope_api::VultrClient;
use lavascope_core::{Controller, Group, GroupEntry, GroupKey, RegistrySnapshot, RuleEntry};

use crate::cli::{GlobalOpts, GroupsArgs, GroupsCommand};
use crate::error::CliError;
use crate::output;

use super::{rules, util};

// ── Group table row ─────────────────────────────────────────────────

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Rules")]
    rules: String,
    #[tabled(rename = "Instances")]
    instances: u32,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&GroupEntry> for GroupRow {
    fn from(e: &GroupEntry) -> Self {
        let g = &e.group;
        Self {
            id: g.id.clone(),
            description: g.description.clone(),
            rules: format!("{}/{}", g.rule_count, g.max_rule_count),
            instances: g.instance_count,
            modified: util::short_date(&g.date_modified),
            status: output::group_badge(e.lifecycle, false),
        }
    }
}

/// A group with its rules, for `groups get`.
#[derive(Serialize)]
struct GroupDetail {
    #[serde(flatten)]
    entry: GroupEntry,
    rules: Vec<RuleEntry>,
}

fn group_detail(d: &GroupDetail, color: bool) -> String {
    let g = &d.entry.group;
    let mut lines = vec![
        format!("ID:          {}", g.id),
        format!("Description: {}", if g.description.is_empty() { "-" } else { g.description.as_str() }),
        format!("Status:      {}", output::group_badge(d.entry.lifecycle, color)),
        format!("Instances:   {}", g.instance_count),
        format!("Rules:       {}/{}", g.rule_count, g.max_rule_count),
        format!("Created:     {}", util::short_date(&g.date_created)),
        format!("Modified:    {}", util::short_date(&g.date_modified)),
    ];
    if !d.rules.is_empty() {
        lines.push(String::new());
        lines.push(rules::rules_table(&d.rules));
    }
    lines.join("\n")
}

fn created_detail(g: &Group) -> String {
    format!("{}\t{}", g.id, g.description)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller<VultrClient>,
    args: GroupsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        GroupsCommand::List { watch } => {
            controller.refresh_groups().await?;
            print_groups(&controller.snapshot(), global);
            if watch {
                watch_groups(controller, global).await?;
            }
            Ok(())
        }

        GroupsCommand::Get { id } => {
            let key = GroupKey::from(id.as_str());
            let entry = controller.fetch_group(&key).await?;
            controller.refresh_rules(&key).await?;
            let snap = controller.snapshot();
            let detail = GroupDetail {
                entry,
                rules: snap
                    .rules(&key)
                    .map(|m| m.values().cloned().collect())
                    .unwrap_or_default(),
            };
            let color = output::should_color(global.color);
            let out = output::render_single(
                global.output,
                &detail,
                |d| group_detail(d, color),
                |d| d.entry.group.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        GroupsCommand::Create { description } => {
            let group = controller.mutations().create_group(&description).await?;
            let out =
                output::render_single(global.output, &group, created_detail, |g| g.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        GroupsCommand::Update { id, description } => {
            let key = util::require_group(controller, &id).await?;
            controller
                .mutations()
                .update_group(&key, &description)
                .await?;
            Ok(())
        }

        GroupsCommand::Delete { id } => {
            let key = util::require_group(controller, &id).await?;
            if !util::confirm(&format!("Delete firewall group {id} and all its rules?"), global.yes)? {
                return Ok(());
            }
            controller.mutations().delete_group(&key).await?;
            Ok(())
        }
    }
}

fn print_groups(snap: &RegistrySnapshot, global: &GlobalOpts) {
    let entries: Vec<GroupEntry> = snap.groups().values().cloned().collect();
    let out = output::render_list(
        global.output,
        &entries,
        |e| GroupRow::from(e),
        |e| e.group.id.clone(),
    );
    output::print_output(&out, global.quiet);
}

/// Reprint the list each time the background refresh changes a group,
/// until Ctrl-C.
async fn watch_groups(
    controller: &Controller<VultrClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut stream = controller.subscribe();
    let mut shown = controller.snapshot();

    loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
            changed = stream.changed() => {
                let Some(snap) = changed else {
                    return Ok(());
                };
                // Rule-only refreshes leave the group list untouched
                if snap.groups() != shown.groups() {
                    print_groups(&snap, global);
                    shown = snap;
                }
            }
        }
    }
}
