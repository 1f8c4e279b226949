// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Membership commands: apply, approve, reject, role, leave, show

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use moim_core::application::GroupLifecycleService;
use moim_core::domain::group::GroupId;
use moim_core::domain::membership::{MemberId, MembershipStatus};
use moim_core::domain::service_config::ServiceConfigManifest;

use super::{connect_service, describe, parse_group_id, parse_member_id};

#[derive(Subcommand)]
pub enum MembershipCommand {
    /// Request to join a group
    Apply {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        #[arg(long, value_parser = parse_member_id)]
        member: MemberId,
    },

    /// Accept a pending join request
    Approve {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        /// Acting leader's member id
        #[arg(long, value_parser = parse_member_id)]
        leader: MemberId,

        /// Applicant's member id
        #[arg(long, value_parser = parse_member_id)]
        member: MemberId,
    },

    /// Reject a pending join request
    Reject {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        #[arg(long, value_parser = parse_member_id)]
        leader: MemberId,

        #[arg(long, value_parser = parse_member_id)]
        member: MemberId,
    },

    /// Toggle an approved member between LEADER and PARTICIPANT
    Role {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        #[arg(long, value_parser = parse_member_id)]
        leader: MemberId,

        #[arg(long, value_parser = parse_member_id)]
        member: MemberId,
    },

    /// Leave a group
    Leave {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        #[arg(long, value_parser = parse_member_id)]
        member: MemberId,
    },

    /// Show one membership
    Show {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        #[arg(long, value_parser = parse_member_id)]
        member: MemberId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(
    command: MembershipCommand,
    config: &ServiceConfigManifest,
) -> Result<()> {
    let service = connect_service(config).await?;

    match command {
        MembershipCommand::Apply { group_id, member } => {
            let view = service
                .apply_for_membership(group_id, member)
                .await
                .map_err(describe)?;
            println!(
                "{}",
                format!("✓ Member {} applied to group {} ({})", member, group_id, view.status).green()
            );
        }
        MembershipCommand::Approve {
            group_id,
            leader,
            member,
        } => {
            service
                .approve_joining(leader, group_id, member, true)
                .await
                .map_err(describe)?;
            println!(
                "{}",
                format!("✓ Member {} approved in group {}", member, group_id).green()
            );
        }
        MembershipCommand::Reject {
            group_id,
            leader,
            member,
        } => {
            service
                .approve_joining(leader, group_id, member, false)
                .await
                .map_err(describe)?;
            println!("Member {} rejected in group {}", member, group_id);
        }
        MembershipCommand::Role {
            group_id,
            leader,
            member,
        } => {
            service
                .modify_group_role(leader, group_id, member)
                .await
                .map_err(describe)?;
            let view = service
                .get_membership(group_id, member)
                .await
                .map_err(describe)?;
            println!(
                "{}",
                format!("✓ Member {} is now {} in group {}", member, view.role, group_id).green()
            );
        }
        MembershipCommand::Leave { group_id, member } => {
            service
                .leave_group(group_id, member)
                .await
                .map_err(describe)?;
            println!(
                "{}",
                format!("✓ Member {} left group {}", member, group_id).green()
            );
        }
        MembershipCommand::Show {
            group_id,
            member,
            json,
        } => {
            let view = service
                .get_membership(group_id, member)
                .await
                .map_err(describe)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                let status = match view.status {
                    MembershipStatus::Approved => view.status.to_string().green(),
                    MembershipStatus::Pending => view.status.to_string().yellow(),
                    MembershipStatus::Rejected | MembershipStatus::Leave => {
                        view.status.to_string().dimmed()
                    }
                };
                println!(
                    "{} in group {}",
                    view.display_name
                        .as_deref()
                        .unwrap_or("(unknown member)")
                        .bold(),
                    group_id
                );
                println!("  Member: {}", view.member_id);
                println!("  Role: {}", view.role);
                println!("  Status: {}", status);
                println!("  Since: {}", view.created_at.to_rfc3339());
            }
        }
    }

    Ok(())
}
