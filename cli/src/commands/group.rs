// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Group commands: create, show, edit, delete

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use moim_core::application::{GroupLifecycleService, GroupView};
use moim_core::domain::group::{GroupId, GroupRegion, GroupUpdate, NewGroup, RecruitRequest};
use moim_core::domain::membership::MemberId;
use moim_core::domain::service_config::ServiceConfigManifest;

use super::{connect_service, describe, parse_group_id, parse_member_id};

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a group led by the given member
    Create {
        /// Founding leader's member id
        #[arg(long, value_parser = parse_member_id)]
        leader: MemberId,

        #[arg(long)]
        name: String,

        #[arg(long)]
        province: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        town: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Maximum number of approved members, leader included
        #[arg(long = "max", value_parser = clap::value_parser!(u32).range(1..))]
        max_recruit_count: u32,

        /// Category name
        #[arg(long)]
        category: String,
    },

    /// Show a group
    Show {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a group. Omitted options keep their current value.
    Edit {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        /// Acting leader's member id
        #[arg(long, value_parser = parse_member_id)]
        leader: MemberId,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        province: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        town: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// RECRUITING or CLOSED
        #[arg(long)]
        status: Option<RecruitRequest>,

        #[arg(long = "max")]
        max_recruit_count: Option<u32>,

        #[arg(long)]
        category: Option<String>,
    },

    /// Delete a group and disable all of its memberships
    Delete {
        #[arg(value_name = "GROUP_ID", value_parser = parse_group_id)]
        group_id: GroupId,

        /// Acting leader's member id
        #[arg(long, value_parser = parse_member_id)]
        leader: MemberId,
    },
}

pub async fn handle_command(command: GroupCommand, config: &ServiceConfigManifest) -> Result<()> {
    let service = connect_service(config).await?;

    match command {
        GroupCommand::Create {
            leader,
            name,
            province,
            city,
            town,
            description,
            max_recruit_count,
            category,
        } => {
            let spec = NewGroup {
                name,
                region: GroupRegion::new(province, city, town),
                description,
                max_recruit_count,
                category_name: category,
            };
            let group_id = service
                .create_group(leader, spec)
                .await
                .map_err(describe)?;
            println!("{}", format!("✓ Group {} created", group_id).green());
            Ok(())
        }
        GroupCommand::Show { group_id, json } => {
            let view = service.get_group(group_id).await.map_err(describe)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_group(&view);
            }
            Ok(())
        }
        GroupCommand::Edit {
            group_id,
            leader,
            name,
            province,
            city,
            town,
            description,
            status,
            max_recruit_count,
            category,
        } => {
            let update = GroupUpdate {
                name,
                province,
                city,
                town,
                description,
                recruit_status: status,
                max_recruit_count,
                category_name: category,
            };
            let view = service
                .modify_group(group_id, leader, update)
                .await
                .map_err(describe)?;
            println!("{}", format!("✓ Group {} updated", group_id).green());
            print_group(&view);
            Ok(())
        }
        GroupCommand::Delete { group_id, leader } => {
            service
                .delete_group(group_id, leader)
                .await
                .map_err(describe)?;
            println!("{}", format!("✓ Group {} deleted", group_id).green());
            Ok(())
        }
    }
}

fn print_group(view: &GroupView) {
    let status = if view.recruit_status.is_recruiting() {
        view.recruit_status.to_string().green()
    } else {
        view.recruit_status.to_string().yellow()
    };

    println!("{} {}", view.name.bold(), format!("#{}", view.id).dimmed());
    println!("  Region: {}", view.region);
    println!("  Category: {}", view.category);
    println!("  Members: {}/{}", view.approved_count, view.max_recruit_count);
    println!("  Recruitment: {}", status);
    if !view.description.is_empty() {
        println!("  Description: {}", view.description);
    }
    println!("  Updated: {}", view.updated_at.to_rfc3339());
}
