//! Displayable wrappers for each resource the CLI prints.

use crate::error::Result;
use crate::output::{write_json, Displayable, Row};
use crate::services::{Account, Action, Droplet};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

fn timestamp(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

// ============ Actions ============

pub struct Actions(pub Vec<Action>);

impl Actions {
    pub const COLUMNS: &'static [&'static str] = &[
        "ID",
        "Status",
        "Type",
        "StartedAt",
        "CompletedAt",
        "ResourceID",
        "ResourceType",
        "Region",
    ];
}

impl Displayable for Actions {
    fn cols(&self) -> Vec<&'static str> {
        Self::COLUMNS.to_vec()
    }

    fn col_map(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ID", "ID"),
            ("Status", "Status"),
            ("Type", "Type"),
            ("StartedAt", "Started At"),
            ("CompletedAt", "Completed At"),
            ("ResourceID", "Resource ID"),
            ("ResourceType", "Resource Type"),
            ("Region", "Region"),
        ])
    }

    fn kv(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|a| {
                Row::new()
                    .with("ID", a.id)
                    .with("Status", a.status.to_string())
                    .with("Type", a.kind.as_str())
                    .with("StartedAt", timestamp(a.started_at))
                    .with("CompletedAt", timestamp(a.completed_at))
                    .with("ResourceID", a.resource_id)
                    .with("ResourceType", a.resource_type.as_str())
                    .with("Region", a.region_slug.as_str())
            })
            .collect()
    }

    fn json(&self, out: &mut dyn Write) -> Result<()> {
        write_json(out, &self.0)
    }
}

// ============ Droplets ============

pub struct Droplets(pub Vec<Droplet>);

impl Droplets {
    pub const COLUMNS: &'static [&'static str] = &[
        "ID",
        "Name",
        "PublicIPv4",
        "PrivateIPv4",
        "PublicIPv6",
        "Memory",
        "VCPUs",
        "Disk",
        "Region",
        "Image",
        "VPCUUID",
        "Status",
        "Tags",
        "Features",
        "Volumes",
    ];
}

impl Displayable for Droplets {
    fn cols(&self) -> Vec<&'static str> {
        Self::COLUMNS.to_vec()
    }

    fn col_map(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ID", "ID"),
            ("Name", "Name"),
            ("PublicIPv4", "Public IPv4"),
            ("PrivateIPv4", "Private IPv4"),
            ("PublicIPv6", "Public IPv6"),
            ("Memory", "Memory"),
            ("VCPUs", "VCPUs"),
            ("Disk", "Disk"),
            ("Region", "Region"),
            ("Image", "Image"),
            ("VPCUUID", "VPC UUID"),
            ("Status", "Status"),
            ("Tags", "Tags"),
            ("Features", "Features"),
            ("Volumes", "Volumes"),
        ])
    }

    fn kv(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|d| {
                let image = format!("{} {}", d.image.distribution, d.image.name);
                Row::new()
                    .with("ID", d.id)
                    .with("Name", d.name.as_str())
                    .with("PublicIPv4", d.public_ipv4())
                    .with("PrivateIPv4", d.private_ipv4())
                    .with("PublicIPv6", d.public_ipv6())
                    .with("Memory", d.memory)
                    .with("VCPUs", d.vcpus)
                    .with("Disk", d.disk)
                    .with("Region", d.region.slug.as_str())
                    .with("Image", image.trim().to_string())
                    .with("VPCUUID", d.vpc_uuid.as_str())
                    .with("Status", d.status.as_str())
                    .with("Tags", d.tags.clone())
                    .with("Features", d.features.clone())
                    .with("Volumes", d.volume_ids.clone())
            })
            .collect()
    }

    fn json(&self, out: &mut dyn Write) -> Result<()> {
        write_json(out, &self.0)
    }
}

// ============ Account ============

pub struct AccountView(pub Account);

impl AccountView {
    pub const COLUMNS: &'static [&'static str] = &[
        "Email",
        "Team",
        "DropletLimit",
        "EmailVerified",
        "UUID",
        "Status",
    ];
}

impl Displayable for AccountView {
    fn cols(&self) -> Vec<&'static str> {
        Self::COLUMNS.to_vec()
    }

    fn col_map(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("Email", "User Email"),
            ("Team", "Team"),
            ("DropletLimit", "Droplet Limit"),
            ("EmailVerified", "Email Verified"),
            ("UUID", "User UUID"),
            ("Status", "Status"),
        ])
    }

    fn kv(&self) -> Vec<Row> {
        let a = &self.0;
        vec![Row::new()
            .with("Email", a.email.as_str())
            .with("Team", a.team.as_ref().map(|t| t.name.clone()))
            .with("DropletLimit", a.droplet_limit)
            .with("EmailVerified", a.email_verified)
            .with("UUID", a.uuid.as_str())
            .with("Status", a.status.as_str())]
    }

    fn json(&self, out: &mut dyn Write) -> Result<()> {
        write_json(out, &self.0)
    }
}

// ============ Auth contexts ============

#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub name: String,
    pub current: bool,
}

pub struct Contexts(pub Vec<ContextEntry>);

impl Contexts {
    pub const COLUMNS: &'static [&'static str] = &["Name", "Current"];
}

impl Displayable for Contexts {
    fn cols(&self) -> Vec<&'static str> {
        Self::COLUMNS.to_vec()
    }

    fn col_map(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([("Name", "Name"), ("Current", "Current")])
    }

    fn kv(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|c| Row::new().with("Name", c.name.as_str()).with("Current", c.current))
            .collect()
    }

    fn json(&self, out: &mut dyn Write) -> Result<()> {
        write_json(out, &self.0)
    }
}
