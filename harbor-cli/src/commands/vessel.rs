//! `harbor vessel create|update|get|list|delete`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use harbor_core::{VesselDetails, VesselId, VesselRecord, VesselRegistry};

use super::{print_json, set, status_label};

#[derive(Subcommand, Debug)]
pub enum VesselCommand {
    /// Register a new vessel (status starts at New).
    Create {
        vessel_id: String,
        #[command(flatten)]
        fields: VesselFields,
    },
    /// Change attributes of an existing vessel. Omitted flags keep their value.
    Update {
        vessel_id: String,
        #[command(flatten)]
        fields: VesselFields,
    },
    /// Show one vessel as JSON.
    Get { vessel_id: String },
    /// List vessels in registration order.
    List {
        /// Only vessels whose owner phone number matches exactly.
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Remove a vessel record.
    Delete { vessel_id: String },
}

#[derive(Args, Debug, Default)]
pub struct VesselFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "type")]
    pub vessel_type: Option<String>,
    #[arg(long = "class")]
    pub vessel_class: Option<String>,
    #[arg(long)]
    pub sin: Option<String>,
    #[arg(long)]
    pub mmsi: Option<String>,
    /// Port of registration.
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long)]
    pub owner_name: Option<String>,
    #[arg(long)]
    pub owner_phone: Option<String>,
    #[arg(long)]
    pub owner_address1: Option<String>,
    #[arg(long)]
    pub owner_address2: Option<String>,
    #[arg(long)]
    pub owner_address3: Option<String>,
    #[arg(long)]
    pub owner_city: Option<String>,
    #[arg(long)]
    pub owner_state: Option<String>,
    #[arg(long)]
    pub owner_post_code: Option<String>,
    #[arg(long)]
    pub owner_country: Option<String>,
}

impl VesselFields {
    fn apply(self, details: &mut VesselDetails) {
        set(&mut details.vessel_name, self.name);
        set(&mut details.vessel_type, self.vessel_type);
        set(&mut details.vessel_class, self.vessel_class);
        set(&mut details.sin, self.sin);
        set(&mut details.mmsi_number, self.mmsi);
        set(&mut details.port_of_registration, self.port);
        let owner = &mut details.owner;
        set(&mut owner.owner_name, self.owner_name);
        set(&mut owner.owner_phone_number, self.owner_phone);
        set(&mut owner.owner_address_line1, self.owner_address1);
        set(&mut owner.owner_address_line2, self.owner_address2);
        set(&mut owner.owner_address_line3, self.owner_address3);
        set(&mut owner.owner_city, self.owner_city);
        set(&mut owner.owner_state, self.owner_state);
        set(&mut owner.owner_post_code, self.owner_post_code);
        set(&mut owner.owner_country, self.owner_country);
    }
}

pub fn run(command: VesselCommand) -> Result<()> {
    let home = super::home()?;
    let registry = VesselRegistry::open_at(&home);

    match command {
        VesselCommand::Create { vessel_id, fields } => {
            let mut details = VesselDetails::default();
            fields.apply(&mut details);
            let record = registry
                .create(VesselId::from(vessel_id), details)
                .context("failed to create vessel")?;
            println!("✓ Registered vessel '{}'", record.vessel_id);
        }
        VesselCommand::Update { vessel_id, fields } => {
            let id = VesselId::from(vessel_id);
            let mut details = registry
                .get(&id)
                .with_context(|| format!("failed to load vessel '{id}'"))?
                .details;
            fields.apply(&mut details);
            registry
                .update_fields(&id, details)
                .with_context(|| format!("failed to update vessel '{id}'"))?;
            println!("✓ Updated vessel '{id}'");
        }
        VesselCommand::Get { vessel_id } => {
            let id = VesselId::from(vessel_id);
            let record = registry
                .get(&id)
                .with_context(|| format!("failed to load vessel '{id}'"))?;
            print_json(&record)?;
        }
        VesselCommand::List { owner, json } => {
            let records = match owner {
                Some(phone) => registry.find_by_owner(&phone),
                None => registry.list_all(),
            }
            .context("failed to list vessels")?;
            if json {
                print_json(&records)?;
            } else {
                print_table(records);
            }
        }
        VesselCommand::Delete { vessel_id } => {
            let id = VesselId::from(vessel_id);
            registry
                .delete(&id)
                .with_context(|| format!("failed to delete vessel '{id}'"))?;
            println!("✓ Deleted vessel '{id}'");
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct VesselRow {
    #[tabled(rename = "vessel")]
    vessel_id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "type")]
    vessel_type: String,
    #[tabled(rename = "owner")]
    owner: String,
    #[tabled(rename = "status")]
    status: String,
}

fn print_table(records: Vec<VesselRecord>) {
    if records.is_empty() {
        println!("No vessels registered.");
        return;
    }
    let rows: Vec<VesselRow> = records
        .into_iter()
        .map(|record| VesselRow {
            vessel_id: record.vessel_id.0,
            name: record.details.vessel_name,
            vessel_type: record.details.vessel_type,
            owner: record.details.owner.owner_name,
            status: status_label(record.booking_status).to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
