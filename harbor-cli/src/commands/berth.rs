//! `harbor berth create|update|get|list|delete`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use harbor_core::{ApproverId, BerthBookingRecord, BerthDetails, BerthRegistry, VesselId};

use super::{print_json, set, status_label};

#[derive(Subcommand, Debug)]
pub enum BerthCommand {
    /// Create the berth booking for a vessel (status starts at New).
    Create {
        vessel_id: String,
        #[command(flatten)]
        fields: BerthFields,
    },
    /// Change attributes of an existing booking. Omitted flags keep their value.
    Update {
        vessel_id: String,
        #[command(flatten)]
        fields: BerthFields,
    },
    /// Show one booking as JSON.
    Get { vessel_id: String },
    /// List bookings in creation order, optionally filtered by one attribute.
    List(ListArgs),
    /// Remove a berth booking.
    Delete { vessel_id: String },
}

#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct ListFilter {
    /// Terminal operator id.
    #[arg(long)]
    pub terminal_operator: Option<String>,
    /// Owner name.
    #[arg(long)]
    pub owner: Option<String>,
    /// Shipping agent reference number.
    #[arg(long)]
    pub shipping_agent: Option<String>,
    /// Approver id.
    #[arg(long)]
    pub approver: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: ListFilter,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct BerthFields {
    #[arg(long)]
    pub vessel_name: Option<String>,
    #[arg(long)]
    pub vessel_type: Option<String>,
    #[arg(long)]
    pub vessel_class: Option<String>,
    #[arg(long)]
    pub shipping_line: Option<String>,
    /// Shipping agent reference number.
    #[arg(long)]
    pub agent_ref: Option<String>,
    #[arg(long)]
    pub arrival_port: Option<String>,
    #[arg(long)]
    pub inbound_voyage: Option<String>,
    #[arg(long)]
    pub outbound_voyage: Option<String>,
    #[arg(long)]
    pub arrive_from: Option<String>,
    #[arg(long)]
    pub terminal: Option<String>,
    #[arg(long)]
    pub remarks: Option<String>,
    #[arg(long)]
    pub rotation: Option<String>,
    /// Terminal operator id.
    #[arg(long = "terminal-operator-id")]
    pub terminal_operator: Option<String>,
    #[arg(long)]
    pub mmsi: Option<String>,
    /// Port of registration.
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long)]
    pub owner_name: Option<String>,
    #[arg(long)]
    pub owner_phone: Option<String>,
}

impl BerthFields {
    fn apply(self, details: &mut BerthDetails) {
        set(&mut details.vessel_name, self.vessel_name);
        set(&mut details.vessel_type, self.vessel_type);
        set(&mut details.vessel_class, self.vessel_class);
        set(&mut details.shipping_line, self.shipping_line);
        set(&mut details.agent_ref_number, self.agent_ref);
        set(&mut details.arrival_port, self.arrival_port);
        set(&mut details.inbound_voyage_no, self.inbound_voyage);
        set(&mut details.outbound_voyage_no, self.outbound_voyage);
        set(&mut details.arrive_from, self.arrive_from);
        set(&mut details.terminal, self.terminal);
        set(&mut details.remarks, self.remarks);
        set(&mut details.rotation_number, self.rotation);
        set(&mut details.terminal_operator_id, self.terminal_operator);
        set(&mut details.mmsi_number, self.mmsi);
        set(&mut details.port_of_registration, self.port);
        set(&mut details.owner_name, self.owner_name);
        set(&mut details.owner_phone_number, self.owner_phone);
    }
}

pub fn run(command: BerthCommand) -> Result<()> {
    let home = super::home()?;
    let registry = BerthRegistry::open_at(&home);

    match command {
        BerthCommand::Create { vessel_id, fields } => {
            let mut details = BerthDetails::default();
            fields.apply(&mut details);
            let record = registry
                .create(VesselId::from(vessel_id), details)
                .context("failed to create berth booking")?;
            println!("✓ Created berth booking for vessel '{}'", record.vessel_id);
        }
        BerthCommand::Update { vessel_id, fields } => {
            let id = VesselId::from(vessel_id);
            let mut details = registry
                .get(&id)
                .with_context(|| format!("failed to load berth booking '{id}'"))?
                .details;
            fields.apply(&mut details);
            registry
                .update_fields(&id, details)
                .with_context(|| format!("failed to update berth booking '{id}'"))?;
            println!("✓ Updated berth booking '{id}'");
        }
        BerthCommand::Get { vessel_id } => {
            let id = VesselId::from(vessel_id);
            let record = registry
                .get(&id)
                .with_context(|| format!("failed to load berth booking '{id}'"))?;
            print_json(&record)?;
        }
        BerthCommand::List(args) => {
            let filter = args.filter;
            let records = if let Some(operator) = filter.terminal_operator {
                registry.find_by_terminal_operator(&operator)
            } else if let Some(owner) = filter.owner {
                registry.find_by_owner(&owner)
            } else if let Some(agent) = filter.shipping_agent {
                registry.find_by_shipping_agent(&agent)
            } else if let Some(approver) = filter.approver {
                registry.find_by_approver(&ApproverId::from(approver))
            } else {
                registry.list_all()
            }
            .context("failed to list berth bookings")?;

            if args.json {
                print_json(&records)?;
            } else {
                print_table(records);
            }
        }
        BerthCommand::Delete { vessel_id } => {
            let id = VesselId::from(vessel_id);
            registry
                .delete(&id)
                .with_context(|| format!("failed to delete berth booking '{id}'"))?;
            println!("✓ Deleted berth booking '{id}'");
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct BerthRow {
    #[tabled(rename = "vessel")]
    vessel_id: String,
    #[tabled(rename = "terminal")]
    terminal: String,
    #[tabled(rename = "operator")]
    operator: String,
    #[tabled(rename = "agent ref")]
    agent: String,
    #[tabled(rename = "approver")]
    approver: String,
    #[tabled(rename = "status")]
    status: String,
}

fn print_table(records: Vec<BerthBookingRecord>) {
    if records.is_empty() {
        println!("No berth bookings.");
        return;
    }
    let rows: Vec<BerthRow> = records
        .into_iter()
        .map(|record| BerthRow {
            vessel_id: record.vessel_id.0,
            terminal: record.details.terminal,
            operator: record.details.terminal_operator_id,
            agent: record.details.agent_ref_number,
            approver: record
                .details
                .approver_id
                .map(|a| a.0)
                .unwrap_or_else(|| "-".to_string()),
            status: status_label(record.booking_status).to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
