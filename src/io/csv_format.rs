//! CSV format handling for scenario commands and state output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvCommand structure for deserialization
//! - Conversion from CSV rows to engine commands
//! - Final-state output serialization
//!
//! All functions are pure (no I/O) for easy testing. The command format is
//! one wide, flexible row shape; which columns a row needs depends on its
//! `command` value:
//!
//! ```text
//! command,kind,entity,actor,listing,quantity,start,end,status,rate_daily,rate_weekly,price_unit,stock,note,payload,signature
//! listing,rental,,10,1,,,,,1500,9000,,,,,
//! create,rental,1,20,1,,2026-03-11T09:00:00Z,2026-03-14T09:00:00Z,,,,,,,,
//! transition,,1,10,,,,,confirmed,,,,,,,
//! pay,,1,20,,,,,,,,,,,,
//! webhook,,,,,,,,,,,,,,"{...}",3f2a...
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{
    Command, EngineError, Inventory, Listing, PaymentRecord, Status, Transactable,
    TransactableId, TransactableKind,
};

/// CSV row structure for deserialization
///
/// Every column except `command` is optional; conversion enforces the
/// per-command requirements.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvCommand {
    pub command: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub listing: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub rate_daily: Option<String>,
    #[serde(default)]
    pub rate_weekly: Option<String>,
    #[serde(default)]
    pub price_unit: Option<String>,
    #[serde(default)]
    pub stock: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

fn require<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, String> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s.trim()),
        _ => Err(format!("missing required field '{}'", field)),
    }
}

fn parse_id(field: &'static str, value: &Option<String>) -> Result<u64, String> {
    let raw = require(field, value)?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {} '{}'", field, raw))
}

fn parse_u32(field: &'static str, value: &Option<String>) -> Result<u32, String> {
    let raw = require(field, value)?;
    raw.parse::<u32>()
        .map_err(|_| format!("invalid {} '{}'", field, raw))
}

fn parse_opt_u32(field: &'static str, value: &Option<String>) -> Result<Option<u32>, String> {
    match value {
        Some(s) if !s.trim().is_empty() => parse_u32(field, value).map(Some),
        _ => Ok(None),
    }
}

fn parse_opt_amount(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<Decimal>, String> {
    match value {
        Some(s) if !s.trim().is_empty() => Decimal::from_str(s.trim())
            .map(Some)
            .map_err(|_| format!("invalid {} '{}'", field, s)),
        _ => Ok(None),
    }
}

fn parse_opt_date(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<DateTime<Utc>>, String> {
    match value {
        Some(s) if !s.trim().is_empty() => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| format!("invalid {} '{}'", field, s)),
        _ => Ok(None),
    }
}

/// Convert a CSV row to an engine command
///
/// Enforces per-command field requirements and parses ids, amounts, dates,
/// and status labels. Returns a message describing the first problem found;
/// the replay logs it and moves on to the next row.
pub fn convert_csv_command(row: CsvCommand) -> Result<Command, String> {
    match row.command.to_lowercase().as_str() {
        "listing" => {
            let kind = require("kind", &row.kind)
                .and_then(|s| TransactableKind::parse(s).ok_or(format!("invalid kind '{}'", s)))?;
            let inventory = match kind {
                TransactableKind::Order => Inventory::Stock {
                    available: parse_u32("stock", &row.stock)?,
                },
                _ => Inventory::Slot { available: true },
            };
            Ok(Command::SeedListing(Listing {
                id: parse_id("listing", &row.listing)?,
                owner: parse_id("actor", &row.actor)?,
                kind,
                inventory,
                unit_price: parse_opt_amount("price_unit", &row.price_unit)?,
                daily_rate: parse_opt_amount("rate_daily", &row.rate_daily)?,
                weekly_rate: parse_opt_amount("rate_weekly", &row.rate_weekly)?,
            }))
        }
        "create" => Ok(Command::Create {
            id: parse_id("entity", &row.entity)?,
            kind: require("kind", &row.kind)
                .and_then(|s| TransactableKind::parse(s).ok_or(format!("invalid kind '{}'", s)))?,
            actor: parse_id("actor", &row.actor)?,
            listing: parse_id("listing", &row.listing)?,
            quantity: parse_opt_u32("quantity", &row.quantity)?,
            start: parse_opt_date("start", &row.start)?,
            end: parse_opt_date("end", &row.end)?,
        }),
        "transition" => Ok(Command::Transition {
            id: parse_id("entity", &row.entity)?,
            actor: parse_id("actor", &row.actor)?,
            requested: require("status", &row.status)
                .and_then(|s| Status::parse(s).ok_or(format!("invalid status '{}'", s)))?,
        }),
        "note" => Ok(Command::Note {
            id: parse_id("entity", &row.entity)?,
            actor: parse_id("actor", &row.actor)?,
            text: require("note", &row.note)?.to_string(),
        }),
        "pay" => Ok(Command::InitiatePayment {
            id: parse_id("entity", &row.entity)?,
            actor: parse_id("actor", &row.actor)?,
        }),
        "webhook" => Ok(Command::Webhook {
            payload: require("payload", &row.payload)?.to_string(),
            signature: require("signature", &row.signature)?.to_string(),
        }),
        other => Err(format!("unknown command '{}'", other)),
    }
}

/// Write final transactable states to CSV
///
/// Columns: entity, kind, status, amount, payment, refund_percent. Rows are
/// sorted by entity id for deterministic output; the payment columns are
/// empty for entities that never initiated payment.
pub fn write_states_csv(
    transactables: &[Transactable],
    payments: &[PaymentRecord],
    output: &mut dyn Write,
) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["entity", "kind", "status", "amount", "payment", "refund_percent"])?;

    let by_id: HashMap<TransactableId, &PaymentRecord> =
        payments.iter().map(|r| (r.transactable, r)).collect();

    let mut sorted = transactables.to_vec();
    sorted.sort_by_key(|t| t.id);

    for transactable in sorted {
        let payment = by_id.get(&transactable.id);
        writer.write_record(&[
            transactable.id.to_string(),
            transactable.kind.label().to_string(),
            transactable.status.label(transactable.kind).to_string(),
            transactable.amount.to_string(),
            payment
                .map(|r| r.status.label().to_string())
                .unwrap_or_default(),
            payment
                .and_then(|r| r.refund_percentage())
                .map(|p| p.to_string())
                .unwrap_or_default(),
        ])?;
    }

    writer
        .flush()
        .map_err(|e| EngineError::IoError {
            message: e.to_string(),
        })?;

    Ok(())
}
