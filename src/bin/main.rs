// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tranche_ledger::math::{amount_from_decimal, amount_to_decimal, ratio_to_decimal};
use tranche_ledger::{
    Engine, Event, EventKind, FacilityId, FacilityState, PositionId, ProtocolConfig, TrancheKind,
};

/// Tranche Ledger - Replay facility and pool events from a CSV file
///
/// Applies events in file order and writes the requested report to stdout.
#[derive(Parser, Debug)]
#[command(name = "tranche-ledger")]
#[command(about = "Replays tranched lending events and reports ledger state", long_about = None)]
struct Args {
    /// Protocol configuration (TOML). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report written to stdout after all events are applied
    #[arg(short, long, value_enum, default_value_t = Report::Facilities)]
    report: Report,

    /// Path to CSV file with events
    ///
    /// Expected format: type,tx,time,actor,facility,tranche,position,amount
    #[arg(value_name = "EVENTS")]
    input: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Facilities,
    Positions,
    Pool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match ProtocolConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => ProtocolConfig::default(),
    };

    let engine = match Engine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Invalid config: {}", e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            log::error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = process_events(&engine, BufReader::new(file)) {
        log::error!("Error processing events: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_report(&engine, args.report, std::io::stdout()) {
        log::error!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    event_type: String,
    tx: u64,
    time: u64,
    actor: u16,
    #[serde(deserialize_with = "csv::invalid_option")]
    facility: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    tranche: Option<TrancheKind>,
    #[serde(deserialize_with = "csv::invalid_option")]
    position: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
}

impl CsvRecord {
    /// Converts a CSV record to an [`Event`].
    ///
    /// Returns `None` for unknown event types or missing required fields.
    fn into_event(self) -> Option<Event> {
        let facility = || self.facility.map(FacilityId);
        let position = || self.position.map(PositionId);
        let amount = || self.amount.and_then(amount_from_decimal);

        let kind = match self.event_type.to_lowercase().as_str() {
            "deposit" => EventKind::Deposit {
                facility: facility()?,
                tranche: self.tranche?,
                amount: amount()?,
            },
            "withdraw" => EventKind::Withdraw {
                facility: facility()?,
                position: position()?,
                amount: amount()?,
            },
            "withdraw_max" => EventKind::WithdrawMax {
                facility: facility()?,
                position: position()?,
            },
            "close" => EventKind::ClosePosition {
                facility: facility()?,
                position: position()?,
            },
            "lock_junior" => EventKind::LockJunior { facility: facility()? },
            "lock_pool" => EventKind::LockPool { facility: facility()? },
            "drawdown" => EventKind::Drawdown {
                facility: facility()?,
                amount: amount()?,
            },
            "pay" => EventKind::Pay {
                facility: facility()?,
                amount: amount()?,
            },
            "reopen" => EventKind::Reopen { facility: facility()? },
            "pause_facility" => EventKind::PauseFacility { facility: facility()? },
            "unpause_facility" => EventKind::UnpauseFacility { facility: facility()? },
            "pool_deposit" => EventKind::PoolDeposit { amount: amount()? },
            "pool_withdraw" => EventKind::PoolWithdraw { amount: amount()? },
            "pool_withdraw_shares" => EventKind::PoolWithdrawShares { shares: amount()? },
            "invest" => EventKind::Invest { facility: facility()? },
            "redeem" => EventKind::Redeem { position: position()? },
            "writedown" => EventKind::Writedown { position: position()? },
            "pause_pool" => EventKind::PausePool,
            "unpause_pool" => EventKind::UnpausePool,
            _ => return None,
        };
        Some(Event::new(self.tx, self.actor, self.time, kind))
    }
}

/// Applies events from a CSV reader to `engine`.
///
/// Streams the input, so file size is not bounded by memory. Malformed
/// rows and rejected events are logged and skipped.
///
/// # CSV Format
///
/// Columns: `type, tx, time, actor, facility, tranche, position, amount`
/// - `type`: event type (`deposit`, `lock_junior`, `pay`, `pool_deposit`, ...)
/// - `tx`: unique event ID (u64)
/// - `time`: seconds, never decreasing
/// - `actor`: acting party (u16)
/// - `facility`, `tranche`, `position`, `amount`: as the event requires
///
/// ```csv
/// type,tx,time,actor,facility,tranche,position,amount
/// deposit,1,0,20,0,junior,,20.0
/// lock_junior,2,0,10,0,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
fn process_events<R: Read>(engine: &Engine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping malformed row: {}", e);
                continue;
            }
        };
        let Some(event) = record.into_event() else {
            log::warn!("Skipping invalid event record");
            continue;
        };
        if let Err(e) = engine.process(event) {
            log::warn!("Skipping event {}: {}", event.id, e);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FacilityRow {
    facility: FacilityId,
    state: FacilityState,
    cycles: usize,
    limit: Decimal,
    balance: Decimal,
    interest_owed: Decimal,
    principal_owed: Decimal,
    days_late: u64,
    senior_deposited: Decimal,
    junior_deposited: Decimal,
    senior_interest_share_price: Decimal,
    junior_interest_share_price: Decimal,
    reserve_collected: Decimal,
}

#[derive(Debug, Serialize)]
struct PositionRow {
    position: PositionId,
    owner: u16,
    facility: FacilityId,
    tranche: TrancheKind,
    cycle: usize,
    principal: Decimal,
    principal_redeemed: Decimal,
    interest_redeemed: Decimal,
    available_interest: Decimal,
    available_principal: Decimal,
}

#[derive(Debug, Serialize)]
struct PoolRow {
    share_price: Decimal,
    total_shares: Decimal,
    assets: Decimal,
    idle: Decimal,
    loans_outstanding: Decimal,
    written_down: Decimal,
    reserve: Decimal,
}

/// Writes the selected report as CSV.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_report<W: Write>(engine: &Engine, report: Report, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    match report {
        Report::Facilities => {
            for status in engine.facilities() {
                wtr.serialize(FacilityRow {
                    facility: status.id,
                    state: status.state,
                    cycles: status.cycles,
                    limit: amount_to_decimal(status.limit),
                    balance: amount_to_decimal(status.balance),
                    interest_owed: amount_to_decimal(status.interest_owed),
                    principal_owed: amount_to_decimal(status.principal_owed),
                    days_late: status.days_late,
                    senior_deposited: amount_to_decimal(status.senior.principal_deposited()),
                    junior_deposited: amount_to_decimal(status.junior.principal_deposited()),
                    senior_interest_share_price: ratio_to_decimal(status.senior.interest_share_price()),
                    junior_interest_share_price: ratio_to_decimal(status.junior.interest_share_price()),
                    reserve_collected: amount_to_decimal(status.reserve_collected),
                })?;
            }
        }
        Report::Positions => {
            let positions = engine
                .positions()
                .map_err(|e| csv::Error::from(std::io::Error::other(e)))?;
            for status in positions {
                let p = status.position;
                wtr.serialize(PositionRow {
                    position: p.id,
                    owner: p.owner.0,
                    facility: p.facility,
                    tranche: p.tranche,
                    cycle: p.cycle,
                    principal: amount_to_decimal(p.principal_amount),
                    principal_redeemed: amount_to_decimal(p.principal_redeemed),
                    interest_redeemed: amount_to_decimal(p.interest_redeemed),
                    available_interest: amount_to_decimal(status.available.interest),
                    available_principal: amount_to_decimal(status.available.principal),
                })?;
            }
        }
        Report::Pool => {
            let pool = engine.pool_status();
            wtr.serialize(PoolRow {
                share_price: ratio_to_decimal(pool.share_price),
                total_shares: amount_to_decimal(pool.total_shares),
                assets: amount_to_decimal(pool.assets),
                idle: amount_to_decimal(pool.idle),
                loans_outstanding: amount_to_decimal(pool.total_loans_outstanding),
                written_down: amount_to_decimal(pool.total_written_down),
                reserve: amount_to_decimal(engine.reserve()),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}
