use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};

use stockledger_inventory::batch::plan_draws;
use stockledger_inventory::item::{ensure_positive, ensure_unit_cost};
use stockledger_inventory::serial::{ensure_serial_count, normalize_serials, select_in_stock};
use stockledger_inventory::{
    Batch, BatchReceipt, InventoryError, InventoryItem, InventoryResult, MovementDirection, MovementType,
    ReceiptOrder, SerialNumber, StockMovement, calculate_cost,
};

use super::commands::{
    AdjustInventory, AdjustmentOutcome, IssueInventory, IssueOutcome, ReceiptOutcome, ReceiveInventory,
};
use super::{InventoryService, load_item, single, withdraw_draws};
use crate::audit::{AuditEntry, AuditLogger};
use crate::store::{InventoryStore, StoreTx};

impl<S, A> InventoryService<S, A>
where
    S: InventoryStore,
    A: AuditLogger,
{
    /// Receive purchased stock: blends the average cost, records the last
    /// purchase cost, opens a lot and serial records where the item tracks
    /// them, and appends one `PURCHASE` movement.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id, quantity = %cmd.quantity), err)]
    pub fn receive_inventory(&self, cmd: ReceiveInventory) -> InventoryResult<ReceiptOutcome> {
        ensure_positive(cmd.quantity, "quantity")?;
        ensure_unit_cost(cmd.unit_cost, "unit_cost")?;
        let serials = normalize_serials(&cmd.serial_numbers)?;

        let outcome = self.write("receive_inventory", &[cmd.item_id], |tx| {
            let now = Utc::now();
            let mut item = load_item(tx, cmd.item_id)?;
            item.ensure_active()?;
            item.ensure_in_warehouse(cmd.warehouse_id)?;
            item.ensure_room_for(cmd.quantity)?;

            let batch = match (&cmd.batch, item.track_batches) {
                (Some(receipt), true) => {
                    if tx
                        .find_batch_by_number(item.id, receipt.batch_number.trim())?
                        .is_some()
                    {
                        return Err(InventoryError::validation(format!(
                            "batch {} was already received for item {}",
                            receipt.batch_number.trim(),
                            item.id
                        )));
                    }
                    Some(Batch::receive(item.id, receipt, cmd.quantity, cmd.unit_cost, now)?)
                }
                (None, true) => {
                    return Err(InventoryError::validation(
                        "batch details are required for a batch-tracked item",
                    ));
                }
                (Some(_), false) => {
                    return Err(InventoryError::validation("item does not track batches"));
                }
                (None, false) => None,
            };

            let serial_records = if item.track_serial {
                ensure_serial_count(&serials, cmd.quantity)?;
                new_serials(tx, &item, &serials, cmd.unit_cost, now)?
            } else if !serials.is_empty() {
                return Err(InventoryError::validation("item does not track serial numbers"));
            } else {
                Vec::new()
            };

            item.apply_receipt(cmd.quantity, cmd.unit_cost, now);
            tx.update_item(&item)?;
            if let Some(batch) = &batch {
                tx.insert_batch(batch.clone())?;
            }

            let movement = StockMovement::record(
                MovementType::Purchase,
                MovementDirection::In,
                item.id,
                item.warehouse_id,
                cmd.quantity,
                cmd.unit_cost,
                now,
            )
            .with_batch(batch.as_ref().map(|b| b.id))
            .with_serial(single(&serial_records).map(|s| s.id))
            .with_reference(cmd.reference.as_ref())
            .with_notes(cmd.notes.clone())
            .created_by(cmd.actor);
            tx.append_movement(movement.clone())?;

            Ok(ReceiptOutcome {
                movement,
                item,
                batch,
                serials: serial_records,
            })
        })?;

        info!(
            movement_id = %outcome.movement.id,
            item_id = %outcome.item.id,
            quantity = %cmd.quantity,
            unit_cost = %cmd.unit_cost,
            on_hand = %outcome.item.quantity,
            "inventory received"
        );
        self.record_audit(AuditEntry::new(
            cmd.actor,
            "inventory.receive",
            "inventory_item",
            outcome.item.id,
            json!({
                "movement_id": outcome.movement.id,
                "quantity": cmd.quantity,
                "unit_cost": cmd.unit_cost,
                "quantity_after": outcome.item.quantity,
                "avg_cost_after": outcome.item.avg_cost,
                "batch_id": outcome.batch.as_ref().map(|b| b.id),
                "serial_numbers": serials,
            }),
        ));
        self.refresh_alerts(&[outcome.item.id]);

        Ok(outcome)
    }

    /// Issue stock: prices the quantity with the valuation engine, depletes
    /// exactly the lots or serials it priced, and appends one `SALE`
    /// movement carrying the computed cost.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id, quantity = %cmd.quantity), err)]
    pub fn issue_inventory(&self, cmd: IssueInventory) -> InventoryResult<IssueOutcome> {
        ensure_positive(cmd.quantity, "quantity")?;
        let serials = normalize_serials(&cmd.serial_numbers)?;

        let outcome = self.write("issue_inventory", &[cmd.item_id], |tx| {
            let now = Utc::now();
            let mut item = load_item(tx, cmd.item_id)?;
            item.ensure_active()?;
            item.ensure_in_warehouse(cmd.warehouse_id)?;
            match (item.track_serial, serials.is_empty()) {
                (true, true) => {
                    return Err(InventoryError::validation(
                        "serial numbers are required for a serial-tracked item",
                    ));
                }
                (false, false) => {
                    return Err(InventoryError::validation("item does not track serial numbers"));
                }
                _ => {}
            }
            item.ensure_available(cmd.quantity)?;

            let order = ReceiptOrder::for_method(item.cost_method);
            let batches = if item.track_batches {
                tx.list_active_batches(item.id, order)?
            } else {
                Vec::new()
            };
            let serial_records = if serials.is_empty() {
                Vec::new()
            } else {
                tx.find_serials(&serials)?
            };

            let cost = calculate_cost(&item, cmd.quantity, Some(serials.as_slice()), &batches, &serial_records)?;

            // Lots priced by the engine are the lots consumed; otherwise the
            // sub-ledger is still depleted in the item's receipt order.
            let draws = if !item.track_batches {
                Vec::new()
            } else if cost.batch_draws.is_empty() {
                plan_draws(&batches, cmd.quantity, order)?
            } else {
                cost.batch_draws.clone()
            };
            withdraw_draws(tx, &batches, &draws)?;

            for serial in &cost.serials {
                let mut sold = serial.clone();
                sold.mark_sold(now)?;
                tx.update_serial(&sold)?;
            }

            item.apply_outbound(cmd.quantity, now);
            tx.update_item(&item)?;

            let movement = StockMovement::record(
                MovementType::Sale,
                MovementDirection::Out,
                item.id,
                item.warehouse_id,
                cmd.quantity,
                cost.unit_cost,
                now,
            )
            .with_total_cost(cost.total_cost)
            .with_batch(single(&draws).map(|d| d.batch_id))
            .with_serial(single(&cost.serials).map(|s| s.id))
            .with_reference(cmd.reference.as_ref())
            .with_notes(cmd.notes.clone())
            .created_by(cmd.actor);
            tx.append_movement(movement.clone())?;

            Ok(IssueOutcome { movement, cost, item })
        })?;

        info!(
            movement_id = %outcome.movement.id,
            item_id = %outcome.item.id,
            quantity = %cmd.quantity,
            method = %outcome.cost.method,
            total_cost = %outcome.cost.total_cost,
            on_hand = %outcome.item.quantity,
            "inventory issued"
        );
        self.record_audit(AuditEntry::new(
            cmd.actor,
            "inventory.issue",
            "inventory_item",
            outcome.item.id,
            json!({
                "movement_id": outcome.movement.id,
                "quantity": cmd.quantity,
                "cost_method": outcome.cost.method,
                "total_cost": outcome.cost.total_cost,
                "quantity_after": outcome.item.quantity,
                "batches": outcome.cost.batch_draws,
                "serial_numbers": serials,
            }),
        ));
        self.refresh_alerts(&[outcome.item.id]);

        Ok(outcome)
    }

    /// Correct on-hand stock by a signed delta. Stock never goes below zero;
    /// added units blend into the average only when their cost is given.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id, delta = %cmd.delta), err)]
    pub fn adjust_inventory(&self, cmd: AdjustInventory) -> InventoryResult<AdjustmentOutcome> {
        if cmd.delta.is_zero() {
            return Err(InventoryError::validation("adjustment delta cannot be zero"));
        }
        ensure_positive(cmd.delta.abs(), "delta")?;
        if cmd.reason.trim().is_empty() {
            return Err(InventoryError::validation("adjustment reason is required"));
        }
        if let Some(cost) = cmd.unit_cost {
            ensure_unit_cost(cost, "unit_cost")?;
        }
        let serials = normalize_serials(&cmd.serial_numbers)?;

        let outcome = self.write("adjust_inventory", &[cmd.item_id], |tx| {
            let now = Utc::now();
            let mut item = load_item(tx, cmd.item_id)?;
            item.ensure_active()?;
            item.ensure_in_warehouse(cmd.warehouse_id)?;
            if item.quantity + cmd.delta < Decimal::ZERO {
                return Err(InventoryError::NegativeStockRejected {
                    current: item.quantity,
                    delta: cmd.delta,
                });
            }
            if cmd.delta > Decimal::ZERO {
                item.ensure_room_for(cmd.delta)?;
            }
            if cmd.batch_number.is_some() && !item.track_batches {
                return Err(InventoryError::validation("item does not track batches"));
            }

            let magnitude = cmd.delta.abs();
            let unit_cost = cmd.unit_cost.unwrap_or_else(|| item.average_cost());
            let serial_records = adjust_serials(tx, &item, cmd.delta, &serials, unit_cost, now)?;
            let batches = if item.track_batches {
                adjust_batches(tx, &item, &cmd, unit_cost, now)?
            } else {
                Vec::new()
            };

            let direction = if cmd.delta > Decimal::ZERO {
                if let Some(cost) = cmd.unit_cost {
                    item.blend_average_cost(magnitude, cost);
                }
                item.apply_inbound(magnitude, now);
                MovementDirection::In
            } else {
                item.apply_outbound(magnitude, now);
                MovementDirection::Out
            };
            tx.update_item(&item)?;

            let movement = StockMovement::record(
                MovementType::Adjustment,
                direction,
                item.id,
                item.warehouse_id,
                magnitude,
                unit_cost,
                now,
            )
            .with_batch(single(&batches).map(|b| b.id))
            .with_serial(single(&serial_records).map(|s| s.id))
            .with_notes(Some(cmd.reason.clone()))
            .created_by(cmd.actor);
            tx.append_movement(movement.clone())?;

            Ok(AdjustmentOutcome {
                movement,
                item,
                batches,
                serials: serial_records,
            })
        })?;

        info!(
            movement_id = %outcome.movement.id,
            item_id = %outcome.item.id,
            delta = %cmd.delta,
            on_hand = %outcome.item.quantity,
            reason = %cmd.reason,
            "inventory adjusted"
        );
        self.record_audit(AuditEntry::new(
            cmd.actor,
            "inventory.adjust",
            "inventory_item",
            outcome.item.id,
            json!({
                "movement_id": outcome.movement.id,
                "delta": cmd.delta,
                "reason": cmd.reason,
                "unit_cost": cmd.unit_cost,
                "quantity_after": outcome.item.quantity,
                "avg_cost_after": outcome.item.avg_cost,
                "serial_numbers": serials,
            }),
        ));
        self.refresh_alerts(&[outcome.item.id]);

        Ok(outcome)
    }
}

/// Create and store serial records for `numbers`, none of which may exist yet.
fn new_serials(
    tx: &mut dyn StoreTx,
    item: &InventoryItem,
    numbers: &[String],
    unit_cost: Decimal,
    now: DateTime<Utc>,
) -> InventoryResult<Vec<SerialNumber>> {
    let taken: Vec<String> = tx
        .find_serials(numbers)?
        .into_iter()
        .map(|s| s.serial_number)
        .collect();
    if !taken.is_empty() {
        return Err(InventoryError::validation(format!(
            "serial numbers already exist: {}",
            taken.join(", ")
        )));
    }
    let records = numbers
        .iter()
        .map(|number| SerialNumber::receive(item.id, number, unit_cost, now))
        .collect::<InventoryResult<Vec<_>>>()?;
    for serial in &records {
        tx.insert_serial(serial.clone())?;
    }
    Ok(records)
}

/// Mirror an adjustment in the serial sub-ledger: one named serial per unit,
/// created on increases and written off on decreases.
fn adjust_serials(
    tx: &mut dyn StoreTx,
    item: &InventoryItem,
    delta: Decimal,
    serials: &[String],
    unit_cost: Decimal,
    now: DateTime<Utc>,
) -> InventoryResult<Vec<SerialNumber>> {
    if !item.track_serial {
        if !serials.is_empty() {
            return Err(InventoryError::validation("item does not track serial numbers"));
        }
        return Ok(Vec::new());
    }
    if serials.is_empty() {
        return Err(InventoryError::validation(
            "serial numbers are required for a serial-tracked item",
        ));
    }
    ensure_serial_count(serials, delta.abs())?;

    if delta > Decimal::ZERO {
        return new_serials(tx, item, serials, unit_cost, now);
    }
    let records = tx.find_serials(serials)?;
    let mut removed = select_in_stock(item.id, serials, &records)?;
    for serial in &mut removed {
        serial.write_off(now)?;
        tx.update_serial(serial)?;
    }
    Ok(removed)
}

/// Mirror an adjustment in the lot sub-ledger.
///
/// Increases credit the named lot (opening it if unknown) or open a fresh
/// adjustment lot. Decreases debit the named lot, or walk lots in the item's
/// receipt order.
fn adjust_batches(
    tx: &mut dyn StoreTx,
    item: &InventoryItem,
    cmd: &AdjustInventory,
    unit_cost: Decimal,
    now: DateTime<Utc>,
) -> InventoryResult<Vec<Batch>> {
    let magnitude = cmd.delta.abs();
    let named = cmd
        .batch_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    if cmd.delta > Decimal::ZERO {
        let existing = match named {
            Some(number) => tx.find_batch_by_number(item.id, number)?,
            None => None,
        };
        let batch = match existing {
            Some(mut batch) => {
                batch.credit(magnitude);
                tx.update_batch(&batch)?;
                batch
            }
            None => {
                let number = named
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("ADJ-{}", now.format("%Y%m%d-%H%M%S%3f")));
                let batch = Batch::receive(item.id, &BatchReceipt::new(number), magnitude, unit_cost, now)?;
                tx.insert_batch(batch.clone())?;
                batch
            }
        };
        return Ok(vec![batch]);
    }

    match named {
        Some(number) => {
            let mut batch = tx
                .find_batch_by_number(item.id, number)?
                .ok_or_else(|| InventoryError::validation(format!("batch {number} not found for item {}", item.id)))?;
            batch.withdraw(magnitude)?;
            tx.update_batch(&batch)?;
            Ok(vec![batch])
        }
        None => {
            let order = ReceiptOrder::for_method(item.cost_method);
            let batches = tx.list_active_batches(item.id, order)?;
            let draws = plan_draws(&batches, magnitude, order)?;
            withdraw_draws(tx, &batches, &draws)
        }
    }
}
