use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use stockledger_core::{BatchId, ItemId};
use stockledger_inventory::batch::plan_draws;
use stockledger_inventory::item::ensure_positive;
use stockledger_inventory::serial::{ensure_serial_count, normalize_serials, select_in_stock};
use stockledger_inventory::{
    InventoryError, InventoryItem, InventoryResult, MovementDirection, MovementReference, MovementType,
    ReceiptOrder, SerialNumber, StockMovement,
};

use super::commands::{TransferInventory, TransferOutcome};
use super::{InventoryService, load_item, single, withdraw_draws};
use crate::audit::{AuditEntry, AuditLogger};
use crate::store::{InventoryStore, StoreTx};

pub const TRANSFER_REFERENCE_TYPE: &str = "WAREHOUSE_TRANSFER";

impl<S, A> InventoryService<S, A>
where
    S: InventoryStore,
    A: AuditLogger,
{
    /// Move stock of one SKU to another warehouse.
    ///
    /// Both sides commit together or not at all: the source item, the
    /// destination item (created on first transfer), relocated lots and
    /// serials, and the paired `TRANSFER` movements. Both movements carry
    /// the source's average cost and share one transfer reference.
    #[instrument(
        skip(self, cmd),
        fields(
            item_id = %cmd.item_id,
            from = %cmd.from_warehouse_id,
            to = %cmd.to_warehouse_id,
            quantity = %cmd.quantity
        ),
        err
    )]
    pub fn transfer_inventory(&self, cmd: TransferInventory) -> InventoryResult<TransferOutcome> {
        ensure_positive(cmd.quantity, "quantity")?;
        if cmd.from_warehouse_id == cmd.to_warehouse_id {
            return Err(InventoryError::validation(
                "source and destination warehouses must differ",
            ));
        }
        let serials = normalize_serials(&cmd.serial_numbers)?;

        let outcome = self.config.retry.run("transfer_inventory", || {
            // Resolve the destination first so both sides are locked up
            // front. A destination created concurrently after this read is
            // caught by the commit-time SKU check and retried.
            let destination_id = self.store.read(|tx| {
                let source = load_item(tx, cmd.item_id)?;
                Ok(tx
                    .find_item_by_sku(cmd.to_warehouse_id, &source.sku)?
                    .map(|d| d.id))
            })?;
            let scope: Vec<ItemId> = std::iter::once(cmd.item_id).chain(destination_id).collect();
            debug!(lock_scope = ?scope, "locking transfer scope");

            self.store
                .transaction(&scope, |tx| transfer_in_tx(tx, &cmd, &serials))
        })?;

        info!(
            item_id = %outcome.source.id,
            destination_item_id = %outcome.destination.id,
            destination_created = outcome.destination_created,
            quantity = %cmd.quantity,
            unit_cost = %outcome.outbound.unit_cost,
            "inventory transferred"
        );
        let changes = json!({
            "outbound_movement_id": outcome.outbound.id,
            "inbound_movement_id": outcome.inbound.id,
            "from_warehouse_id": cmd.from_warehouse_id,
            "to_warehouse_id": cmd.to_warehouse_id,
            "quantity": cmd.quantity,
            "unit_cost": outcome.outbound.unit_cost,
            "source_item_id": outcome.source.id,
            "destination_item_id": outcome.destination.id,
            "destination_created": outcome.destination_created,
            "serial_numbers": serials,
        });
        self.record_audit(AuditEntry::new(
            cmd.actor,
            "inventory.transfer",
            "inventory_item",
            outcome.source.id,
            changes,
        ));
        self.refresh_alerts(&[outcome.source.id, outcome.destination.id]);

        Ok(outcome)
    }
}

fn transfer_in_tx(
    tx: &mut dyn StoreTx,
    cmd: &TransferInventory,
    serials: &[String],
) -> InventoryResult<TransferOutcome> {
    let now = Utc::now();
    let mut source = load_item(tx, cmd.item_id)?;
    source.ensure_active()?;
    source.ensure_in_warehouse(cmd.from_warehouse_id)?;
    source.ensure_available(cmd.quantity)?;

    let (mut destination, destination_created) =
        match tx.find_item_by_sku(cmd.to_warehouse_id, &source.sku)? {
            Some(existing) => {
                existing.ensure_active()?;
                ensure_same_tracking(&source, &existing)?;
                existing.ensure_room_for(cmd.quantity)?;
                (existing, false)
            }
            None => (source.counterpart_in(cmd.to_warehouse_id, now), true),
        };
    let unit_cost = source.average_cost();

    let batch_id = if source.track_batches {
        relocate_batches(tx, &source, &destination, cmd.quantity)?
    } else {
        None
    };
    let moved = if source.track_serial {
        relocate_serials(tx, &source, &destination, cmd.quantity, serials)?
    } else if !serials.is_empty() {
        return Err(InventoryError::validation("item does not track serial numbers"));
    } else {
        Vec::new()
    };

    source.apply_outbound(cmd.quantity, now);
    destination.blend_average_cost(cmd.quantity, unit_cost);
    destination.apply_inbound(cmd.quantity, now);
    tx.update_item(&source)?;
    if destination_created {
        tx.insert_item(destination.clone())?;
    } else {
        tx.update_item(&destination)?;
    }

    let reference = MovementReference::new(TRANSFER_REFERENCE_TYPE, Uuid::now_v7().to_string());
    let serial_id = single(&moved).map(|s| s.id);
    let outbound = StockMovement::record(
        MovementType::Transfer,
        MovementDirection::Out,
        source.id,
        cmd.from_warehouse_id,
        cmd.quantity,
        unit_cost,
        now,
    )
    .with_batch(batch_id)
    .with_serial(serial_id)
    .with_reference(Some(&reference))
    .with_notes(cmd.notes.clone())
    .created_by(cmd.actor);
    let inbound = StockMovement::record(
        MovementType::Transfer,
        MovementDirection::In,
        destination.id,
        cmd.to_warehouse_id,
        cmd.quantity,
        unit_cost,
        now,
    )
    .with_serial(serial_id)
    .with_reference(Some(&reference))
    .with_notes(cmd.notes.clone())
    .created_by(cmd.actor);
    tx.append_movement(outbound.clone())?;
    tx.append_movement(inbound.clone())?;

    Ok(TransferOutcome {
        outbound,
        inbound,
        source,
        destination,
        destination_created,
    })
}

/// Both sides of a transfer must keep the same sub-ledgers and costing,
/// otherwise moved units would arrive without lots or serials to back them.
fn ensure_same_tracking(source: &InventoryItem, destination: &InventoryItem) -> InventoryResult<()> {
    let mut mismatched = Vec::new();
    if source.track_batches != destination.track_batches {
        mismatched.push("track_batches");
    }
    if source.track_serial != destination.track_serial {
        mismatched.push("track_serial");
    }
    if source.cost_method != destination.cost_method {
        mismatched.push("cost_method");
    }
    if mismatched.is_empty() {
        return Ok(());
    }
    Err(InventoryError::validation(format!(
        "item {} in warehouse {} differs from item {} in {}",
        destination.sku,
        destination.warehouse_id,
        source.id,
        mismatched.join(", ")
    )))
}

/// Withdraw `quantity` from the source's lots in its receipt order and, when
/// the destination tracks lots, re-create them there with their original
/// identity, cost and dates. Returns the source lot when only one was drawn.
fn relocate_batches(
    tx: &mut dyn StoreTx,
    source: &InventoryItem,
    destination: &InventoryItem,
    quantity: Decimal,
) -> InventoryResult<Option<BatchId>> {
    let order = ReceiptOrder::for_method(source.cost_method);
    let batches = tx.list_active_batches(source.id, order)?;
    let draws = plan_draws(&batches, quantity, order)?;
    let touched = withdraw_draws(tx, &batches, &draws)?;

    if destination.track_batches {
        for (draw, origin) in draws.iter().zip(&touched) {
            match tx.find_batch_by_number(destination.id, &draw.batch_number)? {
                Some(mut existing) if existing.unit_cost == draw.unit_cost => {
                    existing.credit(draw.quantity);
                    tx.update_batch(&existing)?;
                }
                _ => tx.insert_batch(origin.relocated(destination.id, draw.quantity))?,
            }
        }
    }

    Ok(single(&draws).map(|d| d.batch_id))
}

/// Re-point the named in-stock serials from source to destination.
fn relocate_serials(
    tx: &mut dyn StoreTx,
    source: &InventoryItem,
    destination: &InventoryItem,
    quantity: Decimal,
    serials: &[String],
) -> InventoryResult<Vec<SerialNumber>> {
    if serials.is_empty() {
        return Err(InventoryError::validation(
            "serial numbers are required for a serial-tracked item",
        ));
    }
    ensure_serial_count(serials, quantity)?;
    let records = tx.find_serials(serials)?;

    let mut moved = select_in_stock(source.id, serials, &records)?;
    for serial in &mut moved {
        serial.inventory_item_id = destination.id;
        tx.update_serial(serial)?;
    }
    Ok(moved)
}
