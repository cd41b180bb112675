//! Stock alerts and the evaluator that reconciles them against item state.
//!
//! Alerts are a derived view: `evaluate` is a pure function of the item, its
//! batches and the currently unresolved alerts, returning the transitions a
//! store must apply. Re-running it on unchanged state yields no transitions.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{AlertId, Entity, ItemId};

use crate::batch::Batch;
use crate::item::InventoryItem;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    Overstock,
    Expiring,
    Expired,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::LowStock,
        AlertType::OutOfStock,
        AlertType::Overstock,
        AlertType::Expiring,
        AlertType::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "LOW_STOCK",
            AlertType::OutOfStock => "OUT_OF_STOCK",
            AlertType::Overstock => "OVERSTOCK",
            AlertType::Expiring => "EXPIRING",
            AlertType::Expired => "EXPIRED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: AlertId,
    pub inventory_item_id: ItemId,
    pub alert_type: AlertType,
    pub threshold: Option<Decimal>,
    pub current_quantity: Decimal,
    pub message: String,
    pub is_active: bool,
    pub is_resolved: bool,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Entity for StockAlert {
    type Id = AlertId;

    fn id(&self) -> AlertId {
        self.id
    }
}

impl StockAlert {
    fn raise(item_id: ItemId, signal: &AlertSignal, now: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new(),
            inventory_item_id: item_id,
            alert_type: signal.alert_type,
            threshold: signal.threshold,
            current_quantity: signal.current_quantity,
            message: signal.message.clone(),
            is_active: true,
            is_resolved: false,
            notified: false,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    fn matches_signal(&self, signal: &AlertSignal) -> bool {
        self.threshold == signal.threshold
            && self.current_quantity == signal.current_quantity
            && self.message == signal.message
    }

    fn refresh(&mut self, signal: &AlertSignal, now: DateTime<Utc>) {
        self.threshold = signal.threshold;
        self.current_quantity = signal.current_quantity;
        self.message = signal.message.clone();
        self.is_active = true;
        self.updated_at = now;
    }

    fn resolve(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.is_resolved = true;
        self.resolved_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_open(&self) -> bool {
        !self.is_resolved
    }
}

/// Evaluator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Batches expiring within this window raise `EXPIRING`.
    pub expiry_warning: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            expiry_warning: Duration::days(30),
        }
    }
}

impl AlertPolicy {
    pub fn with_expiry_warning_days(days: i64) -> Self {
        Self {
            expiry_warning: Duration::days(days),
        }
    }
}

/// An alert the current state calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSignal {
    pub alert_type: AlertType,
    pub threshold: Option<Decimal>,
    pub current_quantity: Decimal,
    pub message: String,
}

/// Change a store must persist to bring alerts in line with item state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertTransition {
    /// Insert a new unresolved alert.
    Raise(StockAlert),
    /// Update an existing unresolved alert in place.
    Refresh(StockAlert),
    /// Persist an alert as resolved.
    Resolve(StockAlert),
}

impl AlertTransition {
    pub fn alert(&self) -> &StockAlert {
        match self {
            AlertTransition::Raise(a) | AlertTransition::Refresh(a) | AlertTransition::Resolve(a) => a,
        }
    }
}

/// Alerts that the item and its batches currently warrant.
///
/// Quantity rules are mutually exclusive and checked in priority order:
/// out of stock, then low stock, then overstock. Expiry rules are evaluated
/// independently over active batches. Inactive items warrant nothing.
pub fn desired_alerts(
    item: &InventoryItem,
    batches: &[Batch],
    now: DateTime<Utc>,
    policy: &AlertPolicy,
) -> Vec<AlertSignal> {
    let mut signals = Vec::new();
    if !item.is_active {
        return signals;
    }
    let qty = item.quantity;

    if qty.is_zero() {
        signals.push(AlertSignal {
            alert_type: AlertType::OutOfStock,
            threshold: None,
            current_quantity: qty,
            message: format!("{} ({}) is out of stock", item.name, item.sku),
        });
    } else if qty > Decimal::ZERO && qty <= item.min_stock {
        signals.push(AlertSignal {
            alert_type: AlertType::LowStock,
            threshold: Some(item.min_stock),
            current_quantity: qty,
            message: format!(
                "{} ({}) is at {} {}, at or below the reorder point of {}",
                item.name, item.sku, qty, item.unit, item.min_stock
            ),
        });
    } else if let Some(max) = item.max_stock.filter(|max| qty >= *max) {
        signals.push(AlertSignal {
            alert_type: AlertType::Overstock,
            threshold: Some(max),
            current_quantity: qty,
            message: format!(
                "{} ({}) is at {} {}, at or above the maximum of {}",
                item.name, item.sku, qty, item.unit, max
            ),
        });
    }

    let mut expired: Vec<&Batch> = Vec::new();
    let mut expiring: Vec<&Batch> = Vec::new();
    for batch in batches.iter().filter(|b| b.is_consumable()) {
        if batch.is_expired(now) {
            expired.push(batch);
        } else if batch.expires_within(now, policy.expiry_warning) {
            expiring.push(batch);
        }
    }

    if !expired.is_empty() {
        signals.push(expiry_signal(AlertType::Expired, "expired", &expired));
    }
    if !expiring.is_empty() {
        signals.push(expiry_signal(AlertType::Expiring, "expiring soon", &expiring));
    }

    signals
}

fn expiry_signal(alert_type: AlertType, label: &str, batches: &[&Batch]) -> AlertSignal {
    let mut numbers: Vec<&str> = batches.iter().map(|b| b.batch_number.as_str()).collect();
    numbers.sort_unstable();
    AlertSignal {
        alert_type,
        threshold: None,
        current_quantity: batches.iter().map(|b| b.quantity).sum(),
        message: format!("{} batch(es) {}: {}", numbers.len(), label, numbers.join(", ")),
    }
}

/// Reconcile desired alerts against the item's unresolved alerts.
///
/// - a desired type with an open alert is refreshed when its content changed
/// - a desired type without one is raised
/// - an open alert whose type is no longer desired is resolved
/// - duplicate open alerts of one type are collapsed onto the oldest
pub fn evaluate(
    item: &InventoryItem,
    batches: &[Batch],
    unresolved: &[StockAlert],
    now: DateTime<Utc>,
    policy: &AlertPolicy,
) -> Vec<AlertTransition> {
    let desired = desired_alerts(item, batches, now, policy);
    let mut transitions = Vec::new();

    for alert_type in AlertType::ALL {
        let mut open: Vec<&StockAlert> = unresolved
            .iter()
            .filter(|a| a.inventory_item_id == item.id && a.alert_type == alert_type && a.is_open())
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let signal = desired.iter().find(|s| s.alert_type == alert_type);
        let extra: &[&StockAlert] = match (signal, open.split_first()) {
            (Some(signal), Some((first, rest))) => {
                if !first.matches_signal(signal) {
                    let mut updated = (*first).clone();
                    updated.refresh(signal, now);
                    transitions.push(AlertTransition::Refresh(updated));
                }
                rest
            }
            (Some(signal), None) => {
                transitions.push(AlertTransition::Raise(StockAlert::raise(item.id, signal, now)));
                &[]
            }
            (None, _) => &open,
        };

        for stale in extra {
            let mut resolved = (*stale).clone();
            resolved.resolve(now);
            transitions.push(AlertTransition::Resolve(resolved));
        }
    }

    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchReceipt;
    use crate::item::NewItem;
    use rust_decimal_macros::dec;
    use stockledger_core::WarehouseId;

    fn item(qty: Decimal, min: Decimal, max: Option<Decimal>) -> InventoryItem {
        let mut item = InventoryItem::create(
            NewItem::new("SKU-1", "Widget", WarehouseId::new()).with_stock_levels(min, max),
            Utc::now(),
        )
        .unwrap();
        item.quantity = qty;
        item
    }

    fn apply(open: &mut Vec<StockAlert>, transitions: &[AlertTransition]) {
        for t in transitions {
            let alert = t.alert().clone();
            open.retain(|a| a.id != alert.id);
            if alert.is_open() {
                open.push(alert);
            }
        }
    }

    fn types(transitions: &[AlertTransition]) -> Vec<(&'static str, AlertType)> {
        transitions
            .iter()
            .map(|t| match t {
                AlertTransition::Raise(a) => ("raise", a.alert_type),
                AlertTransition::Refresh(a) => ("refresh", a.alert_type),
                AlertTransition::Resolve(a) => ("resolve", a.alert_type),
            })
            .collect()
    }

    #[test]
    fn zero_quantity_raises_out_of_stock() {
        let now = Utc::now();
        let t = evaluate(&item(dec!(0), dec!(5), None), &[], &[], now, &AlertPolicy::default());
        assert_eq!(types(&t), vec![("raise", AlertType::OutOfStock)]);
    }

    #[test]
    fn low_stock_carries_reorder_point_as_threshold() {
        let now = Utc::now();
        let t = evaluate(&item(dec!(5), dec!(5), None), &[], &[], now, &AlertPolicy::default());
        assert_eq!(types(&t), vec![("raise", AlertType::LowStock)]);
        assert_eq!(t[0].alert().threshold, Some(dec!(5)));
    }

    #[test]
    fn overstock_at_maximum() {
        let now = Utc::now();
        let t = evaluate(&item(dec!(100), dec!(5), Some(dec!(100))), &[], &[], now, &AlertPolicy::default());
        assert_eq!(types(&t), vec![("raise", AlertType::Overstock)]);
    }

    #[test]
    fn healthy_band_resolves_quantity_alerts() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let mut open = Vec::new();
        let mut it = item(dec!(0), dec!(5), Some(dec!(50)));
        let initial = evaluate(&it, &[], &open, now, &policy);
        apply(&mut open, &initial);
        assert_eq!(open.len(), 1);

        it.quantity = dec!(20);
        let t = evaluate(&it, &[], &open, now, &policy);
        assert_eq!(types(&t), vec![("resolve", AlertType::OutOfStock)]);
        assert!(t[0].alert().resolved_at.is_some());
    }

    #[test]
    fn reevaluating_unchanged_state_is_a_no_op() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let low = item(dec!(3), dec!(5), None);
        let mut open = Vec::new();

        let initial = evaluate(&low, &[], &open, now, &policy);
        apply(&mut open, &initial);
        let again = evaluate(&low, &[], &open, now, &policy);

        assert!(again.is_empty());
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn changed_quantity_refreshes_instead_of_duplicating() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let mut open = Vec::new();
        let mut it = item(dec!(4), dec!(5), None);
        let initial = evaluate(&it, &[], &open, now, &policy);
        apply(&mut open, &initial);

        it.quantity = dec!(2);
        let t = evaluate(&it, &[], &open, now, &policy);

        assert_eq!(types(&t), vec![("refresh", AlertType::LowStock)]);
        assert_eq!(t[0].alert().id, open[0].id);
        assert_eq!(t[0].alert().current_quantity, dec!(2));
    }

    #[test]
    fn moving_from_low_to_out_swaps_alerts() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let mut open = Vec::new();
        let mut it = item(dec!(2), dec!(5), None);
        let initial = evaluate(&it, &[], &open, now, &policy);
        apply(&mut open, &initial);

        it.quantity = dec!(0);
        let t = evaluate(&it, &[], &open, now, &policy);

        assert_eq!(
            types(&t),
            vec![("resolve", AlertType::LowStock), ("raise", AlertType::OutOfStock)]
        );
    }

    #[test]
    fn duplicate_open_alerts_collapse_to_one() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let it = item(dec!(0), dec!(5), None);
        let mut open = Vec::new();
        let initial = evaluate(&it, &[], &open, now, &policy);
        apply(&mut open, &initial);
        let mut dup = open[0].clone();
        dup.id = AlertId::new();
        dup.created_at = now + Duration::seconds(1);
        open.push(dup.clone());

        let t = evaluate(&it, &[], &open, now, &policy);

        assert_eq!(types(&t), vec![("resolve", AlertType::OutOfStock)]);
        assert_eq!(t[0].alert().id, dup.id);
    }

    #[test]
    fn expiry_rules_follow_active_batches() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let it = item(dec!(30), dec!(5), None);
        let expired = Batch::receive(
            it.id,
            &BatchReceipt::new("OLD").expiring_on(now - Duration::days(1)),
            dec!(10),
            dec!(1),
            now,
        )
        .unwrap();
        let soon = Batch::receive(
            it.id,
            &BatchReceipt::new("SOON").expiring_on(now + Duration::days(10)),
            dec!(10),
            dec!(1),
            now,
        )
        .unwrap();
        let later = Batch::receive(
            it.id,
            &BatchReceipt::new("LATER").expiring_on(now + Duration::days(90)),
            dec!(10),
            dec!(1),
            now,
        )
        .unwrap();

        let t = evaluate(&it, &[expired.clone(), soon, later], &[], now, &policy);

        assert_eq!(
            types(&t),
            vec![("raise", AlertType::Expiring), ("raise", AlertType::Expired)]
        );

        let mut depleted = expired;
        depleted.withdraw(dec!(10)).unwrap();
        let signals = desired_alerts(&it, &[depleted], now, &policy);
        assert!(signals.is_empty());
    }

    #[test]
    fn deactivated_item_resolves_everything() {
        let now = Utc::now();
        let policy = AlertPolicy::default();
        let mut it = item(dec!(0), dec!(5), None);
        let open: Vec<StockAlert> = evaluate(&it, &[], &[], now, &policy)
            .iter()
            .map(|t| t.alert().clone())
            .collect();

        it.is_active = false;
        let t = evaluate(&it, &[], &open, now, &policy);
        assert_eq!(types(&t), vec![("resolve", AlertType::OutOfStock)]);
    }
}
