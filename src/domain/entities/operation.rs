//! # Operation Entity
//!
//! One validated record of brokerage activity, as read from a statement.
//!
//! An [`Operation`] is built from an [`OperationDraft`] (raw optional
//! fields) through [`Operation::from_draft`], which either yields a fully
//! valid operation or fails with a single error. After construction only
//! the lifecycle flags change, and an operation flagged as duplicate is
//! frozen.
//!
//! # Examples
//!
//! ```
//! use portfolio_ingest::domain::entities::operation::{Operation, OperationDraft};
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let draft = OperationDraft {
//!     direction: Some("Credito".to_string()),
//!     date: NaiveDate::from_ymd_opt(2024, 3, 15),
//!     movement: Some("Compra".to_string()),
//!     product: Some("PETR4".to_string()),
//!     institution: Some("XP INVESTIMENTOS".to_string()),
//!     quantity: Some(Decimal::new(100, 0)),
//!     unit_price: Some(Decimal::new(1050, 2)),
//!     value: Some(Decimal::new(105000, 2)),
//!     original_id: None,
//!     user_id: Some(1),
//! };
//!
//! let operation = Operation::from_draft(draft).unwrap();
//! assert!(operation.is_pending());
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Direction, Money, OperationId, OriginalId, Quantity, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum absolute difference tolerated between the stated value and
/// quantity x unit price.
pub const VALUE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Raw, unvalidated operation fields as produced by an ingestion source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDraft {
    /// Credit/debit label (`Credito`, `Debito`, `Entrada`, `Saída`).
    pub direction: Option<String>,
    /// Settlement date.
    pub date: Option<NaiveDate>,
    /// Movement label, e.g. `Rendimento` or `Transferência - Liquidação`.
    pub movement: Option<String>,
    /// Product code or description.
    pub product: Option<String>,
    /// Institution name.
    pub institution: Option<String>,
    /// Quantity of units.
    pub quantity: Option<Decimal>,
    /// Unit price.
    pub unit_price: Option<Decimal>,
    /// Stated total value.
    pub value: Option<Decimal>,
    /// Identifier in the statement source.
    pub original_id: Option<String>,
    /// Owning user.
    pub user_id: Option<i64>,
}

/// Fully typed snapshot of an operation, used to move operations in and out
/// of storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Store-assigned id, if saved.
    pub id: Option<OperationId>,
    /// Credit or debit.
    pub direction: Direction,
    /// Settlement date.
    pub date: NaiveDate,
    /// Movement label.
    pub movement: String,
    /// Product code.
    pub product: String,
    /// Institution name.
    pub institution: String,
    /// Quantity.
    pub quantity: Quantity,
    /// Unit price.
    pub unit_price: Money,
    /// Stated total value.
    pub value: Money,
    /// Source id.
    pub original_id: Option<OriginalId>,
    /// Owner.
    pub user_id: UserId,
    /// Duplicate flag.
    pub duplicate: bool,
    /// Operation this one duplicates.
    pub duplicate_of: Option<OperationId>,
    /// Consolidated flag.
    pub consolidated: bool,
    /// Soft-delete flag.
    pub deleted: bool,
}

/// A validated brokerage operation.
///
/// # Invariants
///
/// - `|value - quantity x unit_price| <= 0.01`
/// - Movement, product and institution are non-blank
/// - Once `duplicate` is set, no flag changes any more
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    id: Option<OperationId>,
    direction: Direction,
    date: NaiveDate,
    movement: String,
    product: String,
    institution: String,
    quantity: Quantity,
    unit_price: Money,
    value: Money,
    original_id: Option<OriginalId>,
    user_id: UserId,
    duplicate: bool,
    duplicate_of: Option<OperationId>,
    consolidated: bool,
    deleted: bool,
}

fn required<T>(value: Option<T>, field: &str) -> DomainResult<T> {
    value.ok_or_else(|| DomainError::invalid_operation(format!("{field} is required")))
}

fn non_blank(value: Option<String>, field: &str) -> DomainResult<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(DomainError::invalid_operation(format!(
            "{field} must not be blank"
        ))),
    }
}

fn scalar<T>(result: DomainResult<T>) -> DomainResult<T> {
    result.map_err(|e| DomainError::invalid_operation(e.to_string()))
}

impl Operation {
    /// Validates a draft and builds an operation.
    ///
    /// Checks run in a fixed order: presence of date, quantity, unit price,
    /// value and owner; non-blank direction, movement, product and
    /// institution; scalar validity; finally the value consistency check.
    /// The first failure is returned. All flags start cleared.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidOperation` for missing, blank or invalid fields
    /// - `DomainError::ValueMismatch` if the stated value is off by more
    ///   than [`VALUE_TOLERANCE`]
    pub fn from_draft(draft: OperationDraft) -> DomainResult<Self> {
        let date = required(draft.date, "date")?;
        let quantity = required(draft.quantity, "quantity")?;
        let unit_price = required(draft.unit_price, "unit price")?;
        let value = required(draft.value, "value")?;
        let user_id = required(draft.user_id, "user")?;

        let direction = non_blank(draft.direction, "direction")?;
        let movement = non_blank(draft.movement, "movement")?;
        let product = non_blank(draft.product, "product")?;
        let institution = non_blank(draft.institution, "institution")?;

        let quantity = scalar(Quantity::new(quantity))?;
        let unit_price = scalar(Money::new(unit_price))?;
        let value = scalar(Money::new(value))?;
        let user_id = scalar(UserId::new(user_id))?;
        let direction = direction
            .parse::<Direction>()
            .map_err(|e| DomainError::invalid_operation(e.to_string()))?;

        let computed = unit_price.times_quantity(quantity)?;
        if (value.amount() - computed).abs() > VALUE_TOLERANCE {
            return Err(DomainError::ValueMismatch {
                stated: value.amount(),
                computed,
            });
        }

        let original_id = draft
            .original_id
            .filter(|text| !text.trim().is_empty())
            .map(OriginalId::new)
            .transpose()?;

        Ok(Self {
            id: None,
            direction,
            date,
            movement,
            product,
            institution,
            quantity,
            unit_price,
            value,
            original_id,
            user_id,
            duplicate: false,
            duplicate_of: None,
            consolidated: false,
            deleted: false,
        })
    }

    /// Rebuilds an operation from a stored record.
    ///
    /// Stored records were validated when first saved; only the value
    /// consistency check runs again.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValueMismatch` if the record is inconsistent.
    pub fn restore(record: OperationRecord) -> DomainResult<Self> {
        let computed = record.unit_price.times_quantity(record.quantity)?;
        if (record.value.amount() - computed).abs() > VALUE_TOLERANCE {
            return Err(DomainError::ValueMismatch {
                stated: record.value.amount(),
                computed,
            });
        }
        Ok(Self {
            id: record.id,
            direction: record.direction,
            date: record.date,
            movement: record.movement,
            product: record.product,
            institution: record.institution,
            quantity: record.quantity,
            unit_price: record.unit_price,
            value: record.value,
            original_id: record.original_id,
            user_id: record.user_id,
            duplicate: record.duplicate,
            duplicate_of: record.duplicate_of,
            consolidated: record.consolidated,
            deleted: record.deleted,
        })
    }

    /// Returns a storage snapshot of this operation.
    #[must_use]
    pub fn to_record(&self) -> OperationRecord {
        OperationRecord {
            id: self.id,
            direction: self.direction,
            date: self.date,
            movement: self.movement.clone(),
            product: self.product.clone(),
            institution: self.institution.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            value: self.value,
            original_id: self.original_id.clone(),
            user_id: self.user_id,
            duplicate: self.duplicate,
            duplicate_of: self.duplicate_of,
            consolidated: self.consolidated,
            deleted: self.deleted,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the store-assigned id, `None` before the first save.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<OperationId> {
        self.id
    }

    /// Returns the direction.
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the settlement date.
    #[inline]
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the movement label.
    #[inline]
    #[must_use]
    pub fn movement(&self) -> &str {
        &self.movement
    }

    /// Returns the product code.
    #[inline]
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Returns the institution name.
    #[inline]
    #[must_use]
    pub fn institution(&self) -> &str {
        &self.institution
    }

    /// Returns the quantity.
    #[inline]
    #[must_use]
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Returns the unit price.
    #[inline]
    #[must_use]
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// Returns the stated total value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Money {
        self.value
    }

    /// Returns the source id.
    #[inline]
    #[must_use]
    pub fn original_id(&self) -> Option<&OriginalId> {
        self.original_id.as_ref()
    }

    /// Returns the owner.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns true if flagged as duplicate.
    #[inline]
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    /// Returns the id of the operation this one duplicates.
    #[inline]
    #[must_use]
    pub fn duplicate_of(&self) -> Option<OperationId> {
        self.duplicate_of
    }

    /// Returns true once the aggregates have been written.
    #[inline]
    #[must_use]
    pub fn is_consolidated(&self) -> bool {
        self.consolidated
    }

    /// Returns true if soft-deleted.
    #[inline]
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns true if the operation still awaits consolidation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.duplicate && !self.consolidated && !self.deleted
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub(crate) fn set_id(&mut self, id: OperationId) {
        self.id = Some(id);
    }

    fn ensure_mutable(&self) -> DomainResult<()> {
        if self.duplicate {
            return Err(DomainError::DuplicateImmutable);
        }
        Ok(())
    }

    /// Flags this operation as a duplicate of `original`.
    ///
    /// # Errors
    ///
    /// - `DomainError::DuplicateImmutable` if already flagged
    /// - `DomainError::DuplicateWithoutOriginalId` if there is no source id
    pub fn mark_duplicate(&mut self, original: Option<OperationId>) -> DomainResult<()> {
        self.ensure_mutable()?;
        if self.original_id.is_none() {
            return Err(DomainError::DuplicateWithoutOriginalId);
        }
        self.duplicate = true;
        self.duplicate_of = original;
        Ok(())
    }

    /// Flags the operation as consolidated.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateImmutable` for duplicates.
    pub fn mark_consolidated(&mut self) -> DomainResult<()> {
        self.ensure_mutable()?;
        self.consolidated = true;
        Ok(())
    }

    /// Soft-deletes the operation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateImmutable` for duplicates.
    pub fn mark_deleted(&mut self) -> DomainResult<()> {
        self.ensure_mutable()?;
        self.deleted = true;
        Ok(())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation({} {} {} {} x {} = {} user={})",
            self.date,
            self.direction,
            self.movement,
            self.product,
            self.quantity,
            self.value,
            self.user_id
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use proptest::prelude::*;

    pub(crate) fn draft(
        movement: &str,
        quantity: i64,
        price_cents: i64,
        value_cents: i64,
    ) -> OperationDraft {
        OperationDraft {
            direction: Some("Credito".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 15),
            movement: Some(movement.to_string()),
            product: Some("PETR4 - PETROBRAS".to_string()),
            institution: Some("XP INVESTIMENTOS CCTVM S/A".to_string()),
            quantity: Some(Decimal::new(quantity, 0)),
            unit_price: Some(Decimal::new(price_cents, 2)),
            value: Some(Decimal::new(value_cents, 2)),
            original_id: None,
            user_id: Some(1),
        }
    }

    fn message(err: DomainError) -> String {
        err.to_string()
    }

    mod construction {
        use super::*;

        #[test]
        fn builds_consistent_operation() {
            let op = Operation::from_draft(draft("Compra", 100, 1050, 105000)).unwrap();
            assert_eq!(op.direction(), Direction::Credit);
            assert_eq!(op.value(), Money::new(Decimal::new(1050, 0)).unwrap());
            assert!(!op.is_duplicate());
            assert!(!op.is_consolidated());
            assert!(!op.is_deleted());
            assert!(op.id().is_none());
        }

        #[test]
        fn value_mismatch_fails() {
            let err = Operation::from_draft(draft("Compra", 100, 1050, 200000)).unwrap_err();
            assert!(matches!(err, DomainError::ValueMismatch { .. }));
            assert_eq!(err.kind(), ErrorKind::DomainConsistency);
        }

        #[test]
        fn tolerance_is_inclusive() {
            assert!(Operation::from_draft(draft("Compra", 100, 1050, 105001)).is_ok());
            assert!(Operation::from_draft(draft("Compra", 100, 1050, 104999)).is_ok());
            assert!(Operation::from_draft(draft("Compra", 100, 1050, 105002)).is_err());
        }

        #[test]
        fn missing_core_field_reported_first() {
            let mut d = draft("Compra", 100, 1050, 200000);
            d.date = None;
            d.movement = None;
            let err = Operation::from_draft(d).unwrap_err();
            assert!(message(err).contains("date"));
        }

        #[test]
        fn blank_descriptive_field_fails() {
            let mut d = draft("Compra", 100, 1050, 105000);
            d.product = Some("   ".to_string());
            let err = Operation::from_draft(d).unwrap_err();
            assert!(err.is_invalid_operation());
            assert!(message(err).contains("product"));
        }

        #[test]
        fn descriptive_checked_before_scalars() {
            let mut d = draft("Compra", -1, 1050, 105000);
            d.institution = None;
            let err = Operation::from_draft(d).unwrap_err();
            assert!(message(err).contains("institution"));
        }

        #[test]
        fn non_positive_quantity_fails() {
            let err = Operation::from_draft(draft("Compra", 0, 1050, 0)).unwrap_err();
            assert!(matches!(err, DomainError::InvalidOperation(_)));
            assert!(message(err).contains("quantity"));
        }

        #[test]
        fn invalid_user_fails() {
            let mut d = draft("Compra", 1, 100, 100);
            d.user_id = Some(0);
            assert!(Operation::from_draft(d).is_err());
        }

        #[test]
        fn unknown_direction_fails() {
            let mut d = draft("Compra", 1, 100, 100);
            d.direction = Some("Lateral".to_string());
            assert!(Operation::from_draft(d).is_err());
        }

        #[test]
        fn blank_original_id_is_none() {
            let mut d = draft("Compra", 1, 100, 100);
            d.original_id = Some("  ".to_string());
            assert!(Operation::from_draft(d).unwrap().original_id().is_none());
        }
    }

    mod lifecycle {
        use super::*;

        fn with_original() -> Operation {
            let mut d = draft("Compra", 1, 100, 100);
            d.original_id = Some("row-1".to_string());
            Operation::from_draft(d).unwrap()
        }

        #[test]
        fn duplicate_requires_original_id() {
            let mut op = Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap();
            assert_eq!(
                op.mark_duplicate(None).unwrap_err(),
                DomainError::DuplicateWithoutOriginalId
            );
        }

        #[test]
        fn duplicate_freezes_operation() {
            let mut op = with_original();
            op.mark_duplicate(Some(OperationId::new(3))).unwrap();
            assert_eq!(op.duplicate_of(), Some(OperationId::new(3)));
            assert_eq!(op.mark_consolidated().unwrap_err(), DomainError::DuplicateImmutable);
            assert_eq!(op.mark_deleted().unwrap_err(), DomainError::DuplicateImmutable);
            assert_eq!(op.mark_duplicate(None).unwrap_err(), DomainError::DuplicateImmutable);
            assert!(!op.is_pending());
        }

        #[test]
        fn consolidated_is_not_pending() {
            let mut op = with_original();
            op.mark_consolidated().unwrap();
            assert!(!op.is_pending());
        }

        #[test]
        fn record_round_trip_preserves_flags() {
            let mut op = with_original();
            op.set_id(OperationId::new(9));
            op.mark_deleted().unwrap();
            let restored = Operation::restore(op.to_record()).unwrap();
            assert_eq!(restored, op);
        }
    }

    proptest! {
        #[test]
        fn stated_value_within_a_cent_constructs(
            quantity in 1i64..10_000,
            price_cents in 1i64..1_000_000,
            offset in -1i64..=1,
        ) {
            let exact = quantity * price_cents;
            let d = draft("Compra", quantity, price_cents, exact + offset);
            prop_assert!(Operation::from_draft(d).is_ok());
        }

        #[test]
        fn stated_value_beyond_a_cent_fails(
            quantity in 1i64..10_000,
            price_cents in 1i64..1_000_000,
            offset in 2i64..1_000,
        ) {
            let exact = quantity * price_cents;
            let d = draft("Compra", quantity, price_cents, exact + offset);
            let is_mismatch = matches!(
                Operation::from_draft(d),
                Err(DomainError::ValueMismatch { .. })
            );
            prop_assert!(is_mismatch);
        }
    }
}
