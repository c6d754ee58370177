//! Input validation for orders and fulfillment links.
//!
//! Inputs arrive loosely typed (form values, JSON bodies): quantities may be
//! numbers or numeric strings. Each `validate_*` function checks the whole
//! input at once, so every failing field is reported together, and returns
//! a strongly typed record ready for the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// Unit used when an order is submitted without one.
pub const DEFAULT_UNIT: &str = "mtrs";

/// Total significant digits of a stored quantity or rate.
pub const QUANTITY_PRECISION: u32 = 15;

/// Digits after the decimal point of a stored quantity or rate.
pub const QUANTITY_SCALE: u32 = 4;

/// True when `value` fits a `NUMERIC(QUANTITY_PRECISION, QUANTITY_SCALE)`
/// column and so reads back unchanged on every backend.
pub fn fits_quantity_column(value: Decimal) -> bool {
    let normalized = value.normalize();
    let limit = Decimal::from(10i64.pow(QUANTITY_PRECISION - QUANTITY_SCALE));
    normalized.scale() <= QUANTITY_SCALE && normalized.abs() < limit
}

fn precision_error() -> ValidationError {
    let mut err = ValidationError::new("precision");
    err.message = Some(
        format!(
            "At most {} digits before and {} after the decimal point",
            QUANTITY_PRECISION - QUANTITY_SCALE,
            QUANTITY_SCALE
        )
        .into(),
    );
    err
}

/// A quantity as submitted: either a JSON number or text to be coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(Decimal),
    Text(String),
}

impl NumericInput {
    /// Coerces the input to a decimal. Blank text coerces to zero.
    pub fn coerce(&self) -> Option<Decimal> {
        match self {
            NumericInput::Number(value) => Some(*value),
            NumericInput::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Some(Decimal::ZERO)
                } else {
                    Decimal::from_str(trimmed)
                        .or_else(|_| Decimal::from_scientific(trimmed))
                        .ok()
                }
            }
        }
    }

    /// True for text that is empty after trimming, which clearing forms submit.
    pub fn is_blank(&self) -> bool {
        matches!(self, NumericInput::Text(raw) if raw.trim().is_empty())
    }
}

impl From<Decimal> for NumericInput {
    fn from(value: Decimal) -> Self {
        NumericInput::Number(value)
    }
}

impl From<i64> for NumericInput {
    fn from(value: i64) -> Self {
        NumericInput::Number(Decimal::from(value))
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

fn positive_number(value: &NumericInput) -> Result<(), ValidationError> {
    match value.coerce() {
        Some(v) if v > Decimal::ZERO && !fits_quantity_column(v) => Err(precision_error()),
        Some(v) if v > Decimal::ZERO => Ok(()),
        Some(_) => {
            let mut err = ValidationError::new("positive");
            err.message = Some("Must be greater than 0".into());
            Err(err)
        }
        None => {
            let mut err = ValidationError::new("number");
            err.message = Some("Must be a number".into());
            Err(err)
        }
    }
}

fn non_negative_number(value: &NumericInput) -> Result<(), ValidationError> {
    match value.coerce() {
        Some(v) if v >= Decimal::ZERO && !fits_quantity_column(v) => Err(precision_error()),
        Some(v) if v >= Decimal::ZERO => Ok(()),
        Some(_) => {
            let mut err = ValidationError::new("non_negative");
            err.message = Some("Cannot be negative".into());
            Err(err)
        }
        None => {
            let mut err = ValidationError::new("number");
            err.message = Some("Must be a number".into());
            Err(err)
        }
    }
}

fn uuid_format(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("uuid");
        err.message = Some("Must be a valid UUID".into());
        err
    })
}

fn required_quantity(input: &Option<NumericInput>) -> Decimal {
    // Only reached after `validate()` accepted the input.
    input
        .as_ref()
        .and_then(NumericInput::coerce)
        .unwrap_or(Decimal::ZERO)
}

fn optional_quantity(input: &Option<NumericInput>) -> Option<Decimal> {
    input.as_ref().and_then(NumericInput::coerce)
}

fn custom_fields_json(fields: Option<BTreeMap<String, String>>) -> Option<serde_json::Value> {
    fields.map(|map| {
        serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        )
    })
}

/// Customer order as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReceivedOrderInput {
    #[serde(default)]
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    #[validate(required, custom = "positive_number")]
    pub ordered_quantity: Option<NumericInput>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    #[validate(custom = "positive_number")]
    pub rate: Option<NumericInput>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<BTreeMap<String, String>>,
}

/// Supplier order as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PlacedOrderInput {
    #[serde(default)]
    #[validate(length(min = 1, message = "Party name is required"))]
    pub party_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    #[validate(required, custom = "positive_number")]
    pub ordered_quantity: Option<NumericInput>,
    /// Absent and explicit null are both accepted.
    #[serde(default)]
    #[validate(custom = "non_negative_number")]
    pub received_quantity: Option<NumericInput>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    #[validate(custom = "positive_number")]
    pub rate: Option<NumericInput>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<BTreeMap<String, String>>,
}

/// Allocation request as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FulfillmentLinkInput {
    #[serde(default)]
    #[validate(custom = "uuid_format")]
    pub order_received_id: String,
    #[serde(default)]
    #[validate(custom = "uuid_format")]
    pub order_placed_id: String,
    #[serde(default)]
    #[validate(required, custom = "positive_number")]
    pub quantity_fulfilled: Option<NumericInput>,
}

/// Allocation request issued from a received order, which supplies the other side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AllocationInput {
    #[serde(default)]
    #[validate(custom = "uuid_format")]
    pub order_placed_id: String,
    #[serde(default)]
    #[validate(required, custom = "positive_number")]
    pub quantity_fulfilled: Option<NumericInput>,
}

/// Supplier-reported receipt update. Blank or null clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReceivedQuantityInput {
    #[serde(default)]
    #[validate(custom = "non_negative_number")]
    pub received_quantity: Option<NumericInput>,
}

/// Descriptive fields of a received order that may be edited after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReceivedOrderPatchInput {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: Option<String>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: Option<String>,
    pub sku: Option<String>,
    #[validate(length(min = 1, message = "Unit is required"))]
    pub unit: Option<String>,
    #[validate(custom = "positive_number")]
    pub rate: Option<NumericInput>,
    pub notes: Option<String>,
    pub custom_fields: Option<BTreeMap<String, String>>,
}

/// Fields of a placed order that may be edited after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PlacedOrderPatchInput {
    #[validate(length(min = 1, message = "Party name is required"))]
    pub party_name: Option<String>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: Option<String>,
    pub sku: Option<String>,
    #[validate(length(min = 1, message = "Unit is required"))]
    pub unit: Option<String>,
    #[validate(custom = "positive_number")]
    pub rate: Option<NumericInput>,
    pub notes: Option<String>,
    pub custom_fields: Option<BTreeMap<String, String>>,
    /// `Some(blank)` clears the stored value; `None` leaves it untouched.
    #[validate(custom = "non_negative_number")]
    pub received_quantity: Option<NumericInput>,
}

/// A validated customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReceivedOrder {
    pub customer_name: String,
    pub item_name: String,
    pub sku: Option<String>,
    pub ordered_quantity: Decimal,
    pub unit: String,
    pub rate: Option<Decimal>,
    pub notes: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
}

/// A validated supplier order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlacedOrder {
    pub party_name: String,
    pub item_name: String,
    pub sku: Option<String>,
    pub ordered_quantity: Decimal,
    pub received_quantity: Option<Decimal>,
    pub unit: String,
    pub rate: Option<Decimal>,
    pub notes: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
}

/// A validated allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFulfillmentLink {
    pub order_received_id: Uuid,
    pub order_placed_id: Uuid,
    pub quantity_fulfilled: Decimal,
}

/// A validated partial update of a received order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceivedOrderChanges {
    pub customer_name: Option<String>,
    pub item_name: Option<String>,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub rate: Option<Decimal>,
    pub notes: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
}

/// A validated partial update of a placed order.
///
/// `received_quantity` is doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrderChanges {
    pub party_name: Option<String>,
    pub item_name: Option<String>,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub rate: Option<Decimal>,
    pub notes: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
    pub received_quantity: Option<Option<Decimal>>,
}

impl PlacedOrderChanges {
    pub fn received_quantity(value: Option<Decimal>) -> Self {
        Self {
            received_quantity: Some(value),
            ..Default::default()
        }
    }
}

fn unit_or_default(unit: Option<String>) -> String {
    unit.filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_UNIT.to_string())
}

fn empty_update() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let mut err = ValidationError::new("empty");
    err.message = Some("At least one field must be updated".into());
    errors.add("updates", err);
    errors
}

pub fn validate_received_order(input: ReceivedOrderInput) -> Result<NewReceivedOrder, ValidationErrors> {
    input.validate()?;

    Ok(NewReceivedOrder {
        ordered_quantity: required_quantity(&input.ordered_quantity),
        rate: optional_quantity(&input.rate),
        customer_name: input.customer_name,
        item_name: input.item_name,
        sku: input.sku,
        unit: unit_or_default(input.unit),
        notes: input.notes,
        custom_fields: custom_fields_json(input.custom_fields),
    })
}

pub fn validate_placed_order(input: PlacedOrderInput) -> Result<NewPlacedOrder, ValidationErrors> {
    input.validate()?;

    Ok(NewPlacedOrder {
        ordered_quantity: required_quantity(&input.ordered_quantity),
        received_quantity: optional_quantity(&input.received_quantity),
        rate: optional_quantity(&input.rate),
        party_name: input.party_name,
        item_name: input.item_name,
        sku: input.sku,
        unit: unit_or_default(input.unit),
        notes: input.notes,
        custom_fields: custom_fields_json(input.custom_fields),
    })
}

pub fn validate_fulfillment_link(
    input: FulfillmentLinkInput,
) -> Result<NewFulfillmentLink, ValidationErrors> {
    input.validate()?;

    Ok(NewFulfillmentLink {
        order_received_id: Uuid::parse_str(&input.order_received_id).unwrap_or_default(),
        order_placed_id: Uuid::parse_str(&input.order_placed_id).unwrap_or_default(),
        quantity_fulfilled: required_quantity(&input.quantity_fulfilled),
    })
}

/// Validates an allocation made from the page of `order_received_id`.
pub fn validate_allocation(
    order_received_id: Uuid,
    input: AllocationInput,
) -> Result<NewFulfillmentLink, ValidationErrors> {
    input.validate()?;

    Ok(NewFulfillmentLink {
        order_received_id,
        order_placed_id: Uuid::parse_str(&input.order_placed_id).unwrap_or_default(),
        quantity_fulfilled: required_quantity(&input.quantity_fulfilled),
    })
}

/// Returns the new received quantity, `None` meaning "clear".
pub fn validate_received_quantity_update(
    input: ReceivedQuantityInput,
) -> Result<Option<Decimal>, ValidationErrors> {
    input.validate()?;

    Ok(input
        .received_quantity
        .filter(|q| !q.is_blank())
        .as_ref()
        .and_then(NumericInput::coerce))
}

pub fn validate_received_order_patch(
    input: ReceivedOrderPatchInput,
) -> Result<ReceivedOrderChanges, ValidationErrors> {
    input.validate()?;

    let changes = ReceivedOrderChanges {
        rate: optional_quantity(&input.rate),
        customer_name: input.customer_name,
        item_name: input.item_name,
        sku: input.sku,
        unit: input.unit,
        notes: input.notes,
        custom_fields: custom_fields_json(input.custom_fields),
    };

    if changes == ReceivedOrderChanges::default() {
        return Err(empty_update());
    }
    Ok(changes)
}

pub fn validate_placed_order_patch(
    input: PlacedOrderPatchInput,
) -> Result<PlacedOrderChanges, ValidationErrors> {
    input.validate()?;

    let changes = PlacedOrderChanges {
        rate: optional_quantity(&input.rate),
        received_quantity: input
            .received_quantity
            .as_ref()
            .map(|q| if q.is_blank() { None } else { q.coerce() }),
        party_name: input.party_name,
        item_name: input.item_name,
        sku: input.sku,
        unit: input.unit,
        notes: input.notes,
        custom_fields: custom_fields_json(input.custom_fields),
    };

    if changes == PlacedOrderChanges::default() {
        return Err(empty_update());
    }
    Ok(changes)
}

/// Re-checks an already typed allocation; the linker calls this before touching the store.
pub(crate) fn check_link_quantity(quantity: Decimal) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if quantity <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("Must be greater than 0".into());
        errors.add("quantity_fulfilled", err);
    } else if !fits_quantity_column(quantity) {
        errors.add("quantity_fulfilled", precision_error());
    }
    into_result(errors)
}

fn check_non_empty(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("length");
        err.message = Some("Required".into());
        errors.add(field, err);
    }
}

fn check_positive(errors: &mut ValidationErrors, field: &'static str, value: Decimal) {
    if value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("Must be greater than 0".into());
        errors.add(field, err);
    } else if !fits_quantity_column(value) {
        errors.add(field, precision_error());
    }
}

fn check_non_negative(errors: &mut ValidationErrors, field: &'static str, value: Decimal) {
    if value < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Cannot be negative".into());
        errors.add(field, err);
    } else if !fits_quantity_column(value) {
        errors.add(field, precision_error());
    }
}

fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Re-checks an already typed order before insertion.
pub(crate) fn check_typed_order(
    required_text: &[(&'static str, &str)],
    ordered_quantity: Decimal,
    rate: Option<Decimal>,
    received_quantity: Option<Decimal>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for &(field, value) in required_text {
        check_non_empty(&mut errors, field, value);
    }
    check_positive(&mut errors, "ordered_quantity", ordered_quantity);
    if let Some(rate) = rate {
        check_positive(&mut errors, "rate", rate);
    }
    if let Some(quantity) = received_quantity {
        check_non_negative(&mut errors, "received_quantity", quantity);
    }
    into_result(errors)
}

/// Re-checks typed edits before they reach the store. Only fields being
/// changed are checked.
pub(crate) fn check_typed_changes(
    required_text: &[(&'static str, Option<&str>)],
    rate: Option<Decimal>,
    received_quantity: Option<Option<Decimal>>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for &(field, value) in required_text {
        if let Some(value) = value {
            check_non_empty(&mut errors, field, value);
        }
    }
    if let Some(rate) = rate {
        check_positive(&mut errors, "rate", rate);
    }
    if let Some(Some(quantity)) = received_quantity {
        check_non_negative(&mut errors, "received_quantity", quantity);
    }
    into_result(errors)
}
