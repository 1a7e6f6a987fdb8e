//! Receipt formatter
//!
//! Turns a `SaleRecord` into an ordered `FormatCommand` sequence. Pure: no
//! I/O, no clock, no hardware knowledge, so identical sales always yield
//! identical commands.

use rust_decimal::{Decimal, RoundingStrategy};
use shared::SaleRecord;
use thiserror::Error;
use till_printer::{Align, FormatCommand, Style, fit_column, printable};

/// Item name column, in printer columns
pub const NAME_COLUMN: usize = 20;
/// Quantity column
pub const QTY_COLUMN: usize = 10;
/// Price column
pub const PRICE_COLUMN: usize = 10;

const DECIMAL_PLACES: u32 = 2;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Malformed sale data, detected before any printer is contacted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("order id is empty")]
    MissingOrderId,

    #[error("item {index} (`{name}`): quantity must be positive, got {quantity}")]
    InvalidQuantity {
        index: usize,
        name: String,
        quantity: i32,
    },

    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: String, value: Decimal },

    #[error("tax rate must be between 0 and 100, got {0}")]
    InvalidTaxRate(Decimal),
}

pub type FormatResult<T> = Result<T, FormatError>;

/// Receipt formatter
#[derive(Debug, Clone)]
pub struct ReceiptFormatter {
    business_name: String,
    currency: String,
}

impl ReceiptFormatter {
    pub fn new(business_name: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            currency: "$".to_string(),
        }
    }

    /// Currency symbol prefixed to every amount
    pub fn with_currency(mut self, symbol: impl Into<String>) -> Self {
        self.currency = symbol.into();
        self
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    /// Format a sale into printer commands
    pub fn format(&self, sale: &SaleRecord) -> FormatResult<Vec<FormatCommand>> {
        validate_sale(sale)?;

        let mut out = Vec::with_capacity(12 + sale.items.len());

        // Header
        out.push(FormatCommand::style(
            Style::default().align(Align::Center).bold(true).height(2),
        ));
        out.push(FormatCommand::text(format!("{}\n", printable(&self.business_name))));

        out.push(FormatCommand::style(
            Style::default().align(Align::Left).bold(false).height(1),
        ));
        out.push(FormatCommand::text(format!(
            "Receipt: #{}\n",
            printable(&sale.order_id)
        )));
        out.push(FormatCommand::text(format!(
            "Date: {}\n\n",
            sale.timestamp.format(TIMESTAMP_FORMAT)
        )));

        // Column titles
        out.push(FormatCommand::style(Style::default().bold(true)));
        out.push(FormatCommand::text(row("Item", "Qty", "Price")));

        // Items, in the sale's own order
        out.push(FormatCommand::style(Style::default().bold(false)));
        for item in &sale.items {
            out.push(FormatCommand::text(row(
                &item.name,
                &item.quantity.to_string(),
                &self.money(item.unit_price),
            )));
        }

        // Totals (stored values, never recomputed)
        out.push(FormatCommand::text("\n"));
        out.push(FormatCommand::style(Style::default().bold(true)));
        out.push(FormatCommand::text(format!(
            "Subtotal: {}\n",
            self.money(sale.subtotal)
        )));
        out.push(FormatCommand::text(format!(
            "Tax ({}%): {}\n",
            sale.tax_rate.normalize(),
            self.money(sale.tax_amount)
        )));
        out.push(FormatCommand::text(format!(
            "Total: {}\n",
            self.money(sale.grand_total)
        )));

        out.push(FormatCommand::Cut);
        Ok(out)
    }

    /// Two-decimal amount, banker's rounding on the stored value
    fn money(&self, value: Decimal) -> String {
        format!("{}{}", self.currency, round_money(value))
    }
}

/// Round to cents (half-to-even) and always show two decimals
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(DECIMAL_PLACES);
    rounded
}

/// One table row: name truncated to its column, the rest left-justified
fn row(name: &str, qty: &str, price: &str) -> String {
    // Numbers are never cut; a too-wide value pushes the line instead
    format!(
        "{}{:<qw$}{:<pw$}\n",
        fit_column(name, NAME_COLUMN),
        qty,
        price,
        qw = QTY_COLUMN,
        pw = PRICE_COLUMN
    )
}

/// Reject sales that would print a misleading receipt
pub fn validate_sale(sale: &SaleRecord) -> FormatResult<()> {
    if sale.order_id.trim().is_empty() {
        return Err(FormatError::MissingOrderId);
    }

    for (index, item) in sale.items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(FormatError::InvalidQuantity {
                index,
                name: item.name.clone(),
                quantity: item.quantity,
            });
        }
        require_non_negative(&format!("items[{}].unit_price", index), item.unit_price)?;
        require_non_negative(&format!("items[{}].line_total", index), item.line_total)?;
    }

    require_non_negative("subtotal", sale.subtotal)?;
    require_non_negative("tax_amount", sale.tax_amount)?;
    require_non_negative("grand_total", sale.grand_total)?;

    if sale.tax_rate < Decimal::ZERO || sale.tax_rate > Decimal::ONE_HUNDRED {
        return Err(FormatError::InvalidTaxRate(sale.tax_rate));
    }

    Ok(())
}

fn require_non_negative(field: &str, value: Decimal) -> FormatResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(FormatError::NegativeAmount {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}
