//! Sale Record Model

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single sold line, in the order the POS recorded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Read-only view of a completed sale
///
/// Money values are stored exactly as the POS computed them; the receipt
/// renders them, it never recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub order_id: String,
    /// Local wall-clock time the sale was recorded
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    /// Percentage, e.g. `8` for 8 %
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_from_json() {
        let json = r#"{
            "order_id": "1042",
            "timestamp": "2024-01-22T14:32:15",
            "items": [
                {"name": "Coffee", "quantity": 2, "unit_price": "3.50", "line_total": "7.00"},
                {"name": "Bagel", "quantity": 1, "unit_price": 2.25, "line_total": 2.25}
            ],
            "subtotal": "9.25",
            "tax_rate": 8,
            "tax_amount": "0.74",
            "grand_total": "9.99"
        }"#;

        let sale: SaleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(sale.order_id, "1042");
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.items[0].name, "Coffee");
        assert_eq!(sale.items[1].unit_price, Decimal::new(225, 2));
        assert_eq!(sale.grand_total, Decimal::new(999, 2));
    }

    #[test]
    fn test_items_default_empty() {
        let json = r#"{
            "order_id": "1",
            "timestamp": "2024-01-22T14:32:15",
            "subtotal": "0", "tax_rate": "0", "tax_amount": "0", "grand_total": "0"
        }"#;
        let sale: SaleRecord = serde_json::from_str(json).unwrap();
        assert!(sale.items.is_empty());
    }
}
