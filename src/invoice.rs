use std::fmt::Write;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    entity::{enums::PaymentMethod, order_items, orders},
    pricing::line_total,
};

#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Plain-text invoice attached to the order confirmation email.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub order_id: Uuid,
    pub customer: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub payment_method: PaymentMethod,
    pub date: DateTime<Utc>,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl Invoice {
    pub fn from_order(customer: &str, order: &orders::Model, items: &[order_items::Model]) -> Self {
        let lines = items
            .iter()
            .map(|item| InvoiceLine {
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: item.price,
                amount: line_total(item.price, item.quantity),
            })
            .collect();

        Self {
            order_id: order.id,
            customer: customer.to_string(),
            address: order.address.clone(),
            city: order.city.clone(),
            postal_code: order.postal_code.clone(),
            country: order.country.clone(),
            payment_method: order.payment_method,
            date: order.created_at.with_timezone(&Utc),
            lines,
            subtotal: order.shipping_price,
            discount: order.shipping_price - order.total_price,
            total: order.total_price,
        }
    }

    pub fn file_name(&self) -> String {
        format!("invoice-{}.txt", self.order_id)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "INVOICE {}", self.order_id);
        let _ = writeln!(out, "Date: {}", self.date.format("%Y-%m-%d %H:%M UTC"));
        let _ = writeln!(out, "Payment: {:?}", self.payment_method);
        let _ = writeln!(out);
        let _ = writeln!(out, "Bill to: {}", self.customer);
        let _ = writeln!(out, "         {}", self.address);
        let _ = writeln!(
            out,
            "         {} {}, {}",
            self.city, self.postal_code, self.country
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<30} {:>5} {:>12} {:>12}",
            "Item", "Qty", "Unit", "Amount"
        );
        for line in &self.lines {
            let _ = writeln!(
                out,
                "{:<30} {:>5} {:>12} {:>12}",
                truncate(&line.title, 30),
                line.quantity,
                line.unit_price,
                line.amount
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<49} {:>12}", "Subtotal", self.subtotal);
        if !self.discount.is_zero() {
            let _ = writeln!(out, "{:<49} {:>12}", "Coupon", -self.discount);
        }
        let _ = writeln!(out, "{:<49} {:>12}", "Total", self.total);
        out
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::entity::enums::OrderStatus;

    fn order() -> orders::Model {
        let now = Utc::now().fixed_offset();
        orders::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            coupon_id: None,
            address: "1 Main St".into(),
            city: "Cairo".into(),
            postal_code: "11511".into(),
            country: "EG".into(),
            phone_numbers: serde_json::json!(["0123456789"]),
            shipping_price: dec!(300),
            total_price: dec!(270),
            payment_method: PaymentMethod::Cash,
            status: OrderStatus::Placed,
            paid_at: None,
            delivered_at: None,
            delivered_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn invoice_lists_lines_and_coupon() {
        let order = order();
        let items = vec![order_items::Model {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            title: "Wireless Mouse".into(),
            quantity: 3,
            price: dec!(100),
            created_at: order.created_at,
        }];

        let invoice = Invoice::from_order("mona", &order, &items);
        assert_eq!(invoice.discount, dec!(30));

        let text = invoice.render();
        assert!(text.contains("Wireless Mouse"));
        assert!(text.contains("Bill to: mona"));
        assert!(text.contains("Coupon"));
        assert!(text.contains("270"));
        assert_eq!(invoice.file_name(), format!("invoice-{}.txt", order.id));
    }
}
