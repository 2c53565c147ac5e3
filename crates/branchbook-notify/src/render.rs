//! Plain-text rendering of invoice notices.

use branchbook_core::{InvoiceKind, InvoiceNotice, Money, TaxRate};

pub fn subject(notice: &InvoiceNotice) -> String {
    let label = match notice.kind {
        InvoiceKind::SalesReceipt => "Sales receipt",
        InvoiceKind::Expense => "Expense invoice",
    };
    format!(
        "{label} {} from {}",
        notice.reference_number, notice.branch_name
    )
}

pub fn body(notice: &InvoiceNotice) -> String {
    let mut lines = vec![
        format!("Dear {},", notice.recipient_name),
        String::new(),
        format!(
            "{} {}: {}",
            notice.kind.reference_label(),
            notice.reference_number,
            notice.issued_at.format("%Y-%m-%d")
        ),
    ];
    if let Some(date) = notice.date {
        lines.push(format!("Date: {date}"));
    }
    lines.push(String::new());

    for line in &notice.lines {
        let mut row = format!(
            "{:<32} {:>6} x {:>10}",
            line.name,
            line.quantity,
            Money::from_cents(line.unit_price_cents).to_string()
        );
        if line.discount_cents > 0 {
            row.push_str(&format!("  -{}", Money::from_cents(line.discount_cents)));
        }
        row.push_str(&format!("  = {}", line.line_total()));
        lines.push(row);
    }

    let tax_rate = TaxRate::from_bps(notice.tax_rate_bps);
    lines.push(String::new());
    lines.push(format!("Subtotal:    {}", Money::from_cents(notice.subtotal_cents)));
    lines.push(format!(
        "Tax ({}%):   {}",
        tax_rate.percentage(),
        Money::from_cents(notice.tax_cents)
    ));
    lines.push(format!("Grand total: {}", notice.grand_total()));

    if let Some(method) = &notice.payment_method {
        lines.push(format!("Payment method: {method}"));
    }
    if let Some(message) = notice.message.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(String::new());
        lines.push(message.to_string());
    }

    lines.push(String::new());
    lines.push(notice.branch_name.clone());
    if !notice.branch_address.is_empty() {
        lines.push(notice.branch_address.clone());
    }
    if let Some(phone) = &notice.branch_phone_number {
        lines.push(format!("Phone: {phone}"));
    }
    lines.push(format!(
        "Issued by {} <{}>",
        notice.author_name, notice.author_email
    ));

    lines.join("\n")
}
