//! # Invoice Notice
//!
//! The payload handed to the notification side channel after an invoice is
//! stored. It is a self-contained snapshot: the dispatcher renders and sends
//! it without reading any other table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Branch, Invoice, InvoiceDetails, InvoiceKind, PricedLine, Worker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceNotice {
    pub invoice_id: String,
    pub kind: InvoiceKind,
    pub reference_number: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub author_name: String,
    pub author_email: String,
    pub branch_name: String,
    pub branch_phone_number: Option<String>,
    pub branch_address: String,
    pub date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    /// Message to customer (sales receipt) or message on statement (expense).
    pub message: Option<String>,
    pub lines: Vec<PricedLine>,
    pub tax_rate_bps: u32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub grand_total_cents: i64,
    pub issued_at: DateTime<Utc>,
}

impl InvoiceNotice {
    /// Builds one notice per recipient of a freshly stored invoice.
    ///
    /// A sales receipt goes to the customer when an email is on record. An
    /// expense goes to its recipient and, when given, also to the payer.
    pub fn for_invoice(invoice: &Invoice, branch: &Branch, author: &Worker) -> Vec<Self> {
        let (recipients, date, payment_method, message) = match &invoice.details {
            InvoiceDetails::SalesReceipt(d) => (
                vec![(d.customer_name.clone(), d.customer_email.clone())],
                d.date,
                d.payment_method.clone(),
                d.message_to_customer.clone(),
            ),
            InvoiceDetails::Expense(d) => {
                let mut recipients =
                    vec![(d.recipient_name.clone(), Some(d.recipient_email.clone()))];
                let payer_email = d
                    .payer_email
                    .clone()
                    .filter(|e| !e.trim().eq_ignore_ascii_case(d.recipient_email.trim()));
                if payer_email.is_some() {
                    let payer_name = d
                        .payer_name
                        .clone()
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| branch.branch_name.clone());
                    recipients.push((payer_name, payer_email));
                }
                (
                    recipients,
                    None,
                    d.payment_method.clone(),
                    d.message_on_statement.clone(),
                )
            }
        };

        recipients
            .into_iter()
            .filter_map(|(name, email)| {
                let email = email.filter(|e| !e.trim().is_empty())?;
                Some(InvoiceNotice {
                    invoice_id: invoice.id.clone(),
                    kind: invoice.kind(),
                    reference_number: invoice.reference_number.clone(),
                    recipient_name: name,
                    recipient_email: email,
                    author_name: author.full_name.clone(),
                    author_email: author.email.clone(),
                    branch_name: branch.branch_name.clone(),
                    branch_phone_number: branch.branch_phone_number.clone(),
                    branch_address: branch.address.to_string(),
                    date,
                    payment_method: payment_method.clone(),
                    message: message.clone(),
                    lines: invoice.lines.clone(),
                    tax_rate_bps: invoice.tax_rate_bps,
                    subtotal_cents: invoice.subtotal_cents,
                    tax_cents: invoice.tax_cents,
                    grand_total_cents: invoice.grand_total_cents,
                    issued_at: invoice.created_at,
                })
            })
            .collect()
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BranchAddress, ExpenseDetails, Role, SalesReceiptDetails};

    fn fixtures(details: InvoiceDetails) -> (Invoice, Branch, Worker) {
        let now = Utc::now();
        let invoice = Invoice {
            id: "inv".to_string(),
            reference_number: "SR-1".to_string(),
            branch_id: "b1".to_string(),
            created_by: "w1".to_string(),
            lines: Vec::new(),
            tax_rate_bps: 800,
            subtotal_cents: 30000,
            tax_cents: 2400,
            grand_total_cents: 32400,
            details,
            created_at: now,
            updated_at: now,
        };
        let branch = Branch {
            id: "b1".to_string(),
            branch_name: "New Road".to_string(),
            branch_phone_number: Some("01-5550100".to_string()),
            address: BranchAddress {
                country: Some("Nepal".to_string()),
                ..Default::default()
            },
            branch_staff: None,
            sales_receipt_invoices: Vec::new(),
            expense_invoices: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let author = Worker {
            id: "w1".to_string(),
            role: Role::Manager,
            branch_id: Some("b1".to_string()),
            full_name: "Gita Manager".to_string(),
            email: "gita@example.com".to_string(),
            phone_number: None,
            address: None,
            created_at: now,
            updated_at: now,
        };
        (invoice, branch, author)
    }

    #[test]
    fn test_sales_receipt_without_email_has_no_notice() {
        let (invoice, branch, author) = fixtures(InvoiceDetails::SalesReceipt(
            SalesReceiptDetails {
                customer_name: "Walk-in".to_string(),
                ..Default::default()
            },
        ));
        assert!(InvoiceNotice::for_invoice(&invoice, &branch, &author).is_empty());
    }

    #[test]
    fn test_expense_notice_goes_to_recipient() {
        let (invoice, branch, author) = fixtures(InvoiceDetails::Expense(ExpenseDetails {
            recipient_name: "Landlord".to_string(),
            recipient_email: "landlord@example.com".to_string(),
            type_of_expense: "rent".to_string(),
            message_on_statement: Some("October rent".to_string()),
            ..Default::default()
        }));

        let notices = InvoiceNotice::for_invoice(&invoice, &branch, &author);
        assert_eq!(notices.len(), 1);
        let notice = &notices[0];
        assert_eq!(notice.recipient_email, "landlord@example.com");
        assert_eq!(notice.kind, InvoiceKind::Expense);
        assert_eq!(notice.message.as_deref(), Some("October rent"));
        assert_eq!(notice.branch_address, "Nepal");
        assert_eq!(notice.grand_total().cents(), 32400);
    }

    #[test]
    fn test_expense_notice_also_goes_to_payer() {
        let (invoice, branch, author) = fixtures(InvoiceDetails::Expense(ExpenseDetails {
            payer_name: Some("Hari Accounts".to_string()),
            payer_email: Some("hari@example.com".to_string()),
            recipient_name: "Landlord".to_string(),
            recipient_email: "landlord@example.com".to_string(),
            type_of_expense: "rent".to_string(),
            ..Default::default()
        }));

        let notices = InvoiceNotice::for_invoice(&invoice, &branch, &author);
        let to: Vec<_> = notices
            .iter()
            .map(|n| (n.recipient_name.as_str(), n.recipient_email.as_str()))
            .collect();
        assert_eq!(
            to,
            vec![
                ("Landlord", "landlord@example.com"),
                ("Hari Accounts", "hari@example.com"),
            ]
        );
    }

    #[test]
    fn test_payer_same_as_recipient_gets_one_notice() {
        let (invoice, branch, author) = fixtures(InvoiceDetails::Expense(ExpenseDetails {
            payer_email: Some("Landlord@Example.com".to_string()),
            recipient_name: "Landlord".to_string(),
            recipient_email: "landlord@example.com".to_string(),
            type_of_expense: "rent".to_string(),
            ..Default::default()
        }));

        assert_eq!(InvoiceNotice::for_invoice(&invoice, &branch, &author).len(), 1);
    }
}
