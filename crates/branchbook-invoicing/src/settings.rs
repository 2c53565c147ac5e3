//! Runtime knobs of the invoicing services.

use serde::{Deserialize, Serialize};

use branchbook_core::DEFAULT_PAGE_CAP;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoicingSettings {
    /// Maximum records any listing returns.
    pub list_page_cap: u32,
    /// Remove the invoice id from its branch collection on delete.
    pub unlink_on_delete: bool,
}

impl Default for InvoicingSettings {
    fn default() -> Self {
        InvoicingSettings {
            list_page_cap: DEFAULT_PAGE_CAP,
            unlink_on_delete: false,
        }
    }
}
