pub mod api;
pub mod assembler;
pub mod consolidation;
pub mod models;
pub mod numbering;
pub mod period;
pub mod policy;
pub mod pricing;
pub mod shares;

pub use assembler::{GeneratedInvoice, InvoiceAssembler};
pub use consolidation::{collect_descendants, ConsolidatedInvoice, ConsolidationService};
pub use models::{
    Account, BillableProduct, Contract, ContractShare, Invoice, InvoiceItem, VolumeTier,
};
pub use numbering::next_invoice_number;
pub use period::{billing_period, period_amount, prorate, BillingFrequency};
pub use policy::{is_first_billing_period, setup_fee, should_bill, ChargeType};
pub use pricing::{price_seats, SeatPricing};
pub use shares::{create_share, list_shares_for_account, remove_share};
