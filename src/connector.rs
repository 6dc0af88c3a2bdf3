pub mod stripe_tax;

pub use stripe_tax::{StripeTax, StripeTaxInterface};
