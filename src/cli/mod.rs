pub mod convert;
pub mod currency;
pub mod pay;
pub mod setup;
pub mod ui;
