
pub mod calendar;
pub mod catalog;
pub mod correct;
pub mod error;
pub mod output;
pub mod parameters;
pub mod resolve;
pub mod run;
pub mod store;
