pub mod credentials;
pub mod scan;
pub mod sheet;
