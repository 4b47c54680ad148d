pub mod debt;
pub mod projection;
pub mod returns;
pub mod scenarios;
