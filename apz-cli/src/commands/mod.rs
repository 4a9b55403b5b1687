pub mod assess;
pub mod classify;
pub mod input;
pub mod stats;
pub mod table;
