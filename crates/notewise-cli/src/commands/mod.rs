pub mod cleanup;
pub mod history;
pub mod resolve;
pub mod run;
pub mod utils;
