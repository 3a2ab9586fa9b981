pub mod ports;
pub mod process_use_case;

pub use process_use_case::{ProcessReportUseCase, ProcessSummary};
