pub mod channel;
pub mod compression;
pub mod constants;
pub mod data_handle;
pub mod error;
pub mod format;
pub mod merge;
pub mod reader;
pub mod resegment;
pub mod scan;
pub mod steim;
pub mod writer;
