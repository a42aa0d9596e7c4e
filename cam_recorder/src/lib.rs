//! Record from a camera at a requested frame rate and report dropped frames.
pub mod cli;
pub mod recorder;
pub mod sensors;
