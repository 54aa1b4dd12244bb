//! The block pipeline: assembly, internal transaction harvesting, address
//! filtering and the polling loop that ties them together.

pub mod address_filter;
pub mod assembler;
pub mod error;
pub mod harvester;
pub mod orchestrator;
pub mod reporter;
