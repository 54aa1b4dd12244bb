//! Subcommands that run outside the supervisor.

pub mod dry_run;
