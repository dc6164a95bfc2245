/*
[INPUT]:  Parsed subcommands and CLI configuration
[OUTPUT]: Command handlers
[POS]:    CLI layer - module wiring
[UPDATE]: When adding subcommands
*/

pub mod commands;
pub mod init;
