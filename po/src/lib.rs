//! PerryOps - command-line client for preoperative schedule review
//!
//! The `po` binary drives the [`perryclient`] API: report upload, the
//! extract / compliance-check / merge chat workflow, and patient schedule reads.

pub mod chat;
pub mod cli;
pub mod config;
pub mod render;
