#![doc = "fiscal-report-core: report generation and distribution pipeline for fiscal configuration forms."]

//! This crate holds the payload model, the PDF report generator and the
//! distribution pipeline. It performs no network or disk I/O of its own:
//! storage and notification backends plug in through [`contract`].
//!
//! # Usage
//! - [`report::generate`] turns a [`payload::Submission`] into PDF bytes.
//! - [`distribute::Pipeline`] runs parse → render → distribute for one submission.

pub mod codes;
pub mod contract;
pub mod distribute;
pub mod format;
pub mod layout;
pub mod payload;
pub mod pdf;
pub mod report;
