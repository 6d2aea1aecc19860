#![doc = "pdf-relay-core: core pipeline library for pdf-relay."]

//! This crate contains the discovery, reconciliation and transfer pipeline for pdf-relay.
//! The upload client for a concrete destination endpoint lives in the CLI crate; everything
//! here talks to it through the [`contract::Publisher`] trait.
//!
//! # Usage
//! Build the discovery strategies with [`discovery::build_strategies`], a
//! [`transfer::TransferEngine`] around a [`contract::Fetcher`] and a [`contract::Publisher`],
//! then drive a run with [`synchronise::synchronise`].

pub mod config;
pub mod contract;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod http;
pub mod reconcile;
pub mod report;
pub mod synchronise;
pub mod transfer;
