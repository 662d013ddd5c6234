#![doc = "taskship-core: pipeline logic and data models for taskship."]

//! This crate contains the publish/verify/notify pipeline that turns one
//! task request into a published repository, waits for its hosting URL and
//! reports the result to the evaluator callback.
//!
//! External systems (content generation, the hosting platform, plain HTTP
//! endpoints) are reached only through the traits in [`contract`], so every
//! stage can be exercised against mocks.
//!
//! # Usage
//! Build a [`config::Settings`] once, wire concrete collaborators into a
//! [`pipeline::Pipeline`] and call [`pipeline::Pipeline::run`] per request.

pub mod config;
pub mod contract;
pub mod http;
pub mod materialize;
pub mod naming;
pub mod notify;
pub mod pipeline;
pub mod poll;
pub mod publish;
pub mod retry;
pub mod scan;
pub mod task;
pub mod workspace;
