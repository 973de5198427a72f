//! # user-sheet
//!
//! A REST service for a list of users kept in a spreadsheet-style CSV file.
//!
//! - **Domain types** - [`domain::User`] and its create/patch payloads
//! - **Store** - [`store::RecordStore`], one full load/change/save per call
//! - **Actor** - [`actor_framework::ResourceActor`] serializes every store call
//! - **Client** - [`clients::UserClient`], the handle request handlers receive
//! - **System** - [`app_system::UserSystem`] starts and drains the actor
//! - **HTTP** - [`http::router`] and [`http::serve`], with optional JWT auth

pub mod actor_framework;
pub mod app_system;
pub mod auth;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod store;
pub mod user_actor;

#[cfg(test)]
mod mock_framework;
