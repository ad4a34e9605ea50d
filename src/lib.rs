//! Agro Finance API Library
//!
//! Backend for a rural finance site: credit simulations, financial worksheets and contact
//! messages stored in PostgreSQL, plus a daily financial tip produced by Gemini.
//!
//! # Modules
//!
//! - `advice`: Daily advice cache (durable slot, generator fallback).
//! - `config`: Configuration management.
//! - `db`: Database connection pool and schema bootstrap.
//! - `db_storage`: Per-entity storage operations.
//! - `errors`: Error handling types.
//! - `gemini_client`: Gemini text-generation client.
//! - `handlers`: HTTP request handlers.
//! - `models`: Records, request payloads and patches.
//! - `router`: Route table and middleware.
//! - `sparse_update`: Allow-listed partial updates.

pub mod advice;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod gemini_client;
pub mod handlers;
pub mod models;
pub mod router;
pub mod sparse_update;
