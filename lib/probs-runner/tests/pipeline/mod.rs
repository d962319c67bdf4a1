#![cfg(unix)]

mod common;
mod query;
