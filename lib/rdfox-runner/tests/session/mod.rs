#![cfg(unix)]
#![allow(clippy::panic, reason = "tests")]

mod common;
mod one_shot;
