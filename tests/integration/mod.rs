//! Integration tests for the PGAS communication core

mod context_lifecycle;
mod sim_cli;
mod wait_engine;
