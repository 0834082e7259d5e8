//! Integration tests for the Folio section generation orchestrator

mod support;

mod compile_handoff;
mod history_roundtrip;
mod orchestrator_scenarios;
