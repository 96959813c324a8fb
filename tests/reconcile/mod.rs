//! Step definitions, fixtures and scenarios for reconciliation behaviour.

mod bdd_steps;
mod scenarios;
mod test_helpers;
