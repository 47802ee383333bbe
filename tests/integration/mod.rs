mod backend_equivalence;
mod engine_scenarios;
mod support;
mod tree_properties;
