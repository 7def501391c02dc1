pub mod name_bindings;
pub mod overlap;
pub mod track_allocator;
pub mod track_seed_store;
