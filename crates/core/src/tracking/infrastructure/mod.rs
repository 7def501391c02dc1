pub mod json_track_seed_store;
