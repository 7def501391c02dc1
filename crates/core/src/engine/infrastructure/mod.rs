pub mod scripted_engine;
