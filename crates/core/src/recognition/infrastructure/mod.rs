pub mod recognition_dispatcher;
