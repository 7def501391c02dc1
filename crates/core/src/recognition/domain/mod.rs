pub mod recognition_job;
