//! Integration tests for trees stored in page files.

mod file_container_test;
