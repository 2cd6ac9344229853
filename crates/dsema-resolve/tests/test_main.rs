// Main test entry point for dsema-resolve
// This file organizes and loads all test modules

mod common;

mod cache_tests;
mod config_tests;
mod end_to_end_tests;
mod import_tests;
mod inheritance_tests;
mod scope_tests;
mod template_tests;
