//! Scenario files shared by the library and the command-line driver.

pub mod scenario;
