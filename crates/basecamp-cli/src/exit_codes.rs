//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - a declaration carries missing or malformed values
pub const VALIDATION_ERROR: i32 = 2;

/// Reference error - a name was used before it was declared, or the graph
/// has duplicates or cycles
pub const REFERENCE_ERROR: i32 = 3;

/// Config error - unknown environment or invalid configuration
pub const CONFIG_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Allocation error - the address space cannot hold the requested zones
pub const ALLOCATION_ERROR: i32 = 6;

/// Materialization error - the engine failed to create a resource
pub const MATERIALIZATION_ERROR: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
