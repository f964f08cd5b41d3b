/// Context run aggregate and its status machine
pub mod context;

/// Context events
pub mod events;

/// Step requests and validation
pub mod step;
