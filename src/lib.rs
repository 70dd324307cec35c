// Spirit Food warehouse access gateway
// One interface over three execution backends, with schema inference for
// automated table creation and an in-process reference warehouse.

// Clippy configuration
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

// Values, results, parameters and errors
pub mod core;

// Connection configuration (args > env > file > defaults)
pub mod config;

// Backend capability traits and registry
pub mod backend;

// Local and distributed tabular data
pub mod frame;

// Table naming and DDL inference
pub mod schema;

// The gateway itself: sessions, queries, writes, grants
pub mod gateway;

// In-process reference warehouse implementing every backend
pub mod emulator;

// Flavor-profile lookup for the quiz flow
pub mod profile;

// Re-export commonly used types for convenience
pub use core::{GatewayError, Params, TabularResult, Value, WarehouseType};
pub use backend::{ExecutionMode, FallbackPolicy, WriteMode};
pub use config::{ConfigLoader, ConnectionConfig, ConnectionOverrides};
pub use frame::{DistributedFrame, Frame, LocalFrame};
pub use gateway::{ComputePolicy, ComputeSessionRegistry, GatewayBuilder, WarehouseGateway};
pub use emulator::MemoryWarehouse;
pub use profile::{lookup_flavor_profile, FlavorProfile, ProfileLookup};
