//! # Queue Calling
//!
//! A waiting-room queue caller built on the queue relay architecture.
//!
//! One **authority** (hosted by the display) owns two ticket lines, VISIT and
//! FOOD, plus a table of what each station is serving. Station **agents**
//! never touch that state: they publish intents on a broadcast bus and render
//! whatever full snapshot the authority last broadcast.
//!
//! ## Architecture
//!
//! - [`authority`]: the only writer; answers every accepted intent with a snapshot
//! - [`agent`]: publishes intents, caches snapshots, polls until connected
//! - [`protocol`]: the `{type, payload}` wire messages
//! - [`announcer`]: where "Nomor Antrian... D... 5..." goes
//! - [`node`]: store + bus subscription + driver task per participant
//!
//! ## Example
//!
//! ```no_run
//! use queue_calling::announcer::TracingAnnouncer;
//! use queue_calling::config::Config;
//! use queue_calling::model::{Line, StationId};
//! use queue_calling::node::{spawn_agent, spawn_authority};
//! use queue_relay_runtime::BroadcastBus;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let bus = Arc::new(BroadcastBus::new(config.bus_capacity));
//!
//! let authority = spawn_authority(bus.clone(), &config, Arc::new(TracingAnnouncer))?;
//! let agent = spawn_agent(bus, &config, StationId::new(2)?).await?;
//!
//! agent.request_issue(Line::Visit).await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod announcer;
pub mod authority;
pub mod bootstrap;
pub mod config;
pub mod console;
pub mod mocks;
pub mod model;
pub mod node;
pub mod protocol;

pub use agent::{AgentAction, AgentEnvironment, AgentReducer, AgentState, Connectivity};
pub use announcer::{AnnounceError, Announcement, Announcer, TracingAnnouncer};
pub use authority::{AuthorityEnvironment, AuthorityReducer, AuthorityState};
pub use bootstrap::Mode;
pub use config::{Config, ConfigError};
pub use model::{Line, ServiceLine, Snapshot, StationId, StationRecord, StationTable};
pub use node::{AgentNode, AuthorityNode, NodeError, spawn_agent, spawn_authority};
pub use protocol::{Intent, QueueMessage};
