//! # geoclue-position
//!
//! Positioning source backed by a GeoClue2-style location service.
//!
//! The service is reached through an asynchronous request/response
//! channel described by the [`rpc`] traits. A [`PositionSource`] manages
//! the one remote client object on behalf of two independent callers:
//! continuous updates and single-shot requests with a deadline.
//!
//! ## Features
//!
//! - **Shared client lifecycle**: created on first demand, configured,
//!   started, and stopped once nobody wants updates
//! - **Normalized fixes**: provider readings become [`PositionFix`] records
//! - **Last known position**: restored on startup and saved on shutdown
//! - **Simulated provider**: in-memory service for tests and replay
//!
//! ## Quick Start
//!
//! ```no_run
//! use geoclue_position::{
//!     ApplicationIdentity, ClientState, LocationReading, PositionSource, SimulatedProvider,
//!     SourceEvent, SourceOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     geoclue_position::logging::try_init().ok();
//!
//!     let provider = SimulatedProvider::new();
//!     let source = PositionSource::new(
//!         provider.clone(),
//!         SourceOptions::new(ApplicationIdentity::new("org.example.Maps")),
//!     );
//!     let mut events = source.subscribe();
//!
//!     source.start_updates();
//!     let _ = source.watch().wait_for(|s| s.state == ClientState::Started).await;
//!     provider.publish(LocationReading::new(52.52, 13.405));
//!
//!     if let Ok(SourceEvent::PositionUpdated(fix)) = events.recv().await {
//!         println!("{:?}", fix.coordinate);
//!     }
//!
//!     source.shutdown().await;
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod position;
pub mod rpc;

// Re-export commonly used types
pub use client::{
    ClientSettings, ClientState, PositionSource, SourceEvent, SourceOptions, SourceSnapshot,
};
pub use error::{GeoclueError, Result, SourceErrorKind};
pub use identity::ApplicationIdentity;
pub use position::{AccuracyLevel, Coordinate, LastFixStore, PositionFix, PositioningMethods};
pub use rpc::{ClientProxy, LocationProvider, LocationReading, ObjectPath, SimulatedProvider};
