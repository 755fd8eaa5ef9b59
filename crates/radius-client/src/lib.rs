//! RADIUS Client Engine
//!
//! Sends RADIUS requests built with `radius-proto` to one or more servers,
//! retransmitting on a fixed schedule and failing over between the
//! addresses a server name resolves to.
//!
//! # Features
//!
//! - Async I/O with Tokio, one socket task per server connection
//! - Byte-identical retransmissions with an evenly divided time budget
//! - Response matching by identifier, Response Authenticator and
//!   Message-Authenticator
//! - UDP and Unix stream transports
//! - JSON configuration for the `radclient` tool
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_client::Client;
//! use radius_proto::{AttributeSet, AttributeType, Code};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut attrs = AttributeSet::new();
//!     attrs.add(AttributeType::UserName.as_u8(), b"alice")?;
//!     attrs.add(AttributeType::UserPassword.as_u8(), b"password")?;
//!
//!     let mut client = Client::new();
//!     client
//!         .send(
//!             Code::ACCESS_REQUEST,
//!             &attrs,
//!             "radius.example.com",
//!             b"secret",
//!             Duration::from_secs(3),
//!             3,
//!             |result| match result {
//!                 Ok(response) => println!("{}", response.code()),
//!                 Err(e) => eprintln!("{}", e),
//!             },
//!         )
//!         .await?;
//!
//!     client.run_until_idle().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod remote;
pub mod transport;

pub use client::{Client, RequestId, ResponseHandler};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, RequestError};
pub use remote::{Callback, PendingId, Remote};
pub use transport::{DEFAULT_PORT, RemoteId, Target, TransportEvent, TransportEventKind, resolve};
