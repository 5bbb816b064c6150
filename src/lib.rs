//! Local OAuth consent broker for remote notebook kernels: correlates out-of-band redirects,
//! drives the consent dialogs, and replies to the kernel over its own channel.
//!
//! A remote kernel asks for an ephemeral credential by sending a `request_auth` frame. The
//! [`interceptor::MessageInterceptor`] lifts that frame off the channel and hands it to the
//! [`consent::ConsentOrchestrator`], which dry-runs the credential propagation, asks the user for
//! consent, opens the provider page, waits on the [`correlator::CodeCorrelator`] for the redirect
//! delivered by a [`capture`] host, and finally propagates the credential. The kernel always gets
//! exactly one reply frame back.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod capture;
pub mod config;
pub mod consent;
pub mod correlator;
pub mod error;
pub mod interceptor;
pub mod obs;
pub mod propagation;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
