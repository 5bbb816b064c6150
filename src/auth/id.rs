//! Strongly typed correlation identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:ident) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const NONCE_MAX_LEN: usize = 128;
const SCOPE_MAX_LEN: usize = 2048;
const GENERATED_NONCE_LEN: usize = 32;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (scope, nonce).
		kind: &'static str,
	},
	/// The identifier contains whitespace where none is allowed.
	#[error("{kind} identifier contains disallowed whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (scope, nonce).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (scope, nonce).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! {
	Scope,
	"Application-level grouping key under which authorization waits are pending (e.g. `profile email`).",
	"Scope",
	validate_scope
}
def_id! {
	Nonce,
	"Single-use correlation token minted per authorization attempt.",
	"Nonce",
	validate_nonce
}

impl Nonce {
	/// Mints a fresh random nonce.
	pub fn generate() -> Self {
		let value = rand::rng()
			.sample_iter(Alphanumeric)
			.take(GENERATED_NONCE_LEN)
			.map(char::from)
			.collect();

		Self(value)
	}
}

fn validate_nonce(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > NONCE_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: NONCE_MAX_LEN });
	}

	Ok(())
}

// Scopes are space-delimited permission lists, so only surrounding whitespace is rejected.
fn validate_scope(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.trim().is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.trim() != view {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > SCOPE_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: SCOPE_MAX_LEN });
	}

	Ok(())
}
