//! Closed set of ephemeral authorization kinds a kernel may request.

// self
use crate::_prelude::*;

/// Ephemeral credential kinds relayed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
	/// Storage access (Google Drive file system).
	DfsEphemeral,
	/// Generic account credentials for the signed-in user.
	AuthUserEphemeral,
}
impl AuthType {
	/// Every kind the broker recognizes.
	pub const ALL: [AuthType; 2] = [AuthType::DfsEphemeral, AuthType::AuthUserEphemeral];

	/// Returns the wire identifier (`authType` / `authtype`).
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthType::DfsEphemeral => "dfs_ephemeral",
			AuthType::AuthUserEphemeral => "auth_user_ephemeral",
		}
	}

	/// Human label used in dialogs and error messages.
	pub const fn label(self) -> &'static str {
		match self {
			AuthType::DfsEphemeral => "Google Drive",
			AuthType::AuthUserEphemeral => "Google account",
		}
	}

	/// Default correlation scope used when the broker config does not override it.
	pub const fn default_scope(self) -> &'static str {
		match self {
			AuthType::DfsEphemeral => "https://www.googleapis.com/auth/drive",
			AuthType::AuthUserEphemeral => "email profile",
		}
	}
}
impl Display for AuthType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AuthType {
	type Err = UnknownAuthType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| UnknownAuthType { value: s.to_owned() })
	}
}

/// Error returned when a wire value names no known [`AuthType`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown authorization type `{value}`.")]
pub struct UnknownAuthType {
	/// Offending wire value.
	pub value: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn wire_names_match_serde() {
		for kind in AuthType::ALL {
			let json = serde_json::to_string(&kind).expect("AuthType should serialize.");

			assert_eq!(json, format!("\"{}\"", kind.as_str()));
			assert_eq!(kind.as_str().parse::<AuthType>(), Ok(kind));
		}
	}

	#[test]
	fn unknown_kinds_are_rejected() {
		let err = "dfs_persistent".parse::<AuthType>().expect_err("Unknown kind should fail.");

		assert_eq!(err.value, "dfs_persistent");
		assert!(serde_json::from_str::<AuthType>("\"dfs_persistent\"").is_err());
	}
}
