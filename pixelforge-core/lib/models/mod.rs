//! Database models and status enums for the pixelforge project database.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{PixelforgeError, PixelforgeResult};

//--------------------------------------------------------------------------------------------------
// Types: Status Enums
//--------------------------------------------------------------------------------------------------

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Created but nothing accepted yet
    Draft,

    /// Has an accepted live version
    Ready,

    /// Live version deployed for hosted invocation
    Deployed,
}

/// How a project's accepted code is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingType {
    /// The creator exported the code and hosts it themselves
    #[serde(rename = "self")]
    SelfHosted,

    /// The platform hosts and re-executes the code per request
    Platform,
}

/// Lifecycle status of a code version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    /// Created, not yet smoke-tested
    Pending,

    /// Smoke tests have run at least once
    Testing,

    /// Accepted and charged; terminal
    Accepted,

    /// Rejected without charge; terminal
    Rejected,
}

//--------------------------------------------------------------------------------------------------
// Types: Rows
//--------------------------------------------------------------------------------------------------

/// A project row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: String,

    /// Owning user id
    pub owner_id: String,

    /// Display name
    pub name: String,

    /// Display description
    pub description: String,

    /// Lifecycle status (`draft`, `ready`, `deployed`)
    pub status: String,

    /// Hosting type once deployed (`self`, `platform`)
    pub hosting_type: Option<String>,

    /// The single accepted version currently designated live
    pub live_version_id: Option<String>,

    /// Hosted server record, once deployed
    pub deployed_server_id: Option<String>,

    /// Branding icon URL
    pub icon_url: Option<String>,

    /// Branding banner URL
    pub banner_url: Option<String>,

    /// Creation timestamp (RFC 3339)
    pub created_at: String,

    /// Last mutation timestamp (RFC 3339)
    pub updated_at: String,
}

/// A code version row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Version {
    /// Version id
    pub id: String,

    /// Owning project id
    pub project_id: String,

    /// Monotonically increasing number, unique per project
    pub version_number: i64,

    /// The prompt that produced this version
    pub user_prompt: String,

    /// The refinement prompt, for refined versions
    pub refinement_prompt: Option<String>,

    /// Generated entry-point source
    pub generated_code: String,

    /// Generated configuration (JSON)
    pub generated_config: String,

    /// Credits charged if this version is accepted
    pub generation_cost: i64,

    /// Version this one refines or was forked from
    pub parent_version_id: Option<String>,

    /// Lifecycle status (`pending`, `testing`, `accepted`, `rejected`)
    pub status: String,

    /// Latest smoke test result (JSON), if any
    pub test_result: Option<String>,

    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// A hosted server row carrying a deployed version's config
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Server id
    pub id: String,

    /// Owning project id
    pub project_id: String,

    /// The deployed version
    pub version_id: String,

    /// Config copied from the deployed version (JSON)
    pub config: String,

    /// Creation timestamp (RFC 3339)
    pub created_at: String,

    /// Last mutation timestamp (RFC 3339)
    pub updated_at: String,
}

/// An append-only royalty row, one per confirmed hosted charge
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Royalty {
    /// Royalty id
    pub id: String,

    /// Project whose code produced the image
    pub project_id: String,

    /// The created image that triggered the charge
    pub image_id: String,

    /// Credits charged to the end user
    pub credits_charged: i64,

    /// Portion credited to the creator
    pub creator_share: i64,

    /// Portion retained by the platform
    pub platform_share: i64,

    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// A per-user credit balance row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditBalance {
    /// The user this balance belongs to
    pub user_id: String,

    /// Current credits; never negative
    pub credits: i64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProjectStatus {
    /// The stored string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Ready => "ready",
            Self::Deployed => "deployed",
        }
    }
}

impl HostingType {
    /// The stored string form of this hosting type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfHosted => "self",
            Self::Platform => "platform",
        }
    }
}

impl VersionStatus {
    /// The stored string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Testing => "testing",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a stored status string.
    pub fn parse(value: &str) -> PixelforgeResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "testing" => Ok(Self::Testing),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(PixelforgeError::InvalidState {
                entity: "version".to_string(),
                current: other.to_string(),
                attempted: "parse status".to_string(),
            }),
        }
    }

    /// True for the terminal states (`accepted`, `rejected`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HostingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Version {
    /// The parsed lifecycle status of this version.
    pub fn parsed_status(&self) -> PixelforgeResult<VersionStatus> {
        VersionStatus::parse(&self.status)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_status_round_trips() {
        for status in [
            VersionStatus::Pending,
            VersionStatus::Testing,
            VersionStatus::Accepted,
            VersionStatus::Rejected,
        ] {
            assert_eq!(VersionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(VersionStatus::parse("bogus").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(VersionStatus::Accepted.is_terminal());
        assert!(VersionStatus::Rejected.is_terminal());
        assert!(!VersionStatus::Pending.is_terminal());
        assert!(!VersionStatus::Testing.is_terminal());
    }
}
