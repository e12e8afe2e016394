//! Wire and domain types for the Snyk API.
//!
//! REST responses follow the JSON:API envelope (`data`, `links`); only the
//! fields migration needs are modelled, everything else is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifier of a target (a tracked repository) within an org.
    TargetId
);
id_type!(
    /// Identifier of a project owned by a target.
    ProjectId
);
id_type!(
    /// Identifier of an organization.
    OrgId
);
id_type!(
    /// Identifier of a group, the tenant holding organizations.
    GroupId
);

/// A JSON:API list response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<A> {
    /// Resources on this page.
    #[serde(default = "Vec::new")]
    pub data: Vec<Resource<A>>,

    /// Pagination links.
    #[serde(default)]
    pub links: Option<Links>,
}

impl<A> ListResponse<A> {
    /// Link to the next page, if the server returned a non-empty one.
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.next.as_deref())
            .filter(|next| !next.is_empty())
    }
}

/// A single JSON:API resource.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    /// Resource ID.
    pub id: String,

    /// Resource attributes.
    #[serde(default = "Option::default")]
    pub attributes: Option<A>,
}

/// JSON:API pagination links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    /// Next page link.
    #[serde(default)]
    pub next: Option<String>,
}

/// Target attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetAttributes {
    /// Display name, usually `owner/repo`.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Organization attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgAttributes {
    /// Organization name.
    pub name: String,
}

/// Project attributes. Listings only need the resource ID.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectAttributes {}

/// Body of the v1 move-project request.
#[derive(Debug, Clone, Serialize)]
pub struct MoveProjectRequest<'a> {
    /// Destination organization.
    #[serde(rename = "targetOrgId")]
    pub target_org_id: &'a str,
}

/// A target as seen by the remaining-targets listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Target ID.
    pub id: TargetId,

    /// Display name; empty when the server omitted it.
    pub display_name: String,
}

/// Result of a single project move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The server accepted the move.
    Moved,
    /// The move was attempted and failed.
    Failed,
    /// Dry run; no request was sent.
    DryRun,
}
