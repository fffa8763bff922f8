use serde::{Deserialize, Serialize};

#[macro_export]
macro_rules! cli_impl_string_id_inner {
    ($Name:ident, $Doc:literal) => {
        #[doc = $Doc]
        #[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $Name(String);

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl $Name {
            /// Get the inner `str`.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $Name {
            fn from(id: &str) -> Self {
                $Name::from(id)
            }
        }
        impl From<String> for $Name {
            fn from(id: String) -> Self {
                $Name::from(id.as_str())
            }
        }
        impl From<&$Name> for $Name {
            fn from(id: &$Name) -> $Name {
                id.clone()
            }
        }
        impl From<$Name> for String {
            fn from(id: $Name) -> String {
                id.to_string()
            }
        }
        impl From<&$Name> for String {
            fn from(id: &$Name) -> String {
                id.to_string()
            }
        }
    };
}

#[macro_export]
macro_rules! cli_impl_string_id {
    ($Name:ident, $Doc:literal) => {
        cli_impl_string_id_inner!($Name, $Doc);
        impl Default for $Name {
            /// Generates new blank identifier.
            fn default() -> Self {
                $Name("".to_string())
            }
        }
        impl $Name {
            /// Build Self from a string trait id.
            pub fn from<T: Into<String>>(id: T) -> Self {
                $Name(id.into())
            }
        }
    };
}

#[macro_export]
macro_rules! cli_impl_string_uuid {
    ($Name:ident, $Doc:literal) => {
        cli_impl_string_id_inner!($Name, $Doc);
        impl Default for $Name {
            /// Generates new blank identifier.
            fn default() -> Self {
                $Name(uuid::Uuid::default().to_string())
            }
        }
        impl $Name {
            /// Build Self from a string trait id.
            pub fn from<T: Into<String>>(id: T) -> Self {
                $Name(id.into())
            }
            /// Generates new random identifier.
            pub fn new() -> Self {
                $Name(uuid::Uuid::new_v4().to_string())
            }
        }
    };
}

cli_impl_string_uuid!(VolumeId, "UUID of a volume");
cli_impl_string_uuid!(SnapshotId, "UUID of a volume snapshot");
cli_impl_string_uuid!(GroupId, "UUID of a consistency group");
cli_impl_string_uuid!(GroupSnapshotId, "UUID of a consistency group snapshot");
cli_impl_string_id!(VdiskName, "Name of a vdisk on the array");
cli_impl_string_id!(PoolId, "Name of a storage pool (mdisk group)");
cli_impl_string_id!(NodeId, "Name of a node canister");
cli_impl_string_id!(HostName, "Name of a host object on the array");
cli_impl_string_id!(ClusterId, "Identifier of a cluster (system)");
cli_impl_string_id!(RelationshipName, "Name of a remote copy relationship");
