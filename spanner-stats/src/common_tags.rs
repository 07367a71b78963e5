use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Version reported in the `library_version` tag.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

static DATABASE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^projects/(?P<project>[^/]+)/instances/(?P<instance>[^/]+)/databases/(?P<database>[^/]+)$")
        .expect("database name pattern is valid")
});

#[derive(Error, Debug, PartialEq, Eq)]
#[error("database name {0:?} should conform to pattern \"projects/PROJECT_ID/instances/INSTANCE_ID/databases/DATABASE_ID\"")]
pub struct InvalidDatabaseName(pub String);

/// The components of a fully-qualified database resource name.
#[derive(Debug, PartialEq, Eq)]
pub struct DatabaseName<'a> {
    pub project: &'a str,
    pub instance: &'a str,
    pub database: &'a str,
}

pub fn parse_database_name(name: &str) -> Result<DatabaseName<'_>, InvalidDatabaseName> {
    let captures = DATABASE_NAME_REGEX
        .captures(name)
        .ok_or_else(|| InvalidDatabaseName(name.to_owned()))?;

    match (
        captures.name("project"),
        captures.name("instance"),
        captures.name("database"),
    ) {
        (Some(project), Some(instance), Some(database)) => Ok(DatabaseName {
            project: project.as_str(),
            instance: instance.as_str(),
            database: database.as_str(),
        }),
        _ => Err(InvalidDatabaseName(name.to_owned())),
    }
}

/// Identity of a session-pool client, as seen by the telemetry helpers.
#[derive(Debug, Clone)]
pub struct SessionClient {
    /// e.g. `client-1`
    pub id: String,
    /// Fully-qualified database name.
    pub database: String,
}

/// Key-value pairs attached to every GFE latency recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonTags {
    pub client_id: String,
    pub database: String,
    pub instance: String,
    pub lib_version: String,
}

impl CommonTags {
    /// Returns `None` when the client's database name can't be parsed; callers skip recording.
    pub fn from_session_client(client: &SessionClient) -> Option<CommonTags> {
        let name = parse_database_name(&client.database).ok()?;

        Some(CommonTags {
            client_id: client.id.clone(),
            database: name.database.to_owned(),
            instance: name.instance.to_owned(),
            lib_version: LIBRARY_VERSION.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_name() {
        let name = parse_database_name("projects/p1/instances/i1/databases/d1").unwrap();

        assert_eq!(
            name,
            DatabaseName {
                project: "p1",
                instance: "i1",
                database: "d1",
            }
        );
    }

    #[test]
    fn test_parse_invalid_database_names() {
        for name in [
            "",
            "projects/p1/instances/i1",
            "projects/p1/instances/i1/databases/",
            "projects/p1/instances/i1/databases/d1/sessions/s1",
            "/projects/p1/instances/i1/databases/d1",
        ] {
            assert_eq!(
                parse_database_name(name),
                Err(InvalidDatabaseName(name.to_owned()))
            );
        }
    }

    #[test]
    fn test_common_tags_from_session_client() {
        let client = SessionClient {
            id: "client-3".to_owned(),
            database: "projects/p1/instances/i1/databases/d1".to_owned(),
        };

        let tags = CommonTags::from_session_client(&client).unwrap();
        assert_eq!(tags.client_id, "client-3");
        assert_eq!(tags.database, "d1");
        assert_eq!(tags.instance, "i1");
        assert_eq!(tags.lib_version, LIBRARY_VERSION);
    }

    #[test]
    fn test_unparsable_database_skips_tags() {
        let client = SessionClient {
            id: "client-1".to_owned(),
            database: "not-a-database".to_owned(),
        };

        assert_eq!(CommonTags::from_session_client(&client), None);
    }
}
