//! Repository and changeset value types supplied by the hosting SCM.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub namespace: String,
    pub name: String,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub mail: Option<String>,
}

impl Person {
    /// Identity recorded on retry records: mail address when present,
    /// otherwise the display name.
    pub fn identity(&self) -> &str {
        self.mail
            .as_deref()
            .filter(|mail| !mail.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub id: String,
    pub description: String,
    pub author: Person,
}

#[cfg(test)]
mod tests {
    use super::{Person, Repository};

    #[test]
    fn unit_repository_full_name_joins_namespace_and_name() {
        let repository = Repository {
            id: "r1".to_string(),
            namespace: "platform".to_string(),
            name: "billing".to_string(),
        };
        assert_eq!(repository.full_name(), "platform/billing");
    }

    #[test]
    fn unit_person_identity_prefers_mail_over_name() {
        let with_mail = Person {
            name: "Ada".to_string(),
            mail: Some("ada@example.com".to_string()),
        };
        assert_eq!(with_mail.identity(), "ada@example.com");

        let blank_mail = Person {
            name: "Ada".to_string(),
            mail: Some("  ".to_string()),
        };
        assert_eq!(blank_mail.identity(), "Ada");

        let no_mail = Person {
            name: "Ada".to_string(),
            mail: None,
        };
        assert_eq!(no_mail.identity(), "Ada");
    }
}
