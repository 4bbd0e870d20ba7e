//! Portainer API wire types.

use serde::{Deserialize, Serialize};

/// Status code Portainer reports for a running stack.
pub const STACK_STATUS_ACTIVE: i64 = 1;

/// A stack as returned by `GET /api/stacks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    /// 1 = active, 2 = inactive.
    #[serde(rename = "Status", default)]
    pub status: Option<i64>,
}

impl Stack {
    pub fn new(id: i64, name: impl Into<String>, status: i64) -> Self {
        Self {
            id,
            name: name.into(),
            status: Some(status),
        }
    }

    /// Human-readable status label.
    pub fn status_label(&self) -> String {
        match self.status {
            Some(STACK_STATUS_ACTIVE) => "Ativo".to_string(),
            Some(code) => format!("Status-Code-{}", code),
            None => "Status-Code-None".to_string(),
        }
    }
}

/// Body of `GET /api/stacks/{id}/file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackFile {
    #[serde(rename = "StackFileContent", default)]
    pub stack_file_content: Option<String>,
}

impl StackFile {
    /// The file text, or `None` when absent or empty.
    pub fn into_content(self) -> Option<String> {
        self.stack_file_content.filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_deserialization() {
        let stacks: Vec<Stack> = serde_json::from_str(
            r#"[{"Id":1,"Name":"app","Status":1,"EndpointId":2},{"Id":7,"Name":"db"}]"#,
        )
        .unwrap();

        assert_eq!(stacks[0], Stack::new(1, "app", 1));
        assert_eq!(stacks[1].status, None);
        assert_eq!(stacks[1].status_label(), "Status-Code-None");
    }

    #[test]
    fn test_status_label() {
        assert_eq!(Stack::new(1, "app", 1).status_label(), "Ativo");
        assert_eq!(Stack::new(2, "db", 2).status_label(), "Status-Code-2");
        assert_eq!(Stack::new(3, "x", 0).status_label(), "Status-Code-0");
    }

    #[test]
    fn test_stack_file_content() {
        let file: StackFile =
            serde_json::from_str(r#"{"StackFileContent":"services: {}"}"#).unwrap();
        assert_eq!(file.into_content().as_deref(), Some("services: {}"));

        let empty: StackFile = serde_json::from_str(r#"{"StackFileContent":""}"#).unwrap();
        assert!(empty.into_content().is_none());

        let missing: StackFile = serde_json::from_str("{}").unwrap();
        assert!(missing.into_content().is_none());
    }
}
