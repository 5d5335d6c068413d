// ABOUTME: Errors from invoking the aws command-line client, with SNAFU context selectors.
// ABOUTME: Extracts the service error code so callers can classify failures.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("{operation} failed: {stderr}"))]
    Failed {
        operation: String,
        code: Option<String>,
        stderr: String,
    },

    #[snafu(display("unexpected {operation} response: {source}"))]
    Parse {
        operation: String,
        source: serde_json::Error,
    },
}

impl CliError {
    /// Service error code such as `InvalidInstanceID.NotFound`, when reported.
    pub fn code(&self) -> Option<&str> {
        match self {
            CliError::Failed { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn has_code(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|c| codes.contains(&c))
    }

    pub fn is_access_denied(&self) -> bool {
        self.code().is_some_and(|c| {
            c.contains("AccessDenied") || c.contains("Unauthorized") || c.ends_with("InvalidKeyId")
        })
    }
}

/// Pull the code out of `An error occurred (<Code>) when calling ...`.
pub fn error_code(stderr: &str) -> Option<String> {
    let start = stderr.find("An error occurred (")? + "An error occurred (".len();
    let end = stderr[start..].find(')')? + start;
    let code = &stderr[start..end];
    (!code.is_empty()).then(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_cli_message() {
        let stderr = "\nAn error occurred (InvalidInstanceID.NotFound) when calling the \
                      DescribeInstances operation: The instance ID 'i-1' does not exist";
        assert_eq!(error_code(stderr).as_deref(), Some("InvalidInstanceID.NotFound"));
    }

    #[test]
    fn no_code_for_waiter_failures() {
        assert_eq!(
            error_code("Waiter InstanceRunning failed: Max attempts exceeded"),
            None
        );
    }

    #[test]
    fn classifies_access_denied() {
        let err = CliError::Failed {
            operation: "ssm get-parameter".to_string(),
            code: Some("AccessDeniedException".to_string()),
            stderr: String::new(),
        };
        assert!(err.is_access_denied());
        assert!(err.has_code(&["AccessDeniedException"]));
    }
}
