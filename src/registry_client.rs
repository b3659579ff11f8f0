use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::dtos::RegistrySnapshot;
use crate::error::RegistryError;

/// Remote registry operations. One request, one response, no retries.
pub trait RegistryClient: Send + Sync {
    fn bootstrap(&self) -> Result<RegistrySnapshot, RegistryError>;
    fn switch_project(&self, project_id: &str) -> Result<RegistrySnapshot, RegistryError>;
    fn refresh_projects(&self) -> Result<RegistrySnapshot, RegistryError>;
    /// May return the unchanged snapshot when the native picker is cancelled.
    fn add_project(&self) -> Result<RegistrySnapshot, RegistryError>;
    fn toggle_favorite(&self, project_id: &str) -> Result<RegistrySnapshot, RegistryError>;
    fn remove_project(&self, project_id: &str) -> Result<RegistrySnapshot, RegistryError>;
    fn rename_project(&self, project_id: &str, name: &str)
        -> Result<RegistrySnapshot, RegistryError>;
    fn validate_project(&self, project_id: &str) -> Result<bool, RegistryError>;
    fn check_for_updates(&self) -> Result<(), RegistryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Bootstrap,
    SwitchProject(String),
    RefreshProjects,
    AddProject,
    ToggleFavorite(String),
    RemoveProject(String),
    RenameProject { project_id: String, name: String },
    ValidateProject(String),
    CheckForUpdates,
}

impl RegistryCall {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::SwitchProject(_) => "switch-project",
            Self::RefreshProjects => "refresh-projects",
            Self::AddProject => "add-project",
            Self::ToggleFavorite(_) => "toggle-favorite",
            Self::RemoveProject(_) => "remove-project",
            Self::RenameProject { .. } => "rename-project",
            Self::ValidateProject(_) => "validate-project",
            Self::CheckForUpdates => "check-updates",
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::SwitchProject(project_id)
            | Self::ToggleFavorite(project_id)
            | Self::RemoveProject(project_id)
            | Self::ValidateProject(project_id)
            | Self::RenameProject { project_id, .. } => Some(project_id),
            Self::Bootstrap | Self::RefreshProjects | Self::AddProject | Self::CheckForUpdates => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Snapshot(RegistrySnapshot),
    Validation(bool),
    Done,
}

pub fn dispatch(
    client: &dyn RegistryClient,
    call: &RegistryCall,
) -> Result<RemoteOutcome, RegistryError> {
    let outcome = match call {
        RegistryCall::Bootstrap => RemoteOutcome::Snapshot(client.bootstrap()?),
        RegistryCall::SwitchProject(project_id) => {
            RemoteOutcome::Snapshot(client.switch_project(project_id)?)
        }
        RegistryCall::RefreshProjects => RemoteOutcome::Snapshot(client.refresh_projects()?),
        RegistryCall::AddProject => RemoteOutcome::Snapshot(client.add_project()?),
        RegistryCall::ToggleFavorite(project_id) => {
            RemoteOutcome::Snapshot(client.toggle_favorite(project_id)?)
        }
        RegistryCall::RemoveProject(project_id) => {
            RemoteOutcome::Snapshot(client.remove_project(project_id)?)
        }
        RegistryCall::RenameProject { project_id, name } => {
            RemoteOutcome::Snapshot(client.rename_project(project_id, name)?)
        }
        RegistryCall::ValidateProject(project_id) => {
            RemoteOutcome::Validation(client.validate_project(project_id)?)
        }
        RegistryCall::CheckForUpdates => {
            client.check_for_updates()?;
            RemoteOutcome::Done
        }
    };
    Ok(outcome)
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> CommandBody<'a> {
    fn for_project(project_id: &'a str) -> Self {
        Self {
            project_id: Some(project_id),
            name: None,
        }
    }
}

/// Posts camelCase JSON commands to `{base}/desktop/{command}`.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    base_url: Url,
    client: Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|error| RegistryError::InvalidUrl(format!("{base_url}: {error}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("leanspec-desktop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| RegistryError::Transport(error.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn endpoint(&self, command: &str) -> Result<Url, RegistryError> {
        self.base_url
            .join(&format!("desktop/{command}"))
            .map_err(|error| RegistryError::InvalidUrl(error.to_string()))
    }

    fn send(&self, command: &str, body: &CommandBody<'_>) -> Result<String, RegistryError> {
        let endpoint = self.endpoint(command)?;
        debug!(command, %endpoint, "posting registry command");

        let response = self
            .client
            .post(endpoint)
            .json(body)
            .send()
            .map_err(|error| RegistryError::Transport(error.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|error| RegistryError::Transport(error.to_string()))?;

        if !status.is_success() {
            let message = if text.trim().is_empty() {
                status.to_string()
            } else {
                text.trim().to_string()
            };
            return Err(RegistryError::Rejected {
                command: command.to_string(),
                message,
            });
        }

        Ok(text)
    }

    fn post<T: DeserializeOwned>(
        &self,
        command: &str,
        body: &CommandBody<'_>,
    ) -> Result<T, RegistryError> {
        let text = self.send(command, body)?;
        serde_json::from_str::<T>(&text).map_err(|error| RegistryError::Decode {
            command: command.to_string(),
            message: error.to_string(),
        })
    }
}

impl RegistryClient for HttpRegistryClient {
    fn bootstrap(&self) -> Result<RegistrySnapshot, RegistryError> {
        self.post("bootstrap", &CommandBody::default())
    }

    fn switch_project(&self, project_id: &str) -> Result<RegistrySnapshot, RegistryError> {
        self.post("switch-project", &CommandBody::for_project(project_id))
    }

    fn refresh_projects(&self) -> Result<RegistrySnapshot, RegistryError> {
        self.post("refresh-projects", &CommandBody::default())
    }

    fn add_project(&self) -> Result<RegistrySnapshot, RegistryError> {
        self.post("add-project", &CommandBody::default())
    }

    fn toggle_favorite(&self, project_id: &str) -> Result<RegistrySnapshot, RegistryError> {
        self.post("toggle-favorite", &CommandBody::for_project(project_id))
    }

    fn remove_project(&self, project_id: &str) -> Result<RegistrySnapshot, RegistryError> {
        self.post("remove-project", &CommandBody::for_project(project_id))
    }

    fn rename_project(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<RegistrySnapshot, RegistryError> {
        let body = CommandBody {
            project_id: Some(project_id),
            name: Some(name),
        };
        self.post("rename-project", &body)
    }

    fn validate_project(&self, project_id: &str) -> Result<bool, RegistryError> {
        self.post("validate-project", &CommandBody::for_project(project_id))
    }

    fn check_for_updates(&self) -> Result<(), RegistryError> {
        self.send("check-updates", &CommandBody::default())
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serves exactly one HTTP response and hands back the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                head.push_str(&line);
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            format!("{head}\n{}", String::from_utf8(request_body).unwrap())
        });
        (format!("http://{address}"), handle)
    }

    #[test]
    fn endpoint_joins_commands_under_desktop_prefix() {
        let client =
            HttpRegistryClient::new("http://127.0.0.1:4319/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("switch-project").unwrap().as_str(),
            "http://127.0.0.1:4319/api/desktop/switch-project"
        );
        assert!(matches!(
            HttpRegistryClient::new("not a url", Duration::from_secs(1)),
            Err(RegistryError::InvalidUrl(_))
        ));
    }

    #[test]
    fn posts_camel_case_body_and_decodes_snapshot() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"projects":[{"id":"a","name":"Alpha","path":"/w/a","specsDir":"/w/a/specs","lastAccessed":"2024-05-01T10:00:00Z"}],"activeProjectId":"a","config":{}}"#,
        );
        let client = HttpRegistryClient::new(&base, Duration::from_secs(5)).unwrap();

        let snapshot = client.rename_project("a", "Alpha").unwrap();
        assert_eq!(snapshot.active_project_id.as_deref(), Some("a"));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /desktop/rename-project "));
        assert!(request.contains(r#"{"projectId":"a","name":"Alpha"}"#));
    }

    #[test]
    fn non_success_status_is_rejected_with_body_text() {
        let (base, server) = serve_once("500 Internal Server Error", "Project not found");
        let client = HttpRegistryClient::new(&base, Duration::from_secs(5)).unwrap();

        let error = client.validate_project("zzz").unwrap_err();
        assert_eq!(
            error,
            RegistryError::Rejected {
                command: "validate-project".to_string(),
                message: "Project not found".to_string(),
            }
        );
        server.join().unwrap();
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let (base, server) = serve_once("200 OK", "{\"projects\": 5}");
        let client = HttpRegistryClient::new(&base, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.refresh_projects(),
            Err(RegistryError::Decode { .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn call_metadata_matches_commands() {
        let call = RegistryCall::RenameProject {
            project_id: "a".to_string(),
            name: "Alpha".to_string(),
        };
        assert_eq!(call.command(), "rename-project");
        assert_eq!(call.project_id(), Some("a"));
        assert_eq!(RegistryCall::CheckForUpdates.project_id(), None);
    }
}
