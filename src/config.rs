use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::kwargs::Kwargs;


/// A batch of threads to run together, as read from YAML.
///
/// ```yaml
/// timeout: 30
/// workers: 4
/// threads:
///   - args: [ior, -w, -k]
///   - args: [mdtest, -C]
///     timeout: 10
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ThreadPlan {
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub workers: Option<usize>,
    pub threads: Vec<Kwargs>,
}

impl ThreadPlan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        load_yaml(path.as_ref())
    }

    pub fn timeout(&self) -> Result<Option<Duration>, Error> {
        self.timeout.map(seconds).transpose()
    }
}


pub(crate) fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    tracing::debug!("Loading {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}


pub(crate) fn seconds(value: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(value).map_err(|_| Error::InvalidTimeout(value))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_from_yaml() {
        let yaml = r#"
timeout: 2.5
threads:
  - args: [echo, one]
  - args: [echo, two]
    ignore_status: true
"#;
        let plan: ThreadPlan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.timeout().unwrap(), Some(Duration::from_millis(2500)));
        assert_eq!(plan.workers, None);
        assert_eq!(plan.threads.len(), 2);
        assert_eq!(plan.threads[1].get::<bool>("ignore_status").unwrap(), true);
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let plan = ThreadPlan {
            timeout: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(plan.timeout(), Err(Error::InvalidTimeout(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ThreadPlan::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
