//! Event → action reduction.
//!
//! Pure: given an event and what the deployer knows about the file, decide
//! what to do. Keeping this free of I/O makes every transition testable.

use std::path::PathBuf;

use super::source::DeployEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployAction {
    Deploy(PathBuf),
    Undeploy(PathBuf),
}

/// Actions for `event`.
///
/// `tracked` tells whether the file is currently deployed, `recognized`
/// whether a loader accepts it.
pub fn reduce(event: &DeployEvent, tracked: bool, recognized: bool) -> Vec<DeployAction> {
    let path = event.path().to_path_buf();
    match event {
        DeployEvent::Created(_) | DeployEvent::Modified(_) if !recognized => Vec::new(),
        // A create on a tracked file is an editor replacing it.
        DeployEvent::Created(_) | DeployEvent::Modified(_) if tracked => vec![
            DeployAction::Undeploy(path.clone()),
            DeployAction::Deploy(path),
        ],
        DeployEvent::Created(_) | DeployEvent::Modified(_) => vec![DeployAction::Deploy(path)],
        DeployEvent::Removed(_) if tracked => vec![DeployAction::Undeploy(path)],
        DeployEvent::Removed(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> PathBuf {
        PathBuf::from("/scripts/hello.toml")
    }

    #[test]
    fn test_create() {
        assert_eq!(
            reduce(&DeployEvent::Created(p()), false, true),
            vec![DeployAction::Deploy(p())]
        );
        assert!(reduce(&DeployEvent::Created(p()), false, false).is_empty());
        assert_eq!(
            reduce(&DeployEvent::Created(p()), true, true),
            vec![DeployAction::Undeploy(p()), DeployAction::Deploy(p())]
        );
    }

    #[test]
    fn test_modify_redeploys() {
        assert_eq!(
            reduce(&DeployEvent::Modified(p()), true, true),
            vec![DeployAction::Undeploy(p()), DeployAction::Deploy(p())]
        );
        // A file that failed to deploy gets another chance when edited.
        assert_eq!(
            reduce(&DeployEvent::Modified(p()), false, true),
            vec![DeployAction::Deploy(p())]
        );
    }

    #[test]
    fn test_remove() {
        assert_eq!(
            reduce(&DeployEvent::Removed(p()), true, true),
            vec![DeployAction::Undeploy(p())]
        );
        assert!(reduce(&DeployEvent::Removed(p()), false, true).is_empty());
    }
}
