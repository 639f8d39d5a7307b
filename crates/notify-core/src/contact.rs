use crate::{Directory, error::DirectoryError};

/// Look up the chat handle for `identity`. Exactly one directory entry must match.
///
/// # Errors
///
/// `NoContactFound` for zero matches, `AmbiguousContact` for more than one,
/// `MissingHandle` when the single entry has no usable handle, or the
/// backend's own failure.
pub async fn resolve_contact(
    directory: &dyn Directory,
    identity: &str,
) -> Result<String, DirectoryError> {
    let mut handles = directory.search(identity).await?;
    match handles.len() {
        0 => Err(DirectoryError::NoContactFound {
            identity: identity.to_owned(),
        }),
        1 => handles
            .pop()
            .flatten()
            .map(|h| h.trim().to_owned())
            .filter(|h| !h.is_empty() && h != "@")
            .map(|h| normalize_handle(&h))
            .ok_or_else(|| DirectoryError::MissingHandle {
                identity: identity.to_owned(),
            }),
        count => Err(DirectoryError::AmbiguousContact {
            identity: identity.to_owned(),
            count,
        }),
    }
}

fn normalize_handle(handle: &str) -> String {
    if handle.starts_with('@') {
        handle.to_owned()
    } else {
        format!("@{handle}")
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct FixedDirectory(Vec<Option<String>>);

    #[async_trait]
    impl Directory for FixedDirectory {
        async fn search(&self, _identity: &str) -> Result<Vec<Option<String>>, DirectoryError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl Directory for BrokenDirectory {
        async fn search(&self, _identity: &str) -> Result<Vec<Option<String>>, DirectoryError> {
            Err(DirectoryError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn single_entry_resolves_to_mention() {
        let dir = FixedDirectory(vec![Some("jdoe".to_owned())]);
        assert_eq!(resolve_contact(&dir, "jdoe").await.unwrap(), "@jdoe");
    }

    #[tokio::test]
    async fn existing_at_prefix_is_kept() {
        let dir = FixedDirectory(vec![Some("@jane".to_owned())]);
        assert_eq!(resolve_contact(&dir, "jdoe").await.unwrap(), "@jane");
    }

    #[tokio::test]
    async fn zero_entries_is_no_contact() {
        let dir = FixedDirectory(vec![]);
        assert!(matches!(
            resolve_contact(&dir, "ghost").await,
            Err(DirectoryError::NoContactFound { identity }) if identity == "ghost"
        ));
    }

    #[tokio::test]
    async fn several_entries_is_ambiguous() {
        let dir = FixedDirectory(vec![Some("a".to_owned()), Some("b".to_owned())]);
        assert!(matches!(
            resolve_contact(&dir, "jdoe").await,
            Err(DirectoryError::AmbiguousContact { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn entry_without_handle_is_reported() {
        for handles in [vec![None], vec![Some("  ".to_owned())]] {
            let dir = FixedDirectory(handles);
            assert!(matches!(
                resolve_contact(&dir, "jdoe").await,
                Err(DirectoryError::MissingHandle { .. })
            ));
        }
    }

    #[tokio::test]
    async fn backend_failure_passes_through() {
        assert!(matches!(
            resolve_contact(&BrokenDirectory, "jdoe").await,
            Err(DirectoryError::Backend(_))
        ));
    }
}
